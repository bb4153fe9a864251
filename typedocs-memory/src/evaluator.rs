//! Filter evaluation and value ordering for in-memory queries.

use std::{collections::HashMap, cmp::Ordering};
use bson::{Bson, Document as BsonDocument, datetime::DateTime};

use typedocs_core::{
    query::{QueryVisitor, Expr, FieldOp, lookup_path},
    error::{DocumentError, DocumentResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that, for example, an `Int32`
/// filter value matches an `Int64` field.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl Comparable<'_> {
    /// Position of the value's type when values of different types are ordered.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Bool(_) => 5,
            Comparable::DateTime(_) => 6,
        }
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders two possibly-missing field values for sorting and cursors.
///
/// Missing values sort as null. Values of different types are ordered by type,
/// and values that cannot be compared are treated as equal. Numbers are
/// totally ordered with NaN before every other number.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    if let (Comparable::Number(a), Comparable::Number(b)) = (&left, &right) {
        return a.is_nan()
            .cmp(&b.is_nan())
            .reverse()
            .then_with(|| a.total_cmp(b));
    }

    match left.partial_cmp(&right) {
        Some(ordering) => ordering,
        None => left.rank().cmp(&right.rank()),
    }
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentResult<bool> {
        self.visit_expr(expr)
    }
}

fn contains(haystack: &Comparable<'_>, needle: &Comparable<'_>) -> bool {
    match (haystack, needle) {
        (Comparable::Array(items), needle) => items.iter().any(|item| item == needle),
        (Comparable::String(left), Comparable::String(right)) => left.contains(right),
        _ => false,
    }
}

fn any_shared(field: &Comparable<'_>, value: &Comparable<'_>) -> bool {
    match (field, value) {
        (Comparable::Array(items), Comparable::Array(values)) => values
            .iter()
            .any(|value| items.iter().any(|item| item == value)),
        (Comparable::Array(items), single) | (single, Comparable::Array(items)) => items
            .iter()
            .any(|item| item == single),
        _ => false,
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup_path(self.document, field) else {
            return Ok(matches!(op, FieldOp::NotContains | FieldOp::NoneOf));
        };

        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(left.partial_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(left.partial_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
            FieldOp::Contains => contains(&left, &right),
            FieldOp::NotContains => !contains(&left, &right),
            FieldOp::StartsWith => match (left, right) {
                (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
                _ => false,
            },
            FieldOp::EndsWith => match (left, right) {
                (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
                _ => false,
            },
            FieldOp::AnyOf => any_shared(&left, &right),
            FieldOp::NoneOf => !any_shared(&left, &right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use typedocs_core::query::Filter;

    fn matches(document: &BsonDocument, expr: Expr) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&expr)
            .unwrap()
    }

    #[test]
    fn numeric_types_compare_across_widths() {
        let document = doc! { "priority": 3_i64 };

        assert!(matches(&document, Filter::eq("priority", 3_i32)));
        assert!(matches(&document, Filter::gt("priority", 2.5)));
        assert!(!matches(&document, Filter::lt("priority", 3)));
    }

    #[test]
    fn nested_paths_and_existence() {
        let document = doc! { "address": { "city": "Oslo" }, "tags": ["a", "b"] };

        assert!(matches(&document, Filter::eq("address.city", "Oslo")));
        assert!(matches(&document, Filter::not_exists("address.zip")));
        assert!(matches(&document, Filter::contains("tags", "b")));
        assert!(matches(&document, Filter::any_of("tags", vec!["x", "a"])));
        assert!(matches(&document, Filter::none_of("tags", vec!["x", "y"])));
    }

    #[test]
    fn missing_fields_only_satisfy_negative_operators() {
        let document = doc! {};

        assert!(!matches(&document, Filter::eq("title", "x")));
        assert!(matches(&document, Filter::not_contains("title", "x")));
    }

    #[test]
    fn missing_values_sort_first() {
        let two = Bson::Int64(2);
        let name = Bson::String("a".to_string());

        assert_eq!(compare_values(None, Some(&two)), Ordering::Less);
        assert_eq!(compare_values(Some(&two), Some(&name)), Ordering::Less);
        assert_eq!(compare_values(Some(&two), Some(&Bson::Int32(2))), Ordering::Equal);
    }

    #[test]
    fn nan_sorts_before_every_number() {
        let nan = Bson::Double(f64::NAN);
        let low = Bson::Double(f64::NEG_INFINITY);
        let one = Bson::Int32(1);

        assert_eq!(compare_values(Some(&nan), Some(&low)), Ordering::Less);
        assert_eq!(compare_values(Some(&one), Some(&nan)), Ordering::Greater);
        assert_eq!(compare_values(Some(&nan), Some(&nan)), Ordering::Equal);
        assert_eq!(compare_values(None, Some(&nan)), Ordering::Less);

        let mut values = vec![one.clone(), nan.clone(), low.clone(), nan.clone(), Bson::Int64(0)];
        values.sort_by(|a, b| compare_values(Some(a), Some(b)));

        assert!(matches!(values[0], Bson::Double(v) if v.is_nan()));
        assert!(matches!(values[1], Bson::Double(v) if v.is_nan()));
        assert_eq!(&values[2..], &[low, Bson::Int64(0), one]);
    }
}
