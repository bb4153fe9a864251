//! Translation of queries, cursors and patches into MongoDB syntax.

use std::collections::BTreeMap;
use bson::{Document, Bson, doc};

use typedocs_core::{
    query::{Cursor, Query, QueryVisitor, Expr, FieldOp, SortDirection},
    error::{DocumentError, DocumentResult},
    update::{FieldWrite, Patch},
};


/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

fn require_string<'a>(op: &str, value: &'a Bson) -> Result<&'a str, DocumentError> {
    value
        .as_str()
        .ok_or_else(|| DocumentError::InvalidQuery(format!("{op} operator requires a string value")))
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(s) },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                    other => doc! { "$not": { "$elemMatch": { "$eq": other } } },
                },
                FieldOp::StartsWith => doc! { "$regex": format!("^{}", escape_regex(require_string("StartsWith", value)?)) },
                FieldOp::EndsWith => doc! { "$regex": format!("{}$", escape_regex(require_string("EndsWith", value)?)) },
                FieldOp::AnyOf => match value {
                    Bson::Array(_) => doc! { "$in": value },
                    other => doc! { "$in": [other] },
                },
                FieldOp::NoneOf => match value {
                    Bson::Array(_) => doc! { "$nin": value },
                    other => doc! { "$nin": [other] },
                },
            }
        })
    }
}

/// Builds the filter selecting documents strictly after `cursor` in query order.
///
/// Query order is the sort field (nulls first) then ascending `_id`.
pub(crate) fn cursor_filter(query: &Query, cursor: &Cursor) -> Document {
    let Some(sort) = &query.sort else {
        return doc! { "_id": { "$gt": cursor.id.as_str() } };
    };

    let field = sort.field.as_str();
    let tie = doc! { field: cursor.value.clone().unwrap_or(Bson::Null), "_id": { "$gt": cursor.id.as_str() } };

    let clauses = match (&cursor.value, sort.direction) {
        (Some(Bson::Null) | None, SortDirection::Asc) => vec![
            doc! { field: { "$exists": true, "$ne": Bson::Null } },
            tie,
        ],
        (Some(Bson::Null) | None, SortDirection::Desc) => vec![tie],
        (Some(value), SortDirection::Asc) => vec![
            doc! { field: { "$gt": value } },
            tie,
        ],
        (Some(value), SortDirection::Desc) => vec![
            doc! { field: { "$lt": value } },
            tie,
            doc! { field: Bson::Null },
        ],
    };

    doc! { "$or": clauses }
}

/// Builds the complete find filter for `query`.
pub(crate) fn query_filter(query: &Query) -> DocumentResult<Document> {
    let filter = match &query.filter {
        Some(expr) => Some(MongoQueryTranslator.visit_expr(expr)?),
        None => None,
    };
    let cursor = query
        .start_after
        .as_ref()
        .map(|cursor| cursor_filter(query, cursor));

    Ok(match (filter, cursor) {
        (Some(filter), Some(cursor)) => doc! { "$and": [filter, cursor] },
        (Some(filter), None) => filter,
        (None, Some(cursor)) => cursor,
        (None, None) => doc! {},
    })
}

/// Builds the sort specification for `query`, always ending with `_id`.
pub(crate) fn query_sort(query: &Query) -> Document {
    match &query.sort {
        Some(sort) => doc! {
            sort.field.clone(): match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            },
            "_id": 1,
        },
        None => doc! { "_id": 1 },
    }
}

/// Builds a projection document for the selected top-level fields.
///
/// An empty selection projects only `_id`, since `{}` would return every field.
pub(crate) fn projection(fields: &[String]) -> Document {
    if fields.is_empty() {
        return doc! { "_id": 1 };
    }

    fields
        .iter()
        .map(|field| (field.clone(), Bson::Int32(1)))
        .collect()
}

/// Translates a patch into an update document of MongoDB update operators.
///
/// Returns `None` for a patch without writes, which MongoDB would reject.
pub(crate) fn update_document(patch: &Patch) -> Option<Document> {
    let mut operators: BTreeMap<&'static str, Document> = BTreeMap::new();

    for (field, write) in &patch.writes {
        // A later write to a field replaces any earlier one.
        for fields in operators.values_mut() {
            fields.remove(field);
        }

        let (operator, value) = match write {
            FieldWrite::Value(value) => ("$set", value.clone()),
            FieldWrite::ServerTimestamp => ("$currentDate", Bson::Boolean(true)),
            FieldWrite::Increment(by) => ("$inc", by.clone()),
            FieldWrite::ArrayUnion(values) => ("$addToSet", Bson::Document(doc! { "$each": values.clone() })),
            FieldWrite::ArrayRemove(values) => ("$pull", Bson::Document(doc! { "$in": values.clone() })),
            FieldWrite::Delete => ("$unset", Bson::String(String::new())),
        };

        operators
            .entry(operator)
            .or_default()
            .insert(field.clone(), value);
    }

    let update: Document = operators
        .into_iter()
        .filter(|(_, fields)| !fields.is_empty())
        .map(|(operator, fields)| (operator.to_string(), Bson::Document(fields)))
        .collect();

    (!update.is_empty()).then_some(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use typedocs_core::query::Filter;

    #[test]
    fn negation_uses_nor() {
        let filter = MongoQueryTranslator
            .visit_expr(&Filter::eq("a", 1).not())
            .unwrap();

        assert_eq!(filter, doc! { "$nor": [{ "a": { "$eq": 1 } }] });
    }

    #[test]
    fn string_operators_escape_the_pattern() {
        let filter = MongoQueryTranslator
            .visit_expr(&Filter::starts_with("name", "a.b"))
            .unwrap();

        assert_eq!(filter, doc! { "name": { "$regex": "^a\\.b" } });
    }

    #[test]
    fn starts_with_requires_a_string() {
        let err = MongoQueryTranslator
            .visit_expr(&Filter::starts_with("name", 3))
            .unwrap_err();

        assert!(matches!(err, DocumentError::InvalidQuery(_)));
    }

    #[test]
    fn unsorted_cursor_resumes_by_id() {
        let query = Query::builder()
            .filter(Filter::eq("done", false))
            .start_after(Cursor::new("t3", None))
            .build();

        assert_eq!(
            query_filter(&query).unwrap(),
            doc! { "$and": [{ "done": { "$eq": false } }, { "_id": { "$gt": "t3" } }] },
        );
        assert_eq!(query_sort(&query), doc! { "_id": 1 });
    }

    #[test]
    fn sorted_cursor_breaks_ties_by_id() {
        let query = Query::builder()
            .sort("priority", SortDirection::Asc)
            .start_after(Cursor::new("t3", Some(Bson::Int64(2))))
            .build();

        assert_eq!(
            query_filter(&query).unwrap(),
            doc! { "$or": [
                { "priority": { "$gt": 2_i64 } },
                { "priority": 2_i64, "_id": { "$gt": "t3" } },
            ] },
        );
    }

    #[test]
    fn descending_cursor_without_value_stays_among_nulls() {
        let query = Query::builder()
            .sort("due", SortDirection::Desc)
            .start_after(Cursor::new("t3", None))
            .build();

        assert_eq!(
            query_filter(&query).unwrap(),
            doc! { "$or": [{ "due": Bson::Null, "_id": { "$gt": "t3" } }] },
        );
    }

    #[test]
    fn ascending_cursor_at_null_moves_on_to_present_values() {
        let query = Query::builder()
            .sort("due", SortDirection::Asc)
            .start_after(Cursor::new("t3", Some(Bson::Null)))
            .build();

        assert_eq!(
            query_filter(&query).unwrap(),
            doc! { "$or": [
                { "due": { "$exists": true, "$ne": Bson::Null } },
                { "due": Bson::Null, "_id": { "$gt": "t3" } },
            ] },
        );
    }

    #[test]
    fn descending_cursor_with_value_ends_with_nulls() {
        let query = Query::builder()
            .filter(Filter::eq("done", false))
            .sort("priority", SortDirection::Desc)
            .start_after(Cursor::new("t3", Some(Bson::Int64(2))))
            .build();

        assert_eq!(
            query_filter(&query).unwrap(),
            doc! { "$and": [
                { "done": { "$eq": false } },
                { "$or": [
                    { "priority": { "$lt": 2_i64 } },
                    { "priority": 2_i64, "_id": { "$gt": "t3" } },
                    { "priority": Bson::Null },
                ] },
            ] },
        );
    }

    #[test]
    fn empty_selection_projects_only_the_id() {
        assert_eq!(projection(&[]), doc! { "_id": 1 });
        assert_eq!(
            projection(&["title".to_string(), "done".to_string()]),
            doc! { "title": 1, "done": 1 },
        );
    }

    #[test]
    fn patch_maps_each_write_to_its_operator() {
        let mut patch = Patch::new();
        patch.push("title", FieldWrite::Value("x".into()));
        patch.push("visits", FieldWrite::Increment(1.into()));
        patch.push("tags", FieldWrite::ArrayUnion(vec!["a".into()]));
        patch.push("old", FieldWrite::Delete);
        patch.push("seen_at", FieldWrite::ServerTimestamp);

        assert_eq!(
            update_document(&patch).unwrap(),
            doc! {
                "$addToSet": { "tags": { "$each": ["a"] } },
                "$currentDate": { "seen_at": true },
                "$inc": { "visits": 1 },
                "$set": { "title": "x" },
                "$unset": { "old": "" },
            },
        );
    }

    #[test]
    fn later_writes_to_a_field_win() {
        let mut patch = Patch::new();
        patch.push("title", FieldWrite::Value("x".into()));
        patch.push("title", FieldWrite::Delete);

        assert_eq!(update_document(&patch).unwrap(), doc! { "$unset": { "title": "" } });
        assert_eq!(update_document(&Patch::new()), None);
    }
}
