//! Update payloads and server-side write markers.
//!
//! [`UpdateData`] is the permissive, typed update input: every entry is keyed
//! by a [`Field`] of the record and may carry either a value of that field's
//! type or a write marker such as [`FieldWrite::ServerTimestamp`]. Markers are
//! only accepted on fields whose type can hold their result. Both it and the
//! concrete-only partial updates lower to an untyped [`Patch`], which is what
//! the native client receives.

use bson::{Bson, DateTime, Document as BsonDocument, ser::serialize_to_bson};
use serde::Serialize;
use std::marker::PhantomData;

use crate::{
    error::{DocumentError, DocumentResult},
    record::{Field, Record},
};

/// A single field write: a concrete value or a server-computed marker.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Set the field to this value.
    Value(Bson),
    /// Set the field to the server's current time.
    ServerTimestamp,
    /// Add this number to the field (a missing field counts as zero).
    Increment(Bson),
    /// Append each value not already present in the array field.
    ArrayUnion(Vec<Bson>),
    /// Remove every occurrence of each value from the array field.
    ArrayRemove(Vec<Bson>),
    /// Remove the field from the document.
    Delete,
}

impl FieldWrite {
    /// Returns `true` if this write is a server-side marker rather than a value.
    pub fn is_marker(&self) -> bool {
        !matches!(self, FieldWrite::Value(_))
    }
}

/// An untyped list of field writes applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    /// Writes in the order they were declared. Later writes to the same field win.
    pub writes: Vec<(String, FieldWrite)>,
}

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Builds a patch that sets every top-level field of `document`.
    pub fn from_values(document: BsonDocument) -> Self {
        Self {
            writes: document
                .into_iter()
                .map(|(field, value)| (field, FieldWrite::Value(value)))
                .collect(),
        }
    }

    /// Appends a write to this patch.
    pub fn push(&mut self, field: impl Into<String>, write: FieldWrite) {
        self.writes.push((field.into(), write));
    }

    /// Returns `true` if the patch contains no writes.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Returns `true` if no write in this patch is a server-side marker.
    pub fn is_concrete(&self) -> bool {
        self.writes
            .iter()
            .all(|(_, write)| !write.is_marker())
    }

    /// Applies this patch to `document`, resolving server timestamps to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidDocument`] if an increment targets a
    /// non-numeric field or an array operation targets a non-array field.
    pub fn apply(&self, document: &mut BsonDocument, now: DateTime) -> DocumentResult<()> {
        for (field, write) in &self.writes {
            match write {
                FieldWrite::Value(value) => {
                    document.insert(field.clone(), value.clone());
                }
                FieldWrite::ServerTimestamp => {
                    document.insert(field.clone(), Bson::DateTime(now));
                }
                FieldWrite::Increment(by) => {
                    let current = document
                        .get(field)
                        .cloned()
                        .unwrap_or(Bson::Int64(0));

                    document.insert(field.clone(), add_numbers(field, &current, by)?);
                }
                FieldWrite::ArrayUnion(values) => {
                    let mut items = existing_array(document, field)?;

                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }

                    document.insert(field.clone(), Bson::Array(items));
                }
                FieldWrite::ArrayRemove(values) => {
                    let mut items = existing_array(document, field)?;
                    items.retain(|item| !values.contains(item));

                    document.insert(field.clone(), Bson::Array(items));
                }
                FieldWrite::Delete => {
                    document.remove(field);
                }
            }
        }

        Ok(())
    }
}

fn existing_array(document: &BsonDocument, field: &str) -> DocumentResult<Vec<Bson>> {
    match document.get(field) {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(items)) => Ok(items.clone()),
        Some(other) => Err(DocumentError::InvalidDocument(format!(
            "field {field} is {:?}, not an array",
            other.element_type()
        ))),
    }
}

fn add_numbers(field: &str, current: &Bson, by: &Bson) -> DocumentResult<Bson> {
    let overflow = || {
        DocumentError::InvalidDocument(format!("incrementing field {field} overflows a 64-bit integer"))
    };

    match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        }),
        (Bson::Int32(a), Bson::Int64(b)) => i64::from(*a).checked_add(*b).map(Bson::Int64).ok_or_else(overflow),
        (Bson::Int64(a), Bson::Int32(b)) => a.checked_add(i64::from(*b)).map(Bson::Int64).ok_or_else(overflow),
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64).ok_or_else(overflow),
        (Bson::Double(a), Bson::Double(b)) => Ok(Bson::Double(a + b)),
        (Bson::Double(a), Bson::Int32(b)) => Ok(Bson::Double(a + f64::from(*b))),
        (Bson::Double(a), Bson::Int64(b)) => Ok(Bson::Double(a + *b as f64)),
        (Bson::Int32(a), Bson::Double(b)) => Ok(Bson::Double(f64::from(*a) + b)),
        (Bson::Int64(a), Bson::Double(b)) => Ok(Bson::Double(*a as f64 + b)),
        _ => Err(DocumentError::InvalidDocument(format!(
            "cannot increment field {field} of type {:?} by {:?}",
            current.element_type(),
            by.element_type()
        ))),
    }
}

/// A field type the server can increment.
pub trait Numeric {
    /// Converts an increment step into its BSON number.
    fn into_bson(self) -> Bson;
}

impl Numeric for i32 {
    fn into_bson(self) -> Bson {
        Bson::Int32(self)
    }
}

impl Numeric for i64 {
    fn into_bson(self) -> Bson {
        Bson::Int64(self)
    }
}

impl Numeric for f64 {
    fn into_bson(self) -> Bson {
        Bson::Double(self)
    }
}

/// A field type that can hold a server timestamp.
pub trait Timestamp {}

impl Timestamp for DateTime {}

impl Timestamp for Option<DateTime> {}

/// Typed update input accepting values and write markers for fields of `T`.
///
/// Each value is checked against the field's declared type:
///
/// ```
/// # use typedocs_core::{record::{Field, Record}, update::UpdateData};
/// # #[derive(serde::Serialize, serde::Deserialize)]
/// # struct Task { done: bool }
/// # impl Record for Task { const FIELD_NAMES: &'static [&'static str] = &["done"]; }
/// const DONE: Field<Task, bool> = Field::new("done");
///
/// let patch = UpdateData::<Task>::new().set(DONE, true).into_patch().unwrap();
/// assert_eq!(patch.writes.len(), 1);
/// ```
///
/// so a mistyped write does not compile:
///
/// ```compile_fail
/// # use typedocs_core::{record::{Field, Record}, update::UpdateData};
/// # #[derive(serde::Serialize, serde::Deserialize)]
/// # struct Task { done: bool }
/// # impl Record for Task { const FIELD_NAMES: &'static [&'static str] = &["done"]; }
/// const DONE: Field<Task, bool> = Field::new("done");
///
/// let update = UpdateData::<Task>::new().set(DONE, "not a bool");
/// ```
///
/// # Example
///
/// ```ignore
/// let update = UpdateData::<User>::new()
///     .set(UserField::Name, "Alice")
///     .increment(UserField::Visits, 1)
///     .server_timestamp(UserField::UpdatedAt);
///
/// user.update(update).await?;
/// ```
#[derive(Debug, Clone)]
pub struct UpdateData<T: Record> {
    writes: Vec<(&'static str, FieldWrite)>,
    error: Option<String>,
    _marker: PhantomData<T>,
}

impl<T: Record> UpdateData<T> {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self { writes: Vec::new(), error: None, _marker: PhantomData }
    }

    /// Sets `field` to a concrete value.
    pub fn set<V: Serialize>(self, field: Field<T, V>, value: impl Into<V>) -> Self {
        let value: V = value.into();

        match serialize_to_bson(&value) {
            Ok(value) => self.push(field.name(), FieldWrite::Value(value)),
            Err(err) => self.fail(field.name(), err),
        }
    }

    /// Sets `field` to the server's current time.
    pub fn server_timestamp<V: Timestamp>(self, field: Field<T, V>) -> Self {
        self.push(field.name(), FieldWrite::ServerTimestamp)
    }

    /// Increments the numeric `field` by `by`.
    pub fn increment<V: Numeric>(self, field: Field<T, V>, by: V) -> Self {
        self.push(field.name(), FieldWrite::Increment(by.into_bson()))
    }

    /// Adds each of `values` to the array `field` unless already present.
    pub fn array_union<E: Serialize>(
        self,
        field: Field<T, Vec<E>>,
        values: impl IntoIterator<Item = impl Into<E>>,
    ) -> Self {
        match elements::<E>(values) {
            Ok(values) => self.push(field.name(), FieldWrite::ArrayUnion(values)),
            Err(err) => self.fail(field.name(), err),
        }
    }

    /// Removes each of `values` from the array `field`.
    pub fn array_remove<E: Serialize>(
        self,
        field: Field<T, Vec<E>>,
        values: impl IntoIterator<Item = impl Into<E>>,
    ) -> Self {
        match elements::<E>(values) {
            Ok(values) => self.push(field.name(), FieldWrite::ArrayRemove(values)),
            Err(err) => self.fail(field.name(), err),
        }
    }

    /// Removes the optional `field` from the stored document.
    pub fn delete<V>(self, field: Field<T, Option<V>>) -> Self {
        self.push(field.name(), FieldWrite::Delete)
    }

    fn push(mut self, field: &'static str, write: FieldWrite) -> Self {
        self.writes.push((field, write));
        self
    }

    fn fail(mut self, field: &'static str, err: impl std::fmt::Display) -> Self {
        self.error.get_or_insert_with(|| format!("field {field}: {err}"));
        self
    }

    /// Returns `true` if no writes have been declared.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.error.is_none()
    }

    /// Lowers this update into an untyped [`Patch`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] if a declared value could not
    /// be converted to BSON.
    pub fn into_patch(self) -> DocumentResult<Patch> {
        if let Some(err) = self.error {
            return Err(DocumentError::Serialization(err));
        }

        Ok(Patch {
            writes: self
                .writes
                .into_iter()
                .map(|(field, write)| (field.to_string(), write))
                .collect(),
        })
    }
}

fn elements<E: Serialize>(
    values: impl IntoIterator<Item = impl Into<E>>,
) -> Result<Vec<Bson>, bson::error::Error> {
    values
        .into_iter()
        .map(|value| serialize_to_bson(&Into::<E>::into(value)))
        .collect()
}

impl<T: Record> Default for UpdateData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> TryFrom<UpdateData<T>> for Patch {
    type Error = DocumentError;

    fn try_from(update: UpdateData<T>) -> DocumentResult<Self> {
        update.into_patch()
    }
}
