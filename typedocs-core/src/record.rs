//! Record, field and projection traits.
//!
//! A [`Record`] is the user-defined shape stored in a collection. A
//! [`Projection`] is a narrowed view of a record: it names the fields the
//! server should return and is the type those fields deserialize into.
//! Because both come from the same declaration, the selected fields and the
//! narrowed type cannot drift apart.
//!
//! # Example
//!
//! ```ignore
//! use typedocs::{Record, Projection};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     pub name: String,
//!     pub email: String,
//!     pub visits: i64,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Projection)]
//! #[projection(of = User)]
//! pub struct UserName {
//!     pub name: String,
//! }
//! ```

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, marker::PhantomData};

use crate::{
    client::Snapshot,
    error::{DocumentError, DocumentResult},
};

/// A typed key for one top-level field of the record `T` holding a `V`.
///
/// `#[derive(Record)]` generates one key per serialized field as an
/// associated constant of a `<Name>Field` namespace, so `UserField::Email`
/// is a `Field<User, String>`. Typed updates only accept values of `V`.
pub struct Field<T, V> {
    name: &'static str,
    _marker: PhantomData<fn() -> (T, V)>,
}

impl<T, V> Field<T, V> {
    /// Creates a key for the serialized field `name`.
    pub const fn new(name: &'static str) -> Self {
        Self { name, _marker: PhantomData }
    }

    /// Returns the serialized field name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

impl<T, V> PartialEq for Field<T, V> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T, V> Eq for Field<T, V> {}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Core trait for the plain data stored in a collection.
///
/// # Example
///
/// ```ignore
/// pub enum UserField {}
///
/// impl UserField {
///     pub const Name: Field<User, String> = Field::new("name");
///     pub const Email: Field<User, String> = Field::new("email");
/// }
///
/// impl Record for User {
///     const FIELD_NAMES: &'static [&'static str] = &["name", "email"];
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Every serialized top-level field name of this record.
    const FIELD_NAMES: &'static [&'static str];

    /// Returns every serialized top-level field name of this record.
    fn field_names() -> &'static [&'static str] {
        Self::FIELD_NAMES
    }
}

/// Returns `true` if `name` is one of `fields`. Usable in constant evaluation.
pub const fn has_field(fields: &[&str], name: &str) -> bool {
    let mut i = 0;
    while i < fields.len() {
        if str_eq(fields[i], name) {
            return true;
        }
        i += 1;
    }
    false
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// A narrowed, deserializable view of the record `T`.
///
/// Every record is a projection of itself with no field selection, so
/// accessors default to returning the full record.
pub trait Projection<T: Record>: DeserializeOwned + Send + Sync + 'static {
    /// Returns the fields to select on the server, or `None` for the whole record.
    fn selected_fields() -> Option<&'static [&'static str]>;
}

impl<T: Record> Projection<T> for T {
    fn selected_fields() -> Option<&'static [&'static str]> {
        None
    }
}

/// Returns the owned server-side selection for the projection `P` of `T`.
pub fn selection<T: Record, P: Projection<T>>() -> Option<Vec<String>> {
    P::selected_fields().map(|fields| {
        fields
            .iter()
            .map(|field| field.to_string())
            .collect()
    })
}

/// Extension trait providing BSON conversions for any serde type.
///
/// Implemented for every `Serialize + DeserializeOwned` type, which covers
/// both records and projections.
pub trait RecordExt: Sized {
    /// Converts this value into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the value is not a map-like structure.
    fn to_document(&self) -> DocumentResult<BsonDocument>;

    /// Creates a value from a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_document(document: BsonDocument) -> DocumentResult<Self>;
}

impl<V: Serialize + DeserializeOwned> RecordExt for V {
    fn to_document(&self) -> DocumentResult<BsonDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentError::InvalidDocument(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_document(document: BsonDocument) -> DocumentResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

/// Decodes a snapshot into its ID and the projection `P` of `T`.
///
/// In debug builds a snapshot carrying a field outside the selection is
/// rejected with [`DocumentError::ProjectionMismatch`].
pub(crate) fn decode_snapshot<T: Record, P: Projection<T>>(
    collection: &str,
    snapshot: Snapshot,
) -> DocumentResult<(String, P)> {
    if cfg!(debug_assertions) {
        if let Some(fields) = P::selected_fields() {
            check_selection(collection, &snapshot, fields)?;
        }
    }

    let Snapshot { id, data } = snapshot;

    Ok((id, deserialize_from_bson(Bson::Document(data))?))
}

/// Verifies that `snapshot` holds no field outside `fields`.
pub fn check_selection(
    collection: &str,
    snapshot: &Snapshot,
    fields: &[&str],
) -> DocumentResult<()> {
    match snapshot
        .data
        .keys()
        .find(|key| !fields.contains(&key.as_str()))
    {
        Some(field) => Err(DocumentError::ProjectionMismatch {
            collection: collection.to_string(),
            id: snapshot.id.clone(),
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bson::doc;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Task {
        pub title: String,
        pub done: bool,
        pub priority: i64,
    }

    pub(crate) enum TaskField {}

    #[allow(non_upper_case_globals)]
    impl TaskField {
        pub const Title: Field<Task, String> = Field::new("title");
        pub const Done: Field<Task, bool> = Field::new("done");
        pub const Priority: Field<Task, i64> = Field::new("priority");
    }

    impl Record for Task {
        const FIELD_NAMES: &'static [&'static str] = &["title", "done", "priority"];
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct TaskTitle {
        pub title: String,
    }

    impl Projection<Task> for TaskTitle {
        fn selected_fields() -> Option<&'static [&'static str]> {
            Some(&["title"])
        }
    }

    #[test]
    fn record_is_its_own_unselected_projection() {
        assert_eq!(selection::<Task, Task>(), None);
        assert_eq!(selection::<Task, TaskTitle>(), Some(vec!["title".to_string()]));
    }

    #[test]
    fn decodes_projected_snapshot() {
        let snapshot = Snapshot::new("t1", doc! { "title": "write docs" });
        let (id, title) = decode_snapshot::<Task, TaskTitle>("tasks", snapshot).unwrap();

        assert_eq!(id, "t1");
        assert_eq!(title, TaskTitle { title: "write docs".to_string() });
    }

    #[cfg(debug_assertions)]
    #[test]
    fn rejects_fields_outside_the_selection() {
        let snapshot = Snapshot::new("t1", doc! { "title": "write docs", "done": true });
        let err = decode_snapshot::<Task, TaskTitle>("tasks", snapshot).unwrap_err();

        assert!(matches!(
            err,
            DocumentError::ProjectionMismatch { ref field, .. } if field == "done"
        ));
    }

    #[test]
    fn field_lookup_runs_in_const_context() {
        const HAS_DONE: bool = has_field(Task::FIELD_NAMES, "done");
        const HAS_DONE_AT: bool = has_field(Task::FIELD_NAMES, "done_at");

        assert!(HAS_DONE);
        assert!(!HAS_DONE_AT);
        assert!(!has_field(Task::FIELD_NAMES, "Done"));
        assert!(!has_field(&[], "title"));
        assert_eq!(Task::field_names(), Task::FIELD_NAMES);
        assert_eq!(TaskField::Priority.name(), "priority");
    }

    #[test]
    fn round_trips_through_bson_documents() {
        let task = Task { title: "ship".to_string(), done: false, priority: 2 };
        let document = task.to_document().unwrap();

        assert_eq!(document.get_i64("priority").unwrap(), 2);
        assert_eq!(Task::from_document(document).unwrap(), task);
    }
}
