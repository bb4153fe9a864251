//! Typed data extraction from document change events.
//!
//! Trigger systems deliver a JSON payload whenever a document is created,
//! updated, deleted or written. This crate models those payloads and provides
//! extractors that decode the snapshot data into a record type. Extractors
//! never perform I/O: they only reshape the payload they are given.
//!
//! A payload that lacks a snapshot the event kind guarantees is reported as
//! [`DocumentError::MissingEventData`]; no default is substituted.
//!
//! To use these helpers, include the `events` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! typedocs = { version = "x.y.z", features = ["events"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use typedocs::events::{ChangeEvent, get_before_and_after_on_updated};
//!
//! let event: ChangeEvent = serde_json::from_str(payload)?;
//! let (before, after) = get_before_and_after_on_updated::<User>(&event)?;
//!
//! if before.visits != after.visits {
//!     // ...
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as typedocs_events;

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

use typedocs_core::error::{DocumentError, DocumentResult};

/// The state of one document as carried by an event.
///
/// `data` is `None` when the document does not exist at that point, such as
/// the `before` side of a creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// The document ID.
    pub id: String,
    /// The document's fields, if it exists.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl EventSnapshot {
    /// Creates a snapshot of the document `id`.
    pub fn new(id: impl Into<String>, data: Option<Map<String, Value>>) -> Self {
        Self { id: id.into(), data }
    }

    /// Returns `true` if the document exists in this snapshot.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Decodes the snapshot data, or returns `None` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] if the data does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> DocumentResult<Option<T>> {
        self.data
            .as_ref()
            .map(|data| serde_json::from_value(Value::Object(data.clone())))
            .transpose()
            .map_err(DocumentError::from)
    }
}

/// The states of a document before and after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub before: EventSnapshot,
    pub after: EventSnapshot,
}

/// An event delivered by a trigger system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEvent<D> {
    /// Unique event ID.
    pub id: String,
    /// Path of the changed document, such as `users/u1`.
    pub document: String,
    /// Wildcard values matched by the trigger's document pattern.
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// When the change happened.
    pub time: DateTime<Utc>,
    /// The event payload.
    pub data: Option<D>,
}

impl<D> DocumentEvent<D> {
    /// Returns the ID of the changed document (the last path segment).
    pub fn document_id(&self) -> &str {
        self.document
            .rsplit('/')
            .next()
            .unwrap_or(&self.document)
    }

    /// Returns the path of the collection holding the changed document.
    pub fn collection(&self) -> &str {
        self.document
            .rsplit_once('/')
            .map(|(collection, _)| collection)
            .unwrap_or("")
    }

    fn payload(&self) -> DocumentResult<&D> {
        self.data
            .as_ref()
            .ok_or_else(|| DocumentError::MissingEventData(format!("event {} has no payload", self.id)))
    }
}

/// Event for a document creation or deletion.
pub type SnapshotEvent = DocumentEvent<EventSnapshot>;

/// Event for a document update or write.
pub type ChangeEvent = DocumentEvent<Change>;

fn require<T: DeserializeOwned>(event_id: &str, side: &str, snapshot: &EventSnapshot) -> DocumentResult<T> {
    snapshot
        .decode()?
        .ok_or_else(|| DocumentError::MissingEventData(format!(
            "event {event_id} has no {side} data for document {}",
            snapshot.id
        )))
}

/// Returns the data of a newly created document.
pub fn get_data_on_created<T: DeserializeOwned>(event: &SnapshotEvent) -> DocumentResult<T> {
    debug!(event = %event.id, document = %event.document, "extracting created data");

    require(&event.id, "created", event.payload()?)
}

/// Returns the data a deleted document had before deletion.
pub fn get_data_on_deleted<T: DeserializeOwned>(event: &SnapshotEvent) -> DocumentResult<T> {
    debug!(event = %event.id, document = %event.document, "extracting deleted data");

    require(&event.id, "deleted", event.payload()?)
}

/// Returns the data of an updated document after the update.
pub fn get_data_on_updated<T: DeserializeOwned>(event: &ChangeEvent) -> DocumentResult<T> {
    debug!(event = %event.id, document = %event.document, "extracting updated data");

    require(&event.id, "after", &event.payload()?.after)
}

/// Returns the data of an updated document as `(before, after)`.
pub fn get_before_and_after_on_updated<T: DeserializeOwned>(event: &ChangeEvent) -> DocumentResult<(T, T)> {
    debug!(event = %event.id, document = %event.document, "extracting updated change");

    let change = event.payload()?;

    Ok((
        require(&event.id, "before", &change.before)?,
        require(&event.id, "after", &change.after)?,
    ))
}

/// Returns the data of a written document, or `None` if the write deleted it.
pub fn get_data_on_written<T: DeserializeOwned>(event: &ChangeEvent) -> DocumentResult<Option<T>> {
    debug!(event = %event.id, document = %event.document, "extracting written data");

    event.payload()?.after.decode()
}

/// Returns the data of a written document as `(before, after)`.
///
/// `before` is `None` for a creation and `after` is `None` for a deletion.
pub fn get_before_and_after_on_written<T: DeserializeOwned>(
    event: &ChangeEvent,
) -> DocumentResult<(Option<T>, Option<T>)> {
    debug!(event = %event.id, document = %event.document, "extracting written change");

    let change = event.payload()?;

    Ok((change.before.decode()?, change.after.decode()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct User {
        name: String,
        visits: i64,
    }

    fn change_event(before: Value, after: Value) -> ChangeEvent {
        serde_json::from_value(json!({
            "id": "evt-1",
            "document": "users/u1",
            "params": { "userId": "u1" },
            "time": "2024-05-01T12:00:00Z",
            "data": {
                "before": { "id": "u1", "data": before },
                "after": { "id": "u1", "data": after },
            },
        }))
        .unwrap()
    }

    #[test]
    fn updated_pair_keeps_before_and_after_order() {
        let event = change_event(
            json!({ "name": "Ada", "visits": 1 }),
            json!({ "name": "Ada", "visits": 2 }),
        );

        let (before, after) = get_before_and_after_on_updated::<User>(&event).unwrap();

        assert_eq!(before, User { name: "Ada".into(), visits: 1 });
        assert_eq!(after, User { name: "Ada".into(), visits: 2 });
        assert_eq!(get_data_on_updated::<User>(&event).unwrap(), after);
    }

    #[test]
    fn written_data_is_absent_after_delete() {
        let event = change_event(json!({ "name": "Ada", "visits": 1 }), Value::Null);

        assert_eq!(get_data_on_written::<User>(&event).unwrap(), None);

        let (before, after) = get_before_and_after_on_written::<User>(&event).unwrap();
        assert!(before.is_some());
        assert!(after.is_none());
    }

    #[test]
    fn update_without_before_data_fails() {
        let event = change_event(Value::Null, json!({ "name": "Ada", "visits": 1 }));

        let err = get_before_and_after_on_updated::<User>(&event).unwrap_err();

        assert!(matches!(err, DocumentError::MissingEventData(_)));
    }

    #[test]
    fn missing_payload_fails() {
        let event: SnapshotEvent = serde_json::from_value(json!({
            "id": "evt-2",
            "document": "users/u1",
            "time": "2024-05-01T12:00:00Z",
        }))
        .unwrap();

        assert!(matches!(
            get_data_on_created::<User>(&event),
            Err(DocumentError::MissingEventData(_)),
        ));
        assert_eq!(event.document_id(), "u1");
        assert_eq!(event.collection(), "users");
    }

    #[test]
    fn mismatched_data_is_a_serialization_error() {
        let event: SnapshotEvent = serde_json::from_value(json!({
            "id": "evt-3",
            "document": "users/u1",
            "time": "2024-05-01T12:00:00Z",
            "data": { "id": "u1", "data": { "name": 5 } },
        }))
        .unwrap();

        assert!(matches!(
            get_data_on_deleted::<User>(&event),
            Err(DocumentError::Serialization(_)),
        ));
    }
}
