//! Change-event extraction tests
//!
//! Decodes trigger payloads into the shared test record.

#![cfg(feature = "events")]

mod common;

use common::*;
use serde_json::json;
use typedocs::{
    error::DocumentError,
    events::{ChangeEvent, SnapshotEvent, get_before_and_after_on_updated, get_before_and_after_on_written, get_data_on_created},
};

fn written(before: serde_json::Value, after: serde_json::Value) -> ChangeEvent {
    serde_json::from_value(json!({
        "id": "evt-9",
        "document": "tasks/t01",
        "time": "2024-05-01T12:00:00Z",
        "data": {
            "before": { "id": "t01", "data": before },
            "after": { "id": "t01", "data": after },
        },
    }))
    .unwrap()
}

#[test]
fn test_created_event_decodes_record() {
    let event: SnapshotEvent = serde_json::from_value(json!({
        "id": "evt-1",
        "document": "tasks/t01",
        "params": { "taskId": "t01" },
        "time": "2024-05-01T12:00:00Z",
        "data": { "id": "t01", "data": { "title": "task 1", "done": false, "priority": 1, "tags": ["open"] } },
    }))
    .unwrap();

    assert_eq!(get_data_on_created::<Task>(&event).unwrap(), task(1));
    assert_eq!(event.params["taskId"], "t01");
}

#[test]
fn test_written_event_distinguishes_create_and_update() {
    let created = written(
        serde_json::Value::Null,
        json!({ "title": "task 1", "done": false, "priority": 1 }),
    );
    let (before, after) = get_before_and_after_on_written::<Task>(&created).unwrap();

    assert_eq!(before, None);
    assert_eq!(after.map(|task| task.tags), Some(vec![]));

    let updated = written(
        json!({ "title": "task 1", "done": false, "priority": 1 }),
        json!({ "title": "task 1", "done": true, "priority": 1 }),
    );
    let (before, after) = get_before_and_after_on_updated::<Task>(&updated).unwrap();

    assert!(!before.done);
    assert!(after.done);
}

#[test]
fn test_update_event_without_after_data_fails() {
    let event = written(json!({ "title": "task 1", "done": false, "priority": 1 }), serde_json::Value::Null);

    assert!(matches!(
        get_before_and_after_on_updated::<Task>(&event),
        Err(DocumentError::MissingEventData(_)),
    ));
}
