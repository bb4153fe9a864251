//! Single-document accessor tests
//!
//! Covers required and maybe fetches, data-only and specific-document
//! variants, selection narrowing and the update paths of fetched wrappers.

mod common;

use common::*;
use serde::{Deserialize, Serialize};
use typedocs::{
    bson::{Bson, DateTime},
    memory::MemoryClient,
    prelude::*,
};

const NOTES: &str = "notes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
struct Note {
    body: String,
    edited_at: Option<DateTime>,
    pinned_by: Option<String>,
}

fn note() -> Note {
    Note {
        body: "draft".to_string(),
        edited_at: None,
        pinned_by: Some("ada".to_string()),
    }
}

// ============================================================================
// Required vs maybe
// ============================================================================

#[tokio::test]
async fn test_required_and_maybe_fetch_agree() {
    let db = seeded_db(3).await;
    let tasks = db.collection::<Task>(TASKS);

    let required = get_document(&tasks, "t02").await.unwrap();
    let maybe = get_document_maybe(&tasks, Some("t02")).await.unwrap().unwrap();

    assert_eq!(required.id, "t02");
    assert_eq!(required.id, maybe.id);
    assert_eq!(required.data, maybe.data);
    assert_eq!(required.data, task(2));
    assert!(!required.is_transactional());
    assert_eq!(required.collection(), TASKS);
}

#[tokio::test]
async fn test_required_fetch_of_missing_document_fails() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let err = get_document(&tasks, "missing").await.unwrap_err();

    match err {
        DocumentError::NotFound { collection, id } => {
            assert_eq!(collection, TASKS);
            assert_eq!(id, "missing");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }

    assert!(get_document_data(&tasks, "missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_maybe_fetch_of_missing_document_is_none() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    assert!(get_document_maybe(&tasks, Some("missing")).await.unwrap().is_none());
    assert!(get_document_data_maybe(&tasks, Some("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_maybe_fetch_without_id_issues_no_request() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);
    let before = db.client().request_count();

    assert!(get_document_maybe(&tasks, None).await.unwrap().is_none());
    assert!(get_document_maybe(&tasks, Some("")).await.unwrap().is_none());
    assert!(get_document_data_maybe(&tasks, None).await.unwrap().is_none());

    assert_eq!(db.client().request_count(), before);

    get_document_maybe(&tasks, Some("t01")).await.unwrap();
    assert_eq!(db.client().request_count(), before + 1);
}

// ============================================================================
// Data-only and specific documents
// ============================================================================

#[tokio::test]
async fn test_data_accessors_return_bare_data() {
    let db = seeded_db(2).await;
    let tasks = db.collection::<Task>(TASKS);

    assert_eq!(get_document_data(&tasks, "t01").await.unwrap(), task(1));
    assert_eq!(get_document_data_maybe(&tasks, Some("t02")).await.unwrap(), Some(task(2)));
}

#[tokio::test]
async fn test_specific_document_accessors() {
    let db = seeded_db(2).await;
    let second = db.collection::<Task>(TASKS).doc("t02");

    let document = get_specific_document(&second).await.unwrap();
    assert_eq!(document.id, "t02");
    assert_eq!(document.data, task(2));

    let status = get_specific_document_data(&second)
        .select::<TaskStatus>()
        .await
        .unwrap();
    assert_eq!(status, TaskStatus { done: false, priority: 2 });

    let gone = db.doc::<Task>(TASKS, "gone");
    assert!(get_specific_document(&gone).await.unwrap_err().is_not_found());
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_select_narrows_fetched_data() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let title = get_document(&tasks, "t01")
        .select::<TaskTitle>()
        .await
        .unwrap();

    assert_eq!(title.id, "t01");
    assert_eq!(title.data, TaskTitle { title: "task 1".to_string() });

    let maybe = get_document_data_maybe(&tasks, Some("t01"))
        .select::<TaskTitle>()
        .await
        .unwrap();
    assert_eq!(maybe, Some(TaskTitle { title: "task 1".to_string() }));
}

#[tokio::test]
async fn test_narrowed_wrapper_updates_the_full_record() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let title = get_document(&tasks, "t01")
        .select::<TaskTitle>()
        .await
        .unwrap();
    title
        .update(UpdateData::new().set(TaskField::Done, true))
        .await
        .unwrap();

    let stored = get_document_data(&tasks, "t01").await.unwrap();
    assert!(stored.done);
    assert_eq!(stored.title, "task 1");
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn test_update_with_partial_writes_only_given_fields() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let document = get_document(&tasks, "t01").await.unwrap();
    document
        .update_with_partial(&TaskTitle { title: "renamed".to_string() })
        .await
        .unwrap();

    let stored = get_document_data(&tasks, "t01").await.unwrap();
    assert_eq!(stored, Task { title: "renamed".to_string(), ..task(1) });
}

#[tokio::test]
async fn test_update_with_partial_accepts_full_record() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);
    let replacement = Task { done: true, priority: 9, ..task(1) };

    get_document(&tasks, "t01")
        .await
        .unwrap()
        .update_with_partial(&replacement)
        .await
        .unwrap();

    assert_eq!(get_document_data(&tasks, "t01").await.unwrap(), replacement);
}

#[tokio::test]
async fn test_update_applies_write_markers() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let document = get_document(&tasks, "t01").await.unwrap();
    document
        .update(UpdateData::new()
            .increment(TaskField::Priority, 5)
            .array_union(TaskField::Tags, ["urgent", "open"])
            .array_remove(TaskField::Tags, ["open"]))
        .await
        .unwrap();

    let stored = get_document_data(&tasks, "t01").await.unwrap();
    assert_eq!(stored.priority, 6);
    assert_eq!(stored.tags, vec!["urgent".to_string()]);
}

#[tokio::test]
async fn test_deleted_optional_field_reads_as_none() {
    let db = Database::new(MemoryClient::new());
    let notes = db.collection::<Note>(NOTES);
    notes.set("n1", &note()).await.unwrap();

    get_document(&notes, "n1")
        .await
        .unwrap()
        .update(UpdateData::new().delete(NoteField::PinnedBy))
        .await
        .unwrap();

    let stored = get_document_data(&notes, "n1").await.unwrap();
    assert_eq!(stored.pinned_by, None);
    assert_eq!(stored.body, "draft");
}

#[tokio::test]
async fn test_server_timestamp_is_written_by_the_client() {
    let db = Database::new(MemoryClient::new());
    let notes = db.collection::<Note>(NOTES);
    notes.set("n1", &note()).await.unwrap();

    get_document(&notes, "n1")
        .await
        .unwrap()
        .update(UpdateData::new().server_timestamp(NoteField::EditedAt))
        .await
        .unwrap();

    let snapshot = db.client()
        .get_document(NOTES, "n1", None)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(snapshot.data.get("edited_at"), Some(Bson::DateTime(_))));
    assert!(get_document_data(&notes, "n1").await.unwrap().edited_at.is_some());
}

#[tokio::test]
async fn test_overflowing_increment_leaves_document_unchanged() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);
    let document = get_document(&tasks, "t01").await.unwrap();
    document
        .update_with_partial(&TaskStatus { done: false, priority: i64::MAX })
        .await
        .unwrap();

    let err = document
        .update(UpdateData::new()
            .set(TaskField::Done, true)
            .increment(TaskField::Priority, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentError::InvalidDocument(_)));
    assert_eq!(
        get_document_data(&tasks, "t01").await.unwrap(),
        Task { priority: i64::MAX, ..task(1) },
    );
}

#[tokio::test]
async fn test_update_of_deleted_document_fails() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let document = get_document(&tasks, "t01").await.unwrap();
    tasks.delete("t01").await.unwrap();

    let err = document
        .update(UpdateData::new().set(TaskField::Done, true))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
