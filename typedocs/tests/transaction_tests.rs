//! Transaction tests
//!
//! Covers transactional accessors, staged updates, rollback on error and
//! conflict reporting at commit.

mod common;

use common::*;
use typedocs::{prelude::*, query::SortDirection};

// ============================================================================
// Staging and commit
// ============================================================================

#[tokio::test]
async fn test_update_is_invisible_until_commit() {
    let db = seeded_db(2).await;
    let tasks = db.collection::<Task>(TASKS);

    db.run_transaction(async |tx| {
        let document = get_document_from_transaction(tx, &tasks, "t01").await?;
        assert!(document.is_transactional());

        document
            .update(UpdateData::new().set(TaskField::Done, true))
            .await?;

        let outside = get_document_data(&tasks, "t01").await?;
        assert!(!outside.done);

        Ok(())
    })
    .await
    .unwrap();

    assert!(get_document_data(&tasks, "t01").await.unwrap().done);
}

#[tokio::test]
async fn test_transaction_returns_closure_value() {
    let db = seeded_db(3).await;
    let tasks = db.collection::<Task>(TASKS);

    let (title, status) = db
        .run_transaction(async |tx| {
            let title = get_document_data_from_transaction(tx, &tasks, "t01")
                .select::<TaskTitle>()
                .await?;
            let status = get_document_data_from_transaction_maybe(tx, &tasks, Some("t02"))
                .select::<TaskStatus>()
                .await?;

            Ok((title, status))
        })
        .await
        .unwrap();

    assert_eq!(title.title, "task 1");
    assert_eq!(status, Some(TaskStatus { done: false, priority: 2 }));
}

#[tokio::test]
async fn test_partial_update_in_transaction() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);
    let first = tasks.doc("t01");

    db.run_transaction(async |tx| {
        let document = get_specific_document_from_transaction(tx, &first).await?;

        document
            .update_with_partial(&TaskStatus { done: true, priority: 7 })
            .await
    })
    .await
    .unwrap();

    let stored = get_specific_document_data(&first).await.unwrap();
    assert_eq!(stored, Task { done: true, priority: 7, ..task(1) });
}

#[tokio::test]
async fn test_transactional_query_accessors() {
    let db = seeded_db(5).await;
    let tasks = db.collection::<Task>(TASKS);

    let updated = db
        .run_transaction(async |tx| {
            let top = get_first_document_from_transaction(tx, &tasks)
                .query(|q| q.sort("priority", SortDirection::Desc))
                .await?
                .ok_or_else(|| DocumentError::not_found(TASKS, "top"))?;
            let zero = get_documents_from_transaction(tx, &tasks)
                .query(|q| q.filter(Filter::eq("priority", 0_i64)))
                .select::<TaskStatus>()
                .await?;

            let mut updated = vec![top.id.clone()];
            top.update(UpdateData::new().increment(TaskField::Priority, 10)).await?;

            for document in zero {
                assert!(document.is_transactional());
                updated.push(document.id.clone());
                document.update(UpdateData::new().set(TaskField::Done, true)).await?;
            }

            Ok(updated)
        })
        .await
        .unwrap();

    assert_eq!(updated, vec!["t02", "t03"]);
    assert_eq!(get_document_data(&tasks, "t02").await.unwrap().priority, 12);
    assert!(get_document_data(&tasks, "t03").await.unwrap().done);
}

#[tokio::test]
async fn test_transactional_maybe_without_id_is_none() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);
    let before = db.client().request_count();

    let found = db
        .run_transaction(async |tx| {
            let document = get_document_from_transaction_maybe(tx, &tasks, None).await?;
            Ok(document.is_none())
        })
        .await
        .unwrap();

    assert!(found);
    assert_eq!(db.client().request_count(), before);
}

// ============================================================================
// Failure paths
// ============================================================================

#[tokio::test]
async fn test_error_rolls_back_staged_updates() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let err = db
        .run_transaction(async |tx| {
            let document = get_document_from_transaction(tx, &tasks, "t01").await?;
            document
                .update(UpdateData::new().set(TaskField::Done, true))
                .await?;

            Err::<(), _>(DocumentError::InvalidDocument("abort".to_string()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentError::InvalidDocument(_)));
    assert!(!get_document_data(&tasks, "t01").await.unwrap().done);
}

#[tokio::test]
async fn test_missing_document_in_transaction_fails() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let err = db
        .run_transaction(async |tx| {
            get_document_from_transaction(tx, &tasks, "missing").await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_concurrent_write_causes_conflict() {
    let db = seeded_db(1).await;
    let tasks = db.collection::<Task>(TASKS);

    let err = db
        .run_transaction(async |tx| {
            let document = get_document_from_transaction(tx, &tasks, "t01").await?;

            tasks.set("t01", &Task { priority: 42, ..task(1) }).await?;

            document
                .update(UpdateData::new().increment(TaskField::Priority, 1))
                .await
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentError::TransactionConflict(_)));
    assert_eq!(get_document_data(&tasks, "t01").await.unwrap().priority, 42);
}

#[tokio::test]
async fn test_read_after_write_is_rejected() {
    let db = seeded_db(2).await;
    let tasks = db.collection::<Task>(TASKS);

    let err = db
        .run_transaction(async |tx| {
            let document = get_document_from_transaction(tx, &tasks, "t01").await?;
            document
                .update(UpdateData::new().set(TaskField::Done, true))
                .await?;

            get_document_data_from_transaction(tx, &tasks, "t02").await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentError::Transaction(_)));
    assert!(!get_document_data(&tasks, "t01").await.unwrap().done);
}
