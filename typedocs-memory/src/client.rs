//! In-memory document client.
//!
//! Documents are kept as BSON documents per collection, ordered by ID, behind
//! an async-aware read-write lock. Every stored document carries a version so
//! transactions can detect writes made after they read.

use std::{
    collections::{BTreeMap, HashMap},
    cmp::Ordering,
    fmt,
    mem::take,
    sync::{Arc, atomic::{AtomicU64, Ordering as AtomicOrdering}},
};
use async_trait::async_trait;
use bson::{DateTime, Document as BsonDocument};
use mea::{mutex::Mutex, rwlock::RwLock};
use tracing::trace;

use typedocs_core::{
    client::{ClientTransaction, DocumentClient, DocumentClientBuilder, Snapshot},
    error::{DocumentError, DocumentResult},
    query::{Query, SortDirection, lookup_path},
    update::Patch,
};

use crate::evaluator::{DocumentEvaluator, compare_values};

#[derive(Debug, Clone)]
struct StoredDocument {
    data: BsonDocument,
    version: u64,
}

type CollectionMap = BTreeMap<String, StoredDocument>;
type StoreMap = HashMap<String, CollectionMap>;


/// Thread-safe in-memory document client.
///
/// `MemoryClient` is cloneable and uses `Arc`-wrapped internal state, so all
/// clones share the same data. Queries scan the whole collection.
///
/// # Example
///
/// ```ignore
/// use typedocs::{client::DocumentClient, memory::MemoryClient};
/// use bson::doc;
///
/// let client = MemoryClient::new();
/// client.set_document("users", "u1", doc! { "name": "Alice" }).await?;
///
/// let snapshot = client.get_document("users", "u1", None).await?;
/// assert!(snapshot.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryClient {
    /// collection name -> (document ID -> document)
    store: Arc<RwLock<StoreMap>>,
    /// Source of document versions.
    clock: Arc<AtomicU64>,
    /// Number of reads and writes issued so far.
    requests: Arc<AtomicU64>,
}

impl MemoryClient {
    /// Creates a new empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing a `MemoryClient` with seeded data.
    pub fn builder() -> MemoryClientBuilder {
        MemoryClientBuilder::default()
    }

    /// Returns the number of reads and writes issued against this client,
    /// including those issued through its transactions.
    pub fn request_count(&self) -> u64 {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn next_version(&self) -> u64 {
        self.clock.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }
}

/// Keeps only the top-level fields named in `fields`.
fn project(data: &BsonDocument, fields: Option<&[String]>) -> BsonDocument {
    match fields {
        Some(fields) => data
            .iter()
            .filter(|(key, _)| fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        None => data.clone(),
    }
}

/// Orders two documents by the query's sort field, then by ID.
fn query_order(query: &Query, left: (&str, &BsonDocument), right: (&str, Option<&bson::Bson>)) -> Ordering {
    let by_value = match &query.sort {
        Some(sort) => {
            let ordering = compare_values(lookup_path(left.1, &sort.field), right.1);

            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
        None => Ordering::Equal,
    };

    by_value.then_with(|| left.0.cmp(right.0))
}

fn run_query(
    documents: Option<&CollectionMap>,
    query: &Query,
    fields: Option<&[String]>,
) -> DocumentResult<Vec<(Snapshot, u64)>> {
    let Some(documents) = documents else {
        return Ok(vec![]);
    };

    let mut matched = Vec::new();

    for (id, document) in documents {
        let keep = match &query.filter {
            Some(filter) => DocumentEvaluator::new(&document.data).evaluate(filter)?,
            None => true,
        };

        if keep {
            matched.push((id.as_str(), document));
        }
    }

    if let Some(sort) = &query.sort {
        matched.sort_by(|(left_id, left), (right_id, right)| {
            query_order(
                query,
                (*left_id, &left.data),
                (*right_id, lookup_path(&right.data, &sort.field)),
            )
        });
    }

    if let Some(cursor) = &query.start_after {
        matched.retain(|(id, document)| {
            query_order(query, (*id, &document.data), (cursor.id.as_str(), cursor.value.as_ref())) == Ordering::Greater
        });
    }

    Ok(
        matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(id, document)| (Snapshot::new(id, project(&document.data, fields)), document.version))
            .collect()
    )
}


#[async_trait]
impl DocumentClient for MemoryClient {
    type Transaction = MemoryTransaction;

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>> {
        self.record_request();
        trace!(collection, id, "get");

        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|documents| documents.get(id))
                .map(|document| Snapshot::new(id, project(&document.data, fields)))
        )
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>> {
        self.record_request();
        trace!(collection, ?query, "query");

        let store = self.store.read().await;

        Ok(
            run_query(store.get(collection), query, fields)?
                .into_iter()
                .map(|(snapshot, _)| snapshot)
                .collect()
        )
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: BsonDocument,
    ) -> DocumentResult<()> {
        self.record_request();
        trace!(collection, id, "set");

        let version = self.next_version();

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), StoredDocument { data, version });

        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()> {
        self.record_request();
        trace!(collection, id, writes = patch.writes.len(), "update");

        let mut store = self.store.write().await;
        let document = store
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| DocumentError::not_found(collection, id))?;

        let mut data = document.data.clone();
        patch.apply(&mut data, DateTime::now())?;

        document.data = data;
        document.version = self.next_version();

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentResult<()> {
        self.record_request();
        trace!(collection, id, "delete");

        if let Some(documents) = self.store.write().await.get_mut(collection) {
            documents.remove(id);
        }

        Ok(())
    }

    async fn begin_transaction(&self) -> DocumentResult<Self::Transaction> {
        Ok(MemoryTransaction {
            client: self.clone(),
            reads: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        })
    }
}


type DocumentKey = (String, String);

/// A transaction against a [`MemoryClient`].
///
/// Reads record the version they observed. Updates are buffered and applied
/// at [`commit`](ClientTransaction::commit), which fails with
/// [`DocumentError::TransactionConflict`] if any document read by the
/// transaction was written in the meantime. All reads must happen before the
/// first staged update.
pub struct MemoryTransaction {
    client: MemoryClient,
    reads: Mutex<HashMap<DocumentKey, Option<u64>>>,
    writes: Mutex<Vec<(DocumentKey, Patch)>>,
}

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction").finish_non_exhaustive()
    }
}

impl MemoryTransaction {
    async fn ensure_readable(&self) -> DocumentResult<()> {
        if !self.writes.lock().await.is_empty() {
            return Err(DocumentError::Transaction(
                "reads must happen before writes in a transaction".to_string(),
            ));
        }

        Ok(())
    }

    async fn observe(&self, collection: &str, id: &str, version: Option<u64>) {
        self.reads
            .lock()
            .await
            .entry((collection.to_string(), id.to_string()))
            .or_insert(version);
    }
}

#[async_trait]
impl ClientTransaction for MemoryTransaction {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>> {
        self.ensure_readable().await?;
        self.client.record_request();
        trace!(collection, id, "transactional get");

        let (snapshot, version) = {
            let store = self.client.store.read().await;

            match store.get(collection).and_then(|documents| documents.get(id)) {
                Some(document) => (
                    Some(Snapshot::new(id, project(&document.data, fields))),
                    Some(document.version),
                ),
                None => (None, None),
            }
        };

        self.observe(collection, id, version).await;

        Ok(snapshot)
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>> {
        self.ensure_readable().await?;
        self.client.record_request();
        trace!(collection, ?query, "transactional query");

        let results = {
            let store = self.client.store.read().await;
            run_query(store.get(collection), query, fields)?
        };

        let mut snapshots = Vec::with_capacity(results.len());

        for (snapshot, version) in results {
            self.observe(collection, &snapshot.id, Some(version)).await;
            snapshots.push(snapshot);
        }

        Ok(snapshots)
    }

    async fn stage_update(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()> {
        trace!(collection, id, "staging update");

        self.writes
            .lock()
            .await
            .push(((collection.to_string(), id.to_string()), patch));

        Ok(())
    }

    async fn commit(self) -> DocumentResult<()> {
        let reads = take(&mut *self.reads.lock().await);
        let writes = take(&mut *self.writes.lock().await);

        let mut store = self.client.store.write().await;

        for ((collection, id), seen) in &reads {
            let current = store
                .get(collection)
                .and_then(|documents| documents.get(id))
                .map(|document| document.version);

            if current != *seen {
                return Err(DocumentError::TransactionConflict(format!(
                    "document {id} in collection {collection} changed after it was read"
                )));
            }
        }

        let now = DateTime::now();
        let mut staged: HashMap<DocumentKey, BsonDocument> = HashMap::new();

        for ((collection, id), patch) in writes {
            self.client.record_request();

            let key = (collection, id);
            let mut data = match staged.remove(&key) {
                Some(data) => data,
                None => store
                    .get(&key.0)
                    .and_then(|documents| documents.get(&key.1))
                    .map(|document| document.data.clone())
                    .ok_or_else(|| DocumentError::not_found(&key.0, &key.1))?,
            };

            patch.apply(&mut data, now)?;
            staged.insert(key, data);
        }

        trace!(documents = staged.len(), "committing transaction");

        for ((collection, id), data) in staged {
            let version = self.client.next_version();

            store
                .entry(collection)
                .or_default()
                .insert(id, StoredDocument { data, version });
        }

        Ok(())
    }

    async fn rollback(self) -> DocumentResult<()> {
        trace!("rolling back transaction");

        Ok(())
    }
}


/// Builder for constructing [`MemoryClient`] instances.
///
/// # Example
///
/// ```ignore
/// use typedocs::{client::DocumentClientBuilder, memory::MemoryClient};
/// use bson::doc;
///
/// let client = MemoryClient::builder()
///     .with_document("users", "u1", doc! { "name": "Alice" })
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug)]
pub struct MemoryClientBuilder {
    documents: Vec<(String, String, BsonDocument)>,
}

impl MemoryClientBuilder {
    /// Seeds the client with a document.
    pub fn with_document(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        data: BsonDocument,
    ) -> Self {
        self.documents.push((collection.into(), id.into(), data));
        self
    }
}

#[async_trait]
impl DocumentClientBuilder for MemoryClientBuilder {
    type Client = MemoryClient;

    async fn build(self) -> DocumentResult<Self::Client> {
        let client = MemoryClient::new();

        {
            let mut store = client.store.write().await;

            for (collection, id, data) in self.documents {
                let version = client.next_version();

                store
                    .entry(collection)
                    .or_default()
                    .insert(id, StoredDocument { data, version });
            }
        }

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use typedocs_core::{query::{Cursor, Filter}, update::FieldWrite};

    async fn seeded() -> MemoryClient {
        MemoryClient::builder()
            .with_document("tasks", "b", doc! { "title": "write", "priority": 2_i64 })
            .with_document("tasks", "a", doc! { "title": "read", "priority": 1_i64 })
            .with_document("tasks", "c", doc! { "title": "review", "priority": 2_i64 })
            .build()
            .await
            .unwrap()
    }

    fn ids(snapshots: &[Snapshot]) -> Vec<&str> {
        snapshots.iter().map(|snapshot| snapshot.id.as_str()).collect()
    }

    #[tokio::test]
    async fn unsorted_queries_return_id_order() {
        let client = seeded().await;
        let results = client.query_documents("tasks", &Query::new(), None).await.unwrap();

        assert_eq!(ids(&results), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn sorted_queries_break_ties_by_id_and_resume_after_cursor() {
        let client = seeded().await;
        let query = Query::builder()
            .sort("priority", SortDirection::Desc)
            .build();

        let results = client.query_documents("tasks", &query, None).await.unwrap();
        assert_eq!(ids(&results), vec!["b", "c", "a"]);

        let resumed = Query::builder()
            .sort("priority", SortDirection::Desc)
            .start_after(Cursor::new("b", Some(bson::Bson::Int64(2))))
            .build();

        let results = client.query_documents("tasks", &resumed, None).await.unwrap();
        assert_eq!(ids(&results), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn filters_and_projects() {
        let client = seeded().await;
        let query = Query::builder()
            .filter(Filter::starts_with("title", "re"))
            .build();
        let fields = vec!["title".to_string()];

        let results = client.query_documents("tasks", &query, Some(&fields)).await.unwrap();

        assert_eq!(ids(&results), vec!["a", "c"]);
        assert_eq!(results[0].data, doc! { "title": "read" });
    }

    #[tokio::test]
    async fn updating_a_missing_document_is_not_found() {
        let client = seeded().await;
        let mut patch = Patch::new();
        patch.push("title", FieldWrite::Value("x".into()));

        let err = client.update_document("tasks", "zzz", patch).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn staged_updates_apply_only_on_commit() {
        let client = seeded().await;
        let tx = client.begin_transaction().await.unwrap();

        tx.get_document("tasks", "a", None).await.unwrap();

        let mut patch = Patch::new();
        patch.push("priority", FieldWrite::Increment(10_i64.into()));
        tx.stage_update("tasks", "a", patch).await.unwrap();

        let before = client.get_document("tasks", "a", None).await.unwrap().unwrap();
        assert_eq!(before.data.get_i64("priority").unwrap(), 1);

        tx.commit().await.unwrap();

        let after = client.get_document("tasks", "a", None).await.unwrap().unwrap();
        assert_eq!(after.data.get_i64("priority").unwrap(), 11);
    }

    #[tokio::test]
    async fn concurrent_write_conflicts_at_commit() {
        let client = seeded().await;
        let tx = client.begin_transaction().await.unwrap();

        tx.get_document("tasks", "a", None).await.unwrap();
        client.set_document("tasks", "a", doc! { "title": "other" }).await.unwrap();

        let mut patch = Patch::new();
        patch.push("title", FieldWrite::Value("mine".into()));
        tx.stage_update("tasks", "a", patch).await.unwrap();

        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, DocumentError::TransactionConflict(_)));
        let current = client.get_document("tasks", "a", None).await.unwrap().unwrap();
        assert_eq!(current.data, doc! { "title": "other" });
    }

    #[tokio::test]
    async fn reads_after_writes_are_rejected() {
        let client = seeded().await;
        let tx = client.begin_transaction().await.unwrap();

        tx.stage_update("tasks", "a", Patch::new()).await.unwrap();

        let err = tx.get_document("tasks", "b", None).await.unwrap_err();
        assert!(matches!(err, DocumentError::Transaction(_)));
    }

    #[tokio::test]
    async fn counts_requests() {
        let client = MemoryClient::new();

        client.get_document("tasks", "a", None).await.unwrap();
        client.query_documents("tasks", &Query::new(), None).await.unwrap();

        assert_eq!(client.request_count(), 2);
    }
}
