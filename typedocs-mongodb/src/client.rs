use std::fmt;
use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc};
use mea::mutex::Mutex;
use mongodb::{
    Client, ClientSession, Collection as MongoCollection, Database,
    error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR},
    options::{ClientOptions, FindOneOptions, FindOptions},
};
use tracing::trace;

use typedocs_core::{
    client::{ClientTransaction, DocumentClient, DocumentClientBuilder, Snapshot},
    error::{DocumentError, DocumentResult},
    query::Query,
    update::Patch,
};

use crate::query::{projection, query_filter, query_sort, update_document};


/// Maps a driver error, reporting transient transaction failures as conflicts.
fn client_error(err: MongoError) -> DocumentError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        DocumentError::TransactionConflict(err.to_string())
    } else {
        DocumentError::Client(err.to_string())
    }
}

/// Splits a stored document into its string `_id` and the remaining fields.
fn into_snapshot(mut document: Document) -> DocumentResult<Snapshot> {
    let id = match document.remove("_id") {
        Some(bson::Bson::String(id)) => id,
        Some(other) => other.to_string(),
        None => return Err(DocumentError::InvalidDocument("document has no _id".into())),
    };

    Ok(Snapshot::new(id, document))
}

fn find_options(query: &Query, fields: Option<&[String]>) -> FindOptions {
    let mut options = FindOptions::default();

    options.sort = Some(query_sort(query));
    options.limit = query.limit.map(|limit| limit as i64);
    options.skip = query.offset.map(|skip| skip as u64);
    options.projection = fields.map(projection);

    options
}

fn find_one_options(fields: Option<&[String]>) -> FindOneOptions {
    let mut options = FindOneOptions::default();
    options.projection = fields.map(projection);

    options
}


/// Document client backed by a MongoDB database.
///
/// Document IDs are stored as string `_id` values. Transactions require a
/// replica set or sharded cluster.
#[derive(Debug)]
pub struct MongoDbClient {
    client: Client,
    database: String,
}

impl MongoDbClient {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbClientBuilder {
        MongoDbClientBuilder::new(dsn, database)
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database().collection(collection_name)
    }
}

#[async_trait]
impl DocumentClient for MongoDbClient {
    type Transaction = MongoDbTransaction;

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>> {
        trace!(collection, id, "find_one");

        self.get_collection(collection)
            .find_one(doc! { "_id": id })
            .with_options(find_one_options(fields))
            .await
            .map_err(client_error)?
            .map(into_snapshot)
            .transpose()
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>> {
        let filter = query_filter(query)?;
        trace!(collection, %filter, "find");

        self.get_collection(collection)
            .find(filter)
            .with_options(find_options(query, fields))
            .await
            .map_err(client_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(client_error)?
            .into_iter()
            .map(into_snapshot)
            .collect()
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        mut data: Document,
    ) -> DocumentResult<()> {
        trace!(collection, id, "replace_one");
        data.insert("_id", id);

        self.get_collection(collection)
            .replace_one(doc! { "_id": id }, data)
            .upsert(true)
            .await
            .map_err(client_error)?;

        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()> {
        let Some(update) = update_document(&patch) else {
            return match self.get_document(collection, id, None).await? {
                Some(_) => Ok(()),
                None => Err(DocumentError::not_found(collection, id)),
            };
        };

        trace!(collection, id, %update, "update_one");

        let result = self.get_collection(collection)
            .update_one(doc! { "_id": id }, update)
            .await
            .map_err(client_error)?;

        if result.matched_count == 0 {
            return Err(DocumentError::not_found(collection, id));
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentResult<()> {
        trace!(collection, id, "delete_one");

        self.get_collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(client_error)?;

        Ok(())
    }

    async fn begin_transaction(&self) -> DocumentResult<Self::Transaction> {
        let mut session = self.client
            .start_session()
            .await
            .map_err(client_error)?;

        session
            .start_transaction()
            .await
            .map_err(client_error)?;

        Ok(MongoDbTransaction {
            session: Mutex::new(session),
            database: self.database(),
        })
    }

    async fn shutdown(self) -> DocumentResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}


/// A MongoDB multi-document transaction.
///
/// Reads and updates run inside the transaction's session; updates become
/// visible to other sessions only when the transaction commits.
pub struct MongoDbTransaction {
    session: Mutex<ClientSession>,
    database: Database,
}

impl fmt::Debug for MongoDbTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbTransaction")
            .field("database", &self.database.name())
            .finish_non_exhaustive()
    }
}

impl MongoDbTransaction {
    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database.collection(collection_name)
    }
}

#[async_trait]
impl ClientTransaction for MongoDbTransaction {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>> {
        trace!(collection, id, "transactional find_one");
        let mut session = self.session.lock().await;

        self.get_collection(collection)
            .find_one(doc! { "_id": id })
            .with_options(find_one_options(fields))
            .session(&mut *session)
            .await
            .map_err(client_error)?
            .map(into_snapshot)
            .transpose()
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>> {
        let filter = query_filter(query)?;
        trace!(collection, %filter, "transactional find");
        let mut session = self.session.lock().await;

        let mut cursor = self.get_collection(collection)
            .find(filter)
            .with_options(find_options(query, fields))
            .session(&mut *session)
            .await
            .map_err(client_error)?;

        cursor
            .stream(&mut *session)
            .try_collect::<Vec<Document>>()
            .await
            .map_err(client_error)?
            .into_iter()
            .map(into_snapshot)
            .collect()
    }

    async fn stage_update(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()> {
        let Some(update) = update_document(&patch) else {
            return Ok(());
        };

        trace!(collection, id, %update, "transactional update_one");
        let mut session = self.session.lock().await;

        let result = self.get_collection(collection)
            .update_one(doc! { "_id": id }, update)
            .session(&mut *session)
            .await
            .map_err(client_error)?;

        if result.matched_count == 0 {
            return Err(DocumentError::not_found(collection, id));
        }

        Ok(())
    }

    async fn commit(self) -> DocumentResult<()> {
        trace!("commit_transaction");

        self.session
            .lock()
            .await
            .commit_transaction()
            .await
            .map_err(client_error)
    }

    async fn rollback(self) -> DocumentResult<()> {
        trace!("abort_transaction");

        self.session
            .lock()
            .await
            .abort_transaction()
            .await
            .map_err(client_error)
    }
}


pub struct MongoDbClientBuilder {
    dsn: String,
    database: String,
}

impl MongoDbClientBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl DocumentClientBuilder for MongoDbClientBuilder {
    type Client = MongoDbClient;

    async fn build(self) -> DocumentResult<Self::Client> {
        Ok(MongoDbClient::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
