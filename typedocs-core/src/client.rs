//! The native database client seam.
//!
//! This module defines the traits a document database client implements so
//! the typed accessors can forward to it. The library adds no protocol of its
//! own: snapshots and patches pass through unchanged.
//!
//! # Traits
//!
//! - [`DocumentClient`]: direct reads and writes, plus transaction creation
//! - [`ClientTransaction`]: reads registered against a transaction and buffered writes
//! - [`DocumentClientBuilder`]: factory trait for creating client instances
//!
//! # Examples
//!
//! ```ignore
//! use typedocs::client::DocumentClient;
//! use bson::doc;
//!
//! let client = MyClient::new();
//! client.set_document("users", "u1", doc! { "name": "Alice" }).await?;
//! let snapshot = client.get_document("users", "u1", None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::fmt::Debug;

use crate::{error::DocumentResult, query::Query, update::Patch};

/// The data and ID of one existing document, as returned by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The document ID.
    pub id: String,
    /// The stored fields, possibly narrowed by a selection.
    pub data: BsonDocument,
}

impl Snapshot {
    /// Creates a snapshot from an ID and its data.
    pub fn new(id: impl Into<String>, data: BsonDocument) -> Self {
        Self { id: id.into(), data }
    }
}

/// Abstract interface for a document database client.
///
/// Implementations must be thread-safe. Selections passed as `fields` name
/// the top-level fields to return; `None` returns the whole document.
///
/// # Error Handling
///
/// Implementations report their own failures as
/// [`DocumentError::Client`](crate::error::DocumentError::Client) or a more
/// specific variant; the accessors never translate them.
#[async_trait]
pub trait DocumentClient: Send + Sync + Debug {
    /// The transaction handle created by [`DocumentClient::begin_transaction`].
    type Transaction: ClientTransaction;

    /// Fetches one document by ID, or `None` if it does not exist.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>>;

    /// Runs a query and returns the matching documents in query order.
    ///
    /// Without a sort the order is ascending by document ID. With a sort,
    /// ties are broken by document ID so that [`Query::start_after`] cursors
    /// resume deterministically.
    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>>;

    /// Creates or replaces a document.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: BsonDocument,
    ) -> DocumentResult<()>;

    /// Applies `patch` to an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`](crate::error::DocumentError::NotFound)
    /// if the document does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> DocumentResult<()>;

    /// Starts a new transaction.
    async fn begin_transaction(&self) -> DocumentResult<Self::Transaction>;

    /// Cleanly shuts down the client, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// An in-flight transaction of a [`DocumentClient`].
///
/// Reads are registered so the client can detect conflicting writes at
/// commit time. Writes are buffered and only applied by [`commit`](Self::commit).
#[async_trait]
pub trait ClientTransaction: Send + Sync + Debug {
    /// Fetches one document by ID within the transaction.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>>;

    /// Runs a query within the transaction.
    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>>;

    /// Buffers `patch` for application at commit.
    async fn stage_update(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()>;

    /// Applies all staged writes atomically.
    async fn commit(self) -> DocumentResult<()>
    where
        Self: Sized;

    /// Discards all staged writes.
    async fn rollback(self) -> DocumentResult<()>
    where
        Self: Sized;
}

/// Factory trait for constructing configured clients.
#[async_trait]
pub trait DocumentClientBuilder {
    type Client: DocumentClient;

    async fn build(self) -> DocumentResult<Self::Client>;
}

/// Where a wrapper reads from and writes to: the client itself or a transaction.
#[derive(Debug)]
pub enum Binding<'a, C: DocumentClient> {
    /// Direct access; writes are issued immediately.
    Client(&'a C),
    /// Transactional access; writes are staged until commit.
    Transaction(&'a C::Transaction),
}

impl<'a, C: DocumentClient> Clone for Binding<'a, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, C: DocumentClient> Copy for Binding<'a, C> {}

impl<'a, C: DocumentClient> Binding<'a, C> {
    /// Returns `true` if this binding belongs to a transaction.
    pub fn is_transactional(&self) -> bool {
        matches!(self, Binding::Transaction(_))
    }

    pub(crate) async fn get(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&[String]>,
    ) -> DocumentResult<Option<Snapshot>> {
        match self {
            Binding::Client(client) => client.get_document(collection, id, fields).await,
            Binding::Transaction(tx) => tx.get_document(collection, id, fields).await,
        }
    }

    pub(crate) async fn query(
        &self,
        collection: &str,
        query: &Query,
        fields: Option<&[String]>,
    ) -> DocumentResult<Vec<Snapshot>> {
        match self {
            Binding::Client(client) => client.query_documents(collection, query, fields).await,
            Binding::Transaction(tx) => tx.query_documents(collection, query, fields).await,
        }
    }

    pub(crate) async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DocumentResult<()> {
        match self {
            Binding::Client(client) => client.update_document(collection, id, patch).await,
            Binding::Transaction(tx) => tx.stage_update(collection, id, patch).await,
        }
    }
}
