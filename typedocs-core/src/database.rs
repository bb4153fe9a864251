//! The entry point owning a native client.
//!
//! [`Database`] hands out typed references and threads transactions through
//! caller code. It adds no retry or conflict handling: a conflict reported by
//! the client at commit is returned to the caller as-is.
//!
//! # Example
//!
//! ```ignore
//! use typedocs::{prelude::*, memory::MemoryClient};
//!
//! let db = Database::new(MemoryClient::new());
//! let users = db.collection::<User>("users");
//!
//! db.run_transaction(async |tx| {
//!     let user = get_document_from_transaction(tx, &users, "u1").await?;
//!     user.update(UpdateData::new().increment(UserField::Visits, 1)).await
//! })
//! .await?;
//! ```

use tracing::{debug, warn};

use crate::{
    client::{ClientTransaction, DocumentClient},
    error::DocumentResult,
    record::Record,
    reference::{CollectionRef, DocumentRef},
};

/// A database bound to a specific native client implementation.
///
/// # Type Parameters
///
/// * `C` - The native client type
#[derive(Debug)]
pub struct Database<C: DocumentClient> {
    client: C,
}

impl<C: DocumentClient> Database<C> {
    /// Creates a new database over the given client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns a typed handle to the collection `name`.
    pub fn collection<'a, T: Record>(&'a self, name: &str) -> CollectionRef<'a, C, T> {
        CollectionRef::new(&self.client, name)
    }

    /// Returns a typed reference to the document `id` in `collection`.
    pub fn doc<'a, T: Record>(&'a self, collection: &str, id: &str) -> DocumentRef<'a, C, T> {
        DocumentRef::new(&self.client, collection, id)
    }

    /// Runs `f` inside a transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and is rolled back if it
    /// returns `Err`. Updates staged by wrappers fetched through the
    /// transaction become visible only after the commit succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`, or the client's commit error
    /// (for example [`DocumentError::TransactionConflict`](crate::error::DocumentError::TransactionConflict)).
    pub async fn run_transaction<R, F>(&self, f: F) -> DocumentResult<R>
    where
        F: AsyncFnOnce(&C::Transaction) -> DocumentResult<R>,
    {
        let tx = self.client.begin_transaction().await?;
        debug!("transaction started");

        let outcome = f(&tx).await;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!("transaction committed");

                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "transaction rollback failed");
                }

                Err(err)
            }
        }
    }

    /// Shuts down the underlying client.
    pub async fn shutdown(self) -> DocumentResult<()> {
        self.client.shutdown().await
    }
}
