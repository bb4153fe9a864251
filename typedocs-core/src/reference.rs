//! Typed collection and document references.
//!
//! A [`CollectionRef`] is a reusable, type-tagged handle to a set of
//! same-shaped records; a [`DocumentRef`] points at one document of such a
//! collection. Both are cheap to create and borrow the client.
//!
//! # Example
//!
//! ```ignore
//! let db = Database::new(MemoryClient::new());
//! let users = db.collection::<User>("users");
//!
//! let id = users.add(&User { name: "Alice".into(), visits: 0 }).await?;
//! let alice = users.doc(id);
//! ```

use std::marker::PhantomData;
use uuid::Uuid;
use tracing::debug;

use crate::{
    client::DocumentClient,
    error::DocumentResult,
    record::{Record, RecordExt},
};

/// A typed handle to a collection.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the client reference
/// * `C` - The native client type
/// * `T` - The record type stored in the collection
#[derive(Debug)]
pub struct CollectionRef<'a, C: DocumentClient, T: Record> {
    name: String,
    client: &'a C,
    _marker: PhantomData<T>,
}

impl<'a, C: DocumentClient, T: Record> Clone for CollectionRef<'a, C, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            client: self.client,
            _marker: PhantomData,
        }
    }
}

impl<'a, C: DocumentClient, T: Record> CollectionRef<'a, C, T> {
    /// Creates a typed handle to the collection `name`.
    pub fn new(client: &'a C, name: impl Into<String>) -> Self {
        Self { name: name.into(), client, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the client this handle is bound to.
    pub fn client(&self) -> &'a C {
        self.client
    }

    /// Converts this handle to a different record type.
    ///
    /// This method allows reading the same collection through another record shape.
    pub fn with_type<U: Record>(&self) -> CollectionRef<'a, C, U> {
        CollectionRef {
            name: self.name.clone(),
            client: self.client,
            _marker: PhantomData,
        }
    }

    /// Returns a typed reference to the document `id` in this collection.
    pub fn doc(&self, id: impl Into<String>) -> DocumentRef<'a, C, T> {
        DocumentRef {
            collection: self.name.clone(),
            id: id.into(),
            client: self.client,
            _marker: PhantomData,
        }
    }

    /// Creates or replaces the document `id` with `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the client rejects the write.
    pub async fn set(&self, id: &str, record: &T) -> DocumentResult<()> {
        debug!(collection = %self.name, id, "setting document");

        self.client
            .set_document(&self.name, id, record.to_document()?)
            .await
    }

    /// Stores `record` under a freshly generated ID and returns that ID.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the client rejects the write.
    pub async fn add(&self, record: &T) -> DocumentResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&id, record).await?;

        Ok(id)
    }

    /// Deletes the document `id`. Deleting a missing document is not an error.
    pub async fn delete(&self, id: &str) -> DocumentResult<()> {
        debug!(collection = %self.name, id, "deleting document");

        self.client
            .delete_document(&self.name, id)
            .await
    }
}

/// A typed reference to a single document.
#[derive(Debug)]
pub struct DocumentRef<'a, C: DocumentClient, T: Record> {
    collection: String,
    id: String,
    client: &'a C,
    _marker: PhantomData<T>,
}

impl<'a, C: DocumentClient, T: Record> Clone for DocumentRef<'a, C, T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            id: self.id.clone(),
            client: self.client,
            _marker: PhantomData,
        }
    }
}

impl<'a, C: DocumentClient, T: Record> DocumentRef<'a, C, T> {
    /// Creates a typed reference to the document `id` in `collection`.
    pub fn new(client: &'a C, collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            client,
            _marker: PhantomData,
        }
    }

    /// Returns the document ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the name of the collection holding this document.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Returns the client this reference is bound to.
    pub fn client(&self) -> &'a C {
        self.client
    }

    /// Returns a handle to the parent collection.
    pub fn parent(&self) -> CollectionRef<'a, C, T> {
        CollectionRef::new(self.client, self.collection.clone())
    }

    /// Creates or replaces this document with `record`.
    pub async fn set(&self, record: &T) -> DocumentResult<()> {
        self.parent().set(&self.id, record).await
    }

    /// Deletes this document.
    pub async fn delete(&self) -> DocumentResult<()> {
        self.parent().delete(&self.id).await
    }
}
