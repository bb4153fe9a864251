//! Read-only and mutable document wrappers.
//!
//! Every read path returns the fetched data together with its ID. Mutable
//! wrappers also carry a [`Binding`]: updates through a client binding are
//! written immediately, updates through a transaction binding are staged and
//! applied only when the transaction commits.

use serde::Serialize;
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    client::{Binding, DocumentClient},
    error::DocumentResult,
    record::{Projection, Record, RecordExt},
    update::{Patch, UpdateData},
};

/// An immutable `{ id, data }` read model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document<P> {
    /// The document ID.
    pub id: String,
    /// The fetched data, either the full record or a projection of it.
    pub data: P,
}

impl<P> Document<P> {
    /// Creates a document wrapper.
    pub fn new(id: impl Into<String>, data: P) -> Self {
        Self { id: id.into(), data }
    }

    /// Consumes the wrapper and returns its data.
    pub fn into_data(self) -> P {
        self.data
    }
}

/// A document wrapper with a write handle bound to its origin.
///
/// `T` is the record stored in the collection and bounds what [`update`]
/// accepts; `P` is the shape of the fetched data, which may be narrowed by a
/// selection.
///
/// [`update`]: MutableDocument::update
#[derive(Debug)]
pub struct MutableDocument<'a, C: DocumentClient, T: Record, P = T> {
    /// The document ID.
    pub id: String,
    /// The fetched data.
    pub data: P,
    collection: String,
    binding: Binding<'a, C>,
    _marker: PhantomData<T>,
}

impl<'a, C, T, P> MutableDocument<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    pub(crate) fn new(collection: String, id: String, data: P, binding: Binding<'a, C>) -> Self {
        Self { id, data, collection, binding, _marker: PhantomData }
    }

    /// Returns the name of the collection this document was read from.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns `true` if writes through this wrapper are staged in a transaction.
    pub fn is_transactional(&self) -> bool {
        self.binding.is_transactional()
    }

    /// Updates the document with values and write markers.
    ///
    /// Without a transaction the write is issued immediately. Inside a
    /// transaction it is staged and applied when the transaction commits.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a value in `data` could not be
    /// converted, and propagates any error from the client, including a
    /// not-found error if the document was deleted in the meantime.
    pub async fn update(&self, data: UpdateData<T>) -> DocumentResult<()> {
        self.write(data.into_patch()?).await
    }

    /// Updates the document with concrete values only.
    ///
    /// `partial` may be the full record or any projection of it; every
    /// serialized field is written as-is.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `partial` does not serialize to a
    /// map, and propagates client errors.
    pub async fn update_with_partial<Q>(&self, partial: &Q) -> DocumentResult<()>
    where
        Q: Projection<T> + Serialize,
    {
        let patch = Patch::from_values(partial.to_document()?);
        debug_assert!(patch.is_concrete());

        self.write(patch).await
    }

    async fn write(&self, patch: Patch) -> DocumentResult<()> {
        debug!(
            collection = %self.collection,
            id = %self.id,
            fields = patch.writes.len(),
            staged = self.binding.is_transactional(),
            "updating document"
        );

        self.binding
            .update(&self.collection, &self.id, patch)
            .await
    }

    /// Drops the write handle, keeping the read model.
    pub fn into_document(self) -> Document<P> {
        Document { id: self.id, data: self.data }
    }

    /// Consumes the wrapper and returns its data.
    pub fn into_data(self) -> P {
        self.data
    }
}

impl<'a, C, T, P> From<MutableDocument<'a, C, T, P>> for Document<P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    fn from(document: MutableDocument<'a, C, T, P>) -> Self {
        document.into_document()
    }
}
