//! Single-document accessors.
//!
//! Each accessor returns a request that runs when awaited. Before awaiting,
//! [`select`](GetDocument::select) narrows the fetched data to a
//! [`Projection`] of the record:
//!
//! ```ignore
//! use typedocs::fetch::{get_document, get_document_maybe};
//!
//! let user = get_document(&users, "u1").await?;
//! let name = get_document(&users, "u1").select::<UserName>().await?;
//! let maybe = get_document_maybe(&users, params.user_id.as_deref()).await?;
//! ```
//!
//! Required accessors fail with [`DocumentError::NotFound`] when the document
//! is missing; `_maybe` accessors return `None` instead, and return `None`
//! without issuing a request when the ID is absent or empty.

use futures::future::BoxFuture;
use std::{future::IntoFuture, marker::PhantomData};
use tracing::debug;

use crate::{
    client::{Binding, DocumentClient},
    document::MutableDocument,
    error::{DocumentError, DocumentResult},
    record::{Projection, Record, decode_snapshot, selection},
    reference::{CollectionRef, DocumentRef},
};

/// The location and binding shared by every single-document request.
#[derive(Debug)]
struct Lookup<'a, C: DocumentClient> {
    binding: Binding<'a, C>,
    collection: String,
    id: Option<String>,
}

impl<'a, C: DocumentClient> Lookup<'a, C> {
    fn new(binding: Binding<'a, C>, collection: &str, id: Option<String>) -> Self {
        Self { binding, collection: collection.to_string(), id }
    }

    async fn fetch<T: Record, P: Projection<T>>(&self) -> DocumentResult<Option<(String, P)>> {
        let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) else {
            debug!(collection = %self.collection, "no document id given, skipping fetch");
            return Ok(None);
        };

        debug!(
            collection = %self.collection,
            id,
            transactional = self.binding.is_transactional(),
            "fetching document"
        );

        let fields = selection::<T, P>();

        self.binding
            .get(&self.collection, id, fields.as_deref())
            .await?
            .map(|snapshot| decode_snapshot::<T, P>(&self.collection, snapshot))
            .transpose()
    }

    async fn require<T: Record, P: Projection<T>>(&self) -> DocumentResult<(String, P)> {
        self.fetch::<T, P>()
            .await?
            .ok_or_else(|| {
                DocumentError::not_found(&self.collection, self.id.clone().unwrap_or_default())
            })
    }
}

/// Request for a required document with a write handle.
#[must_use = "requests do nothing unless awaited"]
#[derive(Debug)]
pub struct GetDocument<'a, C: DocumentClient, T: Record, P = T> {
    lookup: Lookup<'a, C>,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C: DocumentClient, T: Record, P> GetDocument<'a, C, T, P> {
    /// Narrows the fetched data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> GetDocument<'a, C, T, Q> {
        GetDocument { lookup: self.lookup, _marker: PhantomData }
    }
}

impl<'a, C, T, P> IntoFuture for GetDocument<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    type Output = DocumentResult<MutableDocument<'a, C, T, P>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let (id, data) = self.lookup.require::<T, P>().await?;
            let Lookup { binding, collection, .. } = self.lookup;

            Ok(MutableDocument::new(collection, id, data, binding))
        })
    }
}

/// Request for an optional document with a write handle.
#[must_use = "requests do nothing unless awaited"]
#[derive(Debug)]
pub struct GetDocumentMaybe<'a, C: DocumentClient, T: Record, P = T> {
    lookup: Lookup<'a, C>,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C: DocumentClient, T: Record, P> GetDocumentMaybe<'a, C, T, P> {
    /// Narrows the fetched data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> GetDocumentMaybe<'a, C, T, Q> {
        GetDocumentMaybe { lookup: self.lookup, _marker: PhantomData }
    }
}

impl<'a, C, T, P> IntoFuture for GetDocumentMaybe<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    type Output = DocumentResult<Option<MutableDocument<'a, C, T, P>>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let found = self.lookup.fetch::<T, P>().await?;
            let Lookup { binding, collection, .. } = self.lookup;

            Ok(found.map(|(id, data)| MutableDocument::new(collection, id, data, binding)))
        })
    }
}

/// Request for the bare data of a required document.
#[must_use = "requests do nothing unless awaited"]
#[derive(Debug)]
pub struct GetDocumentData<'a, C: DocumentClient, T: Record, P = T> {
    lookup: Lookup<'a, C>,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C: DocumentClient, T: Record, P> GetDocumentData<'a, C, T, P> {
    /// Narrows the fetched data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> GetDocumentData<'a, C, T, Q> {
        GetDocumentData { lookup: self.lookup, _marker: PhantomData }
    }
}

impl<'a, C, T, P> IntoFuture for GetDocumentData<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    type Output = DocumentResult<P>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let (_, data) = self.lookup.require::<T, P>().await?;

            Ok(data)
        })
    }
}

/// Request for the bare data of an optional document.
#[must_use = "requests do nothing unless awaited"]
#[derive(Debug)]
pub struct GetDocumentDataMaybe<'a, C: DocumentClient, T: Record, P = T> {
    lookup: Lookup<'a, C>,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C: DocumentClient, T: Record, P> GetDocumentDataMaybe<'a, C, T, P> {
    /// Narrows the fetched data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> GetDocumentDataMaybe<'a, C, T, Q> {
        GetDocumentDataMaybe { lookup: self.lookup, _marker: PhantomData }
    }
}

impl<'a, C, T, P> IntoFuture for GetDocumentDataMaybe<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    type Output = DocumentResult<Option<P>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            Ok(self.lookup
                .fetch::<T, P>()
                .await?
                .map(|(_, data)| data))
        })
    }
}

/// Fetches the document `id`, failing with [`DocumentError::NotFound`] if it is missing.
pub fn get_document<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
    id: impl Into<String>,
) -> GetDocument<'a, C, T> {
    GetDocument {
        lookup: Lookup::new(Binding::Client(collection.client()), collection.name(), Some(id.into())),
        _marker: PhantomData,
    }
}

/// Fetches the document `id` if it exists. An absent or empty ID yields `None`
/// without a request.
pub fn get_document_maybe<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
    id: Option<&str>,
) -> GetDocumentMaybe<'a, C, T> {
    GetDocumentMaybe {
        lookup: Lookup::new(Binding::Client(collection.client()), collection.name(), id.map(str::to_string)),
        _marker: PhantomData,
    }
}

/// Fetches only the data of the document `id`, failing if it is missing.
pub fn get_document_data<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
    id: impl Into<String>,
) -> GetDocumentData<'a, C, T> {
    GetDocumentData {
        lookup: Lookup::new(Binding::Client(collection.client()), collection.name(), Some(id.into())),
        _marker: PhantomData,
    }
}

/// Fetches only the data of the document `id` if it exists.
pub fn get_document_data_maybe<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
    id: Option<&str>,
) -> GetDocumentDataMaybe<'a, C, T> {
    GetDocumentDataMaybe {
        lookup: Lookup::new(Binding::Client(collection.client()), collection.name(), id.map(str::to_string)),
        _marker: PhantomData,
    }
}

/// Fetches the document `id` within `tx`, failing if it is missing.
///
/// The read is registered with the transaction and updates on the returned
/// wrapper are staged until commit.
pub fn get_document_from_transaction<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    collection: &CollectionRef<'_, C, T>,
    id: impl Into<String>,
) -> GetDocument<'a, C, T> {
    GetDocument {
        lookup: Lookup::new(Binding::Transaction(tx), collection.name(), Some(id.into())),
        _marker: PhantomData,
    }
}

/// Fetches the document `id` within `tx` if it exists.
pub fn get_document_from_transaction_maybe<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    collection: &CollectionRef<'_, C, T>,
    id: Option<&str>,
) -> GetDocumentMaybe<'a, C, T> {
    GetDocumentMaybe {
        lookup: Lookup::new(Binding::Transaction(tx), collection.name(), id.map(str::to_string)),
        _marker: PhantomData,
    }
}

/// Fetches only the data of the document `id` within `tx`, failing if it is missing.
pub fn get_document_data_from_transaction<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    collection: &CollectionRef<'_, C, T>,
    id: impl Into<String>,
) -> GetDocumentData<'a, C, T> {
    GetDocumentData {
        lookup: Lookup::new(Binding::Transaction(tx), collection.name(), Some(id.into())),
        _marker: PhantomData,
    }
}

/// Fetches only the data of the document `id` within `tx` if it exists.
pub fn get_document_data_from_transaction_maybe<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    collection: &CollectionRef<'_, C, T>,
    id: Option<&str>,
) -> GetDocumentDataMaybe<'a, C, T> {
    GetDocumentDataMaybe {
        lookup: Lookup::new(Binding::Transaction(tx), collection.name(), id.map(str::to_string)),
        _marker: PhantomData,
    }
}

/// Fetches the document `document` points at, failing if it is missing.
pub fn get_specific_document<'a, C: DocumentClient, T: Record>(
    document: &DocumentRef<'a, C, T>,
) -> GetDocument<'a, C, T> {
    GetDocument {
        lookup: Lookup::new(
            Binding::Client(document.client()),
            document.collection_name(),
            Some(document.id().to_string()),
        ),
        _marker: PhantomData,
    }
}

/// Fetches only the data of the document `document` points at, failing if it is missing.
pub fn get_specific_document_data<'a, C: DocumentClient, T: Record>(
    document: &DocumentRef<'a, C, T>,
) -> GetDocumentData<'a, C, T> {
    GetDocumentData {
        lookup: Lookup::new(
            Binding::Client(document.client()),
            document.collection_name(),
            Some(document.id().to_string()),
        ),
        _marker: PhantomData,
    }
}

/// Fetches the document `document` points at within `tx`, failing if it is missing.
pub fn get_specific_document_from_transaction<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    document: &DocumentRef<'_, C, T>,
) -> GetDocument<'a, C, T> {
    GetDocument {
        lookup: Lookup::new(
            Binding::Transaction(tx),
            document.collection_name(),
            Some(document.id().to_string()),
        ),
        _marker: PhantomData,
    }
}

/// Fetches only the data of the document `document` points at within `tx`.
pub fn get_specific_document_data_from_transaction<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    document: &DocumentRef<'_, C, T>,
) -> GetDocumentData<'a, C, T> {
    GetDocumentData {
        lookup: Lookup::new(
            Binding::Transaction(tx),
            document.collection_name(),
            Some(document.id().to_string()),
        ),
        _marker: PhantomData,
    }
}
