//! Query and collection accessors.
//!
//! The filter is supplied through [`query`](GetDocuments::query) and the
//! projection through [`select`](GetDocuments::select), as two separate
//! steps: the filter stays untyped while the selection determines the
//! result type.
//!
//! ```ignore
//! use typedocs::{list::{get_documents, get_first_document}, query::{Filter, SortDirection}};
//!
//! let everyone = get_documents(&users).await?;
//! let names = get_documents(&users)
//!     .query(|q| q.filter(Filter::eq("active", true)))
//!     .select::<UserName>()
//!     .await?;
//! let newest = get_first_document(&users)
//!     .query(|q| q.sort("created_at", SortDirection::Desc))
//!     .await?;
//! ```

use futures::future::BoxFuture;
use std::{future::IntoFuture, marker::PhantomData, mem::take};
use tracing::debug;

use crate::{
    client::{Binding, DocumentClient, Snapshot},
    document::MutableDocument,
    error::DocumentResult,
    query::{Query, QueryBuilder},
    record::{Projection, Record, decode_snapshot, selection},
    reference::CollectionRef,
};

/// A query against one collection through a binding.
#[derive(Debug)]
pub(crate) struct Scan<'a, C: DocumentClient> {
    pub(crate) binding: Binding<'a, C>,
    pub(crate) collection: String,
    pub(crate) query: Query,
}

impl<'a, C: DocumentClient> Scan<'a, C> {
    pub(crate) fn new(binding: Binding<'a, C>, collection: &str) -> Self {
        Self { binding, collection: collection.to_string(), query: Query::new() }
    }

    pub(crate) fn refine(&mut self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) {
        self.query = build(QueryBuilder::from_query(take(&mut self.query))).build();
    }

    /// Runs `query` and wraps every result.
    pub(crate) async fn run<T: Record, P: Projection<T>>(
        &self,
        query: &Query,
    ) -> DocumentResult<Vec<MutableDocument<'a, C, T, P>>> {
        debug!(
            collection = %self.collection,
            filtered = query.filter.is_some(),
            transactional = self.binding.is_transactional(),
            "querying documents"
        );

        let fields = selection::<T, P>();

        self.binding
            .query(&self.collection, query, fields.as_deref())
            .await?
            .into_iter()
            .map(|snapshot| self.wrap::<T, P>(snapshot))
            .collect()
    }

    /// Decodes `snapshot` into a wrapper bound to this scan's binding.
    pub(crate) fn wrap<T: Record, P: Projection<T>>(
        &self,
        snapshot: Snapshot,
    ) -> DocumentResult<MutableDocument<'a, C, T, P>> {
        let (id, data) = decode_snapshot::<T, P>(&self.collection, snapshot)?;

        Ok(MutableDocument::new(self.collection.clone(), id, data, self.binding))
    }
}

/// Request for every document matching a query.
#[must_use = "requests do nothing unless awaited"]
#[derive(Debug)]
pub struct GetDocuments<'a, C: DocumentClient, T: Record, P = T> {
    scan: Scan<'a, C>,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C: DocumentClient, T: Record, P> GetDocuments<'a, C, T, P> {
    /// Restricts the results with the native query builder.
    pub fn query(mut self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.scan.refine(build);
        self
    }

    /// Narrows each document's data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> GetDocuments<'a, C, T, Q> {
        GetDocuments { scan: self.scan, _marker: PhantomData }
    }
}

impl<'a, C, T, P> IntoFuture for GetDocuments<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    type Output = DocumentResult<Vec<MutableDocument<'a, C, T, P>>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            self.scan
                .run::<T, P>(&self.scan.query)
                .await
        })
    }
}

/// Request for the first document matching a query.
#[must_use = "requests do nothing unless awaited"]
#[derive(Debug)]
pub struct GetFirstDocument<'a, C: DocumentClient, T: Record, P = T> {
    scan: Scan<'a, C>,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C: DocumentClient, T: Record, P> GetFirstDocument<'a, C, T, P> {
    /// Restricts the results with the native query builder.
    ///
    /// Any limit set here is replaced by a limit of one.
    pub fn query(mut self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.scan.refine(build);
        self
    }

    /// Narrows the document's data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> GetFirstDocument<'a, C, T, Q> {
        GetFirstDocument { scan: self.scan, _marker: PhantomData }
    }
}

impl<'a, C, T, P> IntoFuture for GetFirstDocument<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    type Output = DocumentResult<Option<MutableDocument<'a, C, T, P>>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut query = self.scan.query.clone();
            query.limit = Some(1);

            Ok(self.scan
                .run::<T, P>(&query)
                .await?
                .into_iter()
                .next())
        })
    }
}

/// Fetches every document in `collection`, optionally filtered and narrowed.
///
/// Without a query this is a full collection scan.
pub fn get_documents<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
) -> GetDocuments<'a, C, T> {
    GetDocuments {
        scan: Scan::new(Binding::Client(collection.client()), collection.name()),
        _marker: PhantomData,
    }
}

/// Fetches every matching document within `tx`.
pub fn get_documents_from_transaction<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    collection: &CollectionRef<'_, C, T>,
) -> GetDocuments<'a, C, T> {
    GetDocuments {
        scan: Scan::new(Binding::Transaction(tx), collection.name()),
        _marker: PhantomData,
    }
}

/// Fetches the first matching document in query order, or `None` if nothing matches.
pub fn get_first_document<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
) -> GetFirstDocument<'a, C, T> {
    GetFirstDocument {
        scan: Scan::new(Binding::Client(collection.client()), collection.name()),
        _marker: PhantomData,
    }
}

/// Fetches the first matching document within `tx`.
pub fn get_first_document_from_transaction<'a, C: DocumentClient + 'a, T: Record>(
    tx: &'a C::Transaction,
    collection: &CollectionRef<'_, C, T>,
) -> GetFirstDocument<'a, C, T> {
    GetFirstDocument {
        scan: Scan::new(Binding::Transaction(tx), collection.name()),
        _marker: PhantomData,
    }
}
