//! Sequential processing of large result sets.
//!
//! Results are read in bounded pages (see [`ChunkOptions`]) and handed to an
//! async handler one document, or one chunk, at a time. Each handler call is
//! awaited before the next one starts. The first handler error stops
//! processing and is returned; writes made by earlier calls stay in place.
//!
//! # Example
//!
//! ```ignore
//! use typedocs::{prelude::*, query::Filter};
//!
//! process_documents(&users)
//!     .query(|q| q.filter(Filter::eq("active", false)))
//!     .select::<UserVisits>()
//!     .run(async |user| {
//!         user.update(UpdateData::new().set(UserField::Visits, 0)).await
//!     })
//!     .await?;
//!
//! process_collection_by_chunk(&users, async |chunk| {
//!     println!("{} users", chunk.len());
//!     Ok(())
//! }, ChunkOptions::new(100))
//! .await?;
//! ```

use std::marker::PhantomData;
use tracing::{debug, info};

use crate::{
    chunk::{ChunkOptions, ChunkReader},
    client::{Binding, DocumentClient},
    document::MutableDocument,
    error::DocumentResult,
    list::Scan,
    query::QueryBuilder,
    record::{Projection, Record, selection},
    reference::CollectionRef,
};

/// Runs a handler for every document matching a query.
#[must_use = "processing does nothing until `run` is awaited"]
#[derive(Debug)]
pub struct ProcessDocuments<'a, C: DocumentClient, T: Record, P = T> {
    scan: Scan<'a, C>,
    options: ChunkOptions,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C, T, P> ProcessDocuments<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
{
    /// Restricts the processed documents with the native query builder.
    ///
    /// A `limit` caps the total number of documents processed.
    pub fn query(mut self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.scan.refine(build);
        self
    }

    /// Narrows each document's data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> ProcessDocuments<'a, C, T, Q> {
        ProcessDocuments { scan: self.scan, options: self.options, _marker: PhantomData }
    }

    /// Sets the page size used to read through the results.
    pub fn options(mut self, options: ChunkOptions) -> Self {
        self.options = options;
        self
    }
}

impl<'a, C, T, P> ProcessDocuments<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    /// Invokes `handler` for each matching document in query order and
    /// returns the number of documents handled.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a read or by `handler`.
    pub async fn run<F>(self, mut handler: F) -> DocumentResult<usize>
    where
        F: AsyncFnMut(MutableDocument<'a, C, T, P>) -> DocumentResult<()>,
    {
        let mut reader = ChunkReader::new(
            self.scan.binding,
            self.scan.collection.clone(),
            self.scan.query.clone(),
            selection::<T, P>(),
            &self.options,
        )?;
        let mut processed = 0;

        while let Some(chunk) = reader.next_chunk().await? {
            for snapshot in chunk {
                let document = self.scan.wrap::<T, P>(snapshot)?;
                handler(document).await?;
                processed += 1;
            }
        }

        info!(collection = %self.scan.collection, processed, "processed documents");

        Ok(processed)
    }
}

/// Runs a handler for every chunk of documents matching a query.
#[must_use = "processing does nothing until `run` is awaited"]
#[derive(Debug)]
pub struct ProcessDocumentsByChunk<'a, C: DocumentClient, T: Record, P = T> {
    scan: Scan<'a, C>,
    options: ChunkOptions,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<'a, C, T, P> ProcessDocumentsByChunk<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
{
    /// Restricts the processed documents with the native query builder.
    ///
    /// A `limit` caps the total number of documents processed.
    pub fn query(mut self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.scan.refine(build);
        self
    }

    /// Narrows each document's data to the projection `Q`.
    pub fn select<Q: Projection<T>>(self) -> ProcessDocumentsByChunk<'a, C, T, Q> {
        ProcessDocumentsByChunk { scan: self.scan, options: self.options, _marker: PhantomData }
    }

    /// Sets the maximum number of documents per chunk.
    pub fn options(mut self, options: ChunkOptions) -> Self {
        self.options = options;
        self
    }
}

impl<'a, C, T, P> ProcessDocumentsByChunk<'a, C, T, P>
where
    C: DocumentClient,
    T: Record,
    P: Projection<T>,
{
    /// Invokes `handler` once per non-empty chunk, in query order, and
    /// returns the number of chunks handled.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a read or by `handler`.
    pub async fn run<F>(self, mut handler: F) -> DocumentResult<usize>
    where
        F: AsyncFnMut(Vec<MutableDocument<'a, C, T, P>>) -> DocumentResult<()>,
    {
        let mut reader = ChunkReader::new(
            self.scan.binding,
            self.scan.collection.clone(),
            self.scan.query.clone(),
            selection::<T, P>(),
            &self.options,
        )?;
        let mut chunks = 0;

        while let Some(chunk) = reader.next_chunk().await? {
            let documents = chunk
                .into_iter()
                .map(|snapshot| self.scan.wrap::<T, P>(snapshot))
                .collect::<DocumentResult<Vec<_>>>()?;

            debug!(collection = %self.scan.collection, chunk = chunks, size = documents.len(), "handling chunk");

            handler(documents).await?;
            chunks += 1;
        }

        info!(collection = %self.scan.collection, chunks, "processed chunks");

        Ok(chunks)
    }
}

/// Prepares per-document processing of `collection`.
pub fn process_documents<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
) -> ProcessDocuments<'a, C, T> {
    ProcessDocuments {
        scan: Scan::new(Binding::Client(collection.client()), collection.name()),
        options: ChunkOptions::default(),
        _marker: PhantomData,
    }
}

/// Prepares chunked processing of `collection`.
pub fn process_documents_by_chunk<'a, C: DocumentClient, T: Record>(
    collection: &CollectionRef<'a, C, T>,
) -> ProcessDocumentsByChunk<'a, C, T> {
    ProcessDocumentsByChunk {
        scan: Scan::new(Binding::Client(collection.client()), collection.name()),
        options: ChunkOptions::default(),
        _marker: PhantomData,
    }
}

/// Invokes `handler` for every document in `collection`.
pub async fn process_collection<'a, C, T, F>(
    collection: &CollectionRef<'a, C, T>,
    handler: F,
) -> DocumentResult<usize>
where
    C: DocumentClient,
    T: Record,
    F: AsyncFnMut(MutableDocument<'a, C, T>) -> DocumentResult<()>,
{
    process_documents(collection).run(handler).await
}

/// Invokes `handler` for every chunk of at most `options.chunk_size` documents in `collection`.
pub async fn process_collection_by_chunk<'a, C, T, F>(
    collection: &CollectionRef<'a, C, T>,
    handler: F,
    options: ChunkOptions,
) -> DocumentResult<usize>
where
    C: DocumentClient,
    T: Record,
    F: AsyncFnMut(Vec<MutableDocument<'a, C, T>>) -> DocumentResult<()>,
{
    process_documents_by_chunk(collection)
        .options(options)
        .run(handler)
        .await
}
