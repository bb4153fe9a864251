//! Chunk sizing and cursor-based paging over query results.
//!
//! Large result sets are read one bounded page at a time. Each page resumes
//! after the last document of the previous one (see [`Cursor`]), so documents
//! that a handler modifies out of the query's filter do not shift the pages
//! that follow.

use serde::{Deserialize, Serialize};
use std::cmp::min;
use tracing::debug;

use crate::{
    client::{Binding, DocumentClient, Snapshot},
    error::{DocumentError, DocumentResult},
    query::{Cursor, Query, lookup_path},
};

/// Number of documents read per page when no chunk size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Options controlling how processing reads through a result set.
///
/// # Example
///
/// ```ignore
/// use typedocs::chunk::ChunkOptions;
///
/// let options = ChunkOptions::builder()
///     .with_chunk_size(100)
///     .build();
///
/// assert_eq!(options.chunk_size, 100);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChunkOptions {
    /// Maximum number of documents read (and handed to a chunk handler) at once.
    pub chunk_size: usize,
}

impl ChunkOptions {
    /// Creates options with the given chunk size.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Creates a new builder for constructing chunk options.
    pub fn builder() -> ChunkOptionsBuilder {
        ChunkOptionsBuilder::new()
    }

    /// Checks that the options can drive a paging loop.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidQuery`] for a zero chunk size.
    pub fn validate(&self) -> DocumentResult<()> {
        if self.chunk_size == 0 {
            return Err(DocumentError::InvalidQuery("chunk size must be at least 1".to_string()));
        }

        Ok(())
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

/// Builder for constructing [`ChunkOptions`] instances.
pub struct ChunkOptionsBuilder {
    chunk_size: Option<usize>,
}

impl ChunkOptionsBuilder {
    /// Creates a new builder with no options set.
    pub fn new() -> Self {
        Self { chunk_size: None }
    }

    /// Sets the number of documents per chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Builds the options, using [`DEFAULT_CHUNK_SIZE`] when unset.
    pub fn build(self) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        }
    }
}

impl Default for ChunkOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a query's results page by page.
pub(crate) struct ChunkReader<'a, C: DocumentClient> {
    binding: Binding<'a, C>,
    collection: String,
    query: Query,
    fields: Option<Vec<String>>,
    cursor_field: Option<String>,
    chunk_size: usize,
    remaining: Option<usize>,
    first_page: bool,
    exhausted: bool,
}

impl<'a, C: DocumentClient> ChunkReader<'a, C> {
    /// Creates a reader over `query`, selecting `selection` from each document.
    ///
    /// The query's `limit` caps the total number of documents read across all
    /// pages; its `offset` applies to the first page only.
    pub(crate) fn new(
        binding: Binding<'a, C>,
        collection: String,
        query: Query,
        selection: Option<Vec<String>>,
        options: &ChunkOptions,
    ) -> DocumentResult<Self> {
        options.validate()?;

        // Sorted paging needs the sort value of each page's last document,
        // even when the selection leaves it out.
        let mut fields = selection;
        let mut cursor_field = None;

        if let (Some(selected), Some(sort_field)) = (fields.as_mut(), query.sort_field()) {
            let root = sort_field.split('.').next().unwrap_or(sort_field);

            if !selected.iter().any(|field| field == root) {
                selected.push(root.to_string());
                cursor_field = Some(root.to_string());
            }
        }

        Ok(Self {
            binding,
            collection,
            remaining: query.limit,
            query,
            fields,
            cursor_field,
            chunk_size: options.chunk_size,
            first_page: true,
            exhausted: false,
        })
    }

    /// Returns the next non-empty page, or `None` once the results are exhausted.
    pub(crate) async fn next_chunk(&mut self) -> DocumentResult<Option<Vec<Snapshot>>> {
        if self.exhausted {
            return Ok(None);
        }

        let size = match self.remaining {
            Some(remaining) => min(self.chunk_size, remaining),
            None => self.chunk_size,
        };

        if size == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        let mut page = self.query.clone();
        page.limit = Some(size);

        if !self.first_page {
            page.offset = None;
        }

        let mut snapshots = self.binding
            .query(&self.collection, &page, self.fields.as_deref())
            .await?;

        debug!(
            collection = %self.collection,
            requested = size,
            received = snapshots.len(),
            "read chunk"
        );

        self.first_page = false;

        if snapshots.len() < size {
            self.exhausted = true;
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(snapshots.len());
        }

        let Some(last) = snapshots.last() else {
            self.exhausted = true;
            return Ok(None);
        };

        let value = self.query
            .sort_field()
            .and_then(|field| lookup_path(&last.data, field))
            .cloned();
        self.query.start_after = Some(Cursor::new(last.id.clone(), value));

        if let Some(field) = &self.cursor_field {
            for snapshot in snapshots.iter_mut() {
                snapshot.data.remove(field);
            }
        }

        Ok(Some(snapshots))
    }
}
