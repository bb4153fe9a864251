//! Convenient re-exports of commonly used types from typedocs.
//!
//! ```ignore
//! use typedocs::prelude::*;
//! ```
//!
//! This provides access to:
//! - Record and projection traits and their derives
//! - The database, references and document wrappers
//! - Every accessor and processing entry point
//! - Update data and error types

pub use typedocs_core::{
    chunk::{ChunkOptions, DEFAULT_CHUNK_SIZE},
    client::{ClientTransaction, DocumentClient, DocumentClientBuilder},
    database::Database,
    document::{Document, MutableDocument},
    error::{DocumentError, DocumentResult},
    fetch::{
        get_document, get_document_maybe, get_document_data, get_document_data_maybe,
        get_document_from_transaction, get_document_from_transaction_maybe,
        get_document_data_from_transaction, get_document_data_from_transaction_maybe,
        get_specific_document, get_specific_document_data,
        get_specific_document_from_transaction, get_specific_document_data_from_transaction,
    },
    list::{get_documents, get_documents_from_transaction, get_first_document, get_first_document_from_transaction},
    process::{process_documents, process_documents_by_chunk, process_collection, process_collection_by_chunk},
    query::{Filter, Query, QueryBuilder, SortDirection},
    record::{Field, Projection, Record},
    reference::{CollectionRef, DocumentRef},
    update::{FieldWrite, Numeric, Timestamp, UpdateData},
};
pub use typedocs_macros::{Projection, Record};
