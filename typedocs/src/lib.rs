//! Strongly-typed document access over a native document database client.
//!
//! This crate is the primary entry point for users of typedocs. It re-exports
//! the accessors from the sub-crates and the bundled clients.
//!
//! # Features
//!
//! - **Typed records** - Derive `Record` on a Serde struct to tie it to a collection and get typed field keys for updates
//! - **Typed projections** - Derive `Projection` to narrow reads; the selected fields and the result type come from one declaration
//! - **Single-document accessors** - Required, maybe, data-only, specific and transactional fetches
//! - **Query accessors** - Fetch every or the first matching document with the native filter language
//! - **Processing** - Sequential per-document or per-chunk handlers over large result sets
//! - **Change events** - Typed before/after extraction from trigger payloads (requires `events` feature)
//!
//! # Quick Start
//!
//! ```ignore
//! use typedocs::{prelude::*, memory::MemoryClient, query::Filter};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     pub name: String,
//!     pub active: bool,
//!     pub visits: i64,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Projection)]
//! #[projection(of = User)]
//! pub struct UserName {
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentResult<()> {
//!     let db = Database::new(MemoryClient::new());
//!     let users = db.collection::<User>("users");
//!
//!     let id = users.add(&User { name: "Alice".into(), active: true, visits: 0 }).await?;
//!
//!     // A required fetch fails with `NotFound` if the document is missing
//!     let user = get_document(&users, &id).await?;
//!     user.update(UpdateData::new().increment(UserField::Visits, 1)).await?;
//!
//!     // Narrowed reads
//!     let names = get_documents(&users)
//!         .query(|q| q.filter(Filter::eq("active", true)))
//!         .select::<UserName>()
//!         .await?;
//!
//!     // Transactions stage updates until commit
//!     db.run_transaction(async |tx| {
//!         let user = get_document_from_transaction(tx, &users, &id).await?;
//!         user.update(UpdateData::new().set(UserField::Active, false)).await
//!     })
//!     .await?;
//!
//!     db.shutdown().await
//! }
//! ```
//!
//! # Compile-time checks
//!
//! Field keys carry the field's type, and projections are checked against the
//! serialized names of their record:
//!
//! ```
//! use typedocs::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, Record)]
//! #[serde(rename_all = "camelCase")]
//! struct Account {
//!     active: bool,
//!     login_count: i64,
//! }
//!
//! #[derive(Serialize, Deserialize, Projection)]
//! #[serde(rename_all = "camelCase")]
//! #[projection(of = Account)]
//! struct AccountLogins {
//!     login_count: i64,
//! }
//!
//! let patch = UpdateData::<Account>::new()
//!     .set(AccountField::Active, false)
//!     .increment(AccountField::LoginCount, 1)
//!     .into_patch()
//!     .unwrap();
//!
//! assert_eq!(patch.writes[1].0, "loginCount");
//! assert_eq!(<AccountLogins as Projection<Account>>::selected_fields(), Some(&["loginCount"][..]));
//! ```
//!
//! A value of the wrong type is rejected:
//!
//! ```compile_fail
//! use typedocs::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, Record)]
//! struct Account {
//!     active: bool,
//! }
//!
//! let update = UpdateData::<Account>::new().set(AccountField::Active, "not a bool");
//! ```
//!
//! So is a projection whose serialized names differ from the record's:
//!
//! ```compile_fail
//! use typedocs::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, Record)]
//! #[serde(rename_all = "camelCase")]
//! struct Account {
//!     login_count: i64,
//! }
//!
//! #[derive(Serialize, Deserialize, Projection)]
//! #[projection(of = Account)]
//! struct AccountLogins {
//!     login_count: i64,
//! }
//! ```
//!
//! # Clients
//!
//! - [`memory`] - In-memory client for development and testing
//! - [`mongodb`] - MongoDB client (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as typedocs;

pub mod prelude;

pub use typedocs_core::{
    chunk, client, database, document, error, fetch, list, process, query, record, reference, update,
};
pub use typedocs_macros::{Projection, Record};

// Re-export BSON types for convenience
pub use bson;
pub use async_trait::async_trait;

/// In-memory client implementation.
pub mod memory {
    pub use typedocs_memory::{MemoryClient, MemoryClientBuilder, MemoryTransaction};
}

/// MongoDB client implementation.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use typedocs_mongodb::{MongoDbClient, MongoDbClientBuilder, MongoDbTransaction};
}

/// Typed change-event extraction.
///
/// This module is only available when the `events` feature is enabled.
#[cfg(feature = "events")]
pub mod events {
    pub use typedocs_events::*;
}
