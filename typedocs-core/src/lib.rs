//! Strongly-typed accessors over a native document database client.
//!
//! This crate is the core of the typedocs project and provides:
//!
//! - **Records and projections** ([`record`]) - Traits tying a collection to its record type and narrowed views of it
//! - **Client abstraction** ([`client`]) - The native client and transaction traits the accessors forward to
//! - **References** ([`reference`]) - Typed collection and document handles
//! - **Database** ([`database`]) - Entry point owning the client and running transactions
//! - **Document wrappers** ([`document`]) - Read-only and mutable views returned by every read path
//! - **Single-document accessors** ([`fetch`]) - Required, maybe, data-only and transactional fetches
//! - **Query accessors** ([`list`]) - Fetching every or the first matching document
//! - **Processing** ([`process`], [`chunk`]) - Sequential per-document and per-chunk handlers over large result sets
//! - **Updates** ([`update`]) - Field-keyed update data and the patches derived from it
//! - **Query language** ([`query`]) - The untyped filter, sort and cursor model
//! - **Error handling** ([`error`]) - The error and result types shared by every crate
//!
//! # Example
//!
//! ```ignore
//! use typedocs::{prelude::*, memory::MemoryClient};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     pub name: String,
//!     pub visits: i64,
//! }
//!
//! let db = Database::new(MemoryClient::new());
//! let users = db.collection::<User>("users");
//!
//! let user = get_document(&users, "u1").await?;
//! user.update(UpdateData::new().increment(UserField::Visits, 1)).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as typedocs_core;

pub mod chunk;
pub mod client;
pub mod database;
pub mod document;
pub mod error;
pub mod fetch;
pub mod list;
pub mod process;
pub mod query;
pub mod record;
pub mod reference;
pub mod update;
