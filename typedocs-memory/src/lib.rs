//! In-memory document client for typedocs.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `DocumentClient` trait. It is meant for development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Full query support** - Filtering, sorting with ID tie-breaks, cursors and offsets
//! - **Optimistic transactions** - Buffered updates with conflict detection at commit
//! - **Request counting** - [`MemoryClient::request_count`] for asserting on traffic
//!
//! # Quick Start
//!
//! ```ignore
//! use typedocs::{prelude::*, memory::MemoryClient};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     pub name: String,
//! }
//!
//! let client = MemoryClient::builder().build().await?;
//! let db = Database::new(client);
//! let users = db.collection::<User>("users");
//!
//! let id = users.add(&User { name: "Alice".to_string() }).await?;
//! let alice = get_document(&users, &id).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as typedocs_memory;

pub mod client;
mod evaluator;

pub use client::{MemoryClient, MemoryClientBuilder, MemoryTransaction};
