//! MongoDB client implementation for typedocs.
//!
//! This crate provides a MongoDB-based implementation of the `DocumentClient` trait.
//!
//! To use this client, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! typedocs = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native queries** - Filters, sorts and cursors run in MongoDB's query engine
//! - **Native updates** - Patches map to `$set`, `$inc`, `$currentDate`, `$addToSet`, `$pull` and `$unset`
//! - **Transactions** - Reads and updates run in a session-bound multi-document transaction
//!
//! # Example
//!
//! ```ignore
//! use typedocs::{client::DocumentClientBuilder, database::Database, mongodb::MongoDbClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MongoDbClient::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let db = Database::new(client);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as typedocs_mongodb;

pub mod client;
mod query;

pub use client::{MongoDbClient, MongoDbClientBuilder, MongoDbTransaction};
