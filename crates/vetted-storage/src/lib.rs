//! Vetted Storage - Storage backends for the entity store
//!
//! This crate provides the backends that persist the collections described
//! by a [`vetted_core::Schema`], and the [`Session`] handle used to insert
//! and query typed records.

#![allow(clippy::result_large_err)]

pub mod error;
pub mod session;
pub mod staging;
pub mod traits;

#[cfg(feature = "redb")]
pub mod redb;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod memory;

pub use error::{StoreError, StoreResult};
pub use session::Session;
pub use traits::StoreBackend;

#[cfg(feature = "redb")]
pub use redb::RedbStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

pub use memory::MemoryStore;
