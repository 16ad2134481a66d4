//! Store error types

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store-specific error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store not initialized: call initialize() before using it")]
    NotInitialized,

    #[error("Store is closed")]
    Closed,

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Uniqueness violation: {collection} already contains primary key {key}")]
    Uniqueness { collection: String, key: i64 },

    #[error("Referential violation: {collection}.{column} = {value} not found in {references}")]
    Referential {
        collection: String,
        column: String,
        value: i64,
        references: String,
    },

    #[error("Schema error: {0}")]
    Schema(#[from] vetted_core::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB error: {0}")]
    Redb(#[from] ::redb::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB database error: {0}")]
    RedbDatabase(#[from] ::redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("ReDB table error: {0}")]
    RedbTable(#[from] ::redb::TableError),

    #[cfg(feature = "redb")]
    #[error("ReDB storage error: {0}")]
    RedbStorage(#[from] ::redb::StorageError),

    #[cfg(feature = "redb")]
    #[error("ReDB commit error: {0}")]
    RedbCommit(#[from] ::redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("ReDB transaction error: {0}")]
    RedbTransaction(#[from] ::redb::TransactionError),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] ::rusqlite::Error),
}

impl StoreError {
    pub fn is_uniqueness(&self) -> bool {
        matches!(self, Self::Uniqueness { .. })
    }

    pub fn is_referential(&self) -> bool {
        matches!(self, Self::Referential { .. })
    }
}
