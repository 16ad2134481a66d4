//! Error types for Vetted Core

use thiserror::Error;

/// Result type alias using the core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Schema, query and decoding errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown column: {collection}.{column}")]
    UnknownColumn { collection: String, column: String },

    #[error("Missing column: {collection}.{column}")]
    MissingColumn { collection: String, column: String },

    #[error("Type mismatch for {collection}.{column}: expected {expected}, got {found}")]
    TypeMismatch {
        collection: String,
        column: String,
        expected: String,
        found: String,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Invalid input document: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
