//! Storage backend trait definitions

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use vetted_core::{Collection, JoinQuery, Predicate, Row, Schema, Value};

/// Trait for storage backend implementations
///
/// Inserts are pending until [`StoreBackend::commit`]; reads only promise
/// to see committed rows.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Create every collection of `schema` that does not exist yet
    async fn initialize(&self, schema: &Schema) -> StoreResult<()>;

    /// Discard pending inserts and release the underlying store
    async fn close(&self) -> StoreResult<()>;

    /// Health check
    async fn health_check(&self) -> StoreResult<bool>;

    /// Schema passed to the last `initialize`
    fn schema(&self) -> StoreResult<Schema>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Stage one row; fails on a duplicate primary key or dangling reference
    async fn insert_row(&self, collection: &str, row: Row) -> StoreResult<()>;

    /// Make every pending insert durable and visible
    async fn commit(&self) -> StoreResult<()>;

    /// Number of inserts waiting for `commit`
    async fn pending_count(&self) -> StoreResult<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Every committed row of a collection, in a stable order
    async fn scan(&self, collection: &str) -> StoreResult<Vec<Row>>;

    /// Rows of a collection matching an optional predicate
    async fn select(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
    ) -> StoreResult<Vec<Row>> {
        let schema = self.schema()?;
        let target = require_collection(&schema, collection)?;
        if let Some(p) = predicate {
            p.check(target)?;
        }

        let rows = self.scan(collection).await?;
        Ok(match predicate {
            Some(p) => rows.into_iter().filter(|r| p.matches(r)).collect(),
            None => rows,
        })
    }

    /// Inner join of two collections, projected to `query.select`
    async fn join(&self, query: &JoinQuery) -> StoreResult<Vec<Vec<Value>>> {
        let schema = self.schema()?;
        let left = require_collection(&schema, &query.left)?;
        let right = require_collection(&schema, &query.right)?;
        query.check(left, right)?;

        let left_rows = self.scan(&query.left).await?;
        let right_rows = self.scan(&query.right).await?;
        Ok(query.evaluate(&left_rows, &right_rows))
    }
}

/// Look up a collection, failing with [`StoreError::UnknownCollection`]
pub fn require_collection<'a>(schema: &'a Schema, name: &str) -> StoreResult<&'a Collection> {
    schema
        .collection(name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}
