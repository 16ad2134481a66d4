//! In-memory storage backend for testing

use crate::error::{StoreError, StoreResult};
use crate::staging::Staging;
use crate::traits::{require_collection, StoreBackend};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use vetted_core::{Row, Schema};

#[derive(Default)]
struct State {
    schema: Option<Schema>,
    closed: bool,
    collections: HashMap<String, Vec<Row>>,
    staging: Staging,
}

impl State {
    fn schema(&self) -> StoreResult<&Schema> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        self.schema.as_ref().ok_or(StoreError::NotInitialized)
    }
}

fn committed_contains(
    schema: &Schema,
    collections: &HashMap<String, Vec<Row>>,
    collection: &str,
    key: i64,
) -> StoreResult<bool> {
    let target = require_collection(schema, collection)?;
    Ok(collections.get(collection).is_some_and(|rows| {
        rows.iter()
            .any(|r| target.key_of(r).map_or(false, |k| k == key))
    }))
}

/// In-memory storage backend
///
/// Useful for testing and temporary storage. Rows are kept in insertion
/// order and vanish with the value.
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| StoreError::Database(format!("Lock error: {}", e)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| StoreError::Database(format!("Lock error: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn initialize(&self, schema: &Schema) -> StoreResult<()> {
        schema.validate()?;

        let mut state = self.write()?;
        if state.closed {
            return Err(StoreError::Closed);
        }
        for collection in &schema.collections {
            state.collections.entry(collection.name.clone()).or_default();
        }
        state.schema = Some(schema.clone());
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.staging.is_empty() {
            tracing::warn!(
                "Discarding {} uncommitted inserts on close",
                state.staging.len()
            );
        }
        state.staging.take();
        state.closed = true;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(!self.read()?.closed)
    }

    fn schema(&self) -> StoreResult<Schema> {
        self.read()?.schema().cloned()
    }

    async fn insert_row(&self, collection: &str, row: Row) -> StoreResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let schema = state.schema()?.clone();
        let collections = &state.collections;

        state.staging.stage(&schema, collection, row, |c, k| {
            committed_contains(&schema, collections, c, k)
        })
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        state.schema()?;

        let staged = state.staging.take();
        let count = staged.len();
        for s in staged {
            state.collections.entry(s.collection).or_default().push(s.row);
        }

        tracing::debug!("Committed {} rows", count);
        Ok(())
    }

    async fn pending_count(&self) -> StoreResult<usize> {
        let state = self.read()?;
        state.schema()?;
        Ok(state.staging.len())
    }

    async fn scan(&self, collection: &str) -> StoreResult<Vec<Row>> {
        let state = self.read()?;
        require_collection(state.schema()?, collection)?;
        Ok(state
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetted_core::{demo_schema, Person, Predicate, Record, Thing};

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.initialize(&demo_schema()).await.unwrap();

        let mike = Person::new(12312, "Mike", "Smith", 'M', 35);
        store.insert_row("people", mike.to_row()).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert!(store.scan("people").await.unwrap().is_empty());

        store.commit().await.unwrap();
        let rows = store.scan("people").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(Person::from_row(&rows[0]).unwrap(), mike);

        let older = store
            .select("people", Some(&Predicate::gt("age", 30)))
            .await
            .unwrap();
        assert_eq!(older.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_constraints() {
        let store = MemoryStore::new();
        store.initialize(&demo_schema()).await.unwrap();

        let mike = Person::new(12312, "Mike", "Smith", 'M', 35);
        store.insert_row("people", mike.to_row()).await.unwrap();
        store.commit().await.unwrap();

        let err = store.insert_row("people", mike.to_row()).await.unwrap_err();
        assert!(err.is_uniqueness());

        let err = store
            .insert_row("things", Thing::new(1, "Car", 99).to_row())
            .await
            .unwrap_err();
        assert!(err.is_referential());
    }

    #[tokio::test]
    async fn test_memory_requires_initialize() {
        let store = MemoryStore::new();
        let err = store
            .insert_row("people", Person::new(1, "A", "B", 'M', 1).to_row())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
        assert!(matches!(
            store.scan("people").await.unwrap_err(),
            StoreError::NotInitialized
        ));
        assert!(matches!(
            store.pending_count().await.unwrap_err(),
            StoreError::NotInitialized
        ));
    }

    #[tokio::test]
    async fn test_memory_close_discards_pending() {
        let store = MemoryStore::new();
        store.initialize(&demo_schema()).await.unwrap();
        store
            .insert_row("people", Person::new(1, "A", "B", 'M', 1).to_row())
            .await
            .unwrap();

        store.close().await.unwrap();
        assert!(!store.health_check().await.unwrap());
        assert!(matches!(store.commit().await.unwrap_err(), StoreError::Closed));
    }
}
