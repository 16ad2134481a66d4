//! ReDB storage backend

use crate::error::{StoreError, StoreResult};
use crate::staging::Staging;
use crate::traits::{require_collection, StoreBackend};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use vetted_core::{Row, Schema};

/// One table per collection, keyed by primary key, rows as JSON
fn table(name: &str) -> TableDefinition<'_, i64, &'static [u8]> {
    TableDefinition::new(name)
}

fn committed_contains(db: &Database, collection: &str, key: i64) -> StoreResult<bool> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(table(collection))?;
    let found = table.get(key)?.is_some();
    Ok(found)
}

struct Inner {
    db: Option<Database>,
    schema: Option<Schema>,
    staging: Staging,
}

impl Inner {
    fn ready(&self) -> StoreResult<(&Database, &Schema)> {
        let db = self.db.as_ref().ok_or(StoreError::Closed)?;
        let schema = self.schema.as_ref().ok_or(StoreError::NotInitialized)?;
        Ok((db, schema))
    }
}

/// ReDB storage backend
///
/// Inserts are checked and staged in memory; `commit` writes them in a
/// single write transaction.
pub struct RedbStore {
    inner: Mutex<Inner>,
}

impl RedbStore {
    /// Open or create a ReDB database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                db: Some(db),
                schema: None,
                staging: Staging::new(),
            }),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl StoreBackend for RedbStore {
    async fn initialize(&self, schema: &Schema) -> StoreResult<()> {
        schema.validate()?;

        let mut inner = self.lock()?;
        let db = inner.db.as_ref().ok_or(StoreError::Closed)?;

        let write_txn = db.begin_write()?;
        for collection in schema.creation_order()? {
            write_txn.open_table(table(&collection.name))?;
        }
        write_txn.commit()?;

        inner.schema = Some(schema.clone());
        tracing::info!("Initialized {} collections", schema.collections.len());
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if !inner.staging.is_empty() {
            tracing::warn!(
                "Discarding {} uncommitted inserts on close",
                inner.staging.len()
            );
        }
        inner.staging.take();
        inner.db = None;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(self.lock()?.db.is_some())
    }

    fn schema(&self) -> StoreResult<Schema> {
        let inner = self.lock()?;
        inner.ready().map(|(_, schema)| schema.clone())
    }

    async fn insert_row(&self, collection: &str, row: Row) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let db = inner.db.as_ref().ok_or(StoreError::Closed)?;
        let schema = inner.schema.as_ref().ok_or(StoreError::NotInitialized)?;

        inner
            .staging
            .stage(schema, collection, row, |c, k| committed_contains(db, c, k))
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let db = inner.db.as_ref().ok_or(StoreError::Closed)?;
        inner.schema.as_ref().ok_or(StoreError::NotInitialized)?;

        if inner.staging.is_empty() {
            return Ok(());
        }

        // A failed commit drops the whole staged batch.
        let staged = inner.staging.take();
        let count = staged.len();

        let write_txn = db.begin_write()?;
        for s in staged {
            let mut t = write_txn.open_table(table(&s.collection))?;
            if t.get(s.key)?.is_some() {
                return Err(StoreError::Uniqueness {
                    collection: s.collection.clone(),
                    key: s.key,
                });
            }
            let value = serde_json::to_vec(&s.row)?;
            t.insert(s.key, value.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!("Committed {} rows", count);
        Ok(())
    }

    async fn pending_count(&self) -> StoreResult<usize> {
        let inner = self.lock()?;
        inner.ready()?;
        Ok(inner.staging.len())
    }

    async fn scan(&self, collection: &str) -> StoreResult<Vec<Row>> {
        let inner = self.lock()?;
        let (db, schema) = inner.ready()?;
        require_collection(schema, collection)?;

        let read_txn = db.begin_read()?;
        let t = read_txn.open_table(table(collection))?;

        let mut rows = Vec::new();
        for entry in t.iter()? {
            let (_, value) = entry?;
            let row: Row = serde_json::from_slice(value.value())?;
            rows.push(row);
        }

        Ok(rows)
    }
}
