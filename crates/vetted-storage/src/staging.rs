//! Pending inserts shared by the key-value backends

use crate::error::{StoreError, StoreResult};
use crate::traits::require_collection;
use vetted_core::{Row, Schema, Value};

/// A row accepted by `insert_row` but not committed yet
#[derive(Debug, Clone)]
pub struct StagedRow {
    pub collection: String,
    pub key: i64,
    pub row: Row,
}

/// Inserts waiting for commit, in insertion order
#[derive(Debug, Default)]
pub struct Staging {
    rows: Vec<StagedRow>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a row and stage it.
    ///
    /// `committed(collection, key)` reports whether a committed row with that
    /// primary key exists. Uniqueness and references are checked against both
    /// committed and staged rows.
    pub fn stage<F>(
        &mut self,
        schema: &Schema,
        collection: &str,
        row: Row,
        committed: F,
    ) -> StoreResult<()>
    where
        F: Fn(&str, i64) -> StoreResult<bool>,
    {
        let target = require_collection(schema, collection)?;
        let key = target.check_row(&row)?;

        if self.contains(collection, key) || committed(collection, key)? {
            return Err(StoreError::Uniqueness {
                collection: collection.to_string(),
                key,
            });
        }

        for fk in &target.foreign_keys {
            let Some(value) = row.get(&fk.column).and_then(Value::as_i64) else {
                continue;
            };
            let self_reference = fk.references == collection && value == key;
            if !self_reference
                && !self.contains(&fk.references, value)
                && !committed(&fk.references, value)?
            {
                return Err(StoreError::Referential {
                    collection: collection.to_string(),
                    column: fk.column.clone(),
                    value,
                    references: fk.references.clone(),
                });
            }
        }

        self.rows.push(StagedRow {
            collection: collection.to_string(),
            key,
            row,
        });
        Ok(())
    }

    pub fn contains(&self, collection: &str, key: i64) -> bool {
        self.rows
            .iter()
            .any(|s| s.collection == collection && s.key == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove and return every staged row
    pub fn take(&mut self) -> Vec<StagedRow> {
        std::mem::take(&mut self.rows)
    }
}
