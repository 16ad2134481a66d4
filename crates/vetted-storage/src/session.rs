//! Typed session over a storage backend

use crate::error::StoreResult;
use crate::traits::StoreBackend;
use vetted_core::{fixture, ColumnRef, JoinQuery, Person, Predicate, Record, Schema, Thing, Value};

/// Explicit store handle: open, use, close.
///
/// A session owns its backend. Dropping it without [`Session::close`] leaves
/// cleanup of uncommitted work to the backend.
pub struct Session {
    backend: Box<dyn StoreBackend>,
    schema: Schema,
}

impl Session {
    /// Initialize `backend` with `schema` and wrap it
    pub async fn open(backend: impl StoreBackend + 'static, schema: Schema) -> StoreResult<Self> {
        backend.initialize(&schema).await?;
        tracing::debug!(
            "Session opened with collections: {:?}",
            schema.collections.iter().map(|c| &c.name).collect::<Vec<_>>()
        );

        Ok(Self {
            backend: Box::new(backend),
            schema,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn backend(&self) -> &dyn StoreBackend {
        self.backend.as_ref()
    }

    /// Stage one record
    pub async fn insert<R: Record>(&self, record: &R) -> StoreResult<()> {
        self.backend.insert_row(R::COLLECTION, record.to_row()).await
    }

    pub async fn commit(&self) -> StoreResult<()> {
        self.backend.commit().await
    }

    /// Every committed record of kind `R`
    pub async fn list_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let rows = self.backend.select(R::COLLECTION, None).await?;
        Ok(rows.iter().map(R::from_row).collect::<vetted_core::Result<_>>()?)
    }

    /// Committed records of kind `R` matching `predicate`
    pub async fn filter<R: Record>(&self, predicate: &Predicate) -> StoreResult<Vec<R>> {
        let rows = self.backend.select(R::COLLECTION, Some(predicate)).await?;
        Ok(rows.iter().map(R::from_row).collect::<vetted_core::Result<_>>()?)
    }

    /// Raw join over any two collections
    pub async fn join(&self, query: &JoinQuery) -> StoreResult<Vec<Vec<Value>>> {
        self.backend.join(query).await
    }

    /// `(thing description, owner firstname)` for every thing owned by a
    /// person called `firstname`
    pub async fn owned_by(&self, firstname: &str) -> StoreResult<Vec<(String, String)>> {
        let query = JoinQuery::new(Thing::COLLECTION, "owner", Person::COLLECTION, "ssn")
            .filter_right(Predicate::eq("firstname", firstname))
            .select(ColumnRef::left("description"))
            .select(ColumnRef::right("firstname"));

        let rows = self.join(&query).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut values = row.into_iter().map(|v| match v {
                    Value::Text(s) => s,
                    other => other.to_string(),
                });
                let description = values.next().unwrap_or_default();
                let owner = values.next().unwrap_or_default();
                (description, owner)
            })
            .collect())
    }

    /// Insert the demonstration people and things, then commit.
    ///
    /// Fails with a uniqueness violation when run against a store that
    /// already holds them.
    pub async fn seed_fixture(&self) -> StoreResult<()> {
        for person in fixture::people() {
            self.insert(&person).await?;
        }
        for thing in fixture::things() {
            self.insert(&thing).await?;
        }
        self.commit().await?;
        tracing::info!("Seeded demonstration data");
        Ok(())
    }

    pub async fn pending_count(&self) -> StoreResult<usize> {
        self.backend.pending_count().await
    }

    /// Release the backend, discarding uncommitted inserts
    pub async fn close(self) -> StoreResult<()> {
        self.backend.close().await
    }
}
