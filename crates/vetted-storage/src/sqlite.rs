//! SQLite storage backend

use crate::error::{StoreError, StoreResult};
use crate::traits::{require_collection, StoreBackend};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{ffi, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use vetted_core::{Collection, ColumnType, JoinQuery, Predicate, Row, Schema, Side, Value};

struct Inner {
    conn: Option<Connection>,
    schema: Option<Schema>,
    in_transaction: bool,
    pending: usize,
}

impl Inner {
    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn ready(&self) -> StoreResult<(&Connection, &Schema)> {
        let conn = self.conn()?;
        let schema = self.schema.as_ref().ok_or(StoreError::NotInitialized)?;
        Ok((conn, schema))
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.in_transaction {
            tracing::warn!("Rolling back {} uncommitted inserts", self.pending);
            self.conn()?.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
            self.pending = 0;
        }
        Ok(())
    }
}

/// SQLite storage backend
///
/// Each collection is a table with a real primary key and foreign keys, so
/// uniqueness and references are enforced by SQLite at insert time. Inserts
/// run inside a transaction that `commit` closes.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self {
            inner: Mutex::new(Inner {
                conn: Some(conn),
                schema: None,
                in_transaction: false,
                pending: 0,
            }),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if let Err(e) = inner.rollback() {
                tracing::warn!("Rollback on drop failed: {}", e);
            }
        }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::Text => "TEXT",
        ColumnType::Char => "CHAR(1)",
    }
}

fn create_table_sql(collection: &Collection) -> String {
    let mut parts: Vec<String> = collection
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote(&c.name), sql_type(c.column_type));
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if c.name == collection.primary_key {
                def.push_str(" PRIMARY KEY");
            }
            def
        })
        .collect();

    for fk in &collection.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote(&fk.column),
            quote(&fk.references),
            quote(&fk.references_column)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(&collection.name),
        parts.join(", ")
    )
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Char(c) => SqlValue::Text(c.to_string()),
        Value::Null => SqlValue::Null,
    }
}

fn read_value(
    row: &rusqlite::Row<'_>,
    index: usize,
    column_type: ColumnType,
) -> rusqlite::Result<Value> {
    Ok(match column_type {
        ColumnType::Integer => row.get::<_, Option<i64>>(index)?.into(),
        ColumnType::Text => row.get::<_, Option<String>>(index)?.into(),
        ColumnType::Char => row
            .get::<_, Option<String>>(index)?
            .and_then(|s| s.chars().next())
            .into(),
    })
}

fn select_list(alias: Option<&str>, columns: &[(&str, ColumnType)]) -> String {
    columns
        .iter()
        .map(|(name, _)| match alias {
            Some(a) => format!("{}.{}", a, quote(name)),
            None => quote(name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(alias: Option<&str>, predicate: &Predicate, index: usize) -> String {
    let column = match alias {
        Some(a) => format!("{}.{}", a, quote(&predicate.column)),
        None => quote(&predicate.column),
    };
    format!("{} {} ?{}", column, predicate.op.as_sql(), index)
}

/// Find the reference that made an insert fail its foreign key check
fn dangling_reference(
    conn: &Connection,
    collection: &Collection,
    row: &Row,
) -> StoreResult<Option<StoreError>> {
    for fk in &collection.foreign_keys {
        let Some(value) = row.get(&fk.column).and_then(Value::as_i64) else {
            continue;
        };
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            quote(&fk.references),
            quote(&fk.references_column)
        );
        let found: Option<i64> = conn.query_row(&sql, [value], |r| r.get(0)).optional()?;
        if found.is_none() {
            return Ok(Some(StoreError::Referential {
                collection: collection.name.clone(),
                column: fk.column.clone(),
                value,
                references: fk.references.clone(),
            }));
        }
    }
    Ok(None)
}

fn classify_insert_error(
    conn: &Connection,
    collection: &Collection,
    row: &Row,
    key: i64,
    err: rusqlite::Error,
) -> StoreError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code),
        _ => None,
    };

    match code {
        Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        | Some(ffi::SQLITE_CONSTRAINT_UNIQUE)
        | Some(ffi::SQLITE_CONSTRAINT_ROWID) => StoreError::Uniqueness {
            collection: collection.name.clone(),
            key,
        },
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => match dangling_reference(conn, collection, row) {
            Ok(Some(referential)) => referential,
            Ok(None) => StoreError::Sqlite(err),
            Err(lookup) => lookup,
        },
        _ => StoreError::Sqlite(err),
    }
}

#[async_trait]
impl StoreBackend for SqliteStore {
    async fn initialize(&self, schema: &Schema) -> StoreResult<()> {
        schema.validate()?;

        let mut inner = self.lock()?;
        let conn = inner.conn()?;
        for collection in schema.creation_order()? {
            let sql = create_table_sql(collection);
            tracing::debug!("{}", sql);
            conn.execute_batch(&sql)?;
        }

        inner.schema = Some(schema.clone());
        tracing::info!("Initialized {} collections", schema.collections.len());
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.rollback()?;
        if let Some(conn) = inner.conn.take() {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let inner = self.lock()?;
        let one: i64 = inner.conn()?.query_row("SELECT 1", [], |r| r.get(0))?;
        Ok(one == 1)
    }

    fn schema(&self) -> StoreResult<Schema> {
        let inner = self.lock()?;
        inner.ready().map(|(_, schema)| schema.clone())
    }

    async fn insert_row(&self, collection: &str, row: Row) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let (conn, schema) = inner.ready()?;
        let target = require_collection(schema, collection)?;
        let key = target.check_row(&row)?;

        let columns: Vec<&str> = target.column_names().collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&target.name),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            placeholders.join(", ")
        );
        let values: Vec<SqlValue> = columns
            .iter()
            .map(|c| row.get(*c).map(to_sql).unwrap_or(SqlValue::Null))
            .collect();

        let opened = !inner.in_transaction;
        if opened {
            conn.execute_batch("BEGIN")?;
        }

        let result = conn.execute(&sql, params_from_iter(values));
        let outcome = match result {
            Ok(_) => Ok(()),
            Err(e) => Err(classify_insert_error(conn, target, &row, key, e)),
        };

        if opened {
            inner.in_transaction = true;
        }
        if outcome.is_ok() {
            inner.pending += 1;
            tracing::debug!(collection, key, "Staged insert");
        }
        outcome
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let (conn, _) = inner.ready()?;

        if inner.in_transaction {
            conn.execute_batch("COMMIT")?;
            tracing::debug!("Committed {} rows", inner.pending);
            inner.in_transaction = false;
            inner.pending = 0;
        }
        Ok(())
    }

    async fn pending_count(&self) -> StoreResult<usize> {
        let inner = self.lock()?;
        inner.ready()?;
        Ok(inner.pending)
    }

    async fn scan(&self, collection: &str) -> StoreResult<Vec<Row>> {
        self.select(collection, None).await
    }

    async fn select(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
    ) -> StoreResult<Vec<Row>> {
        let inner = self.lock()?;
        let (conn, schema) = inner.ready()?;
        let target = require_collection(schema, collection)?;

        let columns: Vec<(&str, ColumnType)> = target
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.column_type))
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list(None, &columns),
            quote(&target.name)
        );
        let mut params = Vec::new();
        if let Some(p) = predicate {
            p.check(target)?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(None, p, 1));
            params.push(to_sql(&p.value));
        }
        sql.push_str(&format!(" ORDER BY {}", quote(&target.primary_key)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |r| {
            let mut row = Row::new();
            for (i, (name, ty)) in columns.iter().enumerate() {
                row.insert(name.to_string(), read_value(r, i, *ty)?);
            }
            Ok(row)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn join(&self, query: &JoinQuery) -> StoreResult<Vec<Vec<Value>>> {
        let inner = self.lock()?;
        let (conn, schema) = inner.ready()?;
        let left = require_collection(schema, &query.left)?;
        let right = require_collection(schema, &query.right)?;
        query.check(left, right)?;

        let mut projected: Vec<(String, ColumnType)> = Vec::new();
        for c in &query.select {
            let (alias, collection) = match c.side {
                Side::Left => ("l", left),
                Side::Right => ("r", right),
            };
            let column = collection.require_column(&c.column)?;
            projected.push((
                format!("{}.{}", alias, quote(&column.name)),
                column.column_type,
            ));
        }

        let mut sql = format!(
            "SELECT {} FROM {} AS l JOIN {} AS r ON l.{} = r.{}",
            projected
                .iter()
                .map(|(expr, _)| expr.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            quote(&left.name),
            quote(&right.name),
            quote(&query.left_column),
            quote(&query.right_column)
        );

        let mut conditions = Vec::new();
        let mut params = Vec::new();
        if let Some(p) = &query.left_filter {
            conditions.push(where_clause(Some("l"), p, params.len() + 1));
            params.push(to_sql(&p.value));
        }
        if let Some(p) = &query.right_filter {
            conditions.push(where_clause(Some("r"), p, params.len() + 1));
            params.push(to_sql(&p.value));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(
            " ORDER BY l.{}, r.{}",
            quote(&left.primary_key),
            quote(&right.primary_key)
        ));
        tracing::debug!("{}", sql);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |r| {
            projected
                .iter()
                .enumerate()
                .map(|(i, (_, ty))| read_value(r, i, *ty))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetted_core::{demo_schema, fixture, Person, Record, Thing};

    async fn seeded() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize(&demo_schema()).await.unwrap();
        for p in fixture::people() {
            store.insert_row("people", p.to_row()).await.unwrap();
        }
        for t in fixture::things() {
            store.insert_row("things", t.to_row()).await.unwrap();
        }
        store.commit().await.unwrap();
        store
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(&Thing::collection());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"things\" (\"tid\" INTEGER NOT NULL PRIMARY KEY, \
             \"description\" TEXT, \"owner\" INTEGER, \
             FOREIGN KEY (\"owner\") REFERENCES \"people\" (\"ssn\"))"
        );
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let store = seeded().await;
        assert!(store.health_check().await.unwrap());

        let people = store.scan("people").await.unwrap();
        assert_eq!(people.len(), 3);
        assert_eq!(
            Person::from_row(&people[0]).unwrap(),
            Person::new(12312, "Mike", "Smith", 'M', 35)
        );

        let older = store
            .select("people", Some(&Predicate::gt("age", 22)))
            .await
            .unwrap();
        let names: Vec<_> = older
            .iter()
            .map(|r| Person::from_row(r).unwrap().firstname.unwrap())
            .collect();
        assert_eq!(names, vec!["Mike", "Biju"]);
    }

    #[tokio::test]
    async fn test_sqlite_constraints() {
        let store = seeded().await;

        let err = store
            .insert_row("people", Person::new(12312, "Mike", "Smith", 'M', 35).to_row())
            .await
            .unwrap_err();
        assert!(err.is_uniqueness(), "{err}");

        let err = store
            .insert_row("things", Thing::new(8, "Hat", 1).to_row())
            .await
            .unwrap_err();
        assert!(err.is_referential(), "{err}");
    }

    #[tokio::test]
    async fn test_sqlite_join() {
        let store = seeded().await;
        let query = JoinQuery::new("things", "owner", "people", "ssn")
            .filter_right(Predicate::eq("firstname", "Mike"))
            .select(vetted_core::ColumnRef::left("description"))
            .select(vetted_core::ColumnRef::right("firstname"));

        let rows = store.join(&query).await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::from("Car"), Value::from("Mike")],
                vec![Value::from("Mug"), Value::from("Mike")],
            ]
        );
    }

    #[tokio::test]
    async fn test_sqlite_not_initialized() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.scan("people").await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
        let err = store.pending_count().await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
    }

    #[tokio::test]
    async fn test_sqlite_uncommitted_rolled_back_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.initialize(&demo_schema()).await.unwrap();
            store
                .insert_row("people", Person::new(1, "A", "B", 'M', 1).to_row())
                .await
                .unwrap();
            assert_eq!(store.pending_count().await.unwrap(), 1);
            store.close().await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        store.initialize(&demo_schema()).await.unwrap();
        assert!(store.scan("people").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_rerun_against_populated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mydb.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.initialize(&demo_schema()).await.unwrap();
            store
                .insert_row("people", Person::new(12312, "Mike", "Smith", 'M', 35).to_row())
                .await
                .unwrap();
            store.commit().await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        store.initialize(&demo_schema()).await.unwrap();
        let err = store
            .insert_row("people", Person::new(12312, "Mike", "Smith", 'M', 35).to_row())
            .await
            .unwrap_err();
        assert!(err.is_uniqueness());
        assert_eq!(store.scan("people").await.unwrap().len(), 1);
    }
}
