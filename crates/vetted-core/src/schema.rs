//! Explicit schema description handed to the storage backends

use crate::error::{Error, Result};
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Text,
    /// A single character
    Char,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Char => "char",
        }
    }

    /// Whether a value can be stored in a column of this type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Integer, Value::Integer(_))
                | (Self::Text, Value::Text(_))
                | (Self::Char, Value::Char(_))
        )
    }
}

/// A typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn default_true() -> bool {
    true
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn char(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Char)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// `column` must hold a primary key of `references`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub references: String,
    pub references_column: String,
}

/// A named collection (table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub columns: Vec<Column>,
    /// Name of the integer primary key column
    pub primary_key: String,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Collection {
    /// Create a collection whose first column is `primary_key`
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Self {
            name: name.into(),
            columns: vec![Column::integer(primary_key.clone()).not_null()],
            primary_key,
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        references: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            references: references.into(),
            references_column: references_column.into(),
        });
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with `UnknownColumn`
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| Error::UnknownColumn {
            collection: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Check a row against this collection and return its primary key.
    ///
    /// Every column must be present (nullable columns may hold `Null`) and no
    /// unknown column is allowed.
    pub fn check_row(&self, row: &Row) -> Result<i64> {
        if let Some(extra) = row.keys().find(|k| self.column(k).is_none()) {
            return Err(Error::UnknownColumn {
                collection: self.name.clone(),
                column: extra.clone(),
            });
        }

        for column in &self.columns {
            let value = row.get(&column.name).ok_or_else(|| Error::MissingColumn {
                collection: self.name.clone(),
                column: column.name.clone(),
            })?;

            if !column.column_type.accepts(value) || (value.is_null() && !column.nullable) {
                return Err(Error::TypeMismatch {
                    collection: self.name.clone(),
                    column: column.name.clone(),
                    expected: column.column_type.as_str().to_string(),
                    found: value.kind().to_string(),
                });
            }
        }

        self.key_of(row)
    }

    /// Read the primary key out of a row
    pub fn key_of(&self, row: &Row) -> Result<i64> {
        row.get(&self.primary_key)
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::MissingColumn {
                collection: self.name.clone(),
                column: self.primary_key.clone(),
            })
    }
}

/// The full set of collections a store manages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub collections: Vec<Collection>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Look up a collection, failing with `UnknownCollection`
    pub fn require(&self, name: &str) -> Result<&Collection> {
        self.collection(name)
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }

    /// Check the schema is internally consistent
    pub fn validate(&self) -> Result<()> {
        for (i, collection) in self.collections.iter().enumerate() {
            if self.collections[..i].iter().any(|c| c.name == collection.name) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate collection '{}'",
                    collection.name
                )));
            }

            let pk = collection.column(&collection.primary_key).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "primary key '{}' is not a column of '{}'",
                    collection.primary_key, collection.name
                ))
            })?;
            if pk.column_type != ColumnType::Integer {
                return Err(Error::InvalidSchema(format!(
                    "primary key '{}.{}' must be an integer column",
                    collection.name, pk.name
                )));
            }

            for fk in &collection.foreign_keys {
                collection.require_column(&fk.column)?;
                let target = self.collection(&fk.references).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "'{}.{}' references unknown collection '{}'",
                        collection.name, fk.column, fk.references
                    ))
                })?;
                if target.primary_key != fk.references_column {
                    return Err(Error::InvalidSchema(format!(
                        "'{}.{}' must reference the primary key of '{}'",
                        collection.name, fk.column, fk.references
                    )));
                }
            }
        }

        Ok(())
    }

    /// Collections ordered so that referenced collections come first
    pub fn creation_order(&self) -> Result<Vec<&Collection>> {
        let mut ordered: Vec<&Collection> = Vec::with_capacity(self.collections.len());

        while ordered.len() < self.collections.len() {
            let before = ordered.len();
            for collection in &self.collections {
                if ordered.iter().any(|c| c.name == collection.name) {
                    continue;
                }
                let ready = collection.foreign_keys.iter().all(|fk| {
                    fk.references == collection.name
                        || ordered.iter().any(|c| c.name == fk.references)
                });
                if ready {
                    ordered.push(collection);
                }
            }
            if ordered.len() == before {
                return Err(Error::InvalidSchema(
                    "foreign keys form a cycle".to_string(),
                ));
            }
        }

        Ok(ordered)
    }
}
