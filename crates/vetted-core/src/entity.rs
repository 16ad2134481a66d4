//! Typed entities and their mapping onto schema rows

use crate::error::{Error, Result};
use crate::schema::{Collection, Column, Schema};
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};

/// A typed record stored in one collection
pub trait Record: Sized {
    /// Collection this record lives in
    const COLLECTION: &'static str;

    /// Schema description of the collection
    fn collection() -> Collection;

    /// Primary key value
    fn primary_key(&self) -> i64;

    fn to_row(&self) -> Row;

    fn from_row(row: &Row) -> Result<Self>;
}

fn get<'a>(row: &'a Row, collection: &str, column: &str) -> Result<&'a Value> {
    row.get(column).ok_or_else(|| Error::MissingColumn {
        collection: collection.to_string(),
        column: column.to_string(),
    })
}

fn mismatch(collection: &str, column: &str, expected: &str, found: &Value) -> Error {
    Error::TypeMismatch {
        collection: collection.to_string(),
        column: column.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

fn get_i64(row: &Row, collection: &str, column: &str) -> Result<i64> {
    let value = get(row, collection, column)?;
    value
        .as_i64()
        .ok_or_else(|| mismatch(collection, column, "integer", value))
}

fn get_opt_i64(row: &Row, collection: &str, column: &str) -> Result<Option<i64>> {
    match get(row, collection, column)? {
        Value::Null => Ok(None),
        value => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| mismatch(collection, column, "integer", value)),
    }
}

fn get_opt_text(row: &Row, collection: &str, column: &str) -> Result<Option<String>> {
    match get(row, collection, column)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s.clone())),
        value => Err(mismatch(collection, column, "text", value)),
    }
}

fn get_opt_char(row: &Row, collection: &str, column: &str) -> Result<Option<char>> {
    match get(row, collection, column)? {
        Value::Null => Ok(None),
        value => value
            .as_char()
            .map(Some)
            .ok_or_else(|| mismatch(collection, column, "char", value)),
    }
}

fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_else(|| "None".to_string())
}

/// A person, identified by social security number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub ssn: i64,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub gender: Option<char>,
    pub age: Option<i64>,
}

impl Person {
    pub fn new(
        ssn: i64,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        gender: char,
        age: i64,
    ) -> Self {
        Self {
            ssn,
            firstname: Some(firstname.into()),
            lastname: Some(lastname.into()),
            gender: Some(gender),
            age: Some(age),
        }
    }
}

impl std::fmt::Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}) {} {} ({},{})",
            self.ssn,
            opt(&self.firstname),
            opt(&self.lastname),
            opt(&self.gender),
            opt(&self.age)
        )
    }
}

impl Record for Person {
    const COLLECTION: &'static str = "people";

    fn collection() -> Collection {
        Collection::new(Self::COLLECTION, "ssn")
            .with_column(Column::text("firstname"))
            .with_column(Column::text("lastname"))
            .with_column(Column::char("gender"))
            .with_column(Column::integer("age"))
    }

    fn primary_key(&self) -> i64 {
        self.ssn
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("ssn".into(), Value::from(self.ssn));
        row.insert("firstname".into(), Value::from(self.firstname.clone()));
        row.insert("lastname".into(), Value::from(self.lastname.clone()));
        row.insert("gender".into(), Value::from(self.gender));
        row.insert("age".into(), Value::from(self.age));
        row
    }

    fn from_row(row: &Row) -> Result<Self> {
        let c = Self::COLLECTION;
        Ok(Self {
            ssn: get_i64(row, c, "ssn")?,
            firstname: get_opt_text(row, c, "firstname")?,
            lastname: get_opt_text(row, c, "lastname")?,
            gender: get_opt_char(row, c, "gender")?,
            age: get_opt_i64(row, c, "age")?,
        })
    }
}

/// A thing owned by a person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub tid: i64,
    pub description: Option<String>,
    /// `ssn` of the owning person
    pub owner: Option<i64>,
}

impl Thing {
    pub fn new(tid: i64, description: impl Into<String>, owner: i64) -> Self {
        Self {
            tid,
            description: Some(description.into()),
            owner: Some(owner),
        }
    }
}

impl std::fmt::Display for Thing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} owned by {}",
            self.tid,
            opt(&self.description),
            opt(&self.owner)
        )
    }
}

impl Record for Thing {
    const COLLECTION: &'static str = "things";

    fn collection() -> Collection {
        Collection::new(Self::COLLECTION, "tid")
            .with_column(Column::text("description"))
            .with_column(Column::integer("owner"))
            .with_foreign_key("owner", Person::COLLECTION, "ssn")
    }

    fn primary_key(&self) -> i64 {
        self.tid
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("tid".into(), Value::from(self.tid));
        row.insert("description".into(), Value::from(self.description.clone()));
        row.insert("owner".into(), Value::from(self.owner));
        row
    }

    fn from_row(row: &Row) -> Result<Self> {
        let c = Self::COLLECTION;
        Ok(Self {
            tid: get_i64(row, c, "tid")?,
            description: get_opt_text(row, c, "description")?,
            owner: get_opt_i64(row, c, "owner")?,
        })
    }
}

/// Schema holding the `people` and `things` collections
pub fn demo_schema() -> Schema {
    Schema::new()
        .with_collection(Person::collection())
        .with_collection(Thing::collection())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_display() {
        let p = Person::new(12312, "Mike", "Smith", 'M', 35);
        assert_eq!(p.to_string(), "(12312) Mike Smith (M,35)");
    }

    #[test]
    fn test_thing_display() {
        let t = Thing::new(1, "Car", 12312);
        assert_eq!(t.to_string(), "1 Car owned by 12312");
    }

    #[test]
    fn test_rows_satisfy_schema() {
        let schema = demo_schema();
        schema.validate().unwrap();

        let person = Person::new(12312, "Mike", "Smith", 'M', 35);
        let key = schema
            .require("people")
            .unwrap()
            .check_row(&person.to_row())
            .unwrap();
        assert_eq!(key, 12312);

        let thing = Thing::new(1, "Car", 12312);
        assert_eq!(Thing::from_row(&thing.to_row()).unwrap(), thing);
    }

    #[test]
    fn test_gender_read_from_text_column() {
        let mut row = Person::new(1, "Rana", "Sen", 'M', 22).to_row();
        row.insert("gender".into(), Value::from("M"));
        assert_eq!(Person::from_row(&row).unwrap().gender, Some('M'));
    }
}
