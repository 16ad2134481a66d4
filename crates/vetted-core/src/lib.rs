//! Vetted Core - Validation engine and relational model
//!
//! This crate provides the record validator, the schema description used by
//! the storage backends, and the query types shared between them.

pub mod entity;
pub mod error;
pub mod fixture;
pub mod query;
pub mod schema;
pub mod user;
pub mod validation;
pub mod value;

pub use entity::{demo_schema, Person, Record, Thing};
pub use error::{Error, Result};
pub use query::{ColumnRef, CompareOp, JoinQuery, Predicate, Side};
pub use schema::{Collection, Column, ColumnType, ForeignKey, Schema};
pub use user::{FieldKind, FieldSpec, User, USER_FIELDS};
pub use validation::{
    parse_records, BatchMode, BatchOutcome, ErrorKind, RawRecord, Rejection, Rule, ValidationError,
    Validator,
};
pub use value::{Row, Value};
