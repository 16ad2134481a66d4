//! Query types for filtering and joining collections

use crate::error::{Error, Result};
use crate::schema::{Collection, ColumnType};
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

// Longest spellings first so ">=" is not read as ">".
const OPERATORS: &[(&str, CompareOp)] = &[
    (">=", CompareOp::Ge),
    ("<=", CompareOp::Le),
    ("!=", CompareOp::Ne),
    ("<>", CompareOp::Ne),
    ("==", CompareOp::Eq),
    ("=", CompareOp::Eq),
    (">", CompareOp::Gt),
    ("<", CompareOp::Lt),
];

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// A single attribute comparison, e.g. `age > 22`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Gt, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Lt, value)
    }

    /// Evaluate against a row. Missing columns and nulls never match.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column)
            .and_then(|v| v.compare(&self.value))
            .is_some_and(|ordering| self.op.holds(ordering))
    }

    /// Check the column exists in `collection` and the literal fits its type
    pub fn check(&self, collection: &Collection) -> Result<()> {
        let column = collection.require_column(&self.column)?;
        let fits = match column.column_type {
            ColumnType::Integer => matches!(self.value, Value::Integer(_)),
            ColumnType::Text => matches!(self.value, Value::Text(_)),
            ColumnType::Char => self.value.as_char().is_some(),
        };
        if fits {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                collection: collection.name.clone(),
                column: column.name.clone(),
                expected: column.column_type.as_str().to_string(),
                found: self.value.kind().to_string(),
            })
        }
    }

    /// Parse `column <op> value`.
    ///
    /// Integer literals become `Integer`; anything else is text, with one
    /// pair of surrounding quotes stripped.
    pub fn parse(input: &str) -> Result<Self> {
        let (pos, spelling, op) = OPERATORS
            .iter()
            .filter_map(|(spelling, op)| input.find(spelling).map(|pos| (pos, *spelling, *op)))
            .min_by_key(|(pos, spelling, _)| (*pos, std::cmp::Reverse(spelling.len())))
            .ok_or_else(|| Error::InvalidPredicate(format!("no operator in '{}'", input)))?;

        let column = input[..pos].trim();
        let raw = input[pos + spelling.len()..].trim();

        if column.is_empty() || raw.is_empty() {
            return Err(Error::InvalidPredicate(format!(
                "expected '<column> {} <value>', got '{}'",
                spelling, input
            )));
        }

        let value = match raw.parse::<i64>() {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(strip_quotes(raw).to_string()),
        };

        Ok(Self::new(column, op, value))
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.value)
    }
}

/// Which side of a join a column comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// A projected column in a join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub side: Side,
    pub column: String,
}

impl ColumnRef {
    pub fn left(column: impl Into<String>) -> Self {
        Self {
            side: Side::Left,
            column: column.into(),
        }
    }

    pub fn right(column: impl Into<String>) -> Self {
        Self {
            side: Side::Right,
            column: column.into(),
        }
    }
}

/// Inner equi-join of two collections
///
/// Rows come back in left-collection order, and within one left row in
/// right-collection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQuery {
    pub left: String,
    pub left_column: String,
    pub right: String,
    pub right_column: String,
    #[serde(default)]
    pub left_filter: Option<Predicate>,
    #[serde(default)]
    pub right_filter: Option<Predicate>,
    pub select: Vec<ColumnRef>,
}

impl JoinQuery {
    /// Join `left.left_column == right.right_column`
    pub fn new(
        left: impl Into<String>,
        left_column: impl Into<String>,
        right: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left: left.into(),
            left_column: left_column.into(),
            right: right.into(),
            right_column: right_column.into(),
            left_filter: None,
            right_filter: None,
            select: Vec::new(),
        }
    }

    pub fn filter_left(mut self, predicate: Predicate) -> Self {
        self.left_filter = Some(predicate);
        self
    }

    pub fn filter_right(mut self, predicate: Predicate) -> Self {
        self.right_filter = Some(predicate);
        self
    }

    pub fn select(mut self, column: ColumnRef) -> Self {
        self.select.push(column);
        self
    }

    /// Check every referenced column exists
    pub fn check(&self, left: &Collection, right: &Collection) -> Result<()> {
        left.require_column(&self.left_column)?;
        right.require_column(&self.right_column)?;
        if let Some(p) = &self.left_filter {
            p.check(left)?;
        }
        if let Some(p) = &self.right_filter {
            p.check(right)?;
        }
        for c in &self.select {
            match c.side {
                Side::Left => left.require_column(&c.column)?,
                Side::Right => right.require_column(&c.column)?,
            };
        }
        Ok(())
    }

    /// Nested-loop evaluation over already loaded rows
    pub fn evaluate(&self, left_rows: &[Row], right_rows: &[Row]) -> Vec<Vec<Value>> {
        let rights: Vec<&Row> = right_rows
            .iter()
            .filter(|r| self.right_filter.as_ref().map_or(true, |p| p.matches(r)))
            .collect();

        let mut out = Vec::new();
        for l in left_rows {
            if !self.left_filter.as_ref().map_or(true, |p| p.matches(l)) {
                continue;
            }
            let Some(key) = l.get(&self.left_column) else {
                continue;
            };
            for r in &rights {
                let joined = r
                    .get(&self.right_column)
                    .and_then(|v| key.compare(v))
                    .is_some_and(|o| o == Ordering::Equal);
                if joined {
                    out.push(self.project(l, r));
                }
            }
        }
        out
    }

    fn project(&self, left: &Row, right: &Row) -> Vec<Value> {
        self.select
            .iter()
            .map(|c| {
                let row = match c.side {
                    Side::Left => left,
                    Side::Right => right,
                };
                row.get(&c.column).cloned().unwrap_or(Value::Null)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Person, Record, Thing};

    #[test]
    fn test_parse_predicate() {
        let p = Predicate::parse("age>22").unwrap();
        assert_eq!(p, Predicate::gt("age", 22));

        let p = Predicate::parse("firstname == 'Mike'").unwrap();
        assert_eq!(p, Predicate::eq("firstname", "Mike"));

        let p = Predicate::parse(" age >= -1 ").unwrap();
        assert_eq!(p.op, CompareOp::Ge);
        assert_eq!(p.value, Value::Integer(-1));

        assert!(Predicate::parse("age").is_err());
        assert!(Predicate::parse("> 3").is_err());
    }

    #[test]
    fn test_predicate_matches() {
        let row = Person::new(1, "Biju", "Mandal", 'F', 23).to_row();
        assert!(Predicate::gt("age", 22).matches(&row));
        assert!(!Predicate::lt("age", 22).matches(&row));
        assert!(Predicate::eq("gender", "F").matches(&row));
        assert!(!Predicate::eq("missing", 1).matches(&row));
    }

    #[test]
    fn test_predicate_check_types() {
        let people = Person::collection();
        assert!(Predicate::gt("age", 22).check(&people).is_ok());
        assert!(Predicate::eq("gender", "F").check(&people).is_ok());
        assert!(matches!(
            Predicate::gt("age", "abc").check(&people),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            Predicate::eq("nickname", "x").check(&people),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_join_evaluate() {
        let people = vec![
            Person::new(12312, "Mike", "Smith", 'M', 35).to_row(),
            Person::new(87609, "Biju", "Mandal", 'F', 23).to_row(),
        ];
        let things = vec![
            Thing::new(1, "Car", 12312).to_row(),
            Thing::new(3, "Mug", 12312).to_row(),
            Thing::new(4, "Bike", 87609).to_row(),
        ];

        let query = JoinQuery::new("things", "owner", "people", "ssn")
            .filter_right(Predicate::eq("firstname", "Mike"))
            .select(ColumnRef::left("description"))
            .select(ColumnRef::right("firstname"));

        query.check(&Thing::collection(), &Person::collection()).unwrap();

        let rows = query.evaluate(&things, &people);
        assert_eq!(
            rows,
            vec![
                vec![Value::from("Car"), Value::from("Mike")],
                vec![Value::from("Mug"), Value::from("Mike")],
            ]
        );
    }

    #[test]
    fn test_join_check_unknown_column() {
        let query = JoinQuery::new("things", "owner", "people", "ssn")
            .select(ColumnRef::right("nickname"));
        assert!(query.check(&Thing::collection(), &Person::collection()).is_err());
    }
}
