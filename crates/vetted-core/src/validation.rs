//! Rule-based validation of raw user records
//!
//! A [`Validator`] holds an ordered list of [`Rule`]s. Pre rules see the raw
//! input mapping before anything is coerced; field rules see one coerced
//! field at a time and may replace its value. The first failing rule aborts
//! the record, so no partially validated user is ever produced.

use crate::error::{Error, Result};
use crate::user::{FieldKind, FieldSpec, User, USER_FIELDS};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw input: field name to arbitrary JSON scalar
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Field name reported by pre rules
pub const ROOT_FIELD: &str = "__root__";

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A rule rejected the value without a more specific category
    Generic,
    /// A rule rejected the value as out of range
    Value,
    /// A required field is absent
    Missing,
    /// The raw value cannot be coerced to the field type
    Type,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "validation_error",
            Self::Value => "value_error",
            Self::Missing => "value_error.missing",
            Self::Type => "type_error",
        }
    }
}

/// Why a rule rejected its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
}

impl Rejection {
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Generic,
            message: message.into(),
        }
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Value,
            message: message.into(),
        }
    }

    fn at(self, field: &str) -> ValidationError {
        ValidationError {
            record: None,
            field: field.to_string(),
            kind: self.kind,
            message: self.message,
        }
    }
}

/// A rejected record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Position in the batch, when validated as part of one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<usize>,
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ValidationError {
    fn missing(field: &str) -> Self {
        Self {
            record: None,
            field: field.to_string(),
            kind: ErrorKind::Missing,
            message: "field required".to_string(),
        }
    }

    fn type_error(field: &str, message: &str) -> Self {
        Self {
            record: None,
            field: field.to_string(),
            kind: ErrorKind::Type,
            message: message.to_string(),
        }
    }

    /// Tag the error with its batch position
    pub fn at_record(mut self, index: usize) -> Self {
        self.record = Some(index);
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(index) = self.record {
            write!(f, "record {}: ", index)?;
        }
        write!(
            f,
            "{}: {} (type={})",
            self.field,
            self.message,
            self.kind.as_str()
        )
    }
}

impl std::error::Error for ValidationError {}

/// Check over the untouched input mapping
pub type PreCheck = fn(&RawRecord) -> std::result::Result<(), Rejection>;

/// Check over one coerced field; the returned value replaces the input
pub type FieldCheck = fn(Value) -> std::result::Result<Value, Rejection>;

/// A named validation rule
#[derive(Clone, Copy)]
pub enum Rule {
    Pre {
        name: &'static str,
        check: PreCheck,
    },
    Field {
        name: &'static str,
        fields: &'static [&'static str],
        check: FieldCheck,
    },
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pre { name, .. } => f.debug_struct("Pre").field("name", name).finish(),
            Self::Field { name, fields, .. } => f
                .debug_struct("Field")
                .field("name", name)
                .field("fields", fields)
                .finish(),
        }
    }
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pre { name, .. } | Self::Field { name, .. } => *name,
        }
    }

    fn applies_to(&self, field: &str) -> bool {
        match self {
            Self::Field { fields, .. } => fields.contains(&field),
            Self::Pre { .. } => false,
        }
    }
}

fn username_longer_than_five(value: Value) -> std::result::Result<Value, Rejection> {
    match &value {
        Value::Text(s) if s.chars().count() > 5 => Ok(value),
        _ => Err(Rejection::generic("username should be longer than 5 letters")),
    }
}

// Shared by `age` and `score`, message included.
fn non_negative(value: Value) -> std::result::Result<Value, Rejection> {
    match value {
        Value::Integer(i) if i >= 0 => Ok(value),
        _ => Err(Rejection::value("age must be positive")),
    }
}

fn email_or_phone_present(raw: &RawRecord) -> std::result::Result<(), Rejection> {
    tracing::debug!(raw = ?raw, "Inspecting raw input");

    // Key presence only: `"email": null` is enough.
    if raw.contains_key("email") || raw.contains_key("phone") {
        Ok(())
    } else {
        Err(Rejection::value("need either email or phone"))
    }
}

/// How a batch reacts to a rejected record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchMode {
    /// Stop at the first rejected record
    #[default]
    FailFast,
    /// Validate every record and collect the rejections
    Isolate,
}

impl std::str::FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(Self::FailFast),
            "isolate" => Ok(Self::Isolate),
            other => Err(format!(
                "unknown batch mode '{}' (expected fail-fast or isolate)",
                other
            )),
        }
    }
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => f.write_str("fail-fast"),
            Self::Isolate => f.write_str("isolate"),
        }
    }
}

/// Result of validating a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Accepted users, in input order
    pub users: Vec<User>,
    /// Rejections, in input order; always empty in fail-fast mode
    pub rejected: Vec<ValidationError>,
}

/// Ordered rule list applied to raw records
#[derive(Debug, Clone)]
pub struct Validator {
    fields: &'static [FieldSpec],
    rules: Vec<Rule>,
}

impl Validator {
    /// Validator with no rules beyond field coercion
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self {
            fields,
            rules: Vec::new(),
        }
    }

    /// The user rules: contact presence, username length, non-negative
    /// `age` and `score`
    pub fn users() -> Self {
        Self::new(USER_FIELDS)
            .with_rule(Rule::Pre {
                name: "email_or_phone",
                check: email_or_phone_present,
            })
            .with_rule(Rule::Field {
                name: "username_length",
                fields: &["username"],
                check: username_longer_than_five,
            })
            .with_rule(Rule::Field {
                name: "non_negative",
                fields: &["age", "score"],
                check: non_negative,
            })
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Validate one record.
    ///
    /// Pre rules run first, in list order. Then each declared field is
    /// coerced in declaration order and passed through the field rules that
    /// target it, in list order.
    pub fn validate(&self, raw: &RawRecord) -> std::result::Result<User, ValidationError> {
        for rule in &self.rules {
            if let Rule::Pre { name, check } = rule {
                tracing::trace!(rule = name, "Applying pre rule");
                check(raw).map_err(|r| r.at(ROOT_FIELD))?;
            }
        }

        let mut draft: BTreeMap<&'static str, Value> = BTreeMap::new();
        for spec in self.fields {
            let mut value = coerce(spec, raw.get(spec.name))?;

            for rule in self.rules.iter().filter(|r| r.applies_to(spec.name)) {
                if let Rule::Field { name, check, .. } = rule {
                    tracing::trace!(rule = name, field = spec.name, "Applying field rule");
                    value = check(value).map_err(|r| r.at(spec.name))?;
                }
            }

            draft.insert(spec.name, value);
        }

        for key in raw.keys() {
            if !self.fields.iter().any(|f| f.name == key) {
                tracing::debug!(field = %key, "Ignoring undeclared field");
            }
        }

        build_user(draft)
    }

    /// Validate records in order
    pub fn validate_batch(
        &self,
        records: &[RawRecord],
        mode: BatchMode,
    ) -> std::result::Result<BatchOutcome, ValidationError> {
        let mut outcome = BatchOutcome::default();

        for (index, raw) in records.iter().enumerate() {
            match self.validate(raw) {
                Ok(user) => outcome.users.push(user),
                Err(e) => {
                    let e = e.at_record(index);
                    match mode {
                        BatchMode::FailFast => return Err(e),
                        BatchMode::Isolate => {
                            tracing::debug!("Rejected {}", e);
                            outcome.rejected.push(e);
                        }
                    }
                }
            }
        }

        tracing::info!(
            accepted = outcome.users.len(),
            rejected = outcome.rejected.len(),
            "Validated batch of {} records",
            records.len()
        );
        Ok(outcome)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::users()
    }
}

fn coerce(
    spec: &FieldSpec,
    raw: Option<&serde_json::Value>,
) -> std::result::Result<Value, ValidationError> {
    use serde_json::Value as Json;

    let raw = match raw {
        None if spec.required => return Err(ValidationError::missing(spec.name)),
        None | Some(Json::Null) if !spec.required => return Ok(Value::Null),
        None | Some(Json::Null) => {
            return Err(ValidationError::type_error(
                spec.name,
                "none is not an allowed value",
            ))
        }
        Some(raw) => raw,
    };

    match spec.kind {
        FieldKind::Text => match raw {
            Json::String(s) => Ok(Value::Text(s.clone())),
            Json::Number(n) => Ok(Value::Text(n.to_string())),
            _ => Err(ValidationError::type_error(spec.name, "str type expected")),
        },
        FieldKind::Integer => {
            let parsed = match raw {
                // Floats truncate toward zero, booleans count as 0 and 1.
                Json::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                        .map(|f| f.trunc() as i64)
                }),
                Json::Bool(b) => Some(i64::from(*b)),
                Json::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            parsed.map(Value::Integer).ok_or_else(|| {
                ValidationError::type_error(spec.name, "value is not a valid integer")
            })
        }
    }
}

fn build_user(
    mut draft: BTreeMap<&'static str, Value>,
) -> std::result::Result<User, ValidationError> {
    let mut text = |name: &'static str| match draft.remove(name) {
        Some(Value::Text(s)) => Ok(Some(s)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(ValidationError::type_error(name, "str type expected")),
    };
    let username = text("username")?.ok_or_else(|| ValidationError::missing("username"))?;
    let password = text("password")?.ok_or_else(|| ValidationError::missing("password"))?;
    let email = text("email")?;
    let phone = text("phone")?;

    let integer = |name: &'static str| match draft.get(name) {
        Some(Value::Integer(i)) => Ok(*i),
        Some(_) => Err(ValidationError::type_error(name, "value is not a valid integer")),
        None => Err(ValidationError::missing(name)),
    };
    let age = integer("age")?;
    let score = integer("score")?;

    Ok(User::from_parts(username, password, age, score, email, phone))
}

/// Parse a JSON document holding an array of objects
pub fn parse_records(document: &str) -> Result<Vec<RawRecord>> {
    let parsed: serde_json::Value = serde_json::from_str(document)?;
    let serde_json::Value::Array(items) = parsed else {
        return Err(Error::InvalidDocument(
            "expected a JSON array of objects".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(Error::InvalidDocument(format!(
                "element {} is not an object: {}",
                i, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    fn valid() -> serde_json::Value {
        json!({
            "username": "ranasen",
            "password": "asdf",
            "age": 20,
            "score": 89,
            "email": "rana@example.com"
        })
    }

    #[test]
    fn test_valid_record() {
        let user = Validator::users().validate(&raw(valid())).unwrap();
        assert_eq!(user.username(), "ranasen");
        assert_eq!(user.age(), 20);
        assert_eq!(user.email(), Some("rana@example.com"));
        assert_eq!(user.phone(), None);
    }

    #[test]
    fn test_username_boundary() {
        let validator = Validator::users();

        let mut five = valid();
        five["username"] = json!("sayak");
        let err = validator.validate(&raw(five)).unwrap_err();
        assert_eq!(err.field, "username");
        assert_eq!(err.kind, ErrorKind::Generic);
        assert_eq!(err.message, "username should be longer than 5 letters");

        let mut six = valid();
        six["username"] = json!("sayakk");
        assert!(validator.validate(&raw(six)).is_ok());
    }

    #[test]
    fn test_non_negative_age_and_score() {
        let validator = Validator::users();

        for field in ["age", "score"] {
            let mut negative = valid();
            negative[field] = json!(-1);
            let err = validator.validate(&raw(negative)).unwrap_err();
            assert_eq!(err.field, field);
            assert_eq!(err.kind, ErrorKind::Value);
            assert_eq!(err.message, "age must be positive");

            let mut zero = valid();
            zero[field] = json!(0);
            assert!(validator.validate(&raw(zero)).is_ok());
        }
    }

    #[test]
    fn test_contact_presence_checks_keys() {
        let validator = Validator::users();

        let mut none = valid();
        none.as_object_mut().unwrap().remove("email");
        let err = validator.validate(&raw(none)).unwrap_err();
        assert_eq!(err.field, ROOT_FIELD);
        assert_eq!(err.message, "need either email or phone");

        let mut empty_phone = valid();
        empty_phone.as_object_mut().unwrap().remove("email");
        empty_phone["phone"] = json!("");
        assert_eq!(
            validator.validate(&raw(empty_phone)).unwrap().phone(),
            Some("")
        );

        let mut null_email = valid();
        null_email["email"] = json!(null);
        let user = validator.validate(&raw(null_email)).unwrap();
        assert_eq!(user.email(), None);
    }

    #[test]
    fn test_pre_rule_runs_before_field_rules() {
        let err = Validator::users()
            .validate(&raw(json!({
                "username": "abc",
                "password": "x",
                "age": -5,
                "score": 1
            })))
            .unwrap_err();
        assert_eq!(err.field, ROOT_FIELD);
    }

    #[test]
    fn test_coercion() {
        let validator = Validator::users();

        let mut strings = valid();
        strings["age"] = json!("42");
        strings["score"] = json!(7.0);
        strings["password"] = json!(1234);
        let user = validator.validate(&raw(strings)).unwrap();
        assert_eq!(user.age(), 42);
        assert_eq!(user.score(), 7);
        assert_eq!(user.password(), "1234");

        let mut truncated = valid();
        truncated["age"] = json!(7.5);
        truncated["score"] = json!(true);
        let user = validator.validate(&raw(truncated)).unwrap();
        assert_eq!(user.age(), 7);
        assert_eq!(user.score(), 1);

        let mut fraction = valid();
        fraction["age"] = json!("7.5");
        let err = validator.validate(&raw(fraction)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);

        let mut bad = valid();
        bad["age"] = json!("forty");
        let err = validator.validate(&raw(bad)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);

        let mut missing = valid();
        missing.as_object_mut().unwrap().remove("password");
        let err = validator.validate(&raw(missing)).unwrap_err();
        assert_eq!(err.field, "password");
        assert_eq!(err.kind, ErrorKind::Missing);
    }

    #[test]
    fn test_batch_fail_fast_and_isolate() {
        let mut bad = valid();
        bad["username"] = json!("abc");
        let records = vec![raw(valid()), raw(bad), raw(valid())];
        let validator = Validator::users();

        let err = validator
            .validate_batch(&records, BatchMode::FailFast)
            .unwrap_err();
        assert_eq!(err.record, Some(1));
        assert!(err.to_string().starts_with("record 1: username:"));

        let outcome = validator
            .validate_batch(&records, BatchMode::Isolate)
            .unwrap();
        assert_eq!(outcome.users.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].record, Some(1));
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records(r#"[{"username": "x"}, {}]"#).unwrap();
        assert_eq!(records.len(), 2);

        assert!(matches!(
            parse_records(r#"{"username": "x"}"#),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(
            parse_records(r#"[1, 2]"#),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(parse_records("not json"), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_batch_mode_from_str() {
        assert_eq!("isolate".parse::<BatchMode>().unwrap(), BatchMode::Isolate);
        assert_eq!("Fail-Fast".parse::<BatchMode>().unwrap(), BatchMode::FailFast);
        assert!("lenient".parse::<BatchMode>().is_err());
    }
}
