//! The validated user record

use serde::Serialize;

/// Expected scalar type of an input field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
}

/// Declared input field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Optional fields default to `None` when absent
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Fields of [`User`], in declaration order
pub const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("username", FieldKind::Text),
    FieldSpec::required("password", FieldKind::Text),
    FieldSpec::required("age", FieldKind::Integer),
    FieldSpec::required("score", FieldKind::Integer),
    FieldSpec::optional("email", FieldKind::Text),
    FieldSpec::optional("phone", FieldKind::Text),
];

/// A user that passed every validation rule.
///
/// Only [`crate::Validator`] builds these; the fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    username: String,
    password: String,
    age: i64,
    score: i64,
    email: Option<String>,
    phone: Option<String>,
}

impl User {
    pub(crate) fn from_parts(
        username: String,
        password: String,
        age: i64,
        score: i64,
        email: Option<String>,
        phone: Option<String>,
    ) -> Self {
        Self {
            username,
            password,
            age,
            score,
            email,
            phone,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn age(&self) -> i64 {
        self.age
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "username='{}' password='{}' age={} score={} email={:?} phone={:?}",
            self.username, self.password, self.age, self.score, self.email, self.phone
        )
    }
}
