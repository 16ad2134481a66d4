//! Output formatting utilities

use serde::Serialize;
use vetted_core::{Person, Thing, User};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Something printable as one row of a table
pub trait Tabular: Serialize {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn cell<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl Tabular for Person {
    fn headers() -> &'static [&'static str] {
        &["ssn", "firstname", "lastname", "gender", "age"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.ssn.to_string(),
            cell(&self.firstname),
            cell(&self.lastname),
            cell(&self.gender),
            cell(&self.age),
        ]
    }
}

impl Tabular for Thing {
    fn headers() -> &'static [&'static str] {
        &["tid", "description", "owner"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.tid.to_string(),
            cell(&self.description),
            cell(&self.owner),
        ]
    }
}

impl Tabular for User {
    fn headers() -> &'static [&'static str] {
        &["username", "password", "age", "score", "email", "phone"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.username().to_string(),
            self.password().to_string(),
            self.age().to_string(),
            self.score().to_string(),
            self.email().unwrap_or_default().to_string(),
            self.phone().unwrap_or_default().to_string(),
        ]
    }
}

/// A thing paired with its owner's first name
#[derive(Debug, Clone, Serialize)]
pub struct Ownership {
    pub description: String,
    pub firstname: String,
}

impl Tabular for Ownership {
    fn headers() -> &'static [&'static str] {
        &["description", "firstname"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.description.clone(), self.firstname.clone()]
    }
}

/// Format rows based on format type
pub fn format_output<T: Tabular>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => {
            let mut lines = vec![T::headers().join(",")];
            for item in items {
                let row: Vec<String> = item.cells().iter().map(|c| csv_escape(c)).collect();
                lines.push(row.join(","));
            }
            lines.join("\n")
        }
        OutputFormat::Table => table(T::headers(), items.iter().map(Tabular::cells).collect()),
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![
        line(headers.iter().map(|h| h.to_string()).collect()),
        line(widths.iter().map(|w| "-".repeat(*w)).collect()),
    ];
    for row in rows {
        out.push(line(row));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_output() {
        let people = vec![
            Person::new(12312, "Mike", "Smith", 'M', 35),
            Person::new(87609, "Biju", "Mandal", 'F', 23),
        ];
        let out = format_output(&people, OutputFormat::Table);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ssn    firstname"));
        assert!(lines[2].contains("Mike"));
        assert!(lines[3].ends_with("23"));
    }

    #[test]
    fn test_csv_output_escapes() {
        let owned = vec![Ownership {
            description: "Mug, blue".into(),
            firstname: "Mike".into(),
        }];
        let out = format_output(&owned, OutputFormat::Csv);
        assert_eq!(out, "description,firstname\n\"Mug, blue\",Mike");
    }

    #[test]
    fn test_json_output() {
        let things = vec![Thing::new(1, "Car", 12312)];
        let out = format_output(&things, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["description"], "Car");
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
    }
}
