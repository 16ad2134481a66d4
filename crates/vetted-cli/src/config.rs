//! CLI configuration

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use vetted_core::BatchMode;

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vetted")
}

/// Location of the config file; `VETTED_CONFIG` overrides it
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os("VETTED_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vetted")
        .join("config.toml")
}

/// Storage engine behind the entity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Redb,
}

impl Backend {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sqlite => "db",
            Self::Redb => "redb",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Redb => "redb",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "redb" => Ok(Self::Redb),
            other => anyhow::bail!("unknown backend '{}' (expected sqlite or redb)", other),
        }
    }
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// File stem of the database inside `data_dir`
    pub database: String,
    pub backend: Backend,
    pub batch_mode: BatchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: "mydb".to_string(),
            backend: Backend::default(),
            batch_mode: BatchMode::default(),
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when it is absent or
    /// unreadable
    pub fn load() -> Self {
        let path = config_file_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("Could not read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &["data_dir", "database", "backend", "batch_mode"]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "data_dir" => Some(self.data_dir.display().to_string()),
            "database" => Some(self.database.clone()),
            "backend" => Some(self.backend.as_str().to_string()),
            "batch_mode" => Some(self.batch_mode.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "database" => {
                if value.is_empty() {
                    anyhow::bail!("database name cannot be empty");
                }
                self.database = value.to_string();
            }
            "backend" => self.backend = value.parse()?,
            "batch_mode" => self.batch_mode = value.parse().map_err(anyhow::Error::msg)?,
            _ => anyhow::bail!(
                "Unknown config key: {} (available: {})",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }
}

/// Effective settings after applying flags and environment over the file
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database: String,
    pub backend: Backend,
    pub batch_mode: BatchMode,
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.database, self.backend.extension()))
    }
}
