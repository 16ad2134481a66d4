//! Vetted CLI - validate user records and work with the entity store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, demo, store, validate};
use config::{Backend, Config, Settings};
use output::OutputFormat;
use vetted_core::demo_schema;
use vetted_storage::Session;

#[derive(Parser)]
#[command(name = "vetted")]
#[command(author, version, about = "Record validation and a small relational entity store")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, global = true, env = "VETTED_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Database name inside the data directory
    #[arg(long, global = true, env = "VETTED_DATABASE")]
    pub database: Option<String>,

    /// Storage backend
    #[arg(short, long, global = true, env = "VETTED_BACKEND", value_enum)]
    pub backend: Option<Backend>,

    /// Output format: table, json, csv
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flags and environment win over the config file
    pub fn settings(&self, config: &Config) -> Settings {
        Settings {
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(|| config.data_dir.clone()),
            database: self
                .database
                .clone()
                .unwrap_or_else(|| config.database.clone()),
            backend: self.backend.unwrap_or(config.backend),
            batch_mode: config.batch_mode,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate user records from a JSON file
    Validate(validate::ValidateArgs),
    /// Work with the people and things collections
    Store(store::StoreArgs),
    /// Seed the store and run the demonstration queries
    Demo(demo::DemoArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with an open store session
pub struct AppContext {
    pub session: Session,
    pub db_path: PathBuf,
}

impl AppContext {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&settings.data_dir)?;

        let db_path = settings.database_path();
        tracing::debug!("Using {} database at: {:?}", settings.backend.as_str(), db_path);

        let session = match settings.backend {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => {
                let store = vetted_storage::SqliteStore::open(&db_path)?;
                Session::open(store, demo_schema()).await?
            }
            #[cfg(feature = "redb")]
            Backend::Redb => {
                let store = vetted_storage::RedbStore::open(&db_path)?;
                Session::open(store, demo_schema()).await?
            }
            #[allow(unreachable_patterns)]
            other => anyhow::bail!(
                "backend '{}' is not compiled into this build",
                other.as_str()
            ),
        };

        Ok(Self { session, db_path })
    }

    /// Close the session, discarding anything left uncommitted
    pub async fn close(self) -> anyhow::Result<()> {
        self.session.close().await?;
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting vetted CLI");

    let config = Config::load();

    match &cli.command {
        Commands::Validate(args) => validate::run(args, &cli, &config)?,
        Commands::Store(args) => {
            let ctx = AppContext::new(&cli.settings(&config)).await?;
            let result = store::run(args, &cli, &ctx).await;
            let closed = ctx.close().await;
            result?;
            closed?;
        }
        Commands::Demo(args) => {
            let ctx = AppContext::new(&cli.settings(&config)).await?;
            let result = demo::run(args, &ctx).await;
            let closed = ctx.close().await;
            result?;
            closed?;
        }
        Commands::Config(args) => commands::config::run(args)?,
        Commands::Completions(args) => completions::run(args)?,
    }

    Ok(())
}
