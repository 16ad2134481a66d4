//! Config command for managing CLI configuration

use clap::{Args, Subcommand};

use crate::config::{config_file_path, Config};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print one config value
    Get {
        /// One of: data_dir, database, backend, batch_mode
        key: String,
    },
    /// Change one config value and save the file
    Set {
        key: String,
        value: String,
    },
    /// Print every config value
    List,
    /// Print the config file location
    Path,
    /// Write a config file holding the defaults
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Get { key } => {
            let config = Config::load();
            let value = config.get(key).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown config key: {} (available: {})",
                    key,
                    Config::keys().join(", ")
                )
            })?;
            println!("{}", value);
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, value)?;
            config.save()?;
            println!("{} = {}", key, value);
        }
        ConfigCommands::List => {
            let config = Config::load();
            println!("# {}", config_file_path().display());
            for key in Config::keys() {
                println!("{} = {}", key, config.get(key).unwrap_or_default());
            }
        }
        ConfigCommands::Path => println!("{}", config_file_path().display()),
        ConfigCommands::Init { force } => {
            let path = config_file_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Created config file at {}", path.display());
        }
    }
    Ok(())
}
