//! Validate command

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use vetted_core::{fixture, parse_records, BatchMode, Validator};

use crate::config::Config;
use crate::output::format_output;
use crate::Cli;

#[derive(Args)]
pub struct ValidateArgs {
    /// JSON file holding an array of user objects
    #[arg(required_unless_present = "demo")]
    pub file: Option<PathBuf>,

    /// Report every rejected record instead of stopping at the first
    #[arg(long)]
    pub isolate: bool,

    /// Run the built-in demonstration records, each of which is rejected
    #[arg(long, conflicts_with = "file")]
    pub demo: bool,
}

pub fn run(args: &ValidateArgs, cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let validator = Validator::users();

    if args.demo {
        return run_demo(&validator);
    }

    let Some(path) = &args.file else {
        anyhow::bail!("no input file given");
    };
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let records = parse_records(&document)?;

    let mode = if args.isolate {
        BatchMode::Isolate
    } else {
        config.batch_mode
    };
    tracing::debug!("Validating {} records ({})", records.len(), mode);

    let outcome = validator.validate_batch(&records, mode)?;

    if !outcome.users.is_empty() {
        println!("{}", format_output(&outcome.users, cli.output_format()));
    }
    for rejection in &outcome.rejected {
        eprintln!("Rejected {}", rejection);
    }

    if !outcome.rejected.is_empty() {
        anyhow::bail!(
            "{} of {} records rejected",
            outcome.rejected.len(),
            records.len()
        );
    }
    Ok(())
}

/// Each record is validated on its own so every rule shows up once
fn run_demo(validator: &Validator) -> anyhow::Result<()> {
    let records = fixture::rejected_users();
    let mut rejected = 0;

    for (index, raw) in records.iter().enumerate() {
        match validator.validate(raw) {
            Ok(user) => println!("{}", user),
            Err(e) => {
                rejected += 1;
                println!("Rejected {}", e.at_record(index));
            }
        }
    }

    if rejected > 0 {
        anyhow::bail!("{} of {} records rejected", rejected, records.len());
    }
    Ok(())
}
