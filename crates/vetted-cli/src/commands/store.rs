//! Store commands

use clap::{Args, Subcommand, ValueEnum};
use vetted_core::{Person, Predicate, Thing};

use crate::output::{format_output, Ownership};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct StoreArgs {
    #[command(subcommand)]
    pub command: StoreCommands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    People,
    Things,
}

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Create the collections if they do not exist yet
    Init,
    /// Insert and commit the demonstration people and things
    Seed,
    /// Insert one person
    AddPerson {
        ssn: i64,
        firstname: String,
        lastname: String,
        /// Single character, e.g. M or F
        gender: char,
        age: i64,
    },
    /// Insert one thing
    AddThing {
        tid: i64,
        description: String,
        /// ssn of the owning person
        owner: i64,
    },
    /// List every record of a kind
    List {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// List records matching a comparison such as `age>22`
    Filter {
        #[arg(value_enum)]
        kind: Kind,
        expr: String,
    },
    /// Things owned by people with the given first name
    OwnedBy { firstname: String },
}

pub async fn run(args: &StoreArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let session = &ctx.session;
    let format = cli.output_format();

    match &args.command {
        StoreCommands::Init => {
            if !cli.quiet {
                println!("Initialized {}", ctx.db_path.display());
            }
        }
        StoreCommands::Seed => {
            session.seed_fixture().await?;
            if !cli.quiet {
                println!("Seeded {}", ctx.db_path.display());
            }
        }
        StoreCommands::AddPerson {
            ssn,
            firstname,
            lastname,
            gender,
            age,
        } => {
            let person = Person::new(*ssn, firstname.as_str(), lastname.as_str(), *gender, *age);
            session.insert(&person).await?;
            session.commit().await?;
            if !cli.quiet {
                println!("Added {}", person);
            }
        }
        StoreCommands::AddThing {
            tid,
            description,
            owner,
        } => {
            let thing = Thing::new(*tid, description.as_str(), *owner);
            session.insert(&thing).await?;
            session.commit().await?;
            if !cli.quiet {
                println!("Added {}", thing);
            }
        }
        StoreCommands::List { kind } => match kind {
            Kind::People => {
                let people: Vec<Person> = session.list_all().await?;
                println!("{}", format_output(&people, format));
            }
            Kind::Things => {
                let things: Vec<Thing> = session.list_all().await?;
                println!("{}", format_output(&things, format));
            }
        },
        StoreCommands::Filter { kind, expr } => {
            let predicate = Predicate::parse(expr)?;
            tracing::debug!("Filtering with {}", predicate);
            match kind {
                Kind::People => {
                    let people: Vec<Person> = session.filter(&predicate).await?;
                    println!("{}", format_output(&people, format));
                }
                Kind::Things => {
                    let things: Vec<Thing> = session.filter(&predicate).await?;
                    println!("{}", format_output(&things, format));
                }
            }
        }
        StoreCommands::OwnedBy { firstname } => {
            let owned: Vec<Ownership> = session
                .owned_by(firstname)
                .await?
                .into_iter()
                .map(|(description, firstname)| Ownership {
                    description,
                    firstname,
                })
                .collect();
            println!("{}", format_output(&owned, format));
        }
    }

    Ok(())
}
