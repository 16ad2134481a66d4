//! Demo command: seed the store and run the sample queries

use clap::Args;
use vetted_core::{Person, Predicate, Thing};

use crate::AppContext;

#[derive(Args)]
pub struct DemoArgs {
    /// Show people strictly older than this
    #[arg(long, default_value_t = 22)]
    pub older_than: i64,

    /// First name for the ownership query
    #[arg(long, default_value = "Mike")]
    pub owner: String,
}

/// Running twice against the same database fails at the seed step with a
/// uniqueness violation.
pub async fn run(args: &DemoArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let session = &ctx.session;

    session.seed_fixture().await?;

    println!("All people:");
    for person in session.list_all::<Person>().await? {
        println!("  {}", person);
    }

    println!("People older than {}:", args.older_than);
    let older: Vec<Person> = session
        .filter(&Predicate::gt("age", args.older_than))
        .await?;
    for person in older {
        println!("  {}", person);
    }

    println!("All things:");
    for thing in session.list_all::<Thing>().await? {
        println!("  {}", thing);
    }

    println!("Things owned by {}:", args.owner);
    for (description, firstname) in session.owned_by(&args.owner).await? {
        println!("  {} {}", description, firstname);
    }

    Ok(())
}
