#![deny(missing_docs)]

//! # Typeforge CLI
//!
//! Command Line Interface for the type & validation model toolchain.
//!
//! Supported Commands:
//! - `resolve`: OpenAPI document -> normalized type model (JSON or YAML).
//! - `check-condition`: evaluates a condition expression against inline data.

use clap::{Parser, Subcommand};
use typeforge_core::EngineResult;

mod check;
mod resolve;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Typeforge toolchain CLI")]
struct Cli {
    /// Enables verbose diagnostics.
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolves a document into its normalized type & validation model.
    Resolve(resolve::ResolveArgs),
    /// Evaluates a condition expression against key=value data bindings.
    CheckCondition(check::CheckConditionArgs),
}

#[tokio::main]
async fn main() -> EngineResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Resolve(args) => resolve::execute(args).await?,
        Commands::CheckCondition(args) => check::execute(args)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
