use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    init::{self, InitArgs},
    patch::{self, PatchArgs},
    run::{self, RunArgs},
    scan::{self, ScanArgs},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "fsp", version, about = "Fragment-screening pipeline driver")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the stage chain over every matching dataset.
    Run(RunArgs),
    /// List the datasets a run would process.
    Scan(ScanArgs),
    /// Write the default configuration as YAML.
    Init(InitArgs),
    /// Apply one occupancy pass to a single coordinate file.
    Patch(PatchArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Scan(args) => scan::run(&args),
        Command::Init(args) => init::run(&args),
        Command::Patch(args) => patch::run(&args),
    }
}
