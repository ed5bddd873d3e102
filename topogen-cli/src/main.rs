//! topogen: render configuration from fleet metadata and keep it in sync.
//!
//! # Usage
//!
//! ```text
//! topogen run [--config <path>] [--onetime] [--interval <secs>] [--dry-run]
//! topogen diff [--config <path>]
//! topogen status [--config <path>] [--json]
//! ```
//!
//! Every subcommand also accepts `--metadata-url`, `--metadata-file` and
//! `--log-level`, which override the configuration file.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, run::RunArgs, status::StatusArgs};

#[derive(Parser, Debug)]
#[command(
    name = "topogen",
    version,
    about = "Render config files from service-discovery metadata and notify on change",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll metadata and process templates (once with --onetime).
    Run(RunArgs),

    /// Show unified diffs of what the next run would write.
    Diff(DiffArgs),

    /// Show whether each template's destination is up to date.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
