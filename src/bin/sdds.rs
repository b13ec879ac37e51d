// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # sdds CLI
//!
//! Command-line front end for self-describing data sets.
//!
//! ## Usage
//!
//! ```sh
//! # Convert ASCII to big-endian binary, xz compressed
//! sdds convert run.sdds run.sdds.xz --binary --endian big
//!
//! # Stream through a pipe, keeping only columns starting with x
//! cat run.sdds | sdds convert - - --retain-columns 'x*' > x.sdds
//!
//! # Every 10th row whose energy lies in [1, 2]
//! sdds convert run.sdds thin.sdds --sparse 10 --filter energy=1,2
//!
//! # Report ok, nonexistent, badHeader or corrupted
//! sdds check run.sdds
//!
//! # Print the schema as JSON
//! sdds query run.sdds --json
//! ```

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use cmd::{CheckCmd, ConvertCmd, QueryCmd};
use common::Result;

/// sdds - self-describing data set toolkit
///
/// Use - as a file name to read stdin or write stdout.
#[derive(Parser, Clone)]
#[command(name = "sdds")]
#[command(about = "Convert, check and query SDDS files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML file with dataset options (recover, strict_keywords, ...)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Re-encode a dataset (layout, compression, pages, fields, rows)
    Convert(ConvertCmd),

    /// Check that a dataset reads cleanly
    Check(CheckCmd),

    /// Show the schema of a dataset
    Query(QueryCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    common::init_logging(cli.verbose);
    let config = common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert(cmd) => cmd.run(config),
        Commands::Check(cmd) => cmd.run(config),
        Commands::Query(cmd) => cmd.run(config),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
