//! CLI argument definitions using clap.
//!
//! ## Commands
//!
//! - `extract`: Run the extraction pipeline and emit the full JSON report
//! - `migrate`: Report migration advisories for deprecated operation names
//! - `init`: Initialize a gqlex configuration file

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Arguments {
    /// Check if a command was provided, otherwise print help and return None.
    pub fn with_command_or_help(self) -> Option<Self> {
        if self.command.is_none() {
            Self::command().print_help().ok();
            None
        } else {
            Some(self)
        }
    }
}

/// Common arguments shared by all commands.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Source code root directory (overrides config file)
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// Pattern registry JSON file (overrides config file)
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Use the cross-run incremental cache
    #[arg(long)]
    pub cache: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct ExtractCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Write the JSON report to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MigrateCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Write the JSON report to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and resolve every GraphQL operation in the project
    Extract(ExtractCommand),
    /// Report migration advisories for deprecated operation names
    Migrate(MigrateCommand),
    /// Initialize a new .gqlexrc.json configuration file
    Init,
}
