// modgraph/src/cli.rs
//! Command-line argument structure.
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use modgraph_common::config::Config;
use modgraph_common::error::Result;

pub mod order;
pub mod tree;

use crate::cli::order::Order;
use crate::cli::tree::Tree;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "modgraph", bin_name = "modgraph")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to $MODGRAPH_CONFIG, then ./modgraph.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every module in emission order, dependencies first
    Order(Order),
    /// Print the dependency tree below each entry
    Tree(Tree),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Order(command) => command.run(config).await,
            Self::Tree(command) => command.run(config).await,
        }
    }
}

/// Shortens `path` relative to the project root when it lies below it.
pub(crate) fn display_path(config: &Config, path: &Path) -> String {
    path.strip_prefix(&config.base_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}
