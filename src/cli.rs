//! CLI argument parsing using clap derive macros

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{graph::GraphCommand, requires::RequiresCommand};

/// gopkgview - Go package dependency graph builder
///
/// Resolves the import graph of a Go module, classifying every package as
/// local, standard library, external or unresolvable.
#[derive(Parser, Debug)]
#[command(name = "gopkgview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the package import graph of a module
    Graph(GraphCommand),

    /// Show the go.mod requirement index, or check import paths against it
    Requires(RequiresCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        match self.command {
            Commands::Graph(cmd) => cmd.execute(self.verbose),
            Commands::Requires(cmd) => cmd.execute(self.verbose),
        }
    }
}
