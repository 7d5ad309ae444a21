//! gopkgview - Go package dependency graph builder
//!
//! Builds the import graph of a Go module by resolving packages on a bounded
//! pool of workers.
//!
//! ## Architecture
//!
//! ```text
//! go.mod → requirement index ─┐
//!                             ├→ GraphBuilder ⇄ GoResolver (GOROOT, module, vendor, GOMODCACHE)
//! root package "." ───────────┘        ↓
//!                                    Graph → json | dot | text
//! ```

mod cli;
mod commands;
mod config;
mod dependency;
mod error;
mod golang;
mod utils;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;
use error::GoPkgViewError;
use utils::terminal::print_error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<GoPkgViewError>() {
                Some(err) => err.display_with_hints(),
                None => print_error(&format!("{:#}", err)),
            }
            ExitCode::FAILURE
        }
    }
}
