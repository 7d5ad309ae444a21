//! Requires command - Inspect the go.mod requirement index
//!
//! Usage:
//!   gopkgview requires                          # Print the index as a tree
//!   gopkgview requires github.com/a/b/c fmt     # Check import paths against it

use anyhow::Result;
use clap::Args;

use super::ModuleArgs;
use crate::config::GoMod;
use crate::dependency::PathTrie;
use crate::utils::terminal::print_warning;

/// Show the requirement prefix index of go.mod
#[derive(Args, Debug)]
pub struct RequiresCommand {
    #[command(flatten)]
    pub module: ModuleArgs,

    /// Import paths to check; prints the whole index when omitted
    pub paths: Vec<String>,
}

impl RequiresCommand {
    /// Execute the requires command
    pub fn execute(self, verbose: bool) -> Result<()> {
        let (_, gomod) = self.module.load()?;
        let index = gomod.requirement_index();
        if index.is_empty() {
            print_warning("go.mod declares no requirements");
        }

        if self.paths.is_empty() {
            print!("{}", render_index(&gomod, &index, verbose));
        } else {
            for path in &self.paths {
                println!("{}", classify_path(&gomod, &index, path));
            }
        }

        Ok(())
    }
}

fn render_index(gomod: &GoMod, index: &PathTrie, verbose: bool) -> String {
    let mut out = format!("{}\n", gomod.module);
    if verbose {
        for require in &gomod.requires {
            out.push_str(&format!(
                "  {} {}{}\n",
                require.path,
                require.version,
                if require.indirect { " // indirect" } else { "" }
            ));
        }
    }
    out.push_str(&index.to_string());
    out.push_str(&format!("{} nodes\n", index.count()));
    out
}

fn classify_path(gomod: &GoMod, index: &PathTrie, path: &str) -> String {
    if !index.has_prefix(path) {
        return format!("{}: not covered", path);
    }
    match gomod.requirement_for(path) {
        Some(require) => format!("{}: covered by {} {}", path, require.path, require.version),
        None => format!("{}: covered", path),
    }
}
