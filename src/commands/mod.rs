//! Command implementations
//!
//! Each command module provides a clap-derived struct and execute method.

pub mod graph;
pub mod requires;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::GoMod;
use crate::error::GoPkgViewError;
use crate::utils::paths;

/// Location of the module being analyzed
#[derive(Args, Debug, Clone)]
pub struct ModuleArgs {
    /// Module root directory
    #[arg(long, env = "GO_PKGVIEW_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Path to go.mod (default: <root>/go.mod)
    #[arg(long, env = "GO_PKGVIEW_GOMOD")]
    pub gomod: Option<PathBuf>,
}

impl ModuleArgs {
    /// Absolute module root and its parsed go.mod
    pub fn load(&self) -> Result<(PathBuf, GoMod)> {
        let root = paths::absolute(&self.root)?;
        if !root.is_dir() {
            return Err(GoPkgViewError::config_error_with_hint(
                format!("{} is not a directory", root.display()),
                "Pass the module root with --root <dir>",
            )
            .into());
        }

        let gomod_path = match &self.gomod {
            Some(path) => paths::absolute(path)?,
            None => root.join("go.mod"),
        };
        let gomod = GoMod::load(&gomod_path).map_err(GoPkgViewError::manifest)?;

        Ok((root, gomod))
    }
}

/// Write `content` to `output`, or to stdout when absent
pub fn write_output(output: Option<&std::path::Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}
