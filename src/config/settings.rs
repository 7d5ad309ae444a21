//! gopkgview.toml parsing
//!
//! Optional per-project defaults, read from the module root. Command line
//! flags and environment variables take precedence over anything set here.
//!
//! ```toml
//! [graph]
//! max_workers = 8
//! hide = ["std"]
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::dependency::PackageType;

/// File name looked up in the module root
pub const SETTINGS_FILE: &str = "gopkgview.toml";

/// Root configuration from gopkgview.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Graph building and rendering defaults
    #[serde(default)]
    pub graph: GraphSettings,
}

/// Configuration from the [graph] section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSettings {
    /// Maximum number of packages resolved in parallel
    pub max_workers: Option<usize>,

    /// Package types left out of the rendered output
    #[serde(default)]
    pub hide: Vec<PackageType>,
}

impl Settings {
    /// Load gopkgview.toml from `root`, falling back to defaults when absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid {}", path.display()))
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(content).with_context(|| format!("Failed to parse {}", SETTINGS_FILE))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.graph.max_workers == Some(0) {
            bail!("graph.max_workers must be at least 1");
        }
        if self.graph.hide.contains(&PackageType::Local) {
            bail!("graph.hide cannot contain \"loc\": local packages are the graph itself");
        }
        Ok(())
    }
}
