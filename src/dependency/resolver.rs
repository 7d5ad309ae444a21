//! Import resolution interface consumed by the graph builder

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Metadata of a resolved package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Canonical import path
    pub import_path: String,

    /// Package name from the `package` clause
    pub name: String,

    /// Absolute directory holding the package sources
    pub dir: PathBuf,

    /// Shipped with the toolchain (found under GOROOT)
    pub goroot: bool,

    /// Imported identifiers, sorted and deduplicated
    pub imports: Vec<String>,
}

/// A single identifier could not be resolved
///
/// Never fatal to a build: the identifier becomes an `err` node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to import {identifier}: {reason}")]
pub struct ResolutionError {
    pub identifier: String,
    pub reason: String,
}

impl ResolutionError {
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// Resolves package identifiers into package metadata
///
/// Called from many worker threads at once, so implementations must be
/// safe for concurrent use.
pub trait ImportResolver: Send + Sync {
    /// Resolve `identifier` as imported from a package living in `src_dir`
    fn resolve(&self, identifier: &str, src_dir: &Path) -> Result<PackageInfo, ResolutionError>;

    /// Import path `identifier` names when imported from `src_dir`
    ///
    /// Must not touch the filesystem. The result keys the visited set and is
    /// the target of import edges, so it has to match the `import_path` a
    /// successful [`resolve`](Self::resolve) reports. The default treats
    /// every identifier as already canonical.
    fn canonical(&self, identifier: &str, _src_dir: &Path) -> String {
        identifier.to_string()
    }
}
