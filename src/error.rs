//! Error types and helpers for user-friendly error messages
//!
//! Failures that stop a command are wrapped in [`GoPkgViewError`], which
//! carries an actionable hint printed under the error itself.

use thiserror::Error;

use crate::config::ManifestError;
use crate::dependency::BuildError;

/// Errors that abort a command, with hints for the user
#[derive(Error, Debug)]
pub enum GoPkgViewError {
    /// Configuration file or flag errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        hint: Option<String>,
    },

    /// go.mod missing or malformed
    #[error("Invalid module descriptor: {source}")]
    Manifest {
        #[source]
        source: ManifestError,
        hint: String,
    },

    /// Tool/executable not found or misconfigured
    #[error("Missing tool: {tool}")]
    MissingTool {
        tool: String,
        required_for: String,
        hint: String,
    },

    /// The graph build itself failed
    #[error("Graph build failed: {source}")]
    Build {
        #[source]
        source: BuildError,
    },
}

impl GoPkgViewError {
    /// Create a configuration error with a hint
    pub fn config_error_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
            hint: Some(hint.into()),
        }
    }

    /// Wrap a go.mod failure, picking the hint from its kind
    pub fn manifest(source: ManifestError) -> Self {
        let hint = match source {
            ManifestError::Read { .. } => hints::gomod_not_found(),
            ManifestError::Syntax { .. } | ManifestError::MissingModule { .. } => {
                hints::invalid_gomod()
            }
        };
        Self::Manifest {
            source,
            hint: hint.to_string(),
        }
    }

    /// Create a missing tool error
    pub fn missing_tool(
        tool: impl Into<String>,
        required_for: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::MissingTool {
            tool: tool.into(),
            required_for: required_for.into(),
            hint: hint.into(),
        }
    }

    /// The hint shown under the error, if any
    pub fn hint(&self) -> Option<&str> {
        match self {
            GoPkgViewError::Config { hint, .. } => hint.as_deref(),
            GoPkgViewError::Manifest { hint, .. } | GoPkgViewError::MissingTool { hint, .. } => {
                Some(hint)
            }
            GoPkgViewError::Build { .. } => None,
        }
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("\n{} {}", style("ERROR:").red().bold(), self);

        if let GoPkgViewError::MissingTool { required_for, .. } = self {
            eprintln!("  required for: {}", required_for);
        }

        if let Some(hint) = self.hint() {
            eprintln!("\n{} {}", style("HINT:").yellow().bold(), hint);
        }

        eprintln!();
    }
}

impl From<BuildError> for GoPkgViewError {
    fn from(source: BuildError) -> Self {
        GoPkgViewError::Build { source }
    }
}

/// Common error hints
pub mod hints {
    /// Get hint for a missing Go toolchain
    pub fn go_toolchain() -> &'static str {
        "The Go toolchain is needed to locate the standard library.\n\
         • Install Go from https://go.dev/dl/\n\
         • Or set GOROOT to an existing Go installation"
    }

    /// Get hint for go.mod not found
    pub fn gomod_not_found() -> &'static str {
        "Could not read go.mod.\n\
         \n\
         • Run gopkgview from the module root, or pass --root <dir>\n\
         • Point at the file directly with --gomod <path>\n\
         • Create a module with: go mod init <module path>"
    }

    /// Get hint for invalid go.mod
    pub fn invalid_gomod() -> &'static str {
        "go.mod is invalid. Common issues:\n\
         • Missing module directive\n\
         • require lines without a version\n\
         • Unbalanced ( ) blocks\n\
         \n\
         Run: go mod tidy"
    }

    /// Get hint for an invalid worker count
    pub fn max_workers() -> &'static str {
        "Use --max-workers with a value of at least 1 (default: 20)."
    }
}
