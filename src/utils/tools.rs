//! Tool detection and invocation
//!
//! Locates executables on PATH and runs them, with helpful errors when a
//! required tool is missing.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use which::which;

use crate::error::{hints, GoPkgViewError};

/// Tool detection result
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Path to the tool executable
    pub path: PathBuf,
}

/// Check if a tool exists and return its information
pub fn check_tool(tool_name: &str) -> Option<ToolInfo> {
    which(tool_name).ok().map(|path| ToolInfo { path })
}

/// Require a tool to exist, return error with hint if missing
pub fn require_tool(tool_name: &str, required_for: &str) -> Result<ToolInfo, GoPkgViewError> {
    check_tool(tool_name)
        .ok_or_else(|| GoPkgViewError::missing_tool(tool_name, required_for, get_tool_hint(tool_name)))
}

/// Get installation hint for a tool
fn get_tool_hint(tool_name: &str) -> &'static str {
    match tool_name {
        "go" => hints::go_toolchain(),
        _ => "Install this tool and ensure it's in your PATH",
    }
}

/// Run a tool and capture its stdout
pub fn run_captured(tool: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {}", tool.display()))?;

    if !output.status.success() {
        bail!(
            "{} {} exited with {}: {}",
            tool.display(),
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
