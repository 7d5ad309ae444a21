//! Go environment discovery
//!
//! Each setting comes from the process environment first, then from
//! `go env`, then from a built-in default. `go` is only executed when the
//! environment leaves something undecided.

use std::collections::HashMap;
use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::{hints, GoPkgViewError};
use crate::utils::tools::{require_tool, run_captured};

/// Operating systems known to the Go toolchain
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// Architectures known to the Go toolchain
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// Operating systems satisfying the `unix` build tag
const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Settings of the Go installation packages are resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoEnv {
    /// Root of the Go distribution; std sources live in `GOROOT/src`
    pub goroot: PathBuf,
    /// Module download cache
    pub gomodcache: PathBuf,
    /// Target operating system for build constraints
    pub goos: String,
    /// Target architecture for build constraints
    pub goarch: String,
}

impl GoEnv {
    /// Detect settings from the process environment and the `go` tool
    pub fn detect() -> Result<Self, GoPkgViewError> {
        Self::detect_with(|key| std::env::var(key).ok())
    }

    /// Detect settings reading variables through `lookup`
    pub fn detect_with<F>(lookup: F) -> Result<Self, GoPkgViewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut go_env: Option<HashMap<String, String>> = None;
        let mut from_go = |key: &str| -> Result<Option<String>, GoPkgViewError> {
            if go_env.is_none() {
                go_env = Some(query_go_env()?);
            }
            Ok(go_env
                .as_ref()
                .and_then(|vars| vars.get(key))
                .filter(|v| !v.is_empty())
                .cloned())
        };

        let goroot = match lookup("GOROOT") {
            Some(goroot) => goroot,
            None => from_go("GOROOT")?.ok_or_else(|| {
                GoPkgViewError::missing_tool("go", "locating GOROOT", hints::go_toolchain())
            })?,
        };

        let gomodcache = match lookup("GOMODCACHE") {
            Some(cache) => PathBuf::from(cache),
            None => match lookup("GOPATH").and_then(|gopath| first_path(&gopath)) {
                Some(gopath) => gopath.join("pkg").join("mod"),
                None => match from_go("GOMODCACHE").ok().flatten() {
                    Some(cache) => PathBuf::from(cache),
                    None => default_gopath().join("pkg").join("mod"),
                },
            },
        };

        let goos = match lookup("GOOS") {
            Some(goos) => goos,
            None => from_go("GOOS")
                .ok()
                .flatten()
                .unwrap_or_else(|| host_os().to_string()),
        };

        let goarch = match lookup("GOARCH") {
            Some(goarch) => goarch,
            None => from_go("GOARCH")
                .ok()
                .flatten()
                .unwrap_or_else(|| host_arch().to_string()),
        };

        Ok(Self {
            goroot: PathBuf::from(goroot),
            gomodcache,
            goos,
            goarch,
        })
    }

    /// Directory holding the standard library sources
    pub fn std_src(&self) -> PathBuf {
        self.goroot.join("src")
    }

    /// Whether the target OS satisfies the `unix` build tag
    pub fn is_unix(&self) -> bool {
        UNIX_OS.contains(&self.goos.as_str())
    }
}

/// Ask the `go` tool for its settings
fn query_go_env() -> Result<HashMap<String, String>, GoPkgViewError> {
    let go = require_tool("go", "locating GOROOT")?;
    let output = run_captured(&go.path, &["env", "-json", "GOROOT", "GOMODCACHE", "GOOS", "GOARCH"])
        .map_err(|e| GoPkgViewError::Config {
            message: "go env failed".to_string(),
            source: Some(e),
            hint: Some(hints::go_toolchain().to_string()),
        })?;

    serde_json::from_str(&output).map_err(|e| GoPkgViewError::Config {
        message: "unexpected output from go env -json".to_string(),
        source: Some(e.into()),
        hint: None,
    })
}

fn first_path(list: &str) -> Option<PathBuf> {
    std::env::split_paths(list).find(|p| !p.as_os_str().is_empty())
}

fn default_gopath() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("go"))
        .unwrap_or_else(|| PathBuf::from("go"))
}

/// GOOS of the machine gopkgview runs on
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// GOARCH of the machine gopkgview runs on
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "386",
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "powerpc" => "ppc",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "sparc64" => "sparc64",
        other => other,
    }
}
