//! Graph command - Build the package import graph of a module
//!
//! Usage:
//!   gopkgview graph                      # JSON on stdout
//!   gopkgview graph --format dot         # Graphviz DOT
//!   gopkgview graph --format text        # Per-type summary
//!   gopkgview graph --hide std,ext       # Leave packages out of the output
//!   gopkgview graph --max-workers 4      # Limit concurrent resolutions
//!   gopkgview graph --timeout 30         # Give up after 30 seconds

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use super::{write_output, ModuleArgs};
use crate::config::Settings;
use crate::dependency::{
    Graph, GraphBuilder, Node, NodeObserver, PackageType, DEFAULT_MAX_WORKERS,
};
use crate::error::{hints, GoPkgViewError};
use crate::golang::{GoEnv, GoResolver};
use crate::utils::terminal::{create_spinner, print_info, print_success, print_warning};

/// Output format for graph command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// JSON document with nodes and edges (default)
    #[default]
    Json,
    /// Graphviz DOT format
    Dot,
    /// Package counts and the list of packages
    Text,
}

/// Build the package import graph
#[derive(Args, Debug)]
pub struct GraphCommand {
    #[command(flatten)]
    pub module: ModuleArgs,

    /// Maximum number of packages resolved concurrently (default: 20)
    #[arg(long, short = 'j', env = "GO_PKGVIEW_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Output format: json, dot, text
    #[arg(long, short = 'f', value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Write the output to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Package types to leave out of the output: std, ext, err
    #[arg(long, value_delimiter = ',')]
    pub hide: Vec<PackageType>,

    /// Abort the build after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl GraphCommand {
    /// Execute the graph command
    pub fn execute(self, verbose: bool) -> Result<()> {
        let (root, gomod) = self.module.load()?;
        let settings = Settings::load_from_root(&root)?;

        let max_workers = self
            .max_workers
            .or(settings.graph.max_workers)
            .unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(GoPkgViewError::config_error_with_hint(
                "max workers must be at least 1",
                hints::max_workers(),
            )
            .into());
        }

        let hide = if self.hide.is_empty() {
            settings.graph.hide
        } else {
            self.hide
        };
        if hide.contains(&PackageType::Local) {
            return Err(GoPkgViewError::config_error_with_hint(
                "local packages cannot be hidden",
                "Use --hide with any of: std, ext, err",
            )
            .into());
        }

        let env = GoEnv::detect()?;
        if verbose {
            print_info(&format!(
                "Module {} (go {}) in {}",
                gomod.module,
                gomod.go_version.as_deref().unwrap_or("unknown"),
                root.display()
            ));
            if let Some(toolchain) = &gomod.toolchain {
                print_info(&format!("Toolchain {}", toolchain));
            }
            print_info(&format!(
                "GOROOT={} GOMODCACHE={} GOOS={} GOARCH={}",
                env.goroot.display(),
                env.gomodcache.display(),
                env.goos,
                env.goarch
            ));
            print_info(&format!(
                "{} requirements, {} workers",
                gomod.requires.len(),
                max_workers
            ));
        }

        let resolver = GoResolver::new(&root, gomod, env);
        let index = resolver.module().requirement_index();
        let module_path = resolver.module().module.clone();

        let cancel = Arc::new(AtomicBool::new(false));
        if let Some(secs) = self.timeout {
            let cancel = Arc::clone(&cancel);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(secs));
                cancel.store(true, Ordering::Relaxed);
            });
        }

        let spinner = create_spinner("Resolving packages...");
        let observer: NodeObserver = {
            let spinner = spinner.clone();
            let resolved = AtomicUsize::new(0);
            Arc::new(move |node: &Node| {
                let n = resolved.fetch_add(1, Ordering::Relaxed) + 1;
                spinner.set_message(format!("Resolved {} packages ({})", n, node.import_path));
            })
        };

        let built = GraphBuilder::new(Arc::new(resolver), index)
            .max_workers(max_workers)
            .observer(observer)
            .cancel_flag(cancel)
            .build(&root);
        spinner.finish_and_clear();
        let graph = built.map_err(GoPkgViewError::from)?;

        if verbose {
            if let Some(node) = graph.node(&module_path) {
                print_info(&format!("Root package {} ({})", node.name, node.import_path));
            }
            let stats = graph.stats();
            print_info(&format!(
                "Resolved {} packages and {} imports",
                stats.total(),
                stats.edges
            ));
        }
        report_failures(&graph, verbose);

        let graph = graph.without(&hide);
        let rendered = match self.format {
            OutputFormat::Json => {
                let mut json =
                    serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
                json.push('\n');
                json
            }
            OutputFormat::Dot => graph.to_dot(),
            OutputFormat::Text => render_text(&graph),
        };

        write_output(self.output.as_deref(), &rendered)?;
        if let Some(path) = &self.output {
            print_success(&format!("Graph written to {}", path.display()));
        }

        Ok(())
    }
}

fn report_failures(graph: &Graph, verbose: bool) {
    let failures = graph.failures();
    if failures.is_empty() {
        return;
    }

    print_warning(&format!(
        "{} package(s) could not be resolved{}",
        failures.len(),
        if verbose { ":" } else { " (use --verbose for details)" }
    ));
    if verbose {
        for failure in failures {
            eprintln!("  {}", failure);
        }
    }
}

fn render_text(graph: &Graph) -> String {
    let stats = graph.stats();
    let mut out = String::new();

    let _ = writeln!(out, "Packages: {}", stats.total());
    let _ = writeln!(out, "  local:    {}", stats.local);
    let _ = writeln!(out, "  std:      {}", stats.std_lib);
    let _ = writeln!(out, "  external: {}", stats.ext_lib);
    let _ = writeln!(out, "  failed:   {}", stats.failed);
    let _ = writeln!(out, "Imports:  {}", stats.edges);

    for pkg_type in PackageType::ALL {
        let mut paths: Vec<&str> = graph
            .nodes()
            .iter()
            .filter(|n| n.pkg_type == pkg_type)
            .map(|n| n.import_path.as_str())
            .collect();
        if paths.is_empty() {
            continue;
        }
        paths.sort_unstable();

        out.push('\n');
        let _ = writeln!(out, "[{}]", pkg_type);
        for path in paths {
            let _ = writeln!(out, "  {}", path);
        }
    }

    out
}
