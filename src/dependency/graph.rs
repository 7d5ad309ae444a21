//! Package graph produced by a build
//!
//! A [`Graph`] is only ever handed out once every resolution task finished,
//! so it is read-only and can be serialized without further synchronization.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::resolver::ResolutionError;

/// Classification of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageType {
    /// Part of the Go distribution
    #[serde(rename = "std")]
    StdLib,
    /// Declared in go.mod, or a package underneath a declared module
    #[serde(rename = "ext")]
    ExtLib,
    /// Belongs to the module being analyzed
    #[serde(rename = "loc")]
    Local,
    /// Could not be resolved
    #[serde(rename = "err")]
    Err,
}

impl PackageType {
    pub const ALL: [PackageType; 4] = [
        PackageType::Local,
        PackageType::StdLib,
        PackageType::ExtLib,
        PackageType::Err,
    ];

    /// Short tag used in JSON and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::StdLib => "std",
            PackageType::ExtLib => "ext",
            PackageType::Local => "loc",
            PackageType::Err => "err",
        }
    }

    /// Graphviz fill color
    fn color(&self) -> &'static str {
        match self {
            PackageType::StdLib => "lightgrey",
            PackageType::ExtLib => "lightblue",
            PackageType::Local => "lightgreen",
            PackageType::Err => "salmon",
        }
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        PackageType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown package type {:?} (expected std, ext, loc or err)", s))
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    pub import_path: String,
    pub name: String,
    #[serde(rename = "PkgType")]
    pub pkg_type: PackageType,
}

/// `from` imports `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Finished package graph
///
/// Nodes and edges keep the order in which they were discovered. The edge
/// list is the source of truth for topology: an edge may point at a path
/// that has no node, e.g. when the target was hidden from the output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    failures: Vec<ResolutionError>,
}

impl Graph {
    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        failures: Vec<ResolutionError>,
    ) -> Self {
        Self {
            nodes,
            edges,
            failures,
        }
    }

    /// All nodes in discovery order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges in discovery order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Resolution failures behind the `err` nodes
    pub fn failures(&self) -> &[ResolutionError] {
        &self.failures
    }

    /// Look up a node by import path
    pub fn node(&self, import_path: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.import_path == import_path)
    }

    /// Copy of the graph without nodes of the given types
    ///
    /// Edges pointing at a hidden package are dropped together with it.
    pub fn without(&self, hidden: &[PackageType]) -> Graph {
        if hidden.is_empty() {
            return self.clone();
        }

        let removed: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| hidden.contains(&n.pkg_type))
            .map(|n| n.import_path.as_str())
            .collect();

        Graph {
            nodes: self
                .nodes
                .iter()
                .filter(|n| !removed.contains(n.import_path.as_str()))
                .cloned()
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|e| {
                    !removed.contains(e.from.as_str()) && !removed.contains(e.to.as_str())
                })
                .cloned()
                .collect(),
            failures: if hidden.contains(&PackageType::Err) {
                Vec::new()
            } else {
                self.failures.clone()
            },
        }
    }

    /// Node and edge counts
    pub fn stats(&self) -> GraphStats {
        let mut by_type: HashMap<PackageType, usize> = HashMap::new();
        for node in &self.nodes {
            *by_type.entry(node.pkg_type).or_insert(0) += 1;
        }

        let count = |t: PackageType| by_type.get(&t).copied().unwrap_or(0);
        GraphStats {
            local: count(PackageType::Local),
            std_lib: count(PackageType::StdLib),
            ext_lib: count(PackageType::ExtLib),
            failed: count(PackageType::Err),
            edges: self.edges.len(),
        }
    }

    /// Render as a Graphviz digraph
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph packages {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=filled, fontname=\"Helvetica\"];\n");
        out.push('\n');

        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\\n{}\", fillcolor={}];",
                escape_dot(&node.import_path),
                escape_dot(&node.name),
                escape_dot(&node.import_path),
                node.pkg_type.color()
            );
        }

        out.push('\n');
        for edge in &self.edges {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\";",
                escape_dot(&edge.from),
                escape_dot(&edge.to)
            );
        }

        out.push_str("}\n");
        out
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Statistics about a package graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    /// Packages of the analyzed module
    pub local: usize,

    /// Standard library packages
    pub std_lib: usize,

    /// Packages of declared requirements
    pub ext_lib: usize,

    /// Identifiers that failed to resolve
    pub failed: usize,

    /// Number of import edges
    pub edges: usize,
}

impl GraphStats {
    pub fn total(&self) -> usize {
        self.local + self.std_lib + self.ext_lib + self.failed
    }
}
