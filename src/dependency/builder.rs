//! Concurrent package graph construction
//!
//! Starting from the root package, every local package's imports are fed back
//! into a bounded worker pool until nothing is left in flight. Each import path
//! is resolved at most once per build: identifiers are first mapped to their
//! canonical import path (`./util` from `/src/m/a` is `m/a/util`), then
//! dispatch is gated by an atomic check-and-insert of that path into the
//! visited set, done under the same lock that guards the node and edge lists.
//!
//! ```text
//! schedule(id) ──canonical──visited?──> spawn ──> resolve ──ok──> classify ──loc──> edges + schedule(imports)
//!                              │                    │                 └──std/ext──> leaf
//!                              └──yes──> drop       └──err──> err node (branch ends)
//! ```

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::{Scope, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

use super::graph::{Edge, Graph, Node, PackageType};
use super::prefix_index::PathTrie;
use super::resolver::{ImportResolver, PackageInfo, ResolutionError};

/// Identifier of the package in the module root directory
pub const ROOT_PACKAGE: &str = ".";

/// Default number of concurrently executing resolution tasks
pub const DEFAULT_MAX_WORKERS: usize = 20;

/// Errors that abort a build
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("max workers must be at least 1")]
    InvalidWorkerCount,

    #[error("failed to start resolver pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),

    #[error("graph build cancelled")]
    Cancelled,
}

/// Called for every node as soon as it is recorded
pub type NodeObserver = Arc<dyn Fn(&Node) + Send + Sync>;

/// Builds a [`Graph`] by resolving imports on a bounded pool of workers
pub struct GraphBuilder {
    resolver: Arc<dyn ImportResolver>,
    index: Arc<PathTrie>,
    max_workers: usize,
    cancel: Option<Arc<AtomicBool>>,
    observer: Option<NodeObserver>,
}

impl GraphBuilder {
    /// Create a builder classifying packages against `index`
    pub fn new(resolver: Arc<dyn ImportResolver>, index: PathTrie) -> Self {
        Self {
            resolver,
            index: Arc::new(index),
            max_workers: DEFAULT_MAX_WORKERS,
            cancel: None,
            observer: None,
        }
    }

    /// Limit the number of resolutions running at the same time
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Abandon pending work once `flag` is raised
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Get notified of every recorded node
    pub fn observer(mut self, observer: NodeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the graph of the package in `root_dir`
    pub fn build(&self, root_dir: &Path) -> Result<Graph, BuildError> {
        self.build_from(ROOT_PACKAGE, root_dir)
    }

    /// Build the graph starting at `identifier`, resolved from `src_dir`
    ///
    /// Returns only after the root task and every task it transitively
    /// spawned have finished.
    pub fn build_from(&self, identifier: &str, src_dir: &Path) -> Result<Graph, BuildError> {
        if self.max_workers == 0 {
            return Err(BuildError::InvalidWorkerCount);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .thread_name(|i| format!("gopkgview-resolve-{}", i))
            .build()?;

        let accumulator = Accumulator::default();
        let task = Task {
            resolver: self.resolver.as_ref(),
            index: self.index.as_ref(),
            accumulator: &accumulator,
            cancel: self.cancel.as_deref(),
            observer: self.observer.as_deref(),
            skipped: AtomicBool::new(false),
        };

        let root = Import {
            import_path: self.resolver.canonical(identifier, src_dir),
            identifier: identifier.to_string(),
            src_dir: src_dir.to_path_buf(),
        };
        pool.scope(|scope| task.schedule(scope, root));

        // A flag raised after the last task finished leaves the graph complete
        if task.skipped.load(Ordering::Relaxed) {
            return Err(BuildError::Cancelled);
        }

        Ok(accumulator.into_graph())
    }
}

/// Classify a resolved package
fn classify(pkg: &PackageInfo, index: &PathTrie) -> PackageType {
    if pkg.goroot {
        PackageType::StdLib
    } else if index.has_prefix(&pkg.import_path) {
        PackageType::ExtLib
    } else {
        PackageType::Local
    }
}

/// Lifecycle of an identifier within one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Dispatched,
    Resolved,
    Failed,
}

#[derive(Default)]
struct State {
    visited: HashMap<String, Visit>,
    node_paths: HashSet<String>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    failures: Vec<ResolutionError>,
}

/// Graph state shared by all tasks of a build
#[derive(Default)]
struct Accumulator {
    state: Mutex<State>,
}

impl Accumulator {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Nothing in a critical section can leave State half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `import_path` as dispatched; false when it already was
    fn dispatch(&self, import_path: &str) -> bool {
        match self.lock().visited.entry(import_path.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Visit::Dispatched);
                true
            }
        }
    }

    fn finish(state: &mut State, import_path: &str, outcome: Visit) {
        let previous = state.visited.insert(import_path.to_string(), outcome);
        debug_assert_eq!(
            previous,
            Some(Visit::Dispatched),
            "{} finished without a matching dispatch",
            import_path
        );
    }

    /// Record a node; returns it unless the import path was already present
    fn add_node(&self, dispatched: &str, node: Node) -> Option<Node> {
        let mut state = self.lock();
        Self::finish(&mut state, dispatched, Visit::Resolved);
        Self::push_node(&mut state, node)
    }

    fn add_failure(&self, import_path: &str, error: ResolutionError) -> Option<Node> {
        let mut state = self.lock();
        Self::finish(&mut state, import_path, Visit::Failed);
        let node = Node {
            import_path: import_path.to_string(),
            name: format!("[err] {}", import_path),
            pkg_type: PackageType::Err,
        };
        state.failures.push(error);
        Self::push_node(&mut state, node)
    }

    fn push_node(state: &mut State, node: Node) -> Option<Node> {
        // Different identifiers (`.` and the module path) can name one package
        if !state.node_paths.insert(node.import_path.clone()) {
            return None;
        }
        state.nodes.push(node.clone());
        Some(node)
    }

    fn add_edge(&self, from: &str, to: &str) {
        self.lock().edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn into_graph(self) -> Graph {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        Graph::from_parts(state.nodes, state.edges, state.failures)
    }
}

/// An import waiting to be resolved
struct Import {
    /// Canonical path, the visited-set key
    import_path: String,
    /// Identifier as written in the importing source
    identifier: String,
    /// Directory of the importing package
    src_dir: PathBuf,
}

/// Everything a resolution task needs, borrowed for the duration of a build
struct Task<'a> {
    resolver: &'a dyn ImportResolver,
    index: &'a PathTrie,
    accumulator: &'a Accumulator,
    cancel: Option<&'a AtomicBool>,
    observer: Option<&'a (dyn Fn(&Node) + Send + Sync)>,
    /// Set when a dispatched import was dropped because of cancellation
    skipped: AtomicBool,
}

impl<'a> Task<'a> {
    fn is_cancelled(&self) -> bool {
        self.cancel.map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Spawn a resolution task unless the import path was already dispatched
    fn schedule<'scope>(&'scope self, scope: &Scope<'scope>, import: Import)
    where
        'a: 'scope,
    {
        if !self.accumulator.dispatch(&import.import_path) {
            return;
        }
        scope.spawn(move |scope| self.run(scope, import));
    }

    fn run<'scope>(&'scope self, scope: &Scope<'scope>, import: Import)
    where
        'a: 'scope,
    {
        if self.is_cancelled() {
            self.skipped.store(true, Ordering::Relaxed);
            return;
        }

        let pkg = match self.resolver.resolve(&import.identifier, &import.src_dir) {
            Ok(pkg) => pkg,
            Err(error) => {
                let node = self.accumulator.add_failure(&import.import_path, error);
                self.notify(node);
                return;
            }
        };

        let pkg_type = classify(&pkg, self.index);
        let node = self.accumulator.add_node(
            &import.import_path,
            Node {
                import_path: pkg.import_path.clone(),
                name: pkg.name.clone(),
                pkg_type,
            },
        );
        self.notify(node);

        // Standard and external packages are leaves
        if pkg_type != PackageType::Local {
            return;
        }

        for identifier in pkg.imports {
            // Imports resolve relative to the importing package
            let import_path = self.resolver.canonical(&identifier, &pkg.dir);
            self.accumulator.add_edge(&pkg.import_path, &import_path);
            self.schedule(
                scope,
                Import {
                    import_path,
                    identifier,
                    src_dir: pkg.dir.clone(),
                },
            );
        }
    }

    fn notify(&self, node: Option<Node>) {
        if let (Some(observer), Some(node)) = (self.observer, node) {
            observer(&node);
        }
    }
}
