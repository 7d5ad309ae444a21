//! Package dependency graph
//!
//! This module provides the requirement prefix index, the resolver interface,
//! the concurrent graph builder and the finished graph it produces.

pub mod builder;
pub mod graph;
pub mod prefix_index;
pub mod resolver;

pub use builder::{BuildError, GraphBuilder, NodeObserver, DEFAULT_MAX_WORKERS};
pub use graph::{Graph, Node, PackageType};
pub use prefix_index::PathTrie;
pub use resolver::{ImportResolver, PackageInfo, ResolutionError};
