//! Core types and traits for dircache.
//!
//! This crate provides the immutable snapshot data model shared by the
//! walker and the cache engine: the generic tree abstraction, file and
//! directory nodes with change-detecting equality, name filters, errors,
//! and configuration.

mod config;
mod error;
mod filter;
mod node;
mod snapshot;
mod tree;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::{CacheError, CacheState, WalkWarning, WarningKind};
pub use filter::{FilterMode, NameFilter};
pub use node::{Directory, File, Node};
pub use snapshot::{Snapshot, WalkStats};
pub use tree::{DepthFirst, NamedNode, TreeNode};
