//! Filesystem walker for dircache.
//!
//! This crate turns a directory on disk into an immutable
//! [`Snapshot`](dircache_core::Snapshot) using jwalk for traversal.
//!
//! # Overview
//!
//! - **Filtering by name**: every entry name is tested against a
//!   [`NameFilter`]; a rejected directory is never descended into
//! - **Deterministic ordering**: directories first, then files, each by name,
//!   so two walks of an unchanged tree compare equal
//! - **Tolerant**: entries that vanish or cannot be read mid-walk are skipped
//!   and reported as warnings; only a bad root fails the walk
//!
//! # Example
//!
//! ```rust,no_run
//! use dircache_walk::{walk, NameFilter};
//!
//! let filter = NameFilter::include_files(["*.txt"]).unwrap();
//! let snapshot = walk("/path/to/docs", filter).unwrap();
//!
//! println!("{} files", snapshot.root.file_count());
//! for file in snapshot.root.files() {
//!     println!("{} ({} bytes)", file.path().display(), file.size());
//! }
//! ```

mod walker;

pub use walker::{Walker, walk};

// Re-export core types for convenience
pub use dircache_core::{
    CacheConfig, CacheError, Directory, File, FilterMode, NameFilter, Node, Snapshot, WalkStats,
    WalkWarning, WarningKind,
};
