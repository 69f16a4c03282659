//! Result of a single walk.

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::error::WalkWarning;
use crate::node::Directory;

/// Summary statistics for a walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Number of files kept.
    pub files: u64,
    /// Number of directories kept, not counting the root.
    pub dirs: u64,
    /// Total size of kept files in bytes.
    pub total_size: u64,
    /// Deepest level reached (root children are at depth 1).
    pub max_depth: u32,
}

impl WalkStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a kept file.
    pub fn record_file(&mut self, size: u64, depth: u32) {
        self.files += 1;
        self.total_size += size;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a kept directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }
}

/// A freshly walked tree plus what is known about how it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Root directory of the tree.
    pub root: Directory,
    /// When the walk began.
    pub walked_at: SystemTime,
    /// How long the walk took.
    pub walk_duration: Duration,
    /// Summary statistics.
    pub stats: WalkStats,
    /// Entries that were skipped because they could not be read.
    pub warnings: Vec<WalkWarning>,
}

impl Snapshot {
    /// Check if any entries were skipped.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Take the tree, dropping the walk metadata.
    pub fn into_root(self) -> Directory {
        self.root
    }
}
