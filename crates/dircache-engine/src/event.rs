//! Events broadcast after every tick.

use std::path::PathBuf;
use std::time::SystemTime;

use dircache_core::WalkStats;

/// Outcome of one walk, as seen by subscribers.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A structurally different tree was published.
    Changed {
        /// When the walk that produced the new tree began.
        walked_at: SystemTime,
        /// Statistics of the new tree.
        stats: WalkStats,
    },
    /// The walk matched the published tree; only the walk time advanced.
    Unchanged {
        /// When the confirming walk began.
        walked_at: SystemTime,
    },
    /// The walk failed; the previous tree stays published.
    WalkFailed {
        /// Root that could not be walked.
        root: PathBuf,
        /// Human-readable error.
        message: String,
    },
}

impl CacheEvent {
    /// Check if this event reports a newly published tree.
    pub fn is_change(&self) -> bool {
        matches!(self, CacheEvent::Changed { .. })
    }

    /// Check if this event reports a failed walk.
    pub fn is_failure(&self) -> bool {
        matches!(self, CacheEvent::WalkFailed { .. })
    }
}
