//! Polling directory cache.
//!
//! [`DirCache`] keeps an immutable snapshot of a directory tree in memory and
//! re-walks it on a fixed interval. When a walk finds a structurally
//! different tree (an entry added or removed, or a file size changed) the new
//! tree is published atomically and the registered callback runs.
//!
//! Readers call [`DirCache::root`] and get an `Arc<Directory>` they can hold
//! for as long as they like; later refreshes never mutate it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dircache_engine::{CacheEvent, DirCache, NameFilter};
//!
//! let filter = NameFilter::include_files(["*.md"]).unwrap();
//! let cache = DirCache::cache("/srv/docs", Duration::from_secs(1), filter).unwrap();
//! let mut events = cache.subscribe();
//! cache.start().unwrap();
//!
//! while let Ok(event) = events.blocking_recv() {
//!     if let CacheEvent::Changed { stats, .. } = event {
//!         println!("{} markdown files", stats.files);
//!     }
//! }
//! ```

mod cache;
mod event;

pub use cache::{Callback, DirCache};
pub use event::CacheEvent;

// Re-export core types for convenience
pub use dircache_core::{
    CacheConfig, CacheConfigBuilder, CacheError, CacheState, Directory, File, FilterMode,
    NameFilter, Node, TreeNode, WalkStats,
};
