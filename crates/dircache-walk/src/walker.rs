//! JWalk-based directory walker.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jwalk::{Parallelism, WalkDir};
use tracing::{debug, trace};

use dircache_core::{
    CacheConfig, CacheError, Directory, File, NameFilter, Node, Snapshot, WalkStats, WalkWarning,
    WarningKind,
};

/// Builds snapshot trees by walking the filesystem under a configured root.
///
/// The walker is cheap to keep around and may be used for any number of
/// walks; each call to [`Walker::walk`] produces a brand new tree.
#[derive(Debug, Clone)]
pub struct Walker {
    config: Arc<CacheConfig>,
    filter: Arc<NameFilter>,
}

impl Walker {
    /// Create a walker, compiling the name filter described by `config`.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let filter = config.name_filter()?;
        Ok(Self::with_filter(config, filter))
    }

    /// Create a walker with an already compiled filter.
    ///
    /// `config.patterns` and `config.filter_mode` are ignored.
    pub fn with_filter(config: CacheConfig, filter: NameFilter) -> Self {
        Self {
            config: Arc::new(config),
            filter: Arc::new(filter),
        }
    }

    /// The configuration this walker uses.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The filter applied to every entry name.
    pub fn filter(&self) -> &NameFilter {
        &self.filter
    }

    /// Walk the root and build a new snapshot.
    ///
    /// Fails only if the root itself is missing, unreadable, or not a
    /// directory. Problems with individual entries are recorded as warnings
    /// and the entry is left out.
    pub fn walk(&self) -> Result<Snapshot, CacheError> {
        let start = Instant::now();
        let walked_at = SystemTime::now();
        let root_path = self.config.root.as_path();

        let root_metadata =
            std::fs::metadata(root_path).map_err(|e| CacheError::io(root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(CacheError::NotADirectory {
                path: root_path.to_path_buf(),
            });
        }

        let mut stats = WalkStats::new();
        let mut warnings = Vec::new();

        let mut entries = self.collect_entries(root_path, &mut stats, &mut warnings);
        let root = build_directory(root_path, modified_of(&root_metadata), &mut entries);

        let walk_duration = start.elapsed();
        trace!(
            root = %root_path.display(),
            files = stats.files,
            dirs = stats.dirs,
            warnings = warnings.len(),
            elapsed_ms = walk_duration.as_millis() as u64,
            "walk complete"
        );

        Ok(Snapshot {
            root,
            walked_at,
            walk_duration,
            stats,
            warnings,
        })
    }

    /// Collect every kept entry, grouped by parent directory.
    fn collect_entries(
        &self,
        root_path: &Path,
        stats: &mut WalkStats,
        warnings: &mut Vec<WalkWarning>,
    ) -> HashMap<PathBuf, Vec<EntryInfo>> {
        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            1 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        // Rejected directories are removed before jwalk reads them, so their
        // subtrees are never visited.
        let config = Arc::clone(&self.config);
        let filter = Arc::clone(&self.filter);
        let walker = WalkDir::new(root_path)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(self.config.follow_symlinks)
            .sort(false)
            .min_depth(1)
            .max_depth(
                self.config
                    .max_depth
                    .map(|d| d as usize)
                    .unwrap_or(usize::MAX),
            )
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|result| match result {
                    Ok(entry) if entry.depth > 0 => {
                        let name = entry.file_name.to_string_lossy();
                        if config.should_skip_hidden(&name) {
                            false
                        } else if entry.file_type.is_dir() {
                            filter.matches_dir(&name)
                        } else {
                            filter.matches_file(&name)
                        }
                    }
                    _ => true,
                });
            });

        let mut entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>> = HashMap::new();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root_path.to_path_buf());
                    debug!(path = %path.display(), error = %err, "skipping unreadable entry");
                    warnings.push(entry_warning(path, &err));
                    continue;
                }
            };

            let path = entry.path();

            if let Some(ref err) = entry.read_children_error {
                debug!(path = %path.display(), error = %err, "directory could not be listed");
                warnings.push(entry_warning(&path, err));
            }

            // The entry may have vanished since its parent was listed
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping entry without metadata");
                    warnings.push(WalkWarning::metadata(&path, &err));
                    continue;
                }
            };

            let depth = entry.depth as u32;
            let kind = if metadata.is_dir() {
                stats.record_dir(depth);
                EntryKind::Directory
            } else if metadata.is_file() {
                stats.record_file(metadata.len(), depth);
                EntryKind::File {
                    size: metadata.len(),
                }
            } else {
                trace!(path = %path.display(), "skipping special file");
                continue;
            };

            let Some(parent) = path.parent().map(Path::to_path_buf) else {
                continue;
            };
            entries_by_parent.entry(parent).or_default().push(EntryInfo {
                modified: modified_of(&metadata),
                path,
                kind,
            });
        }

        entries_by_parent
    }
}

/// Walk `root`, keeping entries accepted by `filter`, with default options.
pub fn walk(root: impl Into<PathBuf>, filter: NameFilter) -> Result<Snapshot, CacheError> {
    Walker::with_filter(CacheConfig::new(root), filter).walk()
}

/// Recursively assemble a directory node from the collected entries.
fn build_directory(
    path: &Path,
    modified: SystemTime,
    entries_by_parent: &mut HashMap<PathBuf, Vec<EntryInfo>>,
) -> Directory {
    let entries = entries_by_parent.remove(path).unwrap_or_default();

    let mut children: Vec<Node> = Vec::with_capacity(entries.len());
    for entry in entries {
        let child = match entry.kind {
            EntryKind::File { size } => File::new(entry.path, entry.modified, size).into(),
            EntryKind::Directory => {
                build_directory(&entry.path, entry.modified, entries_by_parent).into()
            }
        };
        children.push(child);
    }

    // Listing order varies between walks; equality needs a stable order
    children.sort_by(Node::sibling_order);

    Directory::new(path, modified, children)
}

fn entry_warning(path: impl Into<PathBuf>, err: &jwalk::Error) -> WalkWarning {
    match err.io_error() {
        Some(io) => WalkWarning::from_io(path, io),
        None => WalkWarning::new(path, err.to_string(), WarningKind::EntryUnreadable),
    }
}

fn modified_of(metadata: &Metadata) -> SystemTime {
    metadata.modified().unwrap_or(UNIX_EPOCH)
}

/// Temporary struct for collecting entry information.
struct EntryInfo {
    path: PathBuf,
    modified: SystemTime,
    kind: EntryKind,
}

enum EntryKind {
    File { size: u64 },
    Directory,
}
