//! Entry name filtering.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// How the patterns of a [`NameFilter`] are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Files and directories are kept only if their name matches.
    #[default]
    Include,
    /// Files are kept only if their name matches; every directory is traversed.
    IncludeFiles,
    /// Files and directories whose name matches are dropped.
    Exclude,
}

/// Decides which directory entries end up in a snapshot.
///
/// Patterns are globs matched against the entry name only, never the full
/// path. A directory that fails the filter is dropped along with its whole
/// subtree.
#[derive(Debug, Clone)]
pub struct NameFilter {
    patterns: Vec<String>,
    set: GlobSet,
    mode: FilterMode,
}

impl NameFilter {
    /// Compile a filter from glob patterns.
    pub fn new<I, S>(patterns: I, mode: FilterMode) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern).map_err(|source| CacheError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| CacheError::InvalidPattern {
            pattern: patterns.join(","),
            source,
        })?;
        Ok(Self {
            patterns,
            set,
            mode,
        })
    }

    /// Keep only files and directories whose names match.
    pub fn include<I, S>(patterns: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(patterns, FilterMode::Include)
    }

    /// Keep only files whose names match, descending into every directory.
    pub fn include_files<I, S>(patterns: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(patterns, FilterMode::IncludeFiles)
    }

    /// Drop files and directories whose names match.
    pub fn exclude<I, S>(patterns: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(patterns, FilterMode::Exclude)
    }

    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
            mode: FilterMode::Exclude,
        }
    }

    /// Whether a file with this name belongs in the snapshot.
    pub fn matches_file(&self, name: &str) -> bool {
        match self.mode {
            FilterMode::Include | FilterMode::IncludeFiles => self.set.is_match(name),
            FilterMode::Exclude => !self.set.is_match(name),
        }
    }

    /// Whether a directory with this name belongs in the snapshot.
    pub fn matches_dir(&self, name: &str) -> bool {
        match self.mode {
            FilterMode::Include => self.set.is_match(name),
            FilterMode::IncludeFiles => true,
            FilterMode::Exclude => !self.set.is_match(name),
        }
    }

    /// The source patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// How the patterns are applied.
    pub fn mode(&self) -> FilterMode {
        self.mode
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_applies_to_dirs() {
        let filter = NameFilter::include(["*.txt"]).unwrap();
        assert!(filter.matches_file("readme.txt"));
        assert!(!filter.matches_file("notes.log"));
        assert!(!filter.matches_dir("docs"));
    }

    #[test]
    fn test_include_files_traverses_dirs() {
        let filter = NameFilter::include_files(["*.txt"]).unwrap();
        assert!(filter.matches_file("readme.txt"));
        assert!(!filter.matches_file("notes.log"));
        assert!(filter.matches_dir("docs"));
    }

    #[test]
    fn test_exclude() {
        let filter = NameFilter::exclude(["target", "*.log"]).unwrap();
        assert!(!filter.matches_dir("target"));
        assert!(!filter.matches_file("build.log"));
        assert!(filter.matches_file("main.rs"));
        assert!(filter.matches_dir("src"));
    }

    #[test]
    fn test_all() {
        let filter = NameFilter::all();
        assert!(filter.matches_file(".hidden"));
        assert!(filter.matches_dir("anything"));
        assert!(filter.patterns().is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = NameFilter::include(["a[b"]).unwrap_err();
        assert!(matches!(err, CacheError::InvalidPattern { ref pattern, .. } if pattern == "a[b"));
    }
}
