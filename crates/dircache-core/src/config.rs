//! Cache configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::filter::{FilterMode, NameFilter};

/// Configuration for a directory cache and the walks it performs.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct CacheConfig {
    /// Root directory to snapshot.
    pub root: PathBuf,

    /// Time between refreshes.
    #[builder(default = "default_interval()")]
    #[serde(default = "default_interval")]
    pub interval: Duration,

    /// Glob patterns matched against entry names.
    #[builder(default = "default_patterns()")]
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// How `patterns` are applied.
    #[builder(default)]
    #[serde(default)]
    pub filter_mode: FilterMode,

    /// Follow symbolic links.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Number of threads for walking (0 = shared pool, 1 = serial).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_patterns() -> Vec<String> {
    vec!["*".to_string()]
}

impl CacheConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            Some(_) => {}
            None => return Err("Root path is required".to_string()),
        }
        if self.interval.is_some_and(|interval| interval.is_zero()) {
            return Err("Refresh interval must be greater than zero".to_string());
        }
        if let Some(ref patterns) = self.patterns {
            NameFilter::new(patterns.iter().cloned(), self.filter_mode.unwrap_or_default())
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl CacheConfig {
    /// Create a new cache config builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Create a simple config that keeps every entry under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interval: default_interval(),
            patterns: default_patterns(),
            filter_mode: FilterMode::default(),
            follow_symlinks: true,
            include_hidden: true,
            max_depth: None,
            threads: 0,
        }
    }

    /// Check a config that did not come through the builder.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.root.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig {
                message: "Root path cannot be empty".to_string(),
            });
        }
        if self.interval.is_zero() {
            return Err(CacheError::InvalidConfig {
                message: "Refresh interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Compile the name filter described by `patterns` and `filter_mode`.
    pub fn name_filter(&self) -> Result<NameFilter, CacheError> {
        NameFilter::new(self.patterns.iter().cloned(), self.filter_mode)
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
