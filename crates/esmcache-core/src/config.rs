//! Static cache configuration.
//!
//! Nothing here is probed from the host at runtime: whatever optional
//! behaviour the cache uses (gzip artifacts, the cache directory layout) is
//! supplied up front by the integration, either in code or from a JSON/YAML
//! file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::{CacheError, Result};

/// Default cache directory, relative to a package root
pub const DEFAULT_CACHE_DIR: &str = "node_modules/.cache/esm";

/// Configuration shared by every package cache in one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory relative to the package root
    pub cache_dir: PathBuf,

    /// Write compiled artifacts gzip-compressed (`.js.gz` keys)
    pub gzip: bool,

    /// Disable persistence entirely; every package cache is memory-only
    pub memory_only: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            gzip: false,
            memory_only: false,
        }
    }
}

impl CacheConfig {
    /// Parse configuration from a JSON document
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(CacheError::from)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(CacheError::from)
    }

    /// Load configuration from a file, picking the format by extension.
    ///
    /// `.yaml` and `.yml` are read as YAML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&source),
            _ => Self::from_json_str(&source),
        }
    }

    /// Cache path for a package rooted at `package_dir`, or `None` when
    /// persistence is disabled
    pub fn cache_path_for(&self, package_dir: &Path) -> Option<PathBuf> {
        if self.memory_only {
            return None;
        }
        Some(package_dir.join(&self.cache_dir))
    }
}
