//! Configuration for opening a cache

use crate::DATA_FILE_NAME;
use jagcache_formats::MAX_DECOMPRESSION_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk layout of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Native when the data file exists, directory mirror otherwise
    #[default]
    Auto,
    /// Sector-chained data file with index files
    Native,
    /// One file per group under category directories
    Directory,
}

/// Configuration for opening a cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cache root directory
    pub path: PathBuf,

    /// Layout of the cache
    pub kind: StoreKind,

    /// Fail to open a native cache without the reference table index
    pub require_reference_index: bool,

    /// Largest uncompressed length a container may declare (in bytes)
    pub max_decompressed_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./cache"),
            kind: StoreKind::Auto,
            require_reference_index: true,
            max_decompressed_size: MAX_DECOMPRESSION_SIZE, // 1 GiB
        }
    }
}

impl StoreConfig {
    /// Create a new configuration for the specified cache directory
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the cache directory
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Set the cache layout
    #[must_use]
    pub const fn with_kind(mut self, kind: StoreKind) -> Self {
        self.kind = kind;
        self
    }

    /// Require or waive the reference table index
    #[must_use]
    pub const fn with_reference_index(mut self, required: bool) -> Self {
        self.require_reference_index = required;
        self
    }

    /// Set the decompression ceiling
    #[must_use]
    pub const fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Layout to open, with `Auto` resolved against the file system
    pub fn resolved_kind(&self) -> StoreKind {
        match self.kind {
            StoreKind::Auto if self.path.join(DATA_FILE_NAME).is_file() => StoreKind::Native,
            StoreKind::Auto => StoreKind::Directory,
            kind => kind,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("/tmp/cache");
        assert_eq!(config.path, PathBuf::from("/tmp/cache"));
        assert_eq!(config.kind, StoreKind::Auto);
        assert!(config.require_reference_index);
        assert_eq!(config.max_decompressed_size, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::default()
            .with_path("mirror")
            .with_kind(StoreKind::Directory)
            .with_reference_index(false)
            .with_max_decompressed_size(4096);
        assert_eq!(config.path, PathBuf::from("mirror"));
        assert_eq!(config.resolved_kind(), StoreKind::Directory);
        assert!(!config.require_reference_index);
        assert_eq!(config.max_decompressed_size, 4096);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"path": "/srv/cache", "kind": "native"}"#).unwrap();
        assert_eq!(config.kind, StoreKind::Native);
        assert!(config.require_reference_index);
        assert_eq!(config.max_decompressed_size, MAX_DECOMPRESSION_SIZE);

        let json = serde_json::to_string(&StoreConfig::new("x")).unwrap();
        assert!(json.contains(r#""kind":"auto""#));
    }

    #[test]
    fn test_auto_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path());
        assert_eq!(config.resolved_kind(), StoreKind::Directory);

        std::fs::write(dir.path().join(DATA_FILE_NAME), b"").unwrap();
        assert_eq!(config.resolved_kind(), StoreKind::Native);
    }
}
