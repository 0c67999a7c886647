//! Read-only storage layer for sector-chained game asset caches.
//!
//! A native cache directory holds one data file and up to 256 index files:
//!
//! - `main_file_cache.dat2`: fixed 520-byte sectors, each naming its owning
//!   group, its position in the chain and the next sector
//! - `main_file_cache.idx{N}`: one 6-byte record per group of category `N`
//!   giving the group's length and first sector
//!
//! Category 255 holds the reference table of every other category.
//! Extracted caches use a plain directory mirror instead,
//! `<root>/<category>/<group>.dat`. Both layouts sit behind the [`Store`]
//! trait, and [`Cache`] composes a store with decompression, reference
//! tables and archive unpacking.
//!
//! # Example
//!
//! ```rust,no_run
//! use jagcache_storage::{Cache, StoreConfig};
//!
//! # fn example() -> jagcache_storage::Result<()> {
//! let cache = Cache::open(&StoreConfig::new("/path/to/cache"))?;
//! let table = cache.reference_table(2)?;
//! println!("category 2 holds {} groups", table.len());
//!
//! for (id, bytes) in cache.files(2, 10)? {
//!     println!("file {id}: {} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use std::path::PathBuf;
use thiserror::Error;

// Sector codec
pub mod sector;

// Index records and discovery
pub mod index;

// Memory-mapped files
mod mapped;

// Sector chain reader
pub mod data_file;

// Store backends
pub mod store;

// Configuration
pub mod config;

// Read path facade
pub mod cache;

pub use cache::Cache;
pub use config::{StoreConfig, StoreKind};
pub use data_file::{DataFile, read_chain};
pub use index::{ArchiveRef, IndexFile, IndexRecord, IndexSet};
pub use jagcache_formats::ErrorKind;
pub use sector::{Sector, SectorField, SectorHeader, SectorLayout};
pub use store::{DirectoryStore, NativeStore, Store, open_store};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Byte-level format error.
    #[error(transparent)]
    Format(#[from] jagcache_formats::FormatError),

    /// Binary record could not be decoded.
    #[error("Binary decode error: {0}")]
    Binary(#[from] binrw::Error),

    /// The cache directory has no data file.
    #[error("Data file not found: {0}")]
    MissingDataFile(PathBuf),

    /// A required index file is absent.
    #[error("Index file for category {0} not found")]
    MissingIndex(u8),

    /// The store root directory does not exist.
    #[error("Cache directory not found: {0}")]
    MissingRoot(PathBuf),

    /// Category has no index file or directory.
    #[error("Category {0} not found")]
    CategoryNotFound(u8),

    /// Group is absent from its category.
    #[error("Group {group} not found in category {category}")]
    GroupNotFound {
        /// Category ID
        category: u8,
        /// Group ID
        group: u32,
    },

    /// Sub-file is absent from its group.
    #[error("File {file} not found in group {group} of category {category}")]
    FileNotFound {
        /// Category ID
        category: u8,
        /// Group ID
        group: u32,
        /// Sub-file ID
        file: u32,
    },

    /// A sector header names a different owner or position than expected.
    #[error("Sector {field} mismatch: expected {expected}, found {actual}")]
    SectorMismatch {
        /// Header field that disagreed
        field: SectorField,
        /// Value the chain walk expected
        expected: u32,
        /// Value stored in the sector
        actual: u32,
    },

    /// A sector pointer lies outside the data file.
    #[error("Sector {sector} out of bounds (data file holds {sectors} sectors)")]
    SectorOutOfBounds {
        /// Requested sector number
        sector: u32,
        /// Whole sectors in the data file
        sectors: usize,
    },

    /// The chain ended before the group was complete.
    #[error("Group shorter than expected: chain ended after {actual} of {expected} bytes")]
    ChainEnded {
        /// Length recorded in the index
        expected: usize,
        /// Bytes gathered before the chain ended
        actual: usize,
    },

    /// Reassembled group length disagrees with its index record.
    #[error("Group length mismatch: expected {expected} bytes, read {actual}")]
    LengthMismatch {
        /// Length recorded in the index
        expected: usize,
        /// Bytes gathered
        actual: usize,
    },

    /// A sector slice is too short to hold its header.
    #[error("Sector too short: {len} bytes, header needs {needed}")]
    ShortSector {
        /// Bytes available
        len: usize,
        /// Header width
        needed: usize,
    },

    /// Index file length is not a whole number of records.
    #[error("Invalid index file size for category {category}: {len} bytes")]
    InvalidIndexSize {
        /// Category ID
        category: u8,
        /// File length
        len: usize,
    },

    /// A file looks like an index file but its suffix is not a category ID.
    #[error("Invalid index file name: {0}")]
    InvalidIndexName(String),

    /// The store was closed.
    #[error("Store is closed")]
    Closed,
}

impl StorageError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Closed => ErrorKind::Io,
            Self::Format(e) => e.kind(),
            Self::MissingDataFile(_)
            | Self::MissingIndex(_)
            | Self::MissingRoot(_)
            | Self::CategoryNotFound(_)
            | Self::GroupNotFound { .. }
            | Self::FileNotFound { .. } => ErrorKind::NotFound,
            Self::ChainEnded { .. } | Self::LengthMismatch { .. } | Self::ShortSector { .. } => {
                ErrorKind::Truncated
            }
            Self::Binary(_)
            | Self::SectorMismatch { .. }
            | Self::SectorOutOfBounds { .. }
            | Self::InvalidIndexSize { .. }
            | Self::InvalidIndexName(_) => ErrorKind::Malformed,
        }
    }

    /// Check if the requested item does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Version information for the storage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of every sector in the data file.
pub const SECTOR_SIZE: usize = 520;

/// Length of one index record.
pub const INDEX_RECORD_SIZE: usize = 6;

/// Data file name inside a native cache directory.
pub const DATA_FILE_NAME: &str = "main_file_cache.dat2";

/// Prefix of index file names; the category ID follows in decimal.
pub const INDEX_FILE_PREFIX: &str = "main_file_cache.idx";

/// Category holding the reference tables of all other categories.
pub const REFERENCE_CATEGORY: u8 = 255;

/// Extension of group files in a directory mirror.
pub const GROUP_FILE_EXTENSION: &str = "dat";

/// Index file name for a category.
pub fn index_file_name(category: u8) -> String {
    format!("{INDEX_FILE_PREFIX}{category}")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use jagcache_formats::FormatError;

    #[test]
    fn test_error_kinds() {
        assert_eq!(StorageError::CategoryNotFound(3).kind(), ErrorKind::NotFound);
        assert_eq!(
            StorageError::SectorMismatch {
                field: SectorField::Chunk,
                expected: 1,
                actual: 2
            }
            .kind(),
            ErrorKind::Malformed
        );
        assert_eq!(
            StorageError::ChainEnded {
                expected: 600,
                actual: 512
            }
            .kind(),
            ErrorKind::Truncated
        );
        assert_eq!(StorageError::Closed.kind(), ErrorKind::Io);
        assert!(StorageError::GroupNotFound { category: 0, group: 1 }.is_not_found());
    }

    #[test]
    fn test_format_kind_preserved() {
        let err = StorageError::from(FormatError::UnsupportedCompression(9));
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.to_string(), "unsupported compression type: 9");
    }

    #[test]
    fn test_index_file_name() {
        assert_eq!(index_file_name(0), "main_file_cache.idx0");
        assert_eq!(index_file_name(REFERENCE_CATEGORY), "main_file_cache.idx255");
    }
}
