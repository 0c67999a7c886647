//! Byte-level parsers for sector-chained game asset caches
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
//! Everything in this crate works on byte slices that have already been read
//! from disk. Nothing here touches the file system.
//!
//! # Supported Formats
//!
//! - **Cursor**: big-endian reader with the cache's smart integer encodings
//! - **Container**: compression framing (none, bzip2, gzip) around every group
//! - **Reference table**: per-category archive metadata, protocols 5 to 7
//! - **Archive group**: striped multi-file archives with a length trailer
//! - **Params**: string/integer parameter maps found in config definitions
//!
//! # Example
//!
//! ```
//! use jagcache_formats::{ArchiveGroup, decompress};
//!
//! // an uncompressed container holding two sub-files in one stripe
//! let mut archive = b"abcdef".to_vec();
//! archive.extend_from_slice(&2i32.to_be_bytes());
//! archive.extend_from_slice(&4i32.to_be_bytes());
//! archive.push(1);
//!
//! let mut container = vec![0];
//! container.extend_from_slice(&(archive.len() as u32).to_be_bytes());
//! container.extend_from_slice(&archive);
//!
//! let data = decompress(&container)?;
//! let group = ArchiveGroup::unpack(&data, 2)?;
//! assert_eq!(group.get(0), Some(&b"ab"[..]));
//! assert_eq!(group.get(1), Some(&b"cdef"[..]));
//! # Ok::<(), jagcache_formats::FormatError>(())
//! ```

#![warn(missing_docs)]

pub mod container;
pub mod cursor;
pub mod error;
pub mod group;
pub mod params;
pub mod reference_table;

pub use container::{
    CompressionType, Container, ContainerHeader, MAX_DECOMPRESSION_SIZE, decompress,
    decompress_with_limit,
};
pub use cursor::ByteReader;
pub use error::{ErrorKind, FormatError, Result};
pub use group::ArchiveGroup;
pub use params::{ParamValue, read_params};
pub use reference_table::{ArchiveEntry, ReferenceTable, TableFlags};
