//! Read-only memory-mapped files

use crate::Result;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::trace;

/// A file mapped read-only into memory.
///
/// Empty files cannot be mapped on every platform, so they hold no map and
/// expose an empty slice.
#[derive(Debug)]
pub(crate) struct MappedFile {
    path: PathBuf,
    map: Option<Mmap>,
}

impl MappedFile {
    /// Map a file read-only
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let map = if len == 0 {
            None
        } else {
            // SAFETY: the cache is opened read-only and never written through
            // this map. Concurrent external truncation is outside the
            // supported usage, as with any mapped reader.
            #[allow(unsafe_code)]
            let map = unsafe { MmapOptions::new().map(&file)? };
            Some(map)
        };

        trace!("Mapped {:?} ({} bytes)", path, len);
        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    /// Mapped bytes
    pub(crate) fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// File length in bytes
    pub(crate) fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Path the file was opened from
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_map_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"mapped bytes").unwrap();

        let mapped = MappedFile::open(&path).unwrap();
        assert_eq!(mapped.bytes(), b"mapped bytes");
        assert_eq!(mapped.len(), 12);
        assert_eq!(mapped.path(), path.as_path());
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let mapped = MappedFile::open(&path).unwrap();
        assert!(mapped.bytes().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappedFile::open(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
