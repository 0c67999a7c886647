//! Native sector-chained store

use super::Store;
use crate::config::StoreConfig;
use crate::data_file::DataFile;
use crate::index::{ArchiveRef, IndexRecord};
use crate::mapped::MappedFile;
use crate::{
    DATA_FILE_NAME, INDEX_RECORD_SIZE, REFERENCE_CATEGORY, Result, StorageError, index_file_name,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Store backed by `main_file_cache.dat2` and its index files.
///
/// All files are mapped read-only on open. Reads share a lock; [`close`]
/// takes it exclusively and releases every mapping.
///
/// [`close`]: Store::close
#[derive(Debug)]
pub struct NativeStore {
    root: PathBuf,
    data: DataFile,
    indexes: RwLock<Option<BTreeMap<u8, MappedFile>>>,
}

impl NativeStore {
    /// Open a native cache directory with default settings
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_config(&StoreConfig::new(root))
    }

    /// Open the native cache a configuration points at
    pub fn with_config(config: &StoreConfig) -> Result<Self> {
        let root = config.path.clone();
        let data = DataFile::open(&root.join(DATA_FILE_NAME))?;

        let mut indexes = BTreeMap::new();
        for category in 0..=u8::MAX {
            let path = root.join(index_file_name(category));
            if path.is_file() {
                indexes.insert(category, MappedFile::open(&path)?);
            } else if category == REFERENCE_CATEGORY && config.require_reference_index {
                return Err(StorageError::MissingIndex(REFERENCE_CATEGORY));
            }
        }

        info!(
            "Opened native store at {:?}: {} categories, {} sectors",
            root,
            indexes.len(),
            data.sector_count()?
        );

        Ok(Self {
            root,
            data,
            indexes: RwLock::new(Some(indexes)),
        })
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared data file
    pub fn data_file(&self) -> &DataFile {
        &self.data
    }

    /// Run `f` over the raw bytes of a category's index file.
    ///
    /// The file length must be a whole number of records.
    fn with_index<T>(&self, category: u8, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
        let guard = self.indexes.read();
        let indexes = guard.as_ref().ok_or(StorageError::Closed)?;
        let index = indexes
            .get(&category)
            .ok_or(StorageError::CategoryNotFound(category))?;

        let bytes = index.bytes();
        if bytes.len() % INDEX_RECORD_SIZE != 0 {
            return Err(StorageError::InvalidIndexSize {
                category,
                len: bytes.len(),
            });
        }
        f(bytes)
    }

    /// Raw index record of a group, `None` past the end of the index
    fn record(&self, category: u8, group: u32) -> Result<Option<IndexRecord>> {
        self.with_index(category, |bytes| {
            let start = group as usize * INDEX_RECORD_SIZE;
            bytes
                .get(start..start + INDEX_RECORD_SIZE)
                .map(IndexRecord::from_bytes)
                .transpose()
        })
    }

    /// Chain location of a group
    pub fn archive_ref(&self, category: u8, group: u32) -> Result<ArchiveRef> {
        match self.record(category, group)? {
            Some(record) if record.is_present() => {
                Ok(ArchiveRef::from_record(category, group, record))
            }
            _ => Err(StorageError::GroupNotFound { category, group }),
        }
    }
}

impl Store for NativeStore {
    fn archive_list(&self) -> Result<Vec<u8>> {
        let guard = self.indexes.read();
        let indexes = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(indexes.keys().copied().collect())
    }

    fn archive_exists(&self, category: u8) -> Result<bool> {
        let guard = self.indexes.read();
        let indexes = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(indexes.contains_key(&category))
    }

    fn group_list(&self, category: u8) -> Result<Vec<u32>> {
        self.with_index(category, |bytes| {
            let mut groups = Vec::with_capacity(bytes.len() / INDEX_RECORD_SIZE);
            for (record, group) in bytes.chunks_exact(INDEX_RECORD_SIZE).zip(0u32..) {
                if IndexRecord::from_bytes(record)?.is_present() {
                    groups.push(group);
                }
            }
            Ok(groups)
        })
    }

    fn group_exists(&self, category: u8, group: u32) -> Result<bool> {
        match self.record(category, group) {
            Ok(record) => Ok(record.is_some_and(|r| r.is_present())),
            Err(StorageError::CategoryNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn read(&self, category: u8, group: u32) -> Result<Vec<u8>> {
        let reference = self.archive_ref(category, group)?;
        trace!(
            "Reading group {}/{}: {} bytes from sector {}",
            category, group, reference.length, reference.sector
        );
        self.data.read(&reference)
    }

    fn close(&self) -> Result<()> {
        let closed = self.indexes.write().take();
        self.data.close()?;
        if let Some(indexes) = closed {
            debug!(
                "Closed native store at {:?} ({} index files)",
                self.root,
                indexes.len()
            );
        }
        Ok(())
    }
}
