//! Read path from stored bytes to sub-files
//!
//! ```text
//! Store::read -> container -> decompressed group -> reference table lookup
//!             -> archive group unpack -> sub-files keyed by ID
//! ```
//!
//! Nothing is cached between calls; every lookup re-reads and re-parses.

use crate::config::StoreConfig;
use crate::store::{Store, open_store};
use crate::{REFERENCE_CATEGORY, Result, StorageError};
use jagcache_formats::{
    ArchiveGroup, MAX_DECOMPRESSION_SIZE, ReferenceTable, decompress_with_limit,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Cache facade over any [`Store`]
#[derive(Debug)]
pub struct Cache<S: Store> {
    store: S,
    max_decompressed_size: usize,
}

impl Cache<Box<dyn Store>> {
    /// Open the store a configuration describes and wrap it
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let store = open_store(config)?;
        Ok(Self {
            store,
            max_decompressed_size: config.max_decompressed_size,
        })
    }
}

impl<S: Store> Cache<S> {
    /// Wrap a store with the default decompression ceiling
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_decompressed_size: MAX_DECOMPRESSION_SIZE,
        }
    }

    /// Set the largest uncompressed length a container may declare
    #[must_use]
    pub fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the underlying store
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Reference table of a category
    pub fn reference_table(&self, category: u8) -> Result<ReferenceTable> {
        let data = self.group(REFERENCE_CATEGORY, u32::from(category))?;
        let table = ReferenceTable::parse(&data)?;
        debug!(
            "Loaded reference table for category {}: {} groups",
            category,
            table.len()
        );
        Ok(table)
    }

    /// Decompressed bytes of one group
    pub fn group(&self, category: u8, group: u32) -> Result<Vec<u8>> {
        let raw = self.store.read(category, group)?;
        Ok(decompress_with_limit(&raw, self.max_decompressed_size)?)
    }

    /// Sub-files of one group, keyed by the IDs its reference table lists
    pub fn files(&self, category: u8, group: u32) -> Result<BTreeMap<u32, Vec<u8>>> {
        let data = self.group(category, group)?;
        let table = self.reference_table(category)?;
        let entry = table
            .archive(group)
            .ok_or(StorageError::GroupNotFound { category, group })?;

        let files = ArchiveGroup::unpack_entry(&data, entry)?;
        debug!(
            "Unpacked group {}/{} into {} files",
            category,
            group,
            files.len()
        );
        Ok(files.into_files())
    }

    /// One sub-file of a group
    pub fn file(&self, category: u8, group: u32, file: u32) -> Result<Vec<u8>> {
        self.files(category, group)?
            .remove(&file)
            .ok_or(StorageError::FileNotFound {
                category,
                group,
                file,
            })
    }

    /// Close the underlying store
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
