//! Store backends
//!
//! A store hands out the raw (still compressed) bytes of a group addressed by
//! category and group ID. Two on-disk layouts are supported:
//!
//! - [`NativeStore`]: the sector-chained `main_file_cache.dat2` plus its
//!   `main_file_cache.idx{N}` index files
//! - [`DirectoryStore`]: a mirror with one `<category>/<group>.dat` file per
//!   group

mod directory;
mod native;

pub use directory::DirectoryStore;
pub use native::NativeStore;

use crate::config::{StoreConfig, StoreKind};
use crate::Result;
use tracing::info;

/// Read access to the groups of a cache
pub trait Store: Send + Sync {
    /// Category IDs present in the store, ascending
    fn archive_list(&self) -> Result<Vec<u8>>;

    /// Check if a category is present
    fn archive_exists(&self, category: u8) -> Result<bool>;

    /// Group IDs present in a category, ascending
    fn group_list(&self, category: u8) -> Result<Vec<u32>>;

    /// Check if a group is present
    fn group_exists(&self, category: u8, group: u32) -> Result<bool>;

    /// Raw bytes of one group
    fn read(&self, category: u8, group: u32) -> Result<Vec<u8>>;

    /// Release file handles. Later calls may fail with
    /// [`StorageError::Closed`](crate::StorageError::Closed).
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn archive_list(&self) -> Result<Vec<u8>> {
        (**self).archive_list()
    }

    fn archive_exists(&self, category: u8) -> Result<bool> {
        (**self).archive_exists(category)
    }

    fn group_list(&self, category: u8) -> Result<Vec<u32>> {
        (**self).group_list(category)
    }

    fn group_exists(&self, category: u8, group: u32) -> Result<bool> {
        (**self).group_exists(category, group)
    }

    fn read(&self, category: u8, group: u32) -> Result<Vec<u8>> {
        (**self).read(category, group)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Open the store a configuration describes
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn Store>> {
    let kind = config.resolved_kind();
    info!("Opening {:?} store at {:?}", kind, config.path);

    Ok(match kind {
        StoreKind::Native | StoreKind::Auto => Box::new(NativeStore::with_config(config)?),
        StoreKind::Directory => Box::new(DirectoryStore::open(&config.path)?),
    })
}
