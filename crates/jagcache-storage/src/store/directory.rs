//! Directory mirror store
//!
//! Extracted caches keep each group in its own file:
//!
//! ```text
//! <root>/<category>/<group>.dat
//! ```
//!
//! Files hold the same compression container the native store would return.

use super::Store;
use crate::{GROUP_FILE_EXTENSION, Result, StorageError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Store backed by a directory mirror
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a mirror rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::MissingRoot(root));
        }
        debug!("Opened directory store at {:?}", root);
        Ok(Self { root })
    }

    /// Mirror root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn category_dir(&self, category: u8) -> PathBuf {
        self.root.join(category.to_string())
    }

    fn group_path(&self, category: u8, group: u32) -> PathBuf {
        self.category_dir(category)
            .join(format!("{group}.{GROUP_FILE_EXTENSION}"))
    }
}

/// Parse a decimal directory entry name
fn parse_id<T: std::str::FromStr>(name: &str) -> Option<T> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

impl Store for DirectoryStore {
    fn archive_list(&self) -> Result<Vec<u8>> {
        let mut categories = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(parse_id::<u8>) {
                categories.push(id);
            }
        }
        categories.sort_unstable();
        Ok(categories)
    }

    fn archive_exists(&self, category: u8) -> Result<bool> {
        Ok(self.category_dir(category).is_dir())
    }

    fn group_list(&self, category: u8) -> Result<Vec<u32>> {
        let entries = match fs::read_dir(self.category_dir(category)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::CategoryNotFound(category));
            }
            Err(e) => return Err(e.into()),
        };

        let mut groups = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(GROUP_FILE_EXTENSION))
                .and_then(|stem| stem.strip_suffix('.'))
                .and_then(parse_id::<u32>);
            if let Some(id) = id {
                groups.push(id);
            }
        }
        groups.sort_unstable();
        Ok(groups)
    }

    fn group_exists(&self, category: u8, group: u32) -> Result<bool> {
        Ok(self.group_path(category, group).is_file())
    }

    fn read(&self, category: u8, group: u32) -> Result<Vec<u8>> {
        let path = self.group_path(category, group);
        match fs::read(&path) {
            Ok(data) => {
                trace!("Read {:?}: {} bytes", path, data.len());
                Ok(data)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::GroupNotFound { category, group })
            }
            Err(e) => Err(e.into()),
        }
    }
}
