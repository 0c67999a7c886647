//! Data file (`main_file_cache.dat2`) chain reader

use crate::index::ArchiveRef;
use crate::mapped::MappedFile;
use crate::sector::Sector;
use crate::{Result, SECTOR_SIZE, StorageError};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Reassemble one group by walking its sector chain through `data`.
///
/// Every sector header is checked against the expected owner and chunk
/// number. The chain must deliver exactly `reference.length` bytes; a zero
/// next-pointer before that point is [`StorageError::ChainEnded`].
pub fn read_chain(data: &[u8], reference: &ArchiveRef) -> Result<Vec<u8>> {
    let layout = reference.layout();
    let expected = reference.length as usize;
    let sectors = data.len() / SECTOR_SIZE;

    let mut output = Vec::with_capacity(expected);
    let mut current = reference.sector;

    for (chunk, size) in reference.chunk_sizes().enumerate() {
        if chunk > 0 && current == 0 {
            return Err(StorageError::ChainEnded {
                expected,
                actual: output.len(),
            });
        }

        let start = (current as usize)
            .checked_mul(SECTOR_SIZE)
            .ok_or(StorageError::SectorOutOfBounds { sector: current, sectors })?;
        let end = start + layout.header_len() + size;
        if end > data.len() {
            return Err(StorageError::SectorOutOfBounds { sector: current, sectors });
        }

        let sector = Sector::decode(&data[start..end], layout)?;
        sector
            .header
            .validate(reference.index_id, reference.archive_id, chunk as u32)?;

        output.extend_from_slice(sector.payload);
        current = sector.header.next_sector;
    }

    if output.len() != expected {
        return Err(StorageError::LengthMismatch {
            expected,
            actual: output.len(),
        });
    }

    trace!(
        "Read group {}/{}: {} bytes over {} sectors",
        reference.index_id,
        reference.archive_id,
        expected,
        reference.sector_count()
    );
    Ok(output)
}

/// Shared, closable handle on a data file
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    file: RwLock<Option<MappedFile>>,
}

impl DataFile {
    /// Open a data file
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(StorageError::MissingDataFile(path.to_path_buf()));
        }
        let file = MappedFile::open(path)?;
        debug!(
            "Opened data file {:?} ({} sectors)",
            file.path(),
            file.len() / SECTOR_SIZE
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
        })
    }

    /// Read the group a reference points at
    pub fn read(&self, reference: &ArchiveRef) -> Result<Vec<u8>> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or(StorageError::Closed)?;
        read_chain(file.bytes(), reference)
    }

    /// Data file length in bytes
    pub fn len(&self) -> Result<usize> {
        let guard = self.file.read();
        Ok(guard.as_ref().ok_or(StorageError::Closed)?.len())
    }

    /// Check if the data file is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whole sectors in the data file
    pub fn sector_count(&self) -> Result<usize> {
        Ok(self.len()? / SECTOR_SIZE)
    }

    /// Path the data file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the mapping. Waits for in-flight reads; later reads fail
    /// with [`StorageError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.file.write().take().is_some() {
            debug!("Closed data file {:?}", self.path);
        }
        Ok(())
    }

    /// Check if the data file was closed
    pub fn is_closed(&self) -> bool {
        self.file.read().is_none()
    }
}
