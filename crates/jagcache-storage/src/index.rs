//! Index file (`main_file_cache.idx{N}`) records
//!
//! An index file is a dense array of 6-byte records. The record position is
//! the group ID:
//!
//! ```text
//! length: u24        group length in bytes
//! sector: u24        first sector of the chain, 0 if absent
//! ```

use crate::sector::SectorLayout;
use crate::{INDEX_FILE_PREFIX, INDEX_RECORD_SIZE, Result, StorageError};
use binrw::io::{Cursor, Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite, BinWriterExt, Endian};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Custom binrw parser for 3-byte big-endian fields
fn parse_u24<R: Read + Seek>(reader: &mut R, _endian: Endian, _args: ()) -> BinResult<u32> {
    let bytes = <[u8; 3]>::read_options(reader, Endian::Big, ())?;
    Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

/// Custom binrw writer for 3-byte big-endian fields
fn write_u24<W: Write + Seek>(
    value: &u32,
    writer: &mut W,
    _endian: Endian,
    _args: (),
) -> BinResult<()> {
    if *value > 0x00FF_FFFF {
        return Err(binrw::Error::AssertFail {
            pos: 0,
            message: format!("Value {value} does not fit in 24 bits"),
        });
    }
    let bytes = value.to_be_bytes();
    writer.write_be(&[bytes[1], bytes[2], bytes[3]])?;
    Ok(())
}

/// One raw index record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(big)]
pub struct IndexRecord {
    /// Group length in bytes
    #[br(parse_with = parse_u24)]
    #[bw(write_with = write_u24)]
    pub length: u32,

    /// First sector of the chain
    #[br(parse_with = parse_u24)]
    #[bw(write_with = write_u24)]
    pub sector: u32,
}

impl IndexRecord {
    /// Decode one record from exactly six bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::read_be(&mut Cursor::new(bytes))?)
    }

    /// Encode the record
    pub fn to_bytes(&self) -> Result<[u8; INDEX_RECORD_SIZE]> {
        let mut out = [0u8; INDEX_RECORD_SIZE];
        self.write_be(&mut Cursor::new(&mut out[..]))?;
        Ok(out)
    }

    /// Check if the record points at stored data
    pub const fn is_present(&self) -> bool {
        self.sector != 0
    }
}

/// Location of one group's sector chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveRef {
    /// Group ID, equal to the record position
    pub archive_id: u32,
    /// Category the index file belongs to
    pub index_id: u8,
    /// Group length in bytes
    pub length: u32,
    /// First sector of the chain
    pub sector: u32,
}

impl ArchiveRef {
    /// Build a reference from a raw record
    pub const fn from_record(index_id: u8, archive_id: u32, record: IndexRecord) -> Self {
        Self {
            archive_id,
            index_id,
            length: record.length,
            sector: record.sector,
        }
    }

    /// Check if the chain uses wide sector headers
    pub const fn is_extended(&self) -> bool {
        matches!(self.layout(), SectorLayout::Extended)
    }

    /// Sector layout of the chain
    pub const fn layout(&self) -> SectorLayout {
        SectorLayout::for_archive(self.archive_id)
    }

    /// Payload bytes each sector of the chain contributes, in chain order.
    ///
    /// Every chunk is a full payload except the last, which holds the
    /// remainder. An exact multiple ends on a full chunk, never an empty one.
    pub fn chunk_sizes(&self) -> impl Iterator<Item = usize> {
        let length = self.length as usize;
        let payload = self.layout().payload_len();
        let count = length.div_ceil(payload);
        (0..count).map(move |i| (length - i * payload).min(payload))
    }

    /// Number of sectors in the chain
    pub fn sector_count(&self) -> usize {
        (self.length as usize).div_ceil(self.layout().payload_len())
    }
}

/// Parsed index file of one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFile {
    index_id: u8,
    records: Vec<ArchiveRef>,
}

impl IndexFile {
    /// Slice raw index bytes into records.
    ///
    /// A trailing partial record is dropped.
    pub fn parse(index_id: u8, data: &[u8]) -> Result<Self> {
        let records = data
            .chunks_exact(INDEX_RECORD_SIZE)
            .zip(0u32..)
            .map(|(bytes, archive_id)| {
                IndexRecord::from_bytes(bytes)
                    .map(|record| ArchiveRef::from_record(index_id, archive_id, record))
            })
            .collect::<Result<Vec<_>>>()?;

        let remainder = data.len() % INDEX_RECORD_SIZE;
        if remainder != 0 {
            debug!(
                "Index {} has {} trailing bytes after {} records",
                index_id,
                remainder,
                records.len()
            );
        }

        Ok(Self { index_id, records })
    }

    /// Read and parse an index file from disk
    pub fn load(index_id: u8, path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::parse(index_id, &data)
    }

    /// Category of this index file
    pub const fn index_id(&self) -> u8 {
        self.index_id
    }

    /// Record of one group
    pub fn get(&self, archive_id: u32) -> Option<&ArchiveRef> {
        self.records.get(archive_id as usize)
    }

    /// All records, including absent ones
    pub fn records(&self) -> &[ArchiveRef] {
        &self.records
    }

    /// Records that point at stored data
    pub fn present(&self) -> impl Iterator<Item = &ArchiveRef> {
        self.records.iter().filter(|r| r.sector != 0)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the file holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every index file of a cache directory
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    indexes: BTreeMap<u8, IndexFile>,
}

impl IndexSet {
    /// Discover and parse every `main_file_cache.idx{N}` file in `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let mut indexes = BTreeMap::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(suffix) = name.strip_prefix(INDEX_FILE_PREFIX) else {
                continue;
            };
            if !entry.file_type()?.is_file() {
                warn!("Skipping non-file index entry: {}", name);
                continue;
            }

            let index_id = parse_index_suffix(suffix)
                .ok_or_else(|| StorageError::InvalidIndexName(name.to_string()))?;
            let index = IndexFile::load(index_id, &entry.path())?;
            debug!("Loaded index {} with {} records", index_id, index.len());
            indexes.insert(index_id, index);
        }

        debug!("Discovered {} index files in {:?}", indexes.len(), dir);
        Ok(Self { indexes })
    }

    /// Index file of one category
    pub fn get(&self, index_id: u8) -> Option<&IndexFile> {
        self.indexes.get(&index_id)
    }

    /// Category IDs in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.indexes.keys().copied()
    }

    /// Number of index files
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Check if no index files were found
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Iterate over all index files in category order
    pub fn iter(&self) -> impl Iterator<Item = &IndexFile> {
        self.indexes.values()
    }
}

/// Parse the decimal category ID following the index file prefix
pub(crate) fn parse_index_suffix(suffix: &str) -> Option<u8> {
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ErrorKind, index_file_name};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_record_round_trip() {
        let record = IndexRecord {
            length: 0x01_02_03,
            sector: 0xFF_FF_FE,
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0xFF, 0xFF, 0xFE]);
        assert_eq!(IndexRecord::from_bytes(&bytes).unwrap(), record);

        let too_wide = IndexRecord {
            length: 0x0100_0000,
            sector: 1,
        };
        assert!(too_wide.to_bytes().is_err());
    }

    #[test]
    fn test_chunk_sizes() {
        let chunks = |archive_id, length| {
            ArchiveRef {
                archive_id,
                index_id: 0,
                length,
                sector: 1,
            }
            .chunk_sizes()
            .collect::<Vec<_>>()
        };
        assert_eq!(chunks(1, 0), Vec::<usize>::new());
        assert_eq!(chunks(1, 100), vec![100]);
        assert_eq!(chunks(1, 512), vec![512]);
        assert_eq!(chunks(1, 513), vec![512, 1]);
        assert_eq!(chunks(1, 1024), vec![512, 512]);
        assert_eq!(chunks(70_000, 1024), vec![510, 510, 4]);
    }

    #[test]
    fn test_parse_drops_partial_record() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 10, 0, 0, 1]);
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0, 2, 0, 0, 0, 5]);
        data.extend_from_slice(&[1, 2, 3]);

        let index = IndexFile::parse(2, &data).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(
            *index.get(2).unwrap(),
            ArchiveRef {
                archive_id: 2,
                index_id: 2,
                length: 512,
                sector: 5
            }
        );
        assert!(index.get(3).is_none());
        assert_eq!(
            index.present().map(|r| r.archive_id).collect::<Vec<_>>(),
            vec![0, 2]
        );
    }

    #[test]
    fn test_suffix_parsing() {
        assert_eq!(parse_index_suffix("0"), Some(0));
        assert_eq!(parse_index_suffix("255"), Some(255));
        assert_eq!(parse_index_suffix("256"), None);
        assert_eq!(parse_index_suffix("2.bak"), None);
        assert_eq!(parse_index_suffix("+1"), None);
        assert_eq!(parse_index_suffix(""), None);
    }

    #[test]
    fn test_index_set_discovery() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(index_file_name(0)), [0, 0, 1, 0, 0, 1]).unwrap();
        fs::write(dir.path().join(index_file_name(255)), [0u8; 12]).unwrap();
        fs::write(dir.path().join(crate::DATA_FILE_NAME), [0u8; 520]).unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"ignored").unwrap();

        let set = IndexSet::load(dir.path()).unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![0, 255]);
        assert_eq!(set.get(0).unwrap().get(0).unwrap().length, 1);
        assert_eq!(set.get(255).unwrap().len(), 2);
        assert!(set.get(1).is_none());
    }

    #[test]
    fn test_index_set_rejects_bad_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main_file_cache.idx300"), [0u8; 6]).unwrap();
        let err = IndexSet::load(dir.path()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidIndexName(_)));
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    proptest! {
        #[test]
        fn prop_record_density(records in 0usize..64, remainder in 0usize..6) {
            let data = vec![0x5Au8; records * INDEX_RECORD_SIZE + remainder];
            let index = IndexFile::parse(7, &data).unwrap();
            prop_assert_eq!(index.len(), records);
            for (i, r) in index.records().iter().enumerate() {
                prop_assert_eq!(r.archive_id as usize, i);
                prop_assert_eq!(r.index_id, 7);
            }
        }

        #[test]
        fn prop_chunk_sizes_sum_to_length(length in 0u32..0x00FF_FFFF, archive_id in any::<u32>()) {
            let r = ArchiveRef { archive_id, index_id: 0, length, sector: 1 };
            let sizes: Vec<usize> = r.chunk_sizes().collect();
            prop_assert_eq!(sizes.iter().sum::<usize>(), length as usize);
            prop_assert_eq!(sizes.len(), r.sector_count());
            prop_assert!(sizes.iter().all(|&s| s > 0 && s <= r.layout().payload_len()));
        }
    }
}
