//! Reference table parsing
//!
//! Category 255 holds one reference table per category. A table lists every
//! archive of its category together with checksums, optional digests and
//! sizes, a version and the IDs of the sub-files packed into the archive.
//!
//! The table is stored column by column, not row by row:
//!
//! ```text
//! protocol: u8
//! table_version: u32          (protocol >= 6)
//! flags: u8
//! archive_count               (u16, SmartUint from protocol 7)
//! archive_id_deltas[count]    (u16, SmartUint from protocol 7)
//! name_hashes[count]: i32     (flags & NAMES)
//! crcs[count]: u32
//! compressed_checksums: u32   (flags & COMPRESSED_CHECKSUM)
//! digests[count]: [u8; 64]    (flags & DIGESTS)
//! sizes[count]: (u32, u32)    (flags & LENGTHS)
//! versions[count]: u32
//! sub_file_counts[count]      (u16, SmartUint from protocol 7)
//! sub_file_id_deltas          (only for archives with more than one sub-file)
//! ```

use crate::cursor::ByteReader;
use crate::error::{FormatError, Result};
use tracing::debug;

/// Oldest protocol this parser understands
pub const MIN_PROTOCOL: u8 = 5;

/// First protocol that carries a table version
pub const VERSIONED_PROTOCOL: u8 = 6;

/// First protocol that encodes counts and deltas as SmartUint
pub const SMART_PROTOCOL: u8 = 7;

/// Newest protocol this parser understands
pub const MAX_PROTOCOL: u8 = 7;

/// Length of a per-archive digest
pub const DIGEST_LEN: usize = 64;

/// Optional-column flags of a reference table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TableFlags(u8);

impl TableFlags {
    /// Archives carry name hashes
    pub const NAMES: u8 = 0x01;
    /// Archives carry 64-byte digests
    pub const DIGESTS: u8 = 0x02;
    /// Archives carry compressed and uncompressed sizes
    pub const LENGTHS: u8 = 0x04;
    /// Archives carry a checksum of their compressed form
    pub const COMPRESSED_CHECKSUM: u8 = 0x08;

    /// Wrap a raw flags byte
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw flags byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Name hash column present
    pub const fn has_names(self) -> bool {
        self.0 & Self::NAMES != 0
    }

    /// Digest column present
    pub const fn has_digests(self) -> bool {
        self.0 & Self::DIGESTS != 0
    }

    /// Size columns present
    pub const fn has_lengths(self) -> bool {
        self.0 & Self::LENGTHS != 0
    }

    /// Compressed checksum column present
    pub const fn has_compressed_checksum(self) -> bool {
        self.0 & Self::COMPRESSED_CHECKSUM != 0
    }
}

/// Metadata for one archive of a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Archive ID, accumulated from deltas
    pub id: u32,
    /// Hash of the archive name
    pub name_hash: Option<i32>,
    /// CRC-32 of the stored container
    pub crc: u32,
    /// Checksum of the compressed form
    pub compressed_checksum: Option<u32>,
    /// Whirlpool digest of the stored container
    pub digest: Option<[u8; DIGEST_LEN]>,
    /// Stored length
    pub compressed_size: Option<u32>,
    /// Decoded length
    pub uncompressed_size: Option<u32>,
    /// Archive revision
    pub version: u32,
    /// IDs of the sub-files packed in this archive, in packing order.
    /// Always holds exactly one ID per sub-file.
    pub sub_file_ids: Vec<u32>,
}

impl ArchiveEntry {
    /// Number of sub-files packed in this archive
    pub fn sub_file_count(&self) -> usize {
        self.sub_file_ids.len()
    }

    /// Check if the archive needs unpacking
    pub fn is_multi_file(&self) -> bool {
        self.sub_file_ids.len() > 1
    }
}

/// Parsed reference table of one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTable {
    /// Wire protocol of the table
    pub protocol: u8,
    /// Table revision (protocol 6 and later)
    pub version: Option<u32>,
    /// Optional columns present in the table
    pub flags: TableFlags,
    /// Archives in ascending ID order
    pub archives: Vec<ArchiveEntry>,
}

impl ReferenceTable {
    /// Decode a reference table from its decompressed bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let protocol = reader.read_u8()?;
        if !(MIN_PROTOCOL..=MAX_PROTOCOL).contains(&protocol) {
            return Err(FormatError::UnsupportedProtocol(protocol));
        }
        let smart = protocol >= SMART_PROTOCOL;

        let version = if protocol >= VERSIONED_PROTOCOL {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let flags = TableFlags::from_byte(reader.read_u8()?);
        let count = read_count(&mut reader, smart)? as usize;

        let ids = read_delta_ids(&mut reader, count, smart, "archive ID")?;

        let name_hashes = if flags.has_names() {
            Some(read_column(&mut reader, count, ByteReader::read_i32)?)
        } else {
            None
        };
        let crcs = read_column(&mut reader, count, ByteReader::read_u32)?;
        let compressed_checksums = if flags.has_compressed_checksum() {
            Some(read_column(&mut reader, count, ByteReader::read_u32)?)
        } else {
            None
        };
        let digests = if flags.has_digests() {
            Some(read_column(
                &mut reader,
                count,
                ByteReader::read_array::<DIGEST_LEN>,
            )?)
        } else {
            None
        };
        let sizes = if flags.has_lengths() {
            Some(read_column(&mut reader, count, |r| {
                Ok((r.read_u32()?, r.read_u32()?))
            })?)
        } else {
            None
        };
        let versions = read_column(&mut reader, count, ByteReader::read_u32)?;
        let sub_file_counts = read_column(&mut reader, count, |r| read_count(r, smart))?;

        let mut archives = Vec::with_capacity(count);
        for i in 0..count {
            let sub_file_count = sub_file_counts[i];
            if sub_file_count == 0 {
                return Err(FormatError::InvalidReferenceTable(format!(
                    "archive {} declares zero sub-files",
                    ids[i]
                )));
            }
            let sub_file_ids = if sub_file_count > 1 {
                let sub_ids =
                    read_delta_ids(&mut reader, sub_file_count as usize, smart, "sub-file ID")?;
                if let Some(pair) = sub_ids.windows(2).find(|pair| pair[0] == pair[1]) {
                    return Err(FormatError::InvalidReferenceTable(format!(
                        "archive {} repeats sub-file ID {}",
                        ids[i], pair[0]
                    )));
                }
                sub_ids
            } else {
                vec![0]
            };

            archives.push(ArchiveEntry {
                id: ids[i],
                name_hash: name_hashes.as_ref().map(|v| v[i]),
                crc: crcs[i],
                compressed_checksum: compressed_checksums.as_ref().map(|v| v[i]),
                digest: digests.as_ref().map(|v| v[i]),
                compressed_size: sizes.as_ref().map(|v| v[i].0),
                uncompressed_size: sizes.as_ref().map(|v| v[i].1),
                version: versions[i],
                sub_file_ids,
            });
        }

        debug!(
            "Parsed reference table: protocol={}, version={:?}, flags={:#04x}, archives={}",
            protocol,
            version,
            flags.bits(),
            archives.len()
        );

        Ok(Self {
            protocol,
            version,
            flags,
            archives,
        })
    }

    /// Find an archive by ID. With duplicate IDs the first entry wins.
    pub fn archive(&self, id: u32) -> Option<&ArchiveEntry> {
        self.archives.iter().find(|entry| entry.id == id)
    }

    /// Archive IDs in table order
    pub fn archive_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.archives.iter().map(|entry| entry.id)
    }

    /// Number of archives
    pub fn len(&self) -> usize {
        self.archives.len()
    }

    /// Check if the table lists no archives
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}

fn read_count(reader: &mut ByteReader<'_>, smart: bool) -> Result<u32> {
    if smart {
        reader.read_smart_uint()
    } else {
        Ok(u32::from(reader.read_u16()?))
    }
}

fn read_column<'a, T>(
    reader: &mut ByteReader<'a>,
    count: usize,
    mut read: impl FnMut(&mut ByteReader<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    (0..count).map(|_| read(reader)).collect()
}

/// Accumulate `count` deltas starting from zero
fn read_delta_ids(
    reader: &mut ByteReader<'_>,
    count: usize,
    smart: bool,
    what: &str,
) -> Result<Vec<u32>> {
    // every delta takes at least two bytes in both encodings
    let remaining = reader.remaining();
    if count > remaining / 2 {
        return Err(FormatError::UnexpectedEof {
            offset: reader.position(),
            needed: count.saturating_mul(2),
            remaining,
        });
    }

    let mut ids = Vec::with_capacity(count);
    let mut previous = 0u32;
    for _ in 0..count {
        let delta = read_count(reader, smart)?;
        previous = previous.checked_add(delta).ok_or_else(|| {
            FormatError::InvalidReferenceTable(format!(
                "{what} overflows after {previous} + {delta}"
            ))
        })?;
        ids.push(previous);
    }
    Ok(ids)
}
