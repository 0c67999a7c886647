//! Sector codec
//!
//! Every sector starts with a header naming its owner and successor:
//!
//! ```text
//! archive_id: u16       (u32 for extended groups)
//! chunk: u16
//! next_sector: u24
//! index_id: u8
//! ```
//!
//! Groups with IDs above 65535 use the wide archive ID, which grows the
//! header to 10 bytes and shrinks the payload to 510 bytes. The sector
//! itself stays 520 bytes.

use crate::{Result, SECTOR_SIZE, StorageError};
use binrw::io::{Cursor, Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite, Endian};
use std::fmt;

/// Header width selector for a sector chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectorLayout {
    /// 8-byte header, 512-byte payload
    Standard,
    /// 10-byte header, 510-byte payload
    Extended,
}

impl SectorLayout {
    /// Header width of a standard sector
    pub const STANDARD_HEADER: usize = 8;
    /// Header width of an extended sector
    pub const EXTENDED_HEADER: usize = 10;

    /// Layout used by the sectors of a group
    pub const fn for_archive(archive_id: u32) -> Self {
        if archive_id > 0xFFFF {
            Self::Extended
        } else {
            Self::Standard
        }
    }

    /// Header width in bytes
    pub const fn header_len(self) -> usize {
        match self {
            Self::Standard => Self::STANDARD_HEADER,
            Self::Extended => Self::EXTENDED_HEADER,
        }
    }

    /// Payload width in bytes
    pub const fn payload_len(self) -> usize {
        SECTOR_SIZE - self.header_len()
    }
}

/// Header field compared during chain validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectorField {
    /// Owning group ID
    Archive,
    /// Position in the chain
    Chunk,
    /// Owning category ID
    Index,
}

impl fmt::Display for SectorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Archive => "archive",
            Self::Chunk => "chunk",
            Self::Index => "index",
        })
    }
}

/// Decoded sector header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    /// Owning group ID
    pub archive_id: u32,
    /// Position of this sector in its chain, from zero
    pub chunk: u16,
    /// Next sector of the chain, 0 at the end
    pub next_sector: u32,
    /// Owning category ID
    pub index_id: u8,
}

impl BinRead for SectorHeader {
    type Args<'a> = (SectorLayout,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        (layout,): Self::Args<'_>,
    ) -> BinResult<Self> {
        let archive_id = match layout {
            SectorLayout::Standard => u32::from(u16::read_options(reader, Endian::Big, ())?),
            SectorLayout::Extended => u32::read_options(reader, Endian::Big, ())?,
        };
        let chunk = u16::read_options(reader, Endian::Big, ())?;
        let next = <[u8; 3]>::read_options(reader, Endian::Big, ())?;
        let index_id = u8::read_options(reader, Endian::Big, ())?;

        Ok(Self {
            archive_id,
            chunk,
            next_sector: u32::from_be_bytes([0, next[0], next[1], next[2]]),
            index_id,
        })
    }
}

impl BinWrite for SectorHeader {
    type Args<'a> = (SectorLayout,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        (layout,): Self::Args<'_>,
    ) -> BinResult<()> {
        match layout {
            SectorLayout::Standard => {
                let id = u16::try_from(self.archive_id).map_err(|e| binrw::Error::AssertFail {
                    pos: 0,
                    message: format!("Archive ID too large for standard sector: {e}"),
                })?;
                id.write_options(writer, Endian::Big, ())?;
            }
            SectorLayout::Extended => self.archive_id.write_options(writer, Endian::Big, ())?,
        }
        self.chunk.write_options(writer, Endian::Big, ())?;
        let next = self.next_sector.to_be_bytes();
        [next[1], next[2], next[3]].write_options(writer, Endian::Big, ())?;
        self.index_id.write_options(writer, Endian::Big, ())?;
        Ok(())
    }
}

impl SectorHeader {
    /// Check the header against the owner and position the chain walk
    /// expects. Fields are compared archive first, then chunk, then index.
    pub fn validate(&self, index_id: u8, archive_id: u32, chunk: u32) -> Result<()> {
        let checks = [
            (SectorField::Archive, archive_id, self.archive_id),
            (SectorField::Chunk, chunk, u32::from(self.chunk)),
            (SectorField::Index, u32::from(index_id), u32::from(self.index_id)),
        ];
        for (field, expected, actual) in checks {
            if expected != actual {
                return Err(StorageError::SectorMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Encode the header with the given layout
    pub fn to_bytes(&self, layout: SectorLayout) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(layout.header_len()));
        self.write_options(&mut cursor, Endian::Big, (layout,))?;
        Ok(cursor.into_inner())
    }
}

/// A decoded sector borrowing its payload from the data file
#[derive(Debug, Clone, Copy)]
pub struct Sector<'a> {
    /// Decoded header
    pub header: SectorHeader,
    /// Payload bytes following the header
    pub payload: &'a [u8],
}

impl<'a> Sector<'a> {
    /// Decode a sector slice.
    ///
    /// The slice may end early (the last sector of a data file is often
    /// partial); the payload is whatever follows the header, capped at the
    /// layout's payload width.
    pub fn decode(bytes: &'a [u8], layout: SectorLayout) -> Result<Self> {
        let header_len = layout.header_len();
        if bytes.len() < header_len {
            return Err(StorageError::ShortSector {
                len: bytes.len(),
                needed: header_len,
            });
        }

        let header = SectorHeader::read_options(
            &mut Cursor::new(&bytes[..header_len]),
            Endian::Big,
            (layout,),
        )?;
        let end = bytes.len().min(SECTOR_SIZE);

        Ok(Self {
            header,
            payload: &bytes[header_len..end],
        })
    }
}
