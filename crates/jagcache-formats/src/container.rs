//! Compression container framing
//!
//! Every group stored in the cache is wrapped in a small header that names
//! the codec and the payload lengths:
//!
//! ```text
//! [type: u8][compressed_len: u32][uncompressed_len: u32 if type != 0][payload]
//! ```
//!
//! bzip2 payloads are stored without the four byte `BZh1` stream magic; it is
//! restored before the stream is handed to the decoder.

use crate::cursor::ByteReader;
use crate::error::{FormatError, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::trace;

/// Maximum uncompressed length accepted by [`decompress`] (1 GiB)
///
/// Containers declare their output length up front, and the output buffer
/// is sized from it. The ceiling keeps a corrupt header from requesting an
/// arbitrary allocation.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Magic the on-disk bzip2 streams are missing
pub const BZIP2_HEADER: [u8; 4] = *b"BZh1";

/// Largest output buffer reserved up front; bigger outputs grow as they decode
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Codec named by the first byte of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionType {
    /// Stored verbatim
    None = 0,
    /// bzip2 without its stream magic
    Bzip2 = 1,
    /// gzip member
    Gzip = 2,
}

impl CompressionType {
    /// Parse compression type from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Bzip2),
            2 => Some(Self::Gzip),
            _ => None,
        }
    }

    /// Get the byte representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Size of the container header for this codec
    pub fn header_len(self) -> usize {
        match self {
            Self::None => 5,
            Self::Bzip2 | Self::Gzip => 9,
        }
    }
}

/// Decoded container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Codec of the payload
    pub compression: CompressionType,
    /// Payload length on disk
    pub compressed_len: u32,
    /// Declared output length; absent for uncompressed payloads
    pub uncompressed_len: Option<u32>,
}

impl ContainerHeader {
    /// Length the payload has once decoded
    pub fn output_len(&self) -> usize {
        self.uncompressed_len.unwrap_or(self.compressed_len) as usize
    }
}

/// A parsed container borrowing its payload from the input buffer
#[derive(Debug, Clone)]
pub struct Container<'a> {
    /// Framing header
    pub header: ContainerHeader,
    payload: &'a [u8],
}

impl<'a> Container<'a> {
    /// Parse the framing and slice out the payload.
    ///
    /// Fails with [`FormatError::Truncated`] when fewer than
    /// `compressed_len` bytes follow the header. Bytes after the payload are
    /// ignored.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let type_byte = reader.read_u8()?;
        let compression = CompressionType::from_byte(type_byte)
            .ok_or(FormatError::UnsupportedCompression(type_byte))?;
        let compressed_len = reader.read_u32()?;
        let uncompressed_len = match compression {
            CompressionType::None => None,
            CompressionType::Bzip2 | CompressionType::Gzip => Some(reader.read_u32()?),
        };

        let available = reader.remaining();
        if available < compressed_len as usize {
            return Err(FormatError::Truncated {
                expected: compressed_len as usize,
                available,
            });
        }
        let payload = reader.take(compressed_len as usize)?;

        Ok(Self {
            header: ContainerHeader {
                compression,
                compressed_len,
                uncompressed_len,
            },
            payload,
        })
    }

    /// Raw payload bytes, still compressed
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Decode the payload using the default size ceiling
    pub fn decompress(&self) -> Result<Vec<u8>> {
        self.decompress_with_limit(MAX_DECOMPRESSION_SIZE)
    }

    /// Decode the payload, rejecting declared lengths above `limit`.
    ///
    /// The output always has exactly the declared uncompressed length. A
    /// stream that ends early is a [`FormatError::LengthMismatch`].
    pub fn decompress_with_limit(&self, limit: usize) -> Result<Vec<u8>> {
        let expected = self.header.output_len();
        if expected > limit {
            return Err(FormatError::TooLarge {
                size: expected,
                limit,
            });
        }

        let output = match self.header.compression {
            CompressionType::None => self.payload.to_vec(),
            CompressionType::Gzip => {
                read_exactly(GzDecoder::new(self.payload), expected, "gzip")?
            }
            CompressionType::Bzip2 => {
                let magic: &[u8] = &BZIP2_HEADER;
                read_exactly(BzDecoder::new(magic.chain(self.payload)), expected, "bzip2")?
            }
        };

        trace!(
            "Decompressed {:?} container: {} -> {} bytes",
            self.header.compression,
            self.payload.len(),
            output.len()
        );
        Ok(output)
    }
}

/// Pull exactly `expected` bytes out of a decoder.
fn read_exactly<R: Read>(decoder: R, expected: usize, codec: &'static str) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    decoder
        .take(expected as u64)
        .read_to_end(&mut output)
        .map_err(|source| FormatError::Decompression { codec, source })?;

    if output.len() != expected {
        return Err(FormatError::LengthMismatch {
            expected,
            actual: output.len(),
        });
    }
    Ok(output)
}

/// Strip the container framing and decode its payload
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Container::parse(data)?.decompress()
}

/// Like [`decompress`], with a caller-chosen size ceiling
pub fn decompress_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    Container::parse(data)?.decompress_with_limit(limit)
}
