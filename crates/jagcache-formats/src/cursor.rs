//! Sequential big-endian reader over an in-memory buffer
//!
//! Every cache structure in this crate is decoded through [`ByteReader`].
//! Reads advance the position by the width of the field and fail with
//! [`FormatError::UnexpectedEof`] instead of returning partial values.
//!
//! Besides the fixed-width primitives the reader understands the variable
//! width "smart" encodings used throughout the cache:
//!
//! | Encoding | Wire form | Result |
//! |----------|-----------|--------|
//! | BigSmart2 | `u16` = 0 | `-1` |
//! | | `u16` < 32768 | `u16 - 1` |
//! | | `u16` >= 32768, then `u32` | `u32 - 0x10000` |
//! | Uint16SmartMinus1 | `u16` = 32767 | `0` |
//! | | any other `u16` | `u16 + 1` |
//! | SmartUint | first byte < 0x80 | 2-byte `u16` |
//! | | first byte >= 0x80 | 4-byte `u32 & 0x7FFF_FFFF` |

use crate::error::{FormatError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Big-endian cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Unread portion of the buffer
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Move to an absolute position. Seeking to the very end is allowed.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(FormatError::InvalidSeek {
                position,
                len: self.data.len(),
            });
        }
        self.pos = position;
        Ok(())
    }

    /// Advance past `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Borrow the next `count` bytes and advance past them
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(FormatError::UnexpectedEof {
                offset: self.pos,
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Copy the next `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.take(count).map(<[u8]>::to_vec)
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(FormatError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
                remaining: 0,
            })
    }

    /// Read an unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a big-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    /// Read a big-endian `i16`
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    /// Read a big-endian 24-bit unsigned integer
    pub fn read_u24(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u24(self.take(3)?))
    }

    /// Read a big-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    /// Read a big-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Read a BigSmart2 value.
    ///
    /// A leading zero word is the `-1` sentinel. Words with the high bit set
    /// are followed by a full `u32` that carries the value offset by `0x10000`.
    pub fn read_big_smart2(&mut self) -> Result<i32> {
        let value = self.read_u16()?;
        if value == 0 {
            return Ok(-1);
        }
        if value < 0x8000 {
            return Ok(i32::from(value) - 1);
        }
        let wide = self.read_u32()?;
        Ok(wide.wrapping_sub(0x10000) as i32)
    }

    /// Read a Uint16SmartMinus1 value. `32767` decodes to `0`.
    pub fn read_u16_smart_minus1(&mut self) -> Result<u16> {
        let value = self.read_u16()?;
        if value == 0x7FFF {
            return Ok(0);
        }
        Ok(value.wrapping_add(1))
    }

    /// Read a 2- or 4-byte SmartUint, selected by the top bit of the first byte
    pub fn read_smart_uint(&mut self) -> Result<u32> {
        if self.peek_u8()? & 0x80 == 0 {
            Ok(u32::from(self.read_u16()?))
        } else {
            Ok(self.read_u32()? & 0x7FFF_FFFF)
        }
    }

    /// Read a null-terminated string.
    ///
    /// Bytes are decoded as Latin-1 so every byte maps to exactly one char.
    /// Running out of data after at least one byte counts as an implicit
    /// terminator; an empty read at end of buffer is an error.
    pub fn read_string(&mut self) -> Result<String> {
        let rest = self.remaining_slice();
        if rest.is_empty() {
            return Err(FormatError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
                remaining: 0,
            });
        }

        let (text, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        Ok(text.iter().copied().map(char::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fixed_width_reads() {
        let data = [
            0x01, 0xFF, 0x12, 0x34, 0xFF, 0xFE, 0x01, 0x02, 0x03, 0xDE, 0xAD, 0xBE, 0xEF, 0xFF,
            0xFF, 0xFF, 0xFE,
        ];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_u24().unwrap(), 0x010203);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_eof_does_not_advance() {
        let data = [0x00, 0x01, 0x02];
        let mut reader = ByteReader::new(&data);
        reader.read_u8().unwrap();
        let err = reader.read_u32().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
        assert!(matches!(
            err,
            FormatError::UnexpectedEof {
                offset: 1,
                needed: 4,
                remaining: 2
            }
        ));
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn test_big_smart2() {
        // zero word is the sentinel
        assert_eq!(ByteReader::new(&[0x00, 0x00]).read_big_smart2().unwrap(), -1);
        assert_eq!(ByteReader::new(&[0x00, 0x01]).read_big_smart2().unwrap(), 0);
        assert_eq!(
            ByteReader::new(&[0x7F, 0xFF]).read_big_smart2().unwrap(),
            32766
        );

        let data = [0x80, 0x00, 0x00, 0x01, 0x86, 0xA0];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_big_smart2().unwrap(), 100_000 - 0x10000);
        assert_eq!(reader.position(), 6);

        let err = ByteReader::new(&[0x80, 0x00, 0x01])
            .read_big_smart2()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn test_u16_smart_minus1() {
        assert_eq!(
            ByteReader::new(&[0x7F, 0xFF])
                .read_u16_smart_minus1()
                .unwrap(),
            0
        );
        assert_eq!(
            ByteReader::new(&[0x00, 0x00])
                .read_u16_smart_minus1()
                .unwrap(),
            1
        );
        assert_eq!(
            ByteReader::new(&[0x01, 0x00])
                .read_u16_smart_minus1()
                .unwrap(),
            257
        );
    }

    #[test]
    fn test_smart_uint_widths() {
        let mut reader = ByteReader::new(&[0x7F, 0xFF]);
        assert_eq!(reader.read_smart_uint().unwrap(), 0x7FFF);
        assert_eq!(reader.position(), 2);

        let mut reader = ByteReader::new(&[0x80, 0x01, 0x00, 0x00]);
        assert_eq!(reader.read_smart_uint().unwrap(), 0x0001_0000);
        assert_eq!(reader.position(), 4);

        let mut reader = ByteReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(reader.read_smart_uint().unwrap(), 0x7FFF_FFFF);
    }

    #[test]
    fn test_strings() {
        let data = b"hello\0world";
        let mut reader = ByteReader::new(data);
        assert_eq!(reader.read_string().unwrap(), "hello");
        // unterminated tail is accepted
        assert_eq!(reader.read_string().unwrap(), "world");
        assert!(reader.read_string().is_err());

        let mut reader = ByteReader::new(b"\0");
        assert_eq!(reader.read_string().unwrap(), "");

        let mut reader = ByteReader::new(&[0xA3, 0x35, 0x00]);
        assert_eq!(reader.read_string().unwrap(), "\u{a3}5");
    }

    #[test]
    fn test_seek_and_take() {
        let data = [1, 2, 3, 4, 5];
        let mut reader = ByteReader::new(&data);
        reader.seek(3).unwrap();
        assert_eq!(reader.take(2).unwrap(), &[4, 5]);
        reader.seek(5).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert!(matches!(
            reader.seek(6),
            Err(FormatError::InvalidSeek {
                position: 6,
                len: 5
            })
        ));
        reader.seek(0).unwrap();
        assert_eq!(reader.read_array::<2>().unwrap(), [1, 2]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// SmartUint values below 0x8000 always take two bytes
            #[test]
            fn short_smart_uint_is_two_bytes(value in 0u16..0x8000) {
                let bytes = value.to_be_bytes();
                let mut reader = ByteReader::new(&bytes);
                prop_assert_eq!(reader.read_smart_uint().unwrap(), u32::from(value));
                prop_assert_eq!(reader.position(), 2);
            }

            /// SmartUint with the continuation bit masks it back off
            #[test]
            fn long_smart_uint_masks_top_bit(value in 0u32..0x8000_0000) {
                let bytes = (value | 0x8000_0000).to_be_bytes();
                let mut reader = ByteReader::new(&bytes);
                prop_assert_eq!(reader.read_smart_uint().unwrap(), value);
                prop_assert_eq!(reader.position(), 4);
            }

            /// Reads never panic on arbitrary input
            #[test]
            fn reads_never_panic(data in prop::collection::vec(any::<u8>(), 0..16)) {
                let mut reader = ByteReader::new(&data);
                let _ = reader.read_big_smart2();
                let _ = reader.read_smart_uint();
                let _ = reader.read_string();
                prop_assert!(reader.position() <= data.len());
            }
        }
    }
}
