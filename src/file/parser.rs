//! Low-level byte stream parser for module images and symbol streams.
//!
//! This module provides [`Parser`], a cursor-based binary data reader with bounds checking.
//! It is used by the module image reader ([`crate::metadata::reader`]) and by both symbol
//! format readers ([`crate::loader::symbols`]). All multi-byte values are little-endian.

use crate::{Error::OutOfBounds, Result};

/// A bounds-checked, cursor-based binary data parser.
///
/// `Parser` maintains an internal position within a byte slice and validates data availability
/// before every read, so truncated or malformed input surfaces as [`crate::Error::OutOfBounds`]
/// rather than a panic.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over the given data, starting at position 0.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// The current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the cursor has consumed all data.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the position is past the end of the data.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(OutOfBounds);
        }
        self.position = position;
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .ok_or(OutOfBounds)?;
        if end > self.data.len() {
            return Err(OutOfBounds);
        }
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read a single byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no data remains.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u16`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian `i32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read `count` raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `count` bytes remain.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    /// Read a compressed unsigned integer (1, 2, or 4 byte encoding).
    ///
    /// Encoding follows the metadata convention: `0xxxxxxx` for one byte,
    /// `10xxxxxx xxxxxxxx` for two bytes, `110xxxxx` plus three bytes for four.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncation, or
    /// [`crate::Error::Malformed`] for an invalid leading byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_u8()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_u8()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_u8()?);
            let b2 = u32::from(self.read_u8()?);
            let b3 = u32::from(self.read_u8()?);
            return Ok(((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a length-prefixed UTF-8 string (compressed uint length, then bytes).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncation, or
    /// [`crate::Error::Malformed`] for invalid UTF-8.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_compressed_uint()? as usize;
        let start = self.position;
        let string_data = self.take(length)?;

        String::from_utf8(string_data.to_vec()).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                start,
                start + length,
                e.utf8_error()
            )
        })
    }

    /// Verify that the next bytes match the expected magic value, consuming them.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] on a mismatch, or
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn expect_magic(&mut self, magic: &[u8; 4]) -> Result<()> {
        if self.take(4)? != magic {
            return Err(crate::Error::NotSupported);
        }
        Ok(())
    }
}

/// Write a compressed unsigned integer in the same encoding [`Parser::read_compressed_uint`]
/// reads.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if the value exceeds the 29-bit encodable range.
pub fn write_compressed_uint(buffer: &mut Vec<u8>, value: u32) -> Result<()> {
    if value < 0x80 {
        buffer.push(value as u8);
    } else if value < 0x4000 {
        buffer.push(0x80 | (value >> 8) as u8);
        buffer.push((value & 0xFF) as u8);
    } else if value < 0x2000_0000 {
        buffer.push(0xC0 | (value >> 24) as u8);
        buffer.push(((value >> 16) & 0xFF) as u8);
        buffer.push(((value >> 8) & 0xFF) as u8);
        buffer.push((value & 0xFF) as u8);
    } else {
        return Err(crate::Error::NotSupported);
    }
    Ok(())
}

/// Write a length-prefixed UTF-8 string in the encoding
/// [`Parser::read_prefixed_string_utf8`] reads.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if the string length exceeds the encodable range.
pub fn write_prefixed_string_utf8(buffer: &mut Vec<u8>, value: &str) -> Result<()> {
    write_compressed_uint(buffer, value.len() as u32)?;
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}
