//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The bit-file.
//!
//! A growable byte buffer with a cursor, an access mode, and a bit-level
//! sub-mode. The archive writer builds the complete file image through this
//! type: fixed-width values are written little-endian, forward references are
//! reserved with `skip` and back-patched with `seek` + `write`, and the
//! Huffman codec appends individual bits through the bit sub-mode.
//!
//! In bit mode, bits fill the byte under the cursor least-significant first.
//! Entering bit mode reserves a pending byte at the cursor (existing content
//! is preserved so that a written bit run can be re-read in place); leaving it
//! positions the cursor past the last partial byte and reports how many whole
//! bytes the run occupied.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Growth factor applied when a write or skip moves past the current
/// capacity.
const GROWTH_FACTOR: f64 = 1.7;

/// Access mode of a [`MemFile`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// A growable, cursor-addressed byte buffer.
#[derive(Debug)]
pub struct MemFile {
    data: Vec<u8>,
    pos: usize,
    mode: AccessMode,
    bit_mode: bool,
    current_read_bit: u8,
    current_write_bit: u8,
    bytes_completed: usize,
}

impl MemFile {
    /// Creates an empty buffer in read-write mode.
    pub fn new() -> MemFile {
        MemFile::from_vec(Vec::new(), AccessMode::ReadWrite)
    }

    /// Wraps an existing byte vector.
    pub fn from_vec(data: Vec<u8>, mode: AccessMode) -> MemFile {
        MemFile {
            data,
            pos: 0,
            mode,
            bit_mode: false,
            current_read_bit: 0,
            current_write_bit: 0,
            bytes_completed: 0,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The current cursor position.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// The current size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The number of bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Consumes the buffer and returns the underlying bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Moves the cursor to `pos`. In read-write mode the buffer grows to
    /// cover the position; in read-only mode the cursor may sit at most one
    /// past the end.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let pos = pos as usize;
        if pos >= self.data.len() {
            match self.mode {
                AccessMode::ReadWrite => self.data.resize(pos + 1, 0),
                AccessMode::ReadOnly => {
                    if pos > self.data.len() {
                        return Err(Error::Bounds);
                    }
                }
            }
        }
        self.pos = pos;
        Ok(())
    }

    /// Moves the cursor back to the start of the buffer.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Moves the cursor forward by `n` bytes, growing the buffer by the
    /// growth factor when the target lies past the current end.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let required = self.pos + n;
        match self.mode {
            AccessMode::ReadWrite => {
                if required >= self.data.len() {
                    let grown = (required as f64 * GROWTH_FACTOR) as usize + 1;
                    self.data.resize(grown, 0);
                }
            }
            AccessMode::ReadOnly => {
                if required > self.data.len() {
                    return Err(Error::Bounds);
                }
            }
        }
        self.pos = required;
        Ok(())
    }

    /// Returns a view of the next `n` bytes without advancing the cursor.
    pub fn peek(&self, n: usize) -> Result<&[u8]> {
        if self.pos + n > self.data.len() {
            Err(Error::Bounds)
        } else {
            Ok(&self.data[self.pos..self.pos + n])
        }
    }

    /// Returns a view of the next `n` bytes and advances the cursor.
    pub fn read(&mut self, n: usize) -> Result<&[u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::Bounds);
        }
        let view = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(view)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read(8)?))
    }

    /// Reads a list of `n` little-endian u64 values.
    pub fn read_u64_list(&mut self, n: usize) -> Result<Vec<u64>> {
        let bytes = self.read(n * 8)?;
        let mut out = Vec::with_capacity(n);
        for chunk in bytes.chunks_exact(8) {
            out.push(LittleEndian::read_u64(chunk));
        }
        Ok(out)
    }

    /// Writes `bytes` at the cursor, growing the buffer as needed.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.mode != AccessMode::ReadWrite {
            return Err(Error::WriteProtected);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        let required = self.pos + bytes.len();
        if required >= self.data.len() {
            let grown = (required as f64 * GROWTH_FACTOR) as usize + 1;
            self.data.resize(grown, 0);
        }
        self.data[self.pos..required].copy_from_slice(bytes);
        self.pos = required;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write(&buf)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write(&buf)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write(&buf)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write(&[value as u8])
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_u16(value as u16)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, value);
        self.write(&buf)
    }

    /// Truncates the buffer to the cursor position.
    pub fn shrink(&mut self) -> Result<()> {
        if self.mode != AccessMode::ReadWrite {
            return Err(Error::WriteProtected);
        }
        self.data.truncate(self.pos);
        Ok(())
    }

    /// Enters bit mode. A pending byte is reserved at the cursor (appended
    /// and zeroed if the cursor sits at the end of the buffer; existing
    /// content is left intact) and both bit counters are cleared. The cursor
    /// stays on that byte.
    pub fn begin_bits(&mut self) -> Result<()> {
        if self.mode != AccessMode::ReadWrite {
            return Err(Error::WriteProtected);
        }
        self.bit_mode = true;
        self.current_read_bit = 0;
        self.current_write_bit = 0;
        self.bytes_completed = 0;
        if self.pos >= self.data.len() {
            self.data.resize(self.pos + 1, 0);
        }
        Ok(())
    }

    /// Appends one bit to the byte under the cursor, least-significant bit
    /// first. Filling the eighth bit advances to a freshly reserved byte.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        if !self.bit_mode {
            return Err(Error::NotInBitMode);
        }
        self.current_read_bit = 0;
        if self.current_write_bit == 8 {
            self.current_write_bit = 0;
            self.bytes_completed += 1;
            self.pos += 1;
            if self.pos >= self.data.len() {
                self.data.resize(self.pos + 1, 0);
            }
        }
        let mask = 1u8 << self.current_write_bit;
        if bit {
            self.data[self.pos] |= mask;
        } else {
            self.data[self.pos] &= !mask;
        }
        self.current_write_bit += 1;
        Ok(())
    }

    /// Reads the next bit from the byte under the cursor, mirroring
    /// [`MemFile::write_bit`].
    pub fn read_bit(&mut self) -> Result<bool> {
        if !self.bit_mode {
            return Err(Error::NotInBitMode);
        }
        self.current_write_bit = 0;
        if self.current_read_bit == 8 {
            self.current_read_bit = 0;
            self.bytes_completed += 1;
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return Err(Error::Bounds);
        }
        let bit = self.data[self.pos] & (1 << self.current_read_bit) != 0;
        self.current_read_bit += 1;
        Ok(bit)
    }

    /// Leaves bit mode. The cursor moves past the last partial byte; the
    /// return value is the number of whole bytes the bit run occupied.
    pub fn end_bits(&mut self) -> Result<usize> {
        if !self.bit_mode {
            return Err(Error::NotInBitMode);
        }
        self.bit_mode = false;
        self.pos += 1;
        self.bytes_completed += 1;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        let written = self.bytes_completed;
        self.current_read_bit = 0;
        self.current_write_bit = 0;
        self.bytes_completed = 0;
        Ok(written)
    }
}

impl Default for MemFile {
    fn default() -> Self {
        MemFile::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_round_trip() {
        let mut file = MemFile::new();
        file.write_u64(0xdead_beef_cafe_f00d).unwrap();
        file.write_u32(42).unwrap();
        file.write_u8(7).unwrap();
        file.seek(0).unwrap();
        assert_eq!(file.read_u64().unwrap(), 0xdead_beef_cafe_f00d);
        assert_eq!(file.read_u32().unwrap(), 42);
        assert_eq!(file.read_u8().unwrap(), 7);
    }

    #[test]
    fn test_read_only_rejects_overrun_and_writes() {
        let mut file = MemFile::from_vec(vec![1, 2, 3], AccessMode::ReadOnly);
        assert_eq!(file.read(4).unwrap_err(), Error::Bounds);
        assert_eq!(file.write(&[0]).unwrap_err(), Error::WriteProtected);
        assert_eq!(file.seek(10).unwrap_err(), Error::Bounds);
    }

    #[test]
    fn test_skip_grows_in_read_write_mode() {
        let mut file = MemFile::new();
        file.skip(100).unwrap();
        assert_eq!(file.position(), 100);
        assert!(file.size() > 100);
    }

    #[test]
    fn test_shrink_truncates_to_cursor() {
        let mut file = MemFile::new();
        file.write(&[1, 2, 3, 4]).unwrap();
        file.seek(2).unwrap();
        file.shrink().unwrap();
        assert_eq!(file.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_bit_op_outside_bit_mode_fails() {
        let mut file = MemFile::new();
        assert_eq!(file.write_bit(true).unwrap_err(), Error::NotInBitMode);
        assert_eq!(file.read_bit().unwrap_err(), Error::NotInBitMode);
        assert_eq!(file.end_bits().unwrap_err(), Error::NotInBitMode);
    }

    #[test]
    fn test_bit_round_trip() {
        let bits = [true, false, true, true, false, false, true, false, true, true, false];
        let mut file = MemFile::new();
        file.begin_bits().unwrap();
        for &bit in bits.iter() {
            file.write_bit(bit).unwrap();
        }
        let written = file.end_bits().unwrap();
        assert_eq!(written, 2);

        file.seek(0).unwrap();
        file.begin_bits().unwrap();
        for &expected in bits.iter() {
            assert_eq!(file.read_bit().unwrap(), expected);
        }
        file.end_bits().unwrap();
    }

    #[test]
    fn test_bit_run_of_zero_bits_occupies_one_byte() {
        let mut file = MemFile::new();
        file.begin_bits().unwrap();
        assert_eq!(file.end_bits().unwrap(), 1);
        assert_eq!(file.position(), 1);
    }

    #[test]
    fn test_bits_fill_lsb_first() {
        let mut file = MemFile::new();
        file.begin_bits().unwrap();
        file.write_bit(true).unwrap();
        file.write_bit(false).unwrap();
        file.write_bit(true).unwrap();
        file.end_bits().unwrap();
        assert_eq!(file.as_slice()[0], 0b0000_0101);
    }

    proptest::proptest! {
        #[test]
        fn prop_bit_round_trip(bits in proptest::collection::vec(proptest::bool::ANY, 0..256)) {
            let mut file = MemFile::new();
            file.begin_bits().unwrap();
            for &bit in bits.iter() {
                file.write_bit(bit).unwrap();
            }
            let written = file.end_bits().unwrap();
            let expected_bytes = if bits.is_empty() { 1 } else { (bits.len() + 7) / 8 };
            proptest::prop_assert_eq!(written, expected_bytes);

            file.seek(0).unwrap();
            file.begin_bits().unwrap();
            for &expected in bits.iter() {
                proptest::prop_assert_eq!(file.read_bit().unwrap(), expected);
            }
            file.end_bits().unwrap();
        }
    }
}
