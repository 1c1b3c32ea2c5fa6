//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The sid→offset index.
//!
//! An optional secondary index appended to a finalized archive. It maps each
//! string id to the position and original length of its packer-encoded
//! payload inside the string table, letting lookups skip the linear entry
//! scan. The serialized form is a flat dump of the map, re-loadable from a
//! file path plus a start offset.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::document::{
    Marker, Sid, FILE_HEADER_SIZE, MAGIC, STRING_ENTRY_HEADER_SIZE, STRING_TABLE_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::memfile::MemFile;

/// Location of one encoded string payload: absolute offset and original
/// byte length.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PayloadLocation {
    pub offset: u64,
    pub len: u32,
}

/// Map from string id to the location of its encoded payload.
#[derive(Debug, Default)]
pub struct SidIndex {
    mapping: HashMap<Sid, PayloadLocation>,
}

impl SidIndex {
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn get(&self, sid: Sid) -> Option<PayloadLocation> {
        self.mapping.get(&sid).copied()
    }

    /// Builds the index by walking the string-table entry chain of a
    /// finalized archive image.
    pub fn build_from_image(image: &[u8]) -> Result<SidIndex> {
        if image.len() < FILE_HEADER_SIZE + STRING_TABLE_HEADER_SIZE
            || &image[..MAGIC.len()] != MAGIC
        {
            return Err(Error::NotAnArchive);
        }

        let table_off = FILE_HEADER_SIZE;
        if image[table_off] != Marker::StringTable.symbol() {
            return Err(Error::CorruptedMarker {
                expected: Marker::StringTable.symbol(),
                found: image[table_off],
                position: table_off as u64,
            });
        }
        let num_entries = read_u32_at(image, table_off + 1)?;
        let first_entry_off = read_u64_at(image, table_off + 6)?;

        let mut index = SidIndex::default();
        let mut entry_off = first_entry_off;
        for _ in 0..num_entries {
            let at = entry_off as usize;
            if at + STRING_ENTRY_HEADER_SIZE > image.len() {
                return Err(Error::ScanFailed);
            }
            if image[at] != Marker::StringEntry.symbol() {
                return Err(Error::CorruptedMarker {
                    expected: Marker::StringEntry.symbol(),
                    found: image[at],
                    position: entry_off,
                });
            }
            let next_off = read_u64_at(image, at + 1)?;
            let sid = read_u64_at(image, at + 9)?;
            let len = read_u32_at(image, at + 17)?;
            index.mapping.insert(
                sid,
                PayloadLocation {
                    offset: entry_off + STRING_ENTRY_HEADER_SIZE as u64,
                    len,
                },
            );
            if next_off == 0 {
                break;
            }
            entry_off = next_off;
        }
        if index.mapping.len() != num_entries as usize {
            return Err(Error::ScanFailed);
        }
        Ok(index)
    }

    /// Serializes the map as a u32 entry count followed by packed
    /// (sid, offset, len) rows in ascending sid order.
    pub fn serialize(&self, file: &mut MemFile) -> Result<()> {
        let mut sids: Vec<Sid> = self.mapping.keys().copied().collect();
        sids.sort_unstable();

        file.write_u32(self.mapping.len() as u32)?;
        for sid in sids {
            let location = self.mapping[&sid];
            file.write_u64(sid)?;
            file.write_u64(location.offset)?;
            file.write_u32(location.len)?;
        }
        Ok(())
    }

    /// Reloads a serialized index from `path`, starting at `offset`.
    pub fn deserialize(path: &Path, offset: u64) -> Result<SidIndex> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            return Err(Error::IndexCorrupted);
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;

        let num_entries = reader.read_u32::<LittleEndian>()?;
        let mut index = SidIndex::default();
        for _ in 0..num_entries {
            let sid = reader.read_u64::<LittleEndian>()?;
            let payload_off = reader.read_u64::<LittleEndian>()?;
            let len = reader.read_u32::<LittleEndian>()?;
            index
                .mapping
                .insert(sid, PayloadLocation { offset: payload_off, len });
        }
        Ok(index)
    }
}

fn read_u32_at(image: &[u8], at: usize) -> Result<u32> {
    image
        .get(at..at + 4)
        .map(LittleEndian::read_u32)
        .ok_or(Error::Bounds)
}

fn read_u64_at(image: &[u8], at: usize) -> Result<u64> {
    image
        .get(at..at + 8)
        .map(LittleEndian::read_u64)
        .ok_or(Error::Bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_serialize_deserialize_round_trip() {
        let mut index = SidIndex::default();
        index.mapping.insert(7, PayloadLocation { offset: 100, len: 5 });
        index.mapping.insert(3, PayloadLocation { offset: 50, len: 2 });

        let mut file = MemFile::new();
        index.serialize(&mut file).unwrap();
        file.shrink().unwrap();
        let bytes = file.into_vec();

        let mut disk = tempfile::NamedTempFile::new().unwrap();
        disk.write_all(&bytes).unwrap();
        disk.flush().unwrap();

        let loaded = SidIndex::deserialize(disk.path(), 0).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(7), Some(PayloadLocation { offset: 100, len: 5 }));
        assert_eq!(loaded.get(3), Some(PayloadLocation { offset: 50, len: 2 }));
        assert_eq!(loaded.get(4), None);
    }

    #[test]
    fn test_deserialize_rejects_offset_past_eof() {
        let mut disk = tempfile::NamedTempFile::new().unwrap();
        disk.write_all(&[0u8; 16]).unwrap();
        assert_eq!(
            SidIndex::deserialize(disk.path(), 64).unwrap_err(),
            Error::IndexCorrupted
        );
    }
}
