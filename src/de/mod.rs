//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The archive reader.
//!
//! Opening an archive validates the magic, version and record offset, reads
//! the string-table header, instantiates the packer named by its flag byte
//! and lets it deserialize its extra data, then maps the record body into
//! memory for cursor-based traversal. If the file header carries a string-id
//! index offset, the index is reloaded from the file tail.
//!
//! The record body is a byte buffer whose offsets are root-relative, so every
//! offset stored on disk is a direct index into it.

mod decode;
mod dump;
pub(crate) mod parser;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::document::{
    Marker, FILE_HEADER_SIZE, RECORD_HEADER_SIZE, STRING_TABLE_HEADER_SIZE, VERSION,
};
use crate::error::{Error, Result};
use crate::index::SidIndex;
use crate::memfile::{AccessMode, MemFile};
use crate::pack::{self, Packer};
use crate::query::{Query, SidCache};

/// Default capacity of the sid→string cache kept in front of the query path.
const SID_CACHE_CAPACITY: usize = 4096;

/// Size summary of an opened archive.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ArchiveInfo {
    pub string_table_size: u64,
    pub record_body_size: u64,
    pub sid_index_size: u64,
    pub num_embedded_strings: u32,
}

/// The embedded string table of an opened archive.
pub(crate) struct StringTable {
    pub packer: Box<dyn Packer>,
    pub first_entry_off: u64,
    pub num_entries: u32,
}

/// A finalized, immutable archive file.
pub struct Archive {
    pub(crate) path: PathBuf,
    pub(crate) file_size: u64,
    info: ArchiveInfo,
    pub(crate) string_table: StringTable,
    record_flags: u8,
    body: Vec<u8>,
    pub(crate) sid_index: Option<SidIndex>,
    /// Serializes random-access reads against the underlying file.
    pub(crate) io: Mutex<File>,
    pub(crate) cache: Mutex<SidCache>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Archive")
            .field("path", &self.path)
            .field("info", &self.info)
            .finish()
    }
}

impl Archive {
    /// Opens and validates an archive file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Archive> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "opening archive");

        let mut file = File::open(&path)?;
        let file_size = file.metadata()?.len();

        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|_| Error::NotAnArchive)?;
        let (_, header) =
            parser::document::file_header(&header_bytes).map_err(|_| Error::NotAnArchive)?;
        if header.version != VERSION || header.record_header_off == 0 {
            return Err(Error::NotAnArchive);
        }

        let mut table_bytes = [0u8; STRING_TABLE_HEADER_SIZE];
        file.read_exact(&mut table_bytes)?;
        if table_bytes[0] != Marker::StringTable.symbol() {
            return Err(Error::CorruptedMarker {
                expected: Marker::StringTable.symbol(),
                found: table_bytes[0],
                position: FILE_HEADER_SIZE as u64,
            });
        }
        let (_, table_header) =
            parser::document::string_table_header(&table_bytes).map_err(|_| Error::NotAnArchive)?;

        let mut packer = pack::by_flags(table_header.flags)?;
        let mut extra = vec![0u8; table_header.extra_size as usize];
        file.read_exact(&mut extra)?;
        let mut extra_file = MemFile::from_vec(extra, AccessMode::ReadWrite);
        packer.read_extra(&mut extra_file, table_header.extra_size)?;

        file.seek(SeekFrom::Start(header.record_header_off))?;
        let mut record_bytes = [0u8; RECORD_HEADER_SIZE];
        file.read_exact(&mut record_bytes)?;
        if record_bytes[0] != Marker::RecordHeader.symbol() {
            return Err(Error::CorruptedMarker {
                expected: Marker::RecordHeader.symbol(),
                found: record_bytes[0],
                position: header.record_header_off,
            });
        }
        let (_, record) =
            parser::document::record_header(&record_bytes).map_err(|_| Error::NotAnArchive)?;

        let mut body = vec![0u8; record.body_size as usize];
        file.read_exact(&mut body).map_err(|_| Error::NotAnArchive)?;
        if body.first() != Some(&Marker::ObjectBegin.symbol()) {
            return Err(Error::CorruptedMarker {
                expected: Marker::ObjectBegin.symbol(),
                found: body.first().copied().unwrap_or(0),
                position: header.record_header_off + RECORD_HEADER_SIZE as u64,
            });
        }

        let sid_index = if header.sid_index_off != 0 {
            Some(SidIndex::deserialize(&path, header.sid_index_off)?)
        } else {
            None
        };

        let info = ArchiveInfo {
            string_table_size: header.record_header_off - FILE_HEADER_SIZE as u64,
            record_body_size: record.body_size,
            sid_index_size: if header.sid_index_off != 0 {
                file_size - header.sid_index_off
            } else {
                0
            },
            num_embedded_strings: table_header.num_entries,
        };

        let io = Mutex::new(File::open(&path)?);
        Ok(Archive {
            path,
            file_size,
            info,
            string_table: StringTable {
                packer,
                first_entry_off: table_header.first_entry_off,
                num_entries: table_header.num_entries,
            },
            record_flags: record.flags,
            body,
            sid_index,
            io,
            cache: Mutex::new(SidCache::new(SID_CACHE_CAPACITY)),
        })
    }

    pub fn info(&self) -> ArchiveInfo {
        self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the record body was written read-optimized (sorted).
    pub fn is_sorted(&self) -> bool {
        self.record_flags & crate::document::RECORD_FLAG_SORTED != 0
    }

    pub fn has_sid_index(&self) -> bool {
        self.sid_index.is_some()
    }

    /// The mapped record body; the root object header sits at index 0.
    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }

    /// A query handle against this archive.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Reconstructs the archived document as a JSON tree.
    pub fn to_json(&self) -> Result<Value> {
        decode::archive_to_json(self)
    }

    /// Writes an offset-annotated structural dump of the whole file.
    pub fn dump(&self, out: &mut dyn Write) -> Result<()> {
        dump::dump_archive(self, out)
    }

    /// Closes the archive, releasing the mapped record body and the
    /// underlying file handle.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::{self, ArchiveOptions};
    use serde_json::json;
    use std::io::Write as _;

    fn written(value: &Value, options: &ArchiveOptions) -> tempfile::NamedTempFile {
        let image = ser::archive_from_value(value, options).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&image).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_rejects_non_archive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an archive, far too short header")
            .unwrap();
        assert_eq!(
            Archive::open(file.path()).unwrap_err(),
            Error::NotAnArchive
        );
    }

    #[test]
    fn test_open_reports_info() {
        let file = written(&json!({"k": "v"}), &ArchiveOptions::default());
        let archive = Archive::open(file.path()).unwrap();
        let info = archive.info();
        assert_eq!(info.num_embedded_strings, 2);
        assert!(info.string_table_size > 0);
        assert!(info.record_body_size > 0);
        assert!(info.sid_index_size > 0);
        assert!(archive.has_sid_index());
        assert!(!archive.is_sorted());
    }

    #[test]
    fn test_open_without_index() {
        let options = ArchiveOptions {
            bake_sid_index: false,
            ..ArchiveOptions::default()
        };
        let file = written(&json!({"k": "v"}), &options);
        let archive = Archive::open(file.path()).unwrap();
        assert!(!archive.has_sid_index());
        assert_eq!(archive.info().sid_index_size, 0);
    }

    #[test]
    fn test_read_optimized_flag_round_trips() {
        let options = ArchiveOptions {
            read_optimized: true,
            ..ArchiveOptions::default()
        };
        let file = written(&json!({"b": 1, "a": 2}), &options);
        let archive = Archive::open(file.path()).unwrap();
        assert!(archive.is_sorted());
    }
}
