//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Archive queries.
//!
//! Resolves string ids back to their strings. `fetch_string` consults the
//! bounded sid cache first, then the sid→offset index if the archive carries
//! one, and finally falls back to a linear scan of the embedded string
//! table. Bulk offset fetches hold the archive's I/O lock for the whole
//! batch. `find_ids` runs an opaque predicate over the table in blocks of
//! entries and accumulates matching sids up to a limit.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::trace;

use crate::de::Archive;
use crate::document::{Marker, Sid, NULL_SID, NULL_TEXT};
use crate::error::{Error, Result};

/// Entries fetched per block during a string-table scan.
const SCAN_BLOCK_LEN: usize = 100;

/// Location summary of one embedded string entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StridInfo {
    pub sid: Sid,
    /// Absolute offset of the packer-encoded payload.
    pub offset: u64,
    /// Original length of the string in bytes.
    pub len: u32,
}

/// Block iterator over the string-table entries, reading the entry chain
/// from its own file handle.
pub struct StridIter {
    file: File,
    next_off: u64,
}

impl StridIter {
    fn open(archive: &Archive) -> Result<StridIter> {
        let file = File::open(&archive.path).map_err(|_| Error::ScanFailed)?;
        Ok(StridIter {
            file,
            next_off: if archive.string_table.num_entries == 0 {
                0
            } else {
                archive.string_table.first_entry_off
            },
        })
    }

    /// Reads the next block of entry locations, or `None` after the last
    /// entry.
    pub fn next_block(&mut self) -> Result<Option<Vec<StridInfo>>> {
        if self.next_off == 0 {
            return Ok(None);
        }
        let mut block = Vec::with_capacity(SCAN_BLOCK_LEN);
        while self.next_off != 0 && block.len() < SCAN_BLOCK_LEN {
            self.file.seek(SeekFrom::Start(self.next_off))?;
            let marker = self.file.read_u8()?;
            if marker != Marker::StringEntry.symbol() {
                return Err(Error::CorruptedMarker {
                    expected: Marker::StringEntry.symbol(),
                    found: marker,
                    position: self.next_off,
                });
            }
            let next_entry_off = self.file.read_u64::<LittleEndian>()?;
            let sid = self.file.read_u64::<LittleEndian>()?;
            let len = self.file.read_u32::<LittleEndian>()?;
            block.push(StridInfo {
                sid,
                offset: self.file.stream_position()?,
                len,
            });
            self.next_off = next_entry_off;
        }
        Ok(Some(block))
    }
}

/// A predicate over embedded strings, evaluated by [`Query::find_ids`].
///
/// `validate` lets a predicate reject an invalid capture before the scan
/// starts; `limit` lets it impose a stricter cap than the caller's.
pub trait StringPred {
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn limit(&self) -> Option<usize> {
        None
    }

    fn matches(&self, string: &str) -> bool;
}

/// Matches strings equal to the capture.
pub struct EqualsPred(pub String);

impl StringPred for EqualsPred {
    fn matches(&self, string: &str) -> bool {
        string == self.0
    }
}

/// Matches strings containing the capture. An empty capture is invalid.
pub struct ContainsPred(pub String);

impl StringPred for ContainsPred {
    fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            Err(Error::PredicateFailed)
        } else {
            Ok(())
        }
    }

    fn matches(&self, string: &str) -> bool {
        string.contains(&self.0)
    }
}

/// Bounded sid→string cache with first-in eviction and hit statistics.
#[derive(Debug)]
pub struct SidCache {
    capacity: usize,
    map: HashMap<Sid, String>,
    order: VecDeque<Sid>,
    stats: SidCacheStats,
}

/// Counters of the sid cache.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, serde::Serialize)]
pub struct SidCacheStats {
    pub num_hits: u64,
    pub num_misses: u64,
    pub num_evicted: u64,
}

impl SidCache {
    pub fn new(capacity: usize) -> SidCache {
        SidCache {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
            stats: SidCacheStats::default(),
        }
    }

    fn get(&mut self, sid: Sid) -> Option<String> {
        match self.map.get(&sid) {
            Some(string) => {
                self.stats.num_hits += 1;
                Some(string.clone())
            }
            None => {
                self.stats.num_misses += 1;
                None
            }
        }
    }

    fn put(&mut self, sid: Sid, string: String) {
        if self.map.contains_key(&sid) {
            return;
        }
        if self.map.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
                self.stats.num_evicted += 1;
            }
        }
        self.map.insert(sid, string);
        self.order.push_back(sid);
    }

    pub fn stats(&self) -> SidCacheStats {
        self.stats
    }
}

/// A query handle borrowed from an open archive.
pub struct Query<'a> {
    archive: &'a Archive,
}

impl<'a> Query<'a> {
    pub(crate) fn new(archive: &'a Archive) -> Query<'a> {
        Query { archive }
    }

    /// Resolves one sid to its string: cache, then index, then linear scan.
    pub fn fetch_string(&self, sid: Sid) -> Result<String> {
        if sid == NULL_SID {
            return Ok(NULL_TEXT.to_string());
        }
        if let Some(hit) = self.archive.cache.lock().expect("cache poisoned").get(sid) {
            return Ok(hit);
        }
        let string = self.fetch_string_nocache(sid)?;
        self.archive
            .cache
            .lock()
            .expect("cache poisoned")
            .put(sid, string.clone());
        Ok(string)
    }

    /// Resolves one sid without touching the cache.
    pub fn fetch_string_nocache(&self, sid: Sid) -> Result<String> {
        match self.archive.sid_index.as_ref() {
            Some(index) => {
                let location = index.get(sid).ok_or(Error::NotFound)?;
                if location.offset >= self.archive.file_size {
                    return Err(Error::IndexCorrupted);
                }
                trace!(sid, "fetching string via index");
                let mut fetched =
                    self.fetch_strings_by_offset(&[location.offset], &[location.len])?;
                Ok(fetched.remove(0))
            }
            None => self.fetch_string_via_scan(sid),
        }
    }

    fn fetch_string_via_scan(&self, sid: Sid) -> Result<String> {
        trace!(sid, "fetching string via table scan");
        let mut iter = self.scan_strids()?;
        while let Some(block) = iter.next_block()? {
            for info in block {
                if info.sid == sid {
                    let mut fetched =
                        self.fetch_strings_by_offset(&[info.offset], &[info.len])?;
                    return Ok(fetched.remove(0));
                }
            }
        }
        Err(Error::NotFound)
    }

    /// Decodes the strings at the given payload offsets. The archive's I/O
    /// lock is held for the whole batch.
    pub fn fetch_strings_by_offset(&self, offsets: &[u64], lens: &[u32]) -> Result<Vec<String>> {
        debug_assert_eq!(offsets.len(), lens.len());
        let mut file = self.archive.io.lock().expect("io context poisoned");
        let mut result = Vec::with_capacity(offsets.len());
        for (&offset, &len) in offsets.iter().zip(lens.iter()) {
            file.seek(SeekFrom::Start(offset))?;
            let string = self
                .archive
                .string_table
                .packer
                .decode_string(&mut *file, len as usize)?;
            result.push(string);
        }
        Ok(result)
    }

    /// Opens a block iterator over the string-table entries.
    pub fn scan_strids(&self) -> Result<StridIter> {
        StridIter::open(self.archive)
    }

    /// Fetches every embedded string with its sid.
    pub fn all_strings(&self) -> Result<Vec<(Sid, String)>> {
        let mut result = Vec::new();
        let mut iter = self.scan_strids()?;
        while let Some(block) = iter.next_block()? {
            let offsets: Vec<u64> = block.iter().map(|info| info.offset).collect();
            let lens: Vec<u32> = block.iter().map(|info| info.len).collect();
            let strings = self.fetch_strings_by_offset(&offsets, &lens)?;
            result.extend(block.iter().map(|info| info.sid).zip(strings));
        }
        Ok(result)
    }

    /// Scans the string table for ids whose strings satisfy the predicate,
    /// stopping after `limit` matches (or the predicate's stricter limit).
    pub fn find_ids(&self, pred: &dyn StringPred, limit: Option<usize>) -> Result<Vec<Sid>> {
        pred.validate()?;
        let limit = match (pred.limit(), limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        let mut iter = self.scan_strids()?;
        'scan: while let Some(block) = iter.next_block()? {
            let offsets: Vec<u64> = block.iter().map(|info| info.offset).collect();
            let lens: Vec<u32> = block.iter().map(|info| info.len).collect();
            let strings = self.fetch_strings_by_offset(&offsets, &lens)?;
            for (info, string) in block.iter().zip(strings.iter()) {
                if pred.matches(string) {
                    matches.push(info.sid);
                    if limit.map(|cap| matches.len() >= cap).unwrap_or(false) {
                        break 'scan;
                    }
                }
            }
        }
        Ok(matches)
    }

    /// The sid-cache counters of the underlying archive.
    pub fn cache_stats(&self) -> SidCacheStats {
        self.archive.cache.lock().expect("cache poisoned").stats()
    }
}
