//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The synchronous string dictionary.
//!
//! A vector of slot entries provides id allocation through a free list; a
//! key→sid map answers lookups. Batch inserts first probe the map for all
//! keys at once, then run the not-found tail through a bloom filter so that
//! keys which are definitely new in this batch skip the second exact lookup.

use std::collections::HashMap;

use tracing::debug;

use crate::dict::{hash_key, Bloom, LocateResult, StringDictionary};
use crate::document::{Sid, NULL_SID, NULL_TEXT};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
struct Entry {
    value: Option<Box<str>>,
}

/// Slot-vector dictionary; all operations run on the calling thread.
#[derive(Debug)]
pub struct SyncDictionary {
    contents: Vec<Entry>,
    freelist: Vec<Sid>,
    index: HashMap<Box<str>, Sid>,
}

impl SyncDictionary {
    /// Creates a dictionary with room for `capacity` strings before the
    /// first grow. Slot 0 is reserved for the null string and never issued.
    pub fn with_capacity(capacity: usize) -> SyncDictionary {
        let capacity = capacity.max(2);
        SyncDictionary {
            contents: vec![Entry::default(); capacity],
            freelist: (1..capacity as Sid).rev().collect(),
            index: HashMap::with_capacity(capacity),
        }
    }

    pub fn new() -> SyncDictionary {
        SyncDictionary::with_capacity(1024)
    }

    fn freelist_pop(&mut self) -> Sid {
        if self.freelist.is_empty() {
            let old_len = self.contents.len();
            let new_len = (old_len as f64 * 1.7) as usize + 1;
            self.contents.resize(new_len, Entry::default());
            for slot in (old_len as Sid..new_len as Sid).rev() {
                self.freelist.push(slot);
            }
        }
        self.freelist.pop().expect("freelist refilled above")
    }
}

impl Default for SyncDictionary {
    fn default() -> Self {
        SyncDictionary::new()
    }
}

impl StringDictionary for SyncDictionary {
    fn insert(&mut self, keys: &[&str]) -> Result<Vec<Sid>> {
        debug!(num_keys = keys.len(), "sync dictionary insert");

        // One bulk probe against the pre-batch index; only the not-found
        // tail is considered for allocation.
        let probed = self.locate_safe(keys)?;
        let mut bloom = Bloom::new(22 * probed.num_not_found.max(1));

        let mut out = Vec::with_capacity(keys.len());
        for (i, &key) in keys.iter().enumerate() {
            if probed.found_mask[i] {
                out.push(probed.sids[i]);
                continue;
            }
            // The key was absent before this batch, but an earlier iteration
            // of this loop may have inserted it already.
            let mut existing = None;
            if bloom.test_and_set(hash_key(key)) {
                existing = self.index.get(key).copied();
            }
            match existing {
                Some(sid) => out.push(sid),
                None => {
                    let sid = self.freelist_pop();
                    let slot = &mut self.contents[sid as usize];
                    debug_assert!(slot.value.is_none());
                    if slot.value.is_some() {
                        return Err(Error::Internal("allocated slot is occupied"));
                    }
                    slot.value = Some(Box::from(key));
                    self.index.insert(Box::from(key), sid);
                    out.push(sid);
                }
            }
        }
        Ok(out)
    }

    fn locate_safe(&self, keys: &[&str]) -> Result<LocateResult> {
        let mut result = LocateResult {
            sids: Vec::with_capacity(keys.len()),
            found_mask: Vec::with_capacity(keys.len()),
            num_not_found: 0,
        };
        for &key in keys {
            match self.index.get(key) {
                Some(&sid) => {
                    result.sids.push(sid);
                    result.found_mask.push(true);
                }
                None => {
                    result.sids.push(NULL_SID);
                    result.found_mask.push(false);
                    result.num_not_found += 1;
                }
            }
        }
        Ok(result)
    }

    fn locate_fast(&self, keys: &[&str]) -> Result<Vec<Sid>> {
        Ok(self.locate_safe(keys)?.sids)
    }

    fn extract(&self, sids: &[Sid]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(sids.len());
        for &sid in sids {
            if sid == NULL_SID {
                out.push(NULL_TEXT.to_string());
                continue;
            }
            let entry = self
                .contents
                .get(sid as usize)
                .and_then(|entry| entry.value.as_deref())
                .ok_or(Error::NotFound)?;
            out.push(entry.to_string());
        }
        Ok(out)
    }

    fn remove(&mut self, sids: &[Sid]) -> Result<()> {
        for &sid in sids {
            if sid == NULL_SID || sid as usize >= self.contents.len() {
                continue;
            }
            if let Some(value) = self.contents[sid as usize].value.take() {
                self.index.remove(&value);
                self.freelist.push(sid);
            }
        }
        Ok(())
    }

    fn num_distinct(&self) -> usize {
        self.index.len()
    }

    fn contents(&self) -> (Vec<String>, Vec<Sid>) {
        let mut strings = Vec::with_capacity(self.index.len());
        let mut sids = Vec::with_capacity(self.index.len());
        for (slot, entry) in self.contents.iter().enumerate() {
            if let Some(value) = entry.value.as_deref() {
                strings.push(value.to_string());
                sids.push(slot as Sid);
            }
        }
        (strings, sids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut dict = SyncDictionary::new();
        let first = dict.insert(&["a", "b", "a"]).unwrap();
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);

        let second = dict.insert(&["b", "a"]).unwrap();
        assert_eq!(second, vec![first[1], first[0]]);
        assert_eq!(dict.num_distinct(), 2);
    }

    #[test]
    fn test_sid_zero_is_never_issued() {
        let mut dict = SyncDictionary::with_capacity(2);
        let keys: Vec<String> = (0..100).map(|i| format!("k{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let sids = dict.insert(&refs).unwrap();
        assert!(sids.iter().all(|&sid| sid != NULL_SID));
    }

    #[test]
    fn test_extract_resolves_null_and_strings() {
        let mut dict = SyncDictionary::new();
        let sids = dict.insert(&["x"]).unwrap();
        let extracted = dict.extract(&[NULL_SID, sids[0]]).unwrap();
        assert_eq!(extracted, vec!["null".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_locate_safe_reports_missing_keys() {
        let mut dict = SyncDictionary::new();
        dict.insert(&["present"]).unwrap();
        let result = dict.locate_safe(&["present", "absent"]).unwrap();
        assert_eq!(result.found_mask, vec![true, false]);
        assert_eq!(result.num_not_found, 1);
    }

    #[test]
    fn test_remove_enables_reuse() {
        let mut dict = SyncDictionary::new();
        let sids = dict.insert(&["gone"]).unwrap();
        dict.remove(&sids).unwrap();
        assert_eq!(dict.num_distinct(), 0);
        assert!(!dict.locate_safe(&["gone"]).unwrap().found_mask[0]);

        let reused = dict.insert(&["fresh"]).unwrap();
        assert_eq!(reused, sids);
    }

    #[test]
    fn test_contents_scans_live_entries() {
        let mut dict = SyncDictionary::new();
        dict.insert(&["a", "b"]).unwrap();
        let (strings, sids) = dict.contents();
        assert_eq!(strings.len(), 2);
        assert_eq!(sids.len(), 2);
        assert!(strings.contains(&"a".to_string()));
        assert!(strings.contains(&"b".to_string()));
    }

    proptest::proptest! {
        #[test]
        fn prop_distinct_strings_get_distinct_sids(
            keys in proptest::collection::hash_set("[a-z]{1,8}", 1..64)
        ) {
            let keys: Vec<String> = keys.into_iter().collect();
            let refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
            let mut dict = SyncDictionary::new();
            let sids = dict.insert(&refs).unwrap();

            let mut dedup = sids.clone();
            dedup.sort_unstable();
            dedup.dedup();
            proptest::prop_assert_eq!(dedup.len(), sids.len());

            let round = dict.extract(&sids).unwrap();
            proptest::prop_assert_eq!(round, keys);
        }
    }
}
