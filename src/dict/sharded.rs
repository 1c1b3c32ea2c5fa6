//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The sharded string dictionary.
//!
//! N synchronous shards, each owning a disjoint slice of the key-hash space.
//! Every bulk call partitions its input by `hash(key) mod N`, hands each
//! shard its slice on a dedicated scoped worker thread, joins all workers,
//! and reassembles the results in the caller's input order. Sids from shard
//! `s` with local id `l` are externalized as `(s << 54) | l`; incoming sids
//! are decomposed the same way to route operations.
//!
//! Workers share no mutable state: each receives an exclusive borrow of its
//! shard and writes only its own result slot. A started bulk operation runs
//! to completion; worker failures are reported after the join barrier.

use crossbeam_utils::thread;
use tracing::{debug, trace};

use crate::dict::{
    compound_sid, hash_key, split_sid, LocateResult, StringDictionary, SyncDictionary, MAX_SHARDS,
};
use crate::document::{Sid, NULL_SID, NULL_TEXT};
use crate::error::{Error, Result};

/// Routing of one bulk input: which shard owns each element, and at which
/// position of that shard's slice it sits.
struct Routing {
    shard_of: Vec<usize>,
    index_in_shard: Vec<usize>,
}

/// Hash-partitioned dictionary with one worker per shard per bulk call.
#[derive(Debug)]
pub struct ShardedDictionary {
    shards: Vec<SyncDictionary>,
}

impl ShardedDictionary {
    /// Creates a dictionary with `num_shards` shards, each pre-sized for
    /// `capacity / num_shards` strings.
    pub fn new(num_shards: usize, capacity: usize) -> Result<ShardedDictionary> {
        if num_shards == 0 || num_shards > MAX_SHARDS {
            return Err(Error::Internal("shard count out of range"));
        }
        let per_shard = (capacity / num_shards).max(16);
        Ok(ShardedDictionary {
            shards: (0..num_shards)
                .map(|_| SyncDictionary::with_capacity(per_shard))
                .collect(),
        })
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// The shard owning `key`.
    pub fn shard_of(&self, key: &str) -> usize {
        (hash_key(key) % self.shards.len() as u64) as usize
    }

    /// Partitions keys into per-shard slices, remembering for every input
    /// position its shard and its position within the shard slice.
    fn route_keys<'a>(&self, keys: &[&'a str]) -> (Vec<Vec<&'a str>>, Routing) {
        let mut slices: Vec<Vec<&str>> = vec![Vec::new(); self.shards.len()];
        let mut routing = Routing {
            shard_of: Vec::with_capacity(keys.len()),
            index_in_shard: Vec::with_capacity(keys.len()),
        };
        for &key in keys {
            let shard = self.shard_of(key);
            routing.shard_of.push(shard);
            routing.index_in_shard.push(slices[shard].len());
            slices[shard].push(key);
        }
        (slices, routing)
    }

    /// Partitions compound sids into per-shard local-id slices.
    fn route_sids(&self, sids: &[Sid]) -> Result<(Vec<Vec<Sid>>, Routing)> {
        let mut slices: Vec<Vec<Sid>> = vec![Vec::new(); self.shards.len()];
        let mut routing = Routing {
            shard_of: Vec::with_capacity(sids.len()),
            index_in_shard: Vec::with_capacity(sids.len()),
        };
        for &sid in sids {
            let (shard, local) = split_sid(sid);
            if shard >= self.shards.len() {
                return Err(Error::NotFound);
            }
            routing.shard_of.push(shard);
            routing.index_in_shard.push(slices[shard].len());
            slices[shard].push(local);
        }
        Ok((slices, routing))
    }
}

/// Joins a scoped worker, folding panics into an internal error.
fn joined<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .map_err(|_| Error::Internal("shard worker panicked"))?
}

impl StringDictionary for ShardedDictionary {
    fn insert(&mut self, keys: &[&str]) -> Result<Vec<Sid>> {
        debug!(num_keys = keys.len(), num_shards = self.shards.len(), "sharded insert");
        let (slices, routing) = self.route_keys(keys);

        let per_shard = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.shards.len());
            for (shard_id, (shard, slice)) in
                self.shards.iter_mut().zip(slices.iter()).enumerate()
            {
                trace!(shard_id, num_keys = slice.len(), "insert worker spawned");
                handles.push(scope.spawn(move |_| shard.insert(slice)));
            }
            handles.into_iter().map(joined).collect::<Vec<_>>()
        })
        .map_err(|_| Error::Internal("shard scope panicked"))?;

        let mut locals = Vec::with_capacity(self.shards.len());
        for result in per_shard {
            locals.push(result?);
        }

        let mut out = Vec::with_capacity(keys.len());
        for i in 0..keys.len() {
            let shard = routing.shard_of[i];
            let local = locals[shard][routing.index_in_shard[i]];
            out.push(compound_sid(shard, local));
        }
        Ok(out)
    }

    fn locate_safe(&self, keys: &[&str]) -> Result<LocateResult> {
        debug!(num_keys = keys.len(), "sharded locate");
        let (slices, routing) = self.route_keys(keys);

        let per_shard = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.shards.len());
            for (shard, slice) in self.shards.iter().zip(slices.iter()) {
                handles.push(scope.spawn(move |_| shard.locate_safe(slice)));
            }
            handles.into_iter().map(joined).collect::<Vec<_>>()
        })
        .map_err(|_| Error::Internal("shard scope panicked"))?;

        let mut located = Vec::with_capacity(self.shards.len());
        for result in per_shard {
            located.push(result?);
        }

        let mut merged = LocateResult {
            sids: Vec::with_capacity(keys.len()),
            found_mask: Vec::with_capacity(keys.len()),
            num_not_found: 0,
        };
        for i in 0..keys.len() {
            let shard = routing.shard_of[i];
            let index = routing.index_in_shard[i];
            let found = located[shard].found_mask[index];
            merged.found_mask.push(found);
            if found {
                merged
                    .sids
                    .push(compound_sid(shard, located[shard].sids[index]));
            } else {
                merged.sids.push(NULL_SID);
                merged.num_not_found += 1;
            }
        }
        Ok(merged)
    }

    fn locate_fast(&self, keys: &[&str]) -> Result<Vec<Sid>> {
        Ok(self.locate_safe(keys)?.sids)
    }

    fn extract(&self, sids: &[Sid]) -> Result<Vec<String>> {
        let (slices, routing) = self.route_sids(sids)?;

        let per_shard = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.shards.len());
            for (shard, slice) in self.shards.iter().zip(slices.iter()) {
                handles.push(scope.spawn(move |_| shard.extract(slice)));
            }
            handles.into_iter().map(joined).collect::<Vec<_>>()
        })
        .map_err(|_| Error::Internal("shard scope panicked"))?;

        let mut extracted = Vec::with_capacity(self.shards.len());
        for result in per_shard {
            extracted.push(result?);
        }

        let mut out = Vec::with_capacity(sids.len());
        for i in 0..sids.len() {
            if sids[i] == NULL_SID {
                out.push(NULL_TEXT.to_string());
            } else {
                let shard = routing.shard_of[i];
                out.push(extracted[shard][routing.index_in_shard[i]].clone());
            }
        }
        Ok(out)
    }

    fn remove(&mut self, sids: &[Sid]) -> Result<()> {
        debug!(num_sids = sids.len(), "sharded remove");
        let (slices, _) = self.route_sids(sids)?;

        let per_shard = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.shards.len());
            for (shard, slice) in self.shards.iter_mut().zip(slices.iter()) {
                handles.push(scope.spawn(move |_| shard.remove(slice)));
            }
            handles.into_iter().map(joined).collect::<Vec<_>>()
        })
        .map_err(|_| Error::Internal("shard scope panicked"))?;

        for result in per_shard {
            result?;
        }
        Ok(())
    }

    fn num_distinct(&self) -> usize {
        self.shards.iter().map(|shard| shard.num_distinct()).sum()
    }

    fn contents(&self) -> (Vec<String>, Vec<Sid>) {
        let mut strings = Vec::new();
        let mut sids = Vec::new();
        for (shard_id, shard) in self.shards.iter().enumerate() {
            let (shard_strings, shard_sids) = shard.contents();
            strings.extend(shard_strings);
            sids.extend(
                shard_sids
                    .into_iter()
                    .map(|local| compound_sid(shard_id, local)),
            );
        }
        (strings, sids)
    }
}
