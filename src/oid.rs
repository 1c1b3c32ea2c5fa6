//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Object-identifier minting.
//!
//! Every serialized object carries a 64-bit identifier unique within one
//! archive build. The identifier compounds wall-clock time, process identity,
//! a per-process counter, thread identity, a per-thread counter, and a random
//! tail:
//!
//! ```text
//! | 63 .. 56 | 55 .. 48 | 47 .. 38 | 37 .. 30 | 29 .. 8 | 7 .. 0 |
//! |   time   | process  | process  |  thread  | thread  | random |
//! |          |  token   | counter  |  token   | counter |  tail  |
//! ```
//!
//! The per-thread counter is the uniqueness workhorse: 22 bits per thread per
//! process-counter window. Exhausting it fails the build.

use std::cell::Cell;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::document::Oid;
use crate::error::{Error, Result};

const TIME_BITS: u32 = 8;
const PROCESS_TOKEN_BITS: u32 = 8;
const PROCESS_COUNTER_BITS: u32 = 10;
const THREAD_TOKEN_BITS: u32 = 8;
const THREAD_COUNTER_BITS: u32 = 22;
const RANDOM_BITS: u32 = 8;

const THREAD_COUNTER_MAX: u64 = (1 << THREAD_COUNTER_BITS) - 1;

static PROCESS_COUNTER: AtomicU64 = AtomicU64::new(0);
static THREAD_TOKEN_SOURCE: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static THREAD_TOKEN: u64 =
        THREAD_TOKEN_SOURCE.fetch_add(1, Ordering::Relaxed) & ((1 << THREAD_TOKEN_BITS) - 1);
    static THREAD_COUNTER: Cell<u64> = Cell::new(0);
}

fn wallclock_bits() -> u64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    secs & ((1 << TIME_BITS) - 1)
}

fn process_token() -> u64 {
    u64::from(process::id()) & ((1 << PROCESS_TOKEN_BITS) - 1)
}

/// Mints a fresh object identifier.
///
/// Fails with [`Error::ThreadOutOfOids`] once the calling thread has
/// exhausted its counter space.
pub fn mint() -> Result<Oid> {
    let thread_counter = THREAD_COUNTER.with(|counter| {
        let value = counter.get();
        if value > THREAD_COUNTER_MAX {
            Err(Error::ThreadOutOfOids)
        } else {
            counter.set(value + 1);
            Ok(value)
        }
    })?;

    let process_counter =
        PROCESS_COUNTER.fetch_add(1, Ordering::Relaxed) & ((1 << PROCESS_COUNTER_BITS) - 1);
    let thread_token = THREAD_TOKEN.with(|token| *token);
    let random_tail = u64::from(rand::random::<u8>());

    let mut oid = wallclock_bits();
    oid = (oid << PROCESS_TOKEN_BITS) | process_token();
    oid = (oid << PROCESS_COUNTER_BITS) | process_counter;
    oid = (oid << THREAD_TOKEN_BITS) | thread_token;
    oid = (oid << THREAD_COUNTER_BITS) | (thread_counter & THREAD_COUNTER_MAX);
    oid = (oid << RANDOM_BITS) | random_tail;
    Ok(oid)
}
