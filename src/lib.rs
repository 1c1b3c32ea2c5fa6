//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # cabfile
//!
//! A read-optimized, columnar binary archive format for JSON-shaped
//! documents. A document is transformed into a type-segregated columnar
//! model and serialized to a self-describing file carrying an embedded
//! string dictionary (raw or Huffman-coded), an optional string-id index,
//! and a marker-driven record body of objects, typed property groups, and
//! object-array column groups.
//!
//! Writing goes through [`ser::archive_from_json`] (or
//! [`ser::archive_from_model`] when a columnar model is already at hand) and
//! [`ser::write_archive`]; reading starts at [`Archive::open`].

mod document;
mod error;
mod huffman;
mod index;
mod memfile;
mod model;
mod oid;
mod query;

pub mod de;
pub mod dict;
pub mod pack;
pub mod ser;

pub use de::{Archive, ArchiveInfo};
pub use document::{FieldType, Marker, Oid, Sid, NULL_SID, NULL_TEXT};
pub use error::{Error, Result};
pub use huffman::{CodeEntry, Huffman};
pub use index::{PayloadLocation, SidIndex};
pub use memfile::{AccessMode, MemFile};
pub use model::{ColumnDoc, ColumnEntry, ColumnGroupModel, ColumnModel, ColumnObject};
pub use query::{
    ContainsPred, EqualsPred, Query, SidCacheStats, StridInfo, StridIter, StringPred,
};
