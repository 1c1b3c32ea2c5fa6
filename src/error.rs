//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use std;
use std::fmt::{self, Display};

pub type Result<T> = std::result::Result<T, Error>;

/// Archive construction, serialization and query error.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A read or write moved past the current extent of a non-growable buffer.
    Bounds,
    /// A mutating operation was issued against a read-only buffer.
    WriteProtected,
    /// A bit-level operation was issued while the buffer was not in bit mode.
    NotInBitMode,
    /// An unexpected marker byte was encountered during a scan.
    /// Carries the expected marker, the marker found, and the byte position.
    CorruptedMarker {
        expected: u8,
        found: u8,
        position: u64,
    },
    /// The magic number, version or record offset of the file is invalid.
    NotAnArchive,
    /// The packer-flag byte maps to no registered packer strategy.
    UnknownPackerType(u8),
    /// A byte without a prefix-code table entry was submitted for encoding.
    HuffmanMissingLetter(u8),
    /// The packer failed to decode an embedded string payload.
    DecompressFailed,
    /// The requested string id is present in neither the index nor the table.
    NotFound,
    /// The string-id index references a position past the end of the file.
    IndexCorrupted,
    /// The string-table scan could not be started or continued.
    ScanFailed,
    /// A search predicate rejected its capture or failed during evaluation.
    PredicateFailed,
    /// The per-thread object-id counter space is exhausted.
    ThreadOutOfOids,
    /// The input document cannot be represented in the columnar model.
    UnsupportedDocument(String),
    /// An underlying file operation failed.
    Io(String),
    /// An internal invariant was violated. This is a bug.
    Internal(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bounds =>
                formatter.write_str("read or write past the end of the buffer"),
            Error::WriteProtected =>
                formatter.write_str("attempted to mutate a read-only buffer"),
            Error::NotInBitMode =>
                formatter.write_str("bit operation issued outside of bit mode"),
            Error::CorruptedMarker { expected, found, position } =>
                write!(formatter,
                    "expected marker [{}] but found [{}] at offset {:#06x}",
                    *expected as char, *found as char, position),
            Error::NotAnArchive =>
                formatter.write_str("file is not a cabfile archive"),
            Error::UnknownPackerType(flags) =>
                write!(formatter, "no packer registered for flag byte {:#04x}", flags),
            Error::HuffmanMissingLetter(letter) =>
                write!(formatter, "no prefix code for byte {:#04x}", letter),
            Error::DecompressFailed =>
                formatter.write_str("embedded string payload failed to decode"),
            Error::NotFound =>
                formatter.write_str("string id not found"),
            Error::IndexCorrupted =>
                formatter.write_str("string-id index points past the end of the file"),
            Error::ScanFailed =>
                formatter.write_str("string-table scan failed"),
            Error::PredicateFailed =>
                formatter.write_str("search predicate rejected its input"),
            Error::ThreadOutOfOids =>
                formatter.write_str("per-thread object-id counter exhausted"),
            Error::UnsupportedDocument(reason) =>
                write!(formatter, "unsupported document: {}", reason),
            Error::Io(reason) =>
                write!(formatter, "i/o error: {}", reason),
            Error::Internal(reason) =>
                write!(formatter, "internal invariant violated: {}", reason),
        }
    }
}

impl std::error::Error for Error {}
