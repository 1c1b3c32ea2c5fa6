//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use nom::{
    bytes::complete::tag,
    combinator::{map, verify},
    number::complete::{le_u32, le_u64, le_u8},
    sequence::tuple,
    IResult,
};

use crate::document::{
    FileHeader, Marker, RecordHeader, StringEntryHeader, StringTableHeader, MAGIC,
};

/// Parses the fixed-size 26-byte file header from the input slice.
pub fn file_header(input: &[u8]) -> IResult<&[u8], FileHeader> {
    map(
        tuple((
            tag(MAGIC),
            le_u8,
            le_u64,
            le_u64,
        )), |(
            _,
            version,
            record_header_off,
            sid_index_off,
        )| FileHeader {
            version,
            record_header_off,
            sid_index_off,
        }
    )(input)
}

/// Returns a parser which consumes the given marker byte.
pub fn marker(expected: Marker) -> impl Fn(&[u8]) -> IResult<&[u8], u8> {
    move |input: &[u8]| verify(le_u8, |&byte| byte == expected.symbol())(input)
}

/// Parses the fixed-size 22-byte string-table header.
pub fn string_table_header(input: &[u8]) -> IResult<&[u8], StringTableHeader> {
    map(
        tuple((
            marker(Marker::StringTable),
            le_u32,
            le_u8,
            le_u64,
            le_u64,
        )), |(
            _,
            num_entries,
            flags,
            first_entry_off,
            extra_size,
        )| StringTableHeader {
            num_entries,
            flags,
            first_entry_off,
            extra_size,
        }
    )(input)
}

/// Parses the fixed-size 21-byte header of one string-table entry.
pub fn string_entry_header(input: &[u8]) -> IResult<&[u8], StringEntryHeader> {
    map(
        tuple((
            marker(Marker::StringEntry),
            le_u64,
            le_u64,
            le_u32,
        )), |(
            _,
            next_entry_off,
            sid,
            len,
        )| StringEntryHeader {
            next_entry_off,
            sid,
            len,
        }
    )(input)
}

/// Parses the fixed-size 10-byte record header.
pub fn record_header(input: &[u8]) -> IResult<&[u8], RecordHeader> {
    map(
        tuple((
            marker(Marker::RecordHeader),
            le_u8,
            le_u64,
        )), |(
            _,
            flags,
            body_size,
        )| RecordHeader { flags, body_size }
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FILE_HEADER_SIZE, RECORD_HEADER_SIZE, STRING_TABLE_HEADER_SIZE};

    #[test]
    fn test_file_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1);
        bytes.extend_from_slice(&100u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(bytes.len(), FILE_HEADER_SIZE);

        let (rest, header) = file_header(&bytes).unwrap();
        assert_eq!(rest.len(), 0);
        assert_eq!(
            header,
            FileHeader {
                version: 1,
                record_header_off: 100,
                sid_index_off: 0,
            }
        );
    }

    #[test]
    fn test_file_header_rejects_bad_magic() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"notanarch");
        bytes.push(1);
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(file_header(&bytes).is_err());
    }

    #[test]
    fn test_string_table_header() {
        let mut bytes = vec![b'D'];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.push(0x01);
        bytes.extend_from_slice(&48u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(bytes.len(), STRING_TABLE_HEADER_SIZE);

        let (rest, header) = string_table_header(&bytes).unwrap();
        assert_eq!(rest.len(), 0);
        assert_eq!(
            header,
            StringTableHeader {
                num_entries: 2,
                flags: 0x01,
                first_entry_off: 48,
                extra_size: 0,
            }
        );
    }

    #[test]
    fn test_string_entry_header() {
        let mut bytes = vec![b'-'];
        bytes.extend_from_slice(&69u64.to_le_bytes());
        bytes.extend_from_slice(&7u64.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());

        let (rest, header) = string_entry_header(&bytes).unwrap();
        assert_eq!(rest.len(), 0);
        assert_eq!(
            header,
            StringEntryHeader {
                next_entry_off: 69,
                sid: 7,
                len: 5,
            }
        );
    }

    #[test]
    fn test_record_header() {
        let mut bytes = vec![b'R', 0x01];
        bytes.extend_from_slice(&22u64.to_le_bytes());
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE);

        let (rest, header) = record_header(&bytes).unwrap();
        assert_eq!(rest.len(), 0);
        assert!(header.is_sorted());
        assert_eq!(header.body_size, 22);
    }

    #[test]
    fn test_record_header_rejects_wrong_marker() {
        let mut bytes = vec![b'X', 0x00];
        bytes.extend_from_slice(&22u64.to_le_bytes());
        assert!(record_header(&bytes).is_err());
    }
}
