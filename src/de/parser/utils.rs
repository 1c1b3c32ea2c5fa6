//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use nom::{
    multi::many_m_n,
    number::complete::{le_u32, le_u64},
    IResult,
};

use crate::document::Sid;

/// Returns a parser which recognizes a column of `n` little-endian u64
/// values, as used for sid-key columns and offset columns.
pub fn u64_column(n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<u64>> {
    move |input: &[u8]| many_m_n(n, n, le_u64)(input)
}

/// Returns a parser which recognizes a sid-key column of `n` entries.
pub fn sid_column(n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<Sid>> {
    u64_column(n)
}

/// Returns a parser which recognizes a column of `n` little-endian u32
/// values, as used for array-length and position columns.
pub fn u32_column(n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<u32>> {
    move |input: &[u8]| many_m_n(n, n, le_u32)(input)
}

#[cfg(test)]
mod tests {
    use super::{u32_column, u64_column};

    #[test]
    fn test_u64_column_of_two() {
        let (input, result) = u64_column(2)(&[
            0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ])
        .unwrap();
        assert_eq!(input.len(), 0);
        assert_eq!(result, vec![8u64, 9u64]);
    }

    #[test]
    fn test_u32_column_of_three() {
        let (input, result) =
            u32_column(3)(&[0x01, 0, 0, 0, 0x02, 0, 0, 0, 0xFF, 0x01, 0, 0]).unwrap();
        assert_eq!(input.len(), 0);
        assert_eq!(result, vec![1u32, 2u32, 511u32]);
    }

    #[test]
    fn test_u32_column_rejects_short_input() {
        assert!(u32_column(2)(&[0x01, 0x00, 0x00]).is_err());
    }
}
