//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use nom::{
    combinator::{map, map_opt},
    multi::many_m_n,
    number::complete::{
        le_f32, le_i16, le_i32, le_i64, le_i8, le_u16, le_u32, le_u64, le_u8,
    },
    sequence::tuple,
    IResult,
};

use crate::de::parser::document::marker;
use crate::document::{
    ColumnGroupHeader, ColumnHeader, FieldType, Marker, ObjectFlags, ObjectHeader, PropHeader,
    Sid,
};

/// Parses an object header: marker, oid, and the present-group bitmap. The
/// group-offset table and the "next" slot follow and are length-dependent.
pub fn object_header(input: &[u8]) -> IResult<&[u8], ObjectHeader> {
    map(
        tuple((
            marker(Marker::ObjectBegin),
            le_u64,
            le_u32,
        )), |(
            _,
            oid,
            flags,
        )| ObjectHeader {
            oid,
            flags: ObjectFlags(flags),
        }
    )(input)
}

/// Parses a property-group header and resolves its marker to a field type
/// plus array-ness.
pub fn prop_header(input: &[u8]) -> IResult<&[u8], (PropHeader, FieldType, bool)> {
    map_opt(
        tuple((le_u8, le_u32)),
        |(symbol, num_entries)| {
            let header = PropHeader {
                marker: symbol,
                num_entries,
            };
            if let Some(ty) = FieldType::from_value_marker(symbol) {
                Some((header, ty, false))
            } else {
                FieldType::from_array_marker(symbol).map(|ty| (header, ty, true))
            }
        },
    )(input)
}

/// Parses the object-array section header: marker plus the u8 group count.
pub fn object_array_header(input: &[u8]) -> IResult<&[u8], u8> {
    map(
        tuple((
            marker(Marker::PropArray(FieldType::Object)),
            le_u8,
        )),
        |(_, num_groups)| num_groups,
    )(input)
}

/// Parses a column-group header.
pub fn column_group_header(input: &[u8]) -> IResult<&[u8], ColumnGroupHeader> {
    map(
        tuple((
            marker(Marker::ColumnGroup),
            le_u32,
            le_u32,
        )), |(
            _,
            num_columns,
            num_objects,
        )| ColumnGroupHeader {
            num_columns,
            num_objects,
        }
    )(input)
}

/// Parses a column header; the value type is carried as the element type's
/// array marker.
pub fn column_header(input: &[u8]) -> IResult<&[u8], ColumnHeader> {
    map_opt(
        tuple((
            marker(Marker::Column),
            le_u64,
            le_u8,
            le_u32,
        )),
        |(_, name, value_type, num_entries)| {
            FieldType::from_array_marker(value_type).map(|value_type| ColumnHeader {
                name,
                value_type,
                num_entries,
            })
        },
    )(input)
}

/// One decoded scalar value from a value column or column entry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Signed(i64),
    Unsigned(u64),
    Float(f32),
    String(Sid),
}

/// Returns a parser for a value column of `n` entries of the given scalar
/// type. Null columns have no stored values and yield an empty list.
pub fn value_column(
    ty: FieldType,
    n: usize,
) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<Scalar>> {
    move |input: &[u8]| match ty {
        FieldType::Null => Ok((input, Vec::new())),
        FieldType::Boolean => {
            many_m_n(n, n, map(le_u8, |v| Scalar::Boolean(v != 0)))(input)
        }
        FieldType::Int8 => many_m_n(n, n, map(le_i8, |v| Scalar::Signed(v as i64)))(input),
        FieldType::Int16 => many_m_n(n, n, map(le_i16, |v| Scalar::Signed(v as i64)))(input),
        FieldType::Int32 => many_m_n(n, n, map(le_i32, |v| Scalar::Signed(v as i64)))(input),
        FieldType::Int64 => many_m_n(n, n, map(le_i64, Scalar::Signed))(input),
        FieldType::UInt8 => many_m_n(n, n, map(le_u8, |v| Scalar::Unsigned(v as u64)))(input),
        FieldType::UInt16 => many_m_n(n, n, map(le_u16, |v| Scalar::Unsigned(v as u64)))(input),
        FieldType::UInt32 => many_m_n(n, n, map(le_u32, |v| Scalar::Unsigned(v as u64)))(input),
        FieldType::UInt64 => many_m_n(n, n, map(le_u64, Scalar::Unsigned))(input),
        FieldType::Float => many_m_n(n, n, map(le_f32, Scalar::Float))(input),
        FieldType::String => many_m_n(n, n, map(le_u64, Scalar::String))(input),
        FieldType::Object => Err(nom::Err::Error((input, nom::error::ErrorKind::Tag))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_header() {
        let mut bytes = vec![b'{'];
        bytes.extend_from_slice(&42u64.to_le_bytes());
        bytes.extend_from_slice(&0b101u32.to_le_bytes());

        let (rest, header) = object_header(&bytes).unwrap();
        assert_eq!(rest.len(), 0);
        assert_eq!(header.oid, 42);
        assert_eq!(header.flags.num_groups(), 2);
    }

    #[test]
    fn test_prop_header_scalar_and_array() {
        let mut bytes = vec![b't'];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        let (_, (header, ty, is_array)) = prop_header(&bytes).unwrap();
        assert_eq!(header.num_entries, 3);
        assert_eq!(ty, FieldType::String);
        assert!(!is_array);

        let mut bytes = vec![b'Z'];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        let (_, (_, ty, is_array)) = prop_header(&bytes).unwrap();
        assert_eq!(ty, FieldType::Int8);
        assert!(is_array);
    }

    #[test]
    fn test_prop_header_rejects_unknown_marker() {
        let mut bytes = vec![b'?'];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        assert!(prop_header(&bytes).is_err());
    }

    #[test]
    fn test_column_header() {
        let mut bytes = vec![b'C'];
        bytes.extend_from_slice(&9u64.to_le_bytes());
        bytes.push(b'U');
        bytes.extend_from_slice(&2u32.to_le_bytes());

        let (_, header) = column_header(&bytes).unwrap();
        assert_eq!(header.name, 9);
        assert_eq!(header.value_type, FieldType::UInt8);
        assert_eq!(header.num_entries, 2);
    }

    #[test]
    fn test_value_column_uint8() {
        let (rest, values) = value_column(FieldType::UInt8, 3)(&[1, 2, 3]).unwrap();
        assert_eq!(rest.len(), 0);
        assert_eq!(
            values,
            vec![
                Scalar::Unsigned(1),
                Scalar::Unsigned(2),
                Scalar::Unsigned(3)
            ]
        );
    }

    #[test]
    fn test_value_column_null_consumes_nothing() {
        let (rest, values) = value_column(FieldType::Null, 4)(&[1, 2]).unwrap();
        assert_eq!(rest.len(), 2);
        assert!(values.is_empty());
    }
}
