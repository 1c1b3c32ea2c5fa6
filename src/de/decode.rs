//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Reconstruction of the archived document as JSON.
//!
//! The record body is walked with a sequential cursor: property groups are
//! consumed in the order the writer emitted them, nested objects and column
//! entries are parsed in place, and object arrays are reassembled by slot
//! from their columns' position vectors. Sids are resolved through the
//! query layer.

use nom::number::complete::le_u32;
use serde_json::{Map, Number, Value};

use crate::de::parser::object::{self, Scalar};
use crate::de::parser::utils::{sid_column, u32_column, u64_column};
use crate::de::Archive;
use crate::document::{FieldType, Marker, Sid, NULL_SID};
use crate::error::{Error, Result};
use crate::query::Query;

pub(crate) fn archive_to_json(archive: &Archive) -> Result<Value> {
    let query = archive.query();
    let mut cursor = Cursor {
        data: archive.body(),
        pos: 0,
    };
    let root = decode_object(&mut cursor, &query)?;
    Ok(Value::Object(root))
}

/// Sequential reader over the record body.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek_u8(&self) -> Result<u8> {
        self.data.get(self.pos).copied().ok_or(Error::Bounds)
    }

    /// Applies a nom parser at the cursor and advances by the consumed
    /// length.
    fn apply<T>(
        &mut self,
        parser: impl Fn(&'a [u8]) -> nom::IResult<&'a [u8], T>,
    ) -> Result<T> {
        let input = self.data.get(self.pos..).ok_or(Error::Bounds)?;
        let (rest, value) = parser(input).map_err(|_| Error::ScanFailed)?;
        self.pos += input.len() - rest.len();
        Ok(value)
    }

}

fn scalar_to_json(scalar: Scalar, query: &Query<'_>) -> Result<Value> {
    Ok(match scalar {
        Scalar::Boolean(value) => Value::Bool(value),
        Scalar::Signed(value) => Value::Number(value.into()),
        Scalar::Unsigned(value) => Value::Number(value.into()),
        Scalar::Float(value) => Number::from_f64(f64::from(value))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Scalar::String(sid) if sid == NULL_SID => Value::Null,
        Scalar::String(sid) => Value::String(query.fetch_string(sid)?),
    })
}

fn key_string(sid: Sid, query: &Query<'_>) -> Result<String> {
    query.fetch_string(sid)
}

/// Decodes the object under the cursor, leaving the cursor on the byte past
/// its end marker.
fn decode_object(cursor: &mut Cursor<'_>, query: &Query<'_>) -> Result<Map<String, Value>> {
    let header = cursor.apply(object::object_header)?;
    let _group_offs = cursor.apply(u64_column(header.flags.num_groups()))?;
    let _next_slot = cursor.apply(u64_column(1))?;

    let mut map = Map::new();
    loop {
        let symbol = cursor.peek_u8()?;
        if symbol == Marker::ObjectEnd.symbol() {
            cursor.pos += 1;
            break;
        }
        if symbol == Marker::PropArray(FieldType::Object).symbol() {
            decode_object_array_section(cursor, query, &mut map)?;
            continue;
        }

        let (header, ty, is_array) = cursor.apply(object::prop_header)?;
        let num = header.num_entries as usize;
        let keys = cursor.apply(sid_column(num))?;

        if ty == FieldType::Object {
            // Value-offset column, then the nested objects laid out in order.
            let _value_offs = cursor.apply(u64_column(num))?;
            for key in keys {
                let nested = decode_object(cursor, query)?;
                map.insert(key_string(key, query)?, Value::Object(nested));
            }
        } else if is_array {
            let lens = cursor.apply(u32_column(num))?;
            for (key, len) in keys.into_iter().zip(lens.into_iter()) {
                let values = decode_value_list(cursor, ty, len as usize, query)?;
                map.insert(key_string(key, query)?, Value::Array(values));
            }
        } else if ty == FieldType::Null {
            for key in keys {
                map.insert(key_string(key, query)?, Value::Null);
            }
        } else {
            let values = cursor.apply(object::value_column(ty, num))?;
            for (key, scalar) in keys.into_iter().zip(values.into_iter()) {
                map.insert(key_string(key, query)?, scalar_to_json(scalar, query)?);
            }
        }
    }
    Ok(map)
}

fn decode_value_list(
    cursor: &mut Cursor<'_>,
    ty: FieldType,
    len: usize,
    query: &Query<'_>,
) -> Result<Vec<Value>> {
    if ty == FieldType::Null {
        return Ok(vec![Value::Null; len]);
    }
    let scalars = cursor.apply(object::value_column(ty, len))?;
    scalars
        .into_iter()
        .map(|scalar| scalar_to_json(scalar, query))
        .collect()
}

/// Decodes the object-array section and reassembles each group's slots from
/// its columns.
fn decode_object_array_section(
    cursor: &mut Cursor<'_>,
    query: &Query<'_>,
    map: &mut Map<String, Value>,
) -> Result<()> {
    let num_groups = cursor.apply(object::object_array_header)? as usize;
    let keys = cursor.apply(sid_column(num_groups))?;
    let _group_offs = cursor.apply(u64_column(num_groups))?;

    for key in keys {
        let group_header = cursor.apply(object::column_group_header)?;
        let _oids = cursor.apply(u64_column(group_header.num_objects as usize))?;
        let _column_offs = cursor.apply(u64_column(group_header.num_columns as usize))?;

        let mut slots: Vec<Map<String, Value>> =
            vec![Map::new(); group_header.num_objects as usize];

        for _ in 0..group_header.num_columns {
            let column = cursor.apply(object::column_header)?;
            let num_entries = column.num_entries as usize;
            let _entry_offs = cursor.apply(u64_column(num_entries))?;
            let positions = cursor.apply(u32_column(num_entries))?;
            let name = key_string(column.name, query)?;

            for &position in &positions {
                let len = cursor.apply(le_u32)? as usize;
                let value = decode_column_entry(cursor, column.value_type, len, query)?;
                let slot = slots
                    .get_mut(position as usize)
                    .ok_or(Error::Internal("column position out of range"))?;
                slot.insert(name.clone(), value);
            }
        }

        map.insert(
            key_string(key, query)?,
            Value::Array(slots.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(())
}

/// Decodes one column entry. Entries of length 1 export as scalars; the
/// format does not distinguish a scalar from a one-element array.
fn decode_column_entry(
    cursor: &mut Cursor<'_>,
    ty: FieldType,
    len: usize,
    query: &Query<'_>,
) -> Result<Value> {
    if ty == FieldType::Object {
        let mut objects = Vec::with_capacity(len);
        for _ in 0..len {
            objects.push(Value::Object(decode_object(cursor, query)?));
        }
        return Ok(if objects.len() == 1 {
            objects.remove(0)
        } else {
            Value::Array(objects)
        });
    }

    let mut values = decode_value_list(cursor, ty, len, query)?;
    Ok(if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    })
}
