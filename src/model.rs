//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The columnar document model.
//!
//! The intermediate representation between a parsed JSON tree and the
//! serialized archive. Every object is split into type-segregated property
//! groups: per field type a key column plus a value column, array groups
//! with per-key lengths, and object arrays decomposed into per-key columns
//! whose position column records which array slot owns each entry.
//!
//! Strings never appear in the model itself; they are interned through the
//! string dictionary and represented by their sids.
//!
//! Numbers take the smallest integer type admitting every value of the
//! property (unsigned when nothing is negative), or `float` when a
//! fractional value is present.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::dict::StringDictionary;
use crate::document::{FieldType, Sid, NULL_SID};
use crate::error::{Error, Result};

/// A complete columnar document: the root object plus layout options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDoc {
    /// When set, every property group is sorted by key sid and the record
    /// header carries the sorted flag.
    pub read_optimized: bool,
    pub root: ColumnObject,
}

/// One object in columnar form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnObject {
    pub null_keys: Vec<Sid>,
    pub bool_keys: Vec<Sid>,
    pub bool_values: Vec<bool>,
    pub int8_keys: Vec<Sid>,
    pub int8_values: Vec<i8>,
    pub int16_keys: Vec<Sid>,
    pub int16_values: Vec<i16>,
    pub int32_keys: Vec<Sid>,
    pub int32_values: Vec<i32>,
    pub int64_keys: Vec<Sid>,
    pub int64_values: Vec<i64>,
    pub uint8_keys: Vec<Sid>,
    pub uint8_values: Vec<u8>,
    pub uint16_keys: Vec<Sid>,
    pub uint16_values: Vec<u16>,
    pub uint32_keys: Vec<Sid>,
    pub uint32_values: Vec<u32>,
    pub uint64_keys: Vec<Sid>,
    pub uint64_values: Vec<u64>,
    pub float_keys: Vec<Sid>,
    pub float_values: Vec<OrderedFloat<f32>>,
    pub string_keys: Vec<Sid>,
    pub string_values: Vec<Sid>,
    pub object_keys: Vec<Sid>,
    pub object_values: Vec<ColumnObject>,

    pub null_array_keys: Vec<Sid>,
    pub null_array_lengths: Vec<u32>,
    pub bool_array_keys: Vec<Sid>,
    pub bool_array_values: Vec<Vec<bool>>,
    pub int8_array_keys: Vec<Sid>,
    pub int8_array_values: Vec<Vec<i8>>,
    pub int16_array_keys: Vec<Sid>,
    pub int16_array_values: Vec<Vec<i16>>,
    pub int32_array_keys: Vec<Sid>,
    pub int32_array_values: Vec<Vec<i32>>,
    pub int64_array_keys: Vec<Sid>,
    pub int64_array_values: Vec<Vec<i64>>,
    pub uint8_array_keys: Vec<Sid>,
    pub uint8_array_values: Vec<Vec<u8>>,
    pub uint16_array_keys: Vec<Sid>,
    pub uint16_array_values: Vec<Vec<u16>>,
    pub uint32_array_keys: Vec<Sid>,
    pub uint32_array_values: Vec<Vec<u32>>,
    pub uint64_array_keys: Vec<Sid>,
    pub uint64_array_values: Vec<Vec<u64>>,
    pub float_array_keys: Vec<Sid>,
    pub float_array_values: Vec<Vec<OrderedFloat<f32>>>,
    pub string_array_keys: Vec<Sid>,
    pub string_array_values: Vec<Vec<Sid>>,

    pub object_array_groups: Vec<ColumnGroupModel>,
}

/// The columns of one object-array key.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroupModel {
    pub key: Sid,
    pub columns: Vec<ColumnModel>,
}

/// One column: all values a given key takes across the slots of an object
/// array, with the owning slot recorded per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnModel {
    pub name: Sid,
    pub ty: FieldType,
    pub positions: Vec<u32>,
    pub entries: Vec<ColumnEntry>,
}

/// One column entry: the value list a single array slot contributed.
/// Scalars are singleton lists.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnEntry {
    Null(u32),
    Boolean(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float(Vec<OrderedFloat<f32>>),
    String(Vec<Sid>),
    Object(Vec<ColumnObject>),
}

impl ColumnEntry {
    pub fn field_type(&self) -> FieldType {
        match self {
            ColumnEntry::Null(_) => FieldType::Null,
            ColumnEntry::Boolean(_) => FieldType::Boolean,
            ColumnEntry::Int8(_) => FieldType::Int8,
            ColumnEntry::Int16(_) => FieldType::Int16,
            ColumnEntry::Int32(_) => FieldType::Int32,
            ColumnEntry::Int64(_) => FieldType::Int64,
            ColumnEntry::UInt8(_) => FieldType::UInt8,
            ColumnEntry::UInt16(_) => FieldType::UInt16,
            ColumnEntry::UInt32(_) => FieldType::UInt32,
            ColumnEntry::UInt64(_) => FieldType::UInt64,
            ColumnEntry::Float(_) => FieldType::Float,
            ColumnEntry::String(_) => FieldType::String,
            ColumnEntry::Object(_) => FieldType::Object,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnEntry::Null(count) => *count as usize,
            ColumnEntry::Boolean(values) => values.len(),
            ColumnEntry::Int8(values) => values.len(),
            ColumnEntry::Int16(values) => values.len(),
            ColumnEntry::Int32(values) => values.len(),
            ColumnEntry::Int64(values) => values.len(),
            ColumnEntry::UInt8(values) => values.len(),
            ColumnEntry::UInt16(values) => values.len(),
            ColumnEntry::UInt32(values) => values.len(),
            ColumnEntry::UInt64(values) => values.len(),
            ColumnEntry::Float(values) => values.len(),
            ColumnEntry::String(values) => values.len(),
            ColumnEntry::Object(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the columnar model of a JSON document.
///
/// The walk interns every key and string value through the dictionary in one
/// bulk insert, then columnarizes the tree against the resulting sid map.
/// The root of the document must be an object.
pub fn build(
    value: &Value,
    dict: &mut dyn StringDictionary,
    read_optimized: bool,
) -> Result<ColumnDoc> {
    let root = match value {
        Value::Object(map) => map,
        _ => {
            return Err(Error::UnsupportedDocument(
                "document root must be an object".to_string(),
            ))
        }
    };

    let mut strings = Vec::new();
    collect_strings(value, &mut strings);
    let refs: Vec<&str> = strings.iter().map(|s| s.as_str()).collect();
    let sids = dict.insert(&refs)?;
    let mut sid_map: HashMap<&str, Sid> = HashMap::with_capacity(strings.len());
    for (string, sid) in refs.iter().zip(sids.iter()) {
        sid_map.insert(string, *sid);
    }

    let mut root = columnarize(root, &sid_map)?;
    if read_optimized {
        sort_object(&mut root);
    }
    Ok(ColumnDoc {
        read_optimized,
        root,
    })
}

/// Collects every key and string value of the tree, in encounter order.
pub fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(string) => out.push(string.clone()),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                out.push(key.clone());
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

/// The integer width classification of a set of JSON numbers.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum NumberClass {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
}

impl NumberClass {
    fn of(number: &serde_json::Number) -> NumberClass {
        if let Some(value) = number.as_u64() {
            if value <= u8::MAX as u64 {
                NumberClass::UInt8
            } else if value <= u16::MAX as u64 {
                NumberClass::UInt16
            } else if value <= u32::MAX as u64 {
                NumberClass::UInt32
            } else {
                NumberClass::UInt64
            }
        } else if let Some(value) = number.as_i64() {
            if value >= i8::MIN as i64 {
                NumberClass::Int8
            } else if value >= i16::MIN as i64 {
                NumberClass::Int16
            } else if value >= i32::MIN as i64 {
                NumberClass::Int32
            } else {
                NumberClass::Int64
            }
        } else {
            NumberClass::Float
        }
    }

    /// The joint class covering both operands.
    fn join(self, other: NumberClass) -> NumberClass {
        use NumberClass::*;
        if self == Float || other == Float {
            return Float;
        }
        let signed = self.is_signed() || other.is_signed();
        let bits = self.bits().max(other.bits());
        match (signed, bits) {
            (false, 8) => UInt8,
            (false, 16) => UInt16,
            (false, 32) => UInt32,
            (false, _) => UInt64,
            (true, 8) => Int8,
            (true, 16) => Int16,
            (true, 32) => Int32,
            (true, _) => Int64,
        }
    }

    fn is_signed(self) -> bool {
        matches!(
            self,
            NumberClass::Int8 | NumberClass::Int16 | NumberClass::Int32 | NumberClass::Int64
        )
    }

    fn bits(self) -> u32 {
        match self {
            NumberClass::UInt8 | NumberClass::Int8 => 8,
            NumberClass::UInt16 | NumberClass::Int16 => 16,
            NumberClass::UInt32 | NumberClass::Int32 => 32,
            _ => 64,
        }
    }

    /// Widens a signed class until every member fits; a value outside the
    /// signed 64-bit range demotes the whole set to float.
    fn admit_all(numbers: &[&serde_json::Number]) -> NumberClass {
        let mut class = numbers
            .iter()
            .map(|n| NumberClass::of(*n))
            .fold(NumberClass::UInt8, NumberClass::join);
        if class.is_signed() {
            for &number in numbers {
                while class.is_signed() && !class.admits(number) {
                    if class == NumberClass::Int64 {
                        return NumberClass::Float;
                    }
                    class = class.widen();
                }
            }
        }
        class
    }

    fn admits(self, number: &serde_json::Number) -> bool {
        match self {
            NumberClass::Int8 => number
                .as_i64()
                .map(|v| v >= i8::MIN as i64 && v <= i8::MAX as i64)
                .unwrap_or(false),
            NumberClass::Int16 => number
                .as_i64()
                .map(|v| v >= i16::MIN as i64 && v <= i16::MAX as i64)
                .unwrap_or(false),
            NumberClass::Int32 => number
                .as_i64()
                .map(|v| v >= i32::MIN as i64 && v <= i32::MAX as i64)
                .unwrap_or(false),
            NumberClass::Int64 => number.as_i64().is_some(),
            _ => true,
        }
    }

    fn widen(self) -> NumberClass {
        match self {
            NumberClass::Int8 => NumberClass::Int16,
            NumberClass::Int16 => NumberClass::Int32,
            NumberClass::Int32 => NumberClass::Int64,
            other => other,
        }
    }
}

fn sid_of(sid_map: &HashMap<&str, Sid>, string: &str) -> Result<Sid> {
    sid_map
        .get(string)
        .copied()
        .ok_or(Error::Internal("string missing from sid map"))
}

fn as_f32(number: &serde_json::Number) -> OrderedFloat<f32> {
    OrderedFloat(number.as_f64().unwrap_or(0.0) as f32)
}

fn columnarize(
    map: &serde_json::Map<String, Value>,
    sid_map: &HashMap<&str, Sid>,
) -> Result<ColumnObject> {
    let mut object = ColumnObject::default();

    for (key, value) in map {
        let key_sid = sid_of(sid_map, key)?;
        match value {
            Value::Null => object.null_keys.push(key_sid),
            Value::Bool(flag) => {
                object.bool_keys.push(key_sid);
                object.bool_values.push(*flag);
            }
            Value::Number(number) => {
                push_scalar_number(&mut object, key_sid, number);
            }
            Value::String(string) => {
                object.string_keys.push(key_sid);
                object.string_values.push(sid_of(sid_map, string)?);
            }
            Value::Object(nested) => {
                object.object_keys.push(key_sid);
                object.object_values.push(columnarize(nested, sid_map)?);
            }
            Value::Array(items) => {
                push_array(&mut object, key_sid, items, sid_map)?;
            }
        }
    }
    Ok(object)
}

fn push_scalar_number(object: &mut ColumnObject, key_sid: Sid, number: &serde_json::Number) {
    match NumberClass::of(number) {
        NumberClass::UInt8 => {
            object.uint8_keys.push(key_sid);
            object.uint8_values.push(number.as_u64().unwrap() as u8);
        }
        NumberClass::UInt16 => {
            object.uint16_keys.push(key_sid);
            object.uint16_values.push(number.as_u64().unwrap() as u16);
        }
        NumberClass::UInt32 => {
            object.uint32_keys.push(key_sid);
            object.uint32_values.push(number.as_u64().unwrap() as u32);
        }
        NumberClass::UInt64 => {
            object.uint64_keys.push(key_sid);
            object.uint64_values.push(number.as_u64().unwrap());
        }
        NumberClass::Int8 => {
            object.int8_keys.push(key_sid);
            object.int8_values.push(number.as_i64().unwrap() as i8);
        }
        NumberClass::Int16 => {
            object.int16_keys.push(key_sid);
            object.int16_values.push(number.as_i64().unwrap() as i16);
        }
        NumberClass::Int32 => {
            object.int32_keys.push(key_sid);
            object.int32_values.push(number.as_i64().unwrap() as i32);
        }
        NumberClass::Int64 => {
            object.int64_keys.push(key_sid);
            object.int64_values.push(number.as_i64().unwrap());
        }
        NumberClass::Float => {
            object.float_keys.push(key_sid);
            object.float_values.push(as_f32(number));
        }
    }
}

fn push_array(
    object: &mut ColumnObject,
    key_sid: Sid,
    items: &[Value],
    sid_map: &HashMap<&str, Sid>,
) -> Result<()> {
    if items.iter().all(|item| item.is_null()) {
        // Covers the empty array: a null array fully described by its length.
        object.null_array_keys.push(key_sid);
        object.null_array_lengths.push(items.len() as u32);
        return Ok(());
    }

    if items.iter().all(|item| item.is_object()) {
        let group = columnarize_object_array(key_sid, items, sid_map)?;
        object.object_array_groups.push(group);
        return Ok(());
    }

    if items.iter().any(|item| item.is_object()) {
        return Err(Error::UnsupportedDocument(
            "array mixes objects with scalar values".to_string(),
        ));
    }

    if items.iter().all(|item| item.is_string() || item.is_null()) {
        let mut sids = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::String(string) => sids.push(sid_of(sid_map, string)?),
                Value::Null => sids.push(NULL_SID),
                _ => unreachable!(),
            }
        }
        object.string_array_keys.push(key_sid);
        object.string_array_values.push(sids);
        return Ok(());
    }

    if items.iter().all(|item| item.is_boolean()) {
        object.bool_array_keys.push(key_sid);
        object
            .bool_array_values
            .push(items.iter().map(|item| item.as_bool().unwrap()).collect());
        return Ok(());
    }

    if items.iter().all(|item| item.is_number()) {
        let numbers: Vec<&serde_json::Number> = items
            .iter()
            .map(|item| match item {
                Value::Number(number) => number,
                _ => unreachable!(),
            })
            .collect();
        push_number_array(object, key_sid, &numbers);
        return Ok(());
    }

    Err(Error::UnsupportedDocument(
        "array mixes incompatible scalar types".to_string(),
    ))
}

fn push_number_array(object: &mut ColumnObject, key_sid: Sid, numbers: &[&serde_json::Number]) {
    match NumberClass::admit_all(numbers) {
        NumberClass::UInt8 => {
            object.uint8_array_keys.push(key_sid);
            object
                .uint8_array_values
                .push(numbers.iter().map(|n| n.as_u64().unwrap() as u8).collect());
        }
        NumberClass::UInt16 => {
            object.uint16_array_keys.push(key_sid);
            object
                .uint16_array_values
                .push(numbers.iter().map(|n| n.as_u64().unwrap() as u16).collect());
        }
        NumberClass::UInt32 => {
            object.uint32_array_keys.push(key_sid);
            object
                .uint32_array_values
                .push(numbers.iter().map(|n| n.as_u64().unwrap() as u32).collect());
        }
        NumberClass::UInt64 => {
            object.uint64_array_keys.push(key_sid);
            object
                .uint64_array_values
                .push(numbers.iter().map(|n| n.as_u64().unwrap()).collect());
        }
        NumberClass::Int8 => {
            object.int8_array_keys.push(key_sid);
            object
                .int8_array_values
                .push(numbers.iter().map(|n| n.as_i64().unwrap() as i8).collect());
        }
        NumberClass::Int16 => {
            object.int16_array_keys.push(key_sid);
            object
                .int16_array_values
                .push(numbers.iter().map(|n| n.as_i64().unwrap() as i16).collect());
        }
        NumberClass::Int32 => {
            object.int32_array_keys.push(key_sid);
            object
                .int32_array_values
                .push(numbers.iter().map(|n| n.as_i64().unwrap() as i32).collect());
        }
        NumberClass::Int64 => {
            object.int64_array_keys.push(key_sid);
            object
                .int64_array_values
                .push(numbers.iter().map(|n| n.as_i64().unwrap()).collect());
        }
        NumberClass::Float => {
            object.float_array_keys.push(key_sid);
            object
                .float_array_values
                .push(numbers.iter().map(|n| as_f32(*n)).collect());
        }
    }
}

fn columnarize_object_array(
    key_sid: Sid,
    items: &[Value],
    sid_map: &HashMap<&str, Sid>,
) -> Result<ColumnGroupModel> {
    let mut group = ColumnGroupModel {
        key: key_sid,
        columns: Vec::new(),
    };

    for (position, item) in items.iter().enumerate() {
        let map = match item {
            Value::Object(map) => map,
            _ => return Err(Error::Internal("object array slot is not an object")),
        };
        for (key, value) in map {
            let name = sid_of(sid_map, key)?;
            let entry = column_entry(value, sid_map)?;
            let ty = entry.field_type();

            let column = match group
                .columns
                .iter_mut()
                .find(|column| column.name == name && column.ty == ty)
            {
                Some(column) => column,
                None => {
                    group.columns.push(ColumnModel {
                        name,
                        ty,
                        positions: Vec::new(),
                        entries: Vec::new(),
                    });
                    group.columns.last_mut().expect("just pushed")
                }
            };
            column.positions.push(position as u32);
            column.entries.push(entry);
        }
    }
    Ok(group)
}

/// The column entry a single slot value contributes: scalars become
/// singleton lists, arrays keep their element list, objects recurse.
fn column_entry(value: &Value, sid_map: &HashMap<&str, Sid>) -> Result<ColumnEntry> {
    Ok(match value {
        Value::Null => ColumnEntry::Null(1),
        Value::Bool(flag) => ColumnEntry::Boolean(vec![*flag]),
        Value::Number(number) => number_entry(&[number]),
        Value::String(string) => ColumnEntry::String(vec![sid_of(sid_map, string)?]),
        Value::Object(map) => ColumnEntry::Object(vec![columnarize(map, sid_map)?]),
        Value::Array(items) => {
            if items.iter().all(|item| item.is_null()) {
                ColumnEntry::Null(items.len() as u32)
            } else if items.iter().all(|item| item.is_object()) {
                let mut objects = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(map) => objects.push(columnarize(map, sid_map)?),
                        _ => unreachable!(),
                    }
                }
                ColumnEntry::Object(objects)
            } else if items.iter().all(|item| item.is_string() || item.is_null()) {
                let mut sids = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(string) => sids.push(sid_of(sid_map, string)?),
                        Value::Null => sids.push(NULL_SID),
                        _ => unreachable!(),
                    }
                }
                ColumnEntry::String(sids)
            } else if items.iter().all(|item| item.is_boolean()) {
                ColumnEntry::Boolean(items.iter().map(|item| item.as_bool().unwrap()).collect())
            } else if items.iter().all(|item| item.is_number()) {
                let numbers: Vec<&serde_json::Number> = items
                    .iter()
                    .map(|item| match item {
                        Value::Number(number) => number,
                        _ => unreachable!(),
                    })
                    .collect();
                number_entry(&numbers)
            } else {
                return Err(Error::UnsupportedDocument(
                    "array inside object array mixes incompatible types".to_string(),
                ));
            }
        }
    })
}

fn number_entry(numbers: &[&serde_json::Number]) -> ColumnEntry {
    match NumberClass::admit_all(numbers) {
        NumberClass::UInt8 => {
            ColumnEntry::UInt8(numbers.iter().map(|n| n.as_u64().unwrap() as u8).collect())
        }
        NumberClass::UInt16 => {
            ColumnEntry::UInt16(numbers.iter().map(|n| n.as_u64().unwrap() as u16).collect())
        }
        NumberClass::UInt32 => {
            ColumnEntry::UInt32(numbers.iter().map(|n| n.as_u64().unwrap() as u32).collect())
        }
        NumberClass::UInt64 => {
            ColumnEntry::UInt64(numbers.iter().map(|n| n.as_u64().unwrap()).collect())
        }
        NumberClass::Int8 => {
            ColumnEntry::Int8(numbers.iter().map(|n| n.as_i64().unwrap() as i8).collect())
        }
        NumberClass::Int16 => {
            ColumnEntry::Int16(numbers.iter().map(|n| n.as_i64().unwrap() as i16).collect())
        }
        NumberClass::Int32 => {
            ColumnEntry::Int32(numbers.iter().map(|n| n.as_i64().unwrap() as i32).collect())
        }
        NumberClass::Int64 => {
            ColumnEntry::Int64(numbers.iter().map(|n| n.as_i64().unwrap()).collect())
        }
        NumberClass::Float => ColumnEntry::Float(numbers.iter().map(|n| as_f32(*n)).collect()),
    }
}

/// Sorts two parallel columns by ascending key sid.
fn sort_parallel<T>(keys: &mut [Sid], values: &mut [T]) {
    debug_assert_eq!(keys.len(), values.len());
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);
    apply_permutation(keys, &order);
    apply_permutation(values, &order);
}

fn apply_permutation<T>(slice: &mut [T], order: &[usize]) {
    let mut visited = vec![false; slice.len()];
    for start in 0..slice.len() {
        if visited[start] {
            continue;
        }
        let mut current = start;
        loop {
            visited[current] = true;
            let next = order[current];
            if visited[next] {
                break;
            }
            slice.swap(current, next);
            current = next;
        }
    }
}

fn sort_object(object: &mut ColumnObject) {
    object.null_keys.sort_unstable();
    sort_parallel(&mut object.bool_keys, &mut object.bool_values);
    sort_parallel(&mut object.int8_keys, &mut object.int8_values);
    sort_parallel(&mut object.int16_keys, &mut object.int16_values);
    sort_parallel(&mut object.int32_keys, &mut object.int32_values);
    sort_parallel(&mut object.int64_keys, &mut object.int64_values);
    sort_parallel(&mut object.uint8_keys, &mut object.uint8_values);
    sort_parallel(&mut object.uint16_keys, &mut object.uint16_values);
    sort_parallel(&mut object.uint32_keys, &mut object.uint32_values);
    sort_parallel(&mut object.uint64_keys, &mut object.uint64_values);
    sort_parallel(&mut object.float_keys, &mut object.float_values);
    sort_parallel(&mut object.string_keys, &mut object.string_values);
    sort_parallel(&mut object.object_keys, &mut object.object_values);

    sort_parallel(&mut object.null_array_keys, &mut object.null_array_lengths);
    sort_parallel(&mut object.bool_array_keys, &mut object.bool_array_values);
    sort_parallel(&mut object.int8_array_keys, &mut object.int8_array_values);
    sort_parallel(&mut object.int16_array_keys, &mut object.int16_array_values);
    sort_parallel(&mut object.int32_array_keys, &mut object.int32_array_values);
    sort_parallel(&mut object.int64_array_keys, &mut object.int64_array_values);
    sort_parallel(&mut object.uint8_array_keys, &mut object.uint8_array_values);
    sort_parallel(&mut object.uint16_array_keys, &mut object.uint16_array_values);
    sort_parallel(&mut object.uint32_array_keys, &mut object.uint32_array_values);
    sort_parallel(&mut object.uint64_array_keys, &mut object.uint64_array_values);
    sort_parallel(&mut object.float_array_keys, &mut object.float_array_values);
    sort_parallel(&mut object.string_array_keys, &mut object.string_array_values);

    object.object_array_groups.sort_by_key(|group| group.key);
    for group in &mut object.object_array_groups {
        group.columns.sort_by_key(|column| (column.name, column.ty));
        for column in &mut group.columns {
            for entry in &mut column.entries {
                if let ColumnEntry::Object(objects) = entry {
                    for nested in objects {
                        sort_object(nested);
                    }
                }
            }
        }
    }

    for nested in &mut object.object_values {
        sort_object(nested);
    }
}
