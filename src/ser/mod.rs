//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The archive writer.
//!
//! Serializes a columnar document into a complete archive image inside one
//! bit-file: file header (reserved, back-patched), embedded string table
//! written through the packer, record header (reserved, back-patched), then
//! the root object recursively. All forward references (header slots, the
//! value-offset column of object properties, column-group and column-entry
//! offset tables, and the per-object "next" slots) are reserved with `skip`
//! and filled after the referenced data is in place.
//!
//! Offsets stored inside the record body are relative to the root object
//! header, which makes them direct indices into the mapped body.
//!
//! Finalized images only ever touch the destination path once: publication
//! goes through a temp file in the destination directory plus a rename.

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::dict::{ShardedDictionary, StringDictionary, SyncDictionary};
use crate::document::{
    FieldType, Marker, ObjectFlags, Sid, FILE_HEADER_SIZE, MAGIC, OBJECT_HEADER_SIZE,
    RECORD_FLAG_SORTED, RECORD_HEADER_SIZE, STRING_ENTRY_HEADER_SIZE, VERSION,
};
use crate::error::{Error, Result};
use crate::index::SidIndex;
use crate::memfile::MemFile;
use crate::model::{self, ColumnDoc, ColumnEntry, ColumnGroupModel, ColumnModel, ColumnObject};
use crate::oid;
use crate::pack::{self, PackerType};

/// Which dictionary variant backs a build.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DictionaryKind {
    Sync,
    Sharded,
}

/// Build options for an archive.
#[derive(Clone, Debug)]
pub struct ArchiveOptions {
    pub packer: PackerType,
    /// Sort every property group by key sid and mark the record sorted.
    pub read_optimized: bool,
    /// Append the sid→offset index after finalization.
    pub bake_sid_index: bool,
    pub dictionary: DictionaryKind,
    /// Shard count of the sharded dictionary.
    pub num_shards: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            packer: PackerType::None,
            read_optimized: false,
            bake_sid_index: true,
            dictionary: DictionaryKind::Sync,
            num_shards: 8,
        }
    }
}

/// Builds an archive image from a JSON string.
pub fn archive_from_json(json: &str, options: &ArchiveOptions) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::UnsupportedDocument(e.to_string()))?;
    archive_from_value(&value, options)
}

/// Builds an archive image from a parsed JSON tree.
pub fn archive_from_value(value: &Value, options: &ArchiveOptions) -> Result<Vec<u8>> {
    let mut dict: Box<dyn StringDictionary> = match options.dictionary {
        DictionaryKind::Sync => Box::new(SyncDictionary::new()),
        DictionaryKind::Sharded => Box::new(ShardedDictionary::new(options.num_shards, 1024)?),
    };
    let doc = model::build(value, dict.as_mut(), options.read_optimized)?;
    archive_from_model(&doc, dict.as_ref(), options)
}

/// Serializes a columnar document against its dictionary.
pub fn archive_from_model(
    doc: &ColumnDoc,
    dict: &dyn StringDictionary,
    options: &ArchiveOptions,
) -> Result<Vec<u8>> {
    let mut file = MemFile::new();

    debug!("writing string table");
    skip_file_header(&mut file)?;
    serialize_string_table(&mut file, dict, options.packer)?;

    debug!("writing record body");
    let record_header_off = file.position();
    file.skip(RECORD_HEADER_SIZE)?;
    update_file_header(&mut file, record_header_off, 0)?;

    let root_off = file.position();
    serialize_object(&mut file, &doc.root, root_off)?;

    let body_size = file.position() - (record_header_off + RECORD_HEADER_SIZE as u64);
    update_record_header(&mut file, record_header_off, doc.read_optimized, body_size)?;
    file.shrink()?;

    let mut image = file.into_vec();
    if options.bake_sid_index {
        debug!("baking string-id index");
        image = bake_sid_index(image)?;
    }
    Ok(image)
}

/// Publishes a finalized archive image. The destination path is only touched
/// by the final rename.
pub fn write_archive(path: &Path, image: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut staged = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    staged.write_all(image)?;
    staged
        .persist(path)
        .map_err(|e| Error::Io(e.to_string()))?;
    Ok(())
}

fn skip_file_header(file: &mut MemFile) -> Result<()> {
    file.skip(FILE_HEADER_SIZE)
}

fn update_file_header(file: &mut MemFile, record_header_off: u64, sid_index_off: u64) -> Result<()> {
    let continue_off = file.position();
    file.seek(0)?;
    file.write(MAGIC)?;
    file.write_u8(VERSION)?;
    file.write_u64(record_header_off)?;
    file.write_u64(sid_index_off)?;
    file.seek(continue_off)
}

fn update_record_header(
    file: &mut MemFile,
    record_header_off: u64,
    sorted: bool,
    body_size: u64,
) -> Result<()> {
    let continue_off = file.position();
    file.seek(record_header_off)?;
    file.write_u8(Marker::RecordHeader.symbol())?;
    file.write_u8(if sorted { RECORD_FLAG_SORTED } else { 0 })?;
    file.write_u64(body_size)?;
    file.seek(continue_off)
}

/// Emits the embedded string table: header, packer extra, then one linked
/// entry per dictionary string.
fn serialize_string_table(
    file: &mut MemFile,
    dict: &dyn StringDictionary,
    packer_type: PackerType,
) -> Result<()> {
    let (strings, sids) = dict.contents();
    debug_assert_eq!(strings.len(), sids.len());
    let refs: Vec<&str> = strings.iter().map(|s| s.as_str()).collect();

    let mut packer = pack::by_type(packer_type);
    let flags = pack::flag_bit(packer_type);

    let header_off = file.position();
    file.skip(crate::document::STRING_TABLE_HEADER_SIZE)?;

    let extra_begin = file.position();
    packer.write_extra(file, &refs)?;
    let extra_size = file.position() - extra_begin;
    let first_entry_off = file.position();

    for (i, (string, &sid)) in refs.iter().zip(sids.iter()).enumerate() {
        let entry_off = file.position();
        file.skip(STRING_ENTRY_HEADER_SIZE)?;
        packer.encode_string(file, string)?;
        let continue_off = file.position();

        file.seek(entry_off)?;
        file.write_u8(Marker::StringEntry.symbol())?;
        file.write_u64(if i + 1 < refs.len() { continue_off } else { 0 })?;
        file.write_u64(sid)?;
        file.write_u32(string.len() as u32)?;
        file.seek(continue_off)?;
    }

    let continue_off = file.position();
    file.seek(header_off)?;
    file.write_u8(Marker::StringTable.symbol())?;
    file.write_u32(refs.len() as u32)?;
    file.write_u8(flags)?;
    file.write_u64(first_entry_off)?;
    file.write_u64(extra_size)?;
    file.seek(continue_off)
}

fn flags_of(object: &ColumnObject) -> ObjectFlags {
    let mut flags = ObjectFlags::default();
    macro_rules! flag_if {
        ($keys:expr, $set:ident, $ty:expr) => {
            if !$keys.is_empty() {
                flags.$set($ty);
            }
        };
    }
    flag_if!(object.null_keys, set_value, FieldType::Null);
    flag_if!(object.bool_keys, set_value, FieldType::Boolean);
    flag_if!(object.int8_keys, set_value, FieldType::Int8);
    flag_if!(object.int16_keys, set_value, FieldType::Int16);
    flag_if!(object.int32_keys, set_value, FieldType::Int32);
    flag_if!(object.int64_keys, set_value, FieldType::Int64);
    flag_if!(object.uint8_keys, set_value, FieldType::UInt8);
    flag_if!(object.uint16_keys, set_value, FieldType::UInt16);
    flag_if!(object.uint32_keys, set_value, FieldType::UInt32);
    flag_if!(object.uint64_keys, set_value, FieldType::UInt64);
    flag_if!(object.float_keys, set_value, FieldType::Float);
    flag_if!(object.string_keys, set_value, FieldType::String);
    flag_if!(object.object_keys, set_value, FieldType::Object);
    flag_if!(object.null_array_keys, set_array, FieldType::Null);
    flag_if!(object.bool_array_keys, set_array, FieldType::Boolean);
    flag_if!(object.int8_array_keys, set_array, FieldType::Int8);
    flag_if!(object.int16_array_keys, set_array, FieldType::Int16);
    flag_if!(object.int32_array_keys, set_array, FieldType::Int32);
    flag_if!(object.int64_array_keys, set_array, FieldType::Int64);
    flag_if!(object.uint8_array_keys, set_array, FieldType::UInt8);
    flag_if!(object.uint16_array_keys, set_array, FieldType::UInt16);
    flag_if!(object.uint32_array_keys, set_array, FieldType::UInt32);
    flag_if!(object.uint64_array_keys, set_array, FieldType::UInt64);
    flag_if!(object.float_array_keys, set_array, FieldType::Float);
    flag_if!(object.string_array_keys, set_array, FieldType::String);
    flag_if!(object.object_array_groups, set_array, FieldType::Object);
    flags
}

fn write_prop_header(file: &mut MemFile, marker: u8, num_entries: usize) -> Result<u64> {
    let off = file.position();
    file.write_u8(marker)?;
    file.write_u32(num_entries as u32)?;
    Ok(off)
}

fn write_key_column(file: &mut MemFile, keys: &[Sid]) -> Result<()> {
    for &key in keys {
        file.write_u64(key)?;
    }
    Ok(())
}

/// Serializes one object and everything beneath it. Returns the absolute
/// position of the object's "next object or nil" slot, which the caller
/// chains when the object lives inside a column.
fn serialize_object(file: &mut MemFile, object: &ColumnObject, root_off: u64) -> Result<u64> {
    let flags = flags_of(object);
    let header_off = file.position();
    file.skip(OBJECT_HEADER_SIZE)?;
    file.skip(flags.num_groups() * 8)?;

    let next_slot_off = file.position();
    file.write_u64(0)?;

    // Group offsets accumulate in the canonical on-disk order; absolute for
    // now, rebased against the root when the header is emitted.
    let mut group_offs: Vec<u64> = Vec::with_capacity(flags.num_groups());

    macro_rules! fixed_prop {
        ($keys:expr, $ty:expr, $write_values:expr) => {
            if !$keys.is_empty() {
                let off = write_prop_header(file, Marker::Prop($ty).symbol(), $keys.len())?;
                write_key_column(file, $keys)?;
                $write_values(file)?;
                group_offs.push(off);
            }
        };
    }

    fixed_prop!(&object.null_keys, FieldType::Null, |_: &mut MemFile| Ok::<(), Error>(()));
    fixed_prop!(&object.bool_keys, FieldType::Boolean, |f: &mut MemFile| {
        for &v in &object.bool_values {
            f.write_u8(v as u8)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.int8_keys, FieldType::Int8, |f: &mut MemFile| {
        for &v in &object.int8_values {
            f.write_i8(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.int16_keys, FieldType::Int16, |f: &mut MemFile| {
        for &v in &object.int16_values {
            f.write_i16(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.int32_keys, FieldType::Int32, |f: &mut MemFile| {
        for &v in &object.int32_values {
            f.write_i32(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.int64_keys, FieldType::Int64, |f: &mut MemFile| {
        for &v in &object.int64_values {
            f.write_i64(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.uint8_keys, FieldType::UInt8, |f: &mut MemFile| {
        for &v in &object.uint8_values {
            f.write_u8(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.uint16_keys, FieldType::UInt16, |f: &mut MemFile| {
        for &v in &object.uint16_values {
            f.write_u16(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.uint32_keys, FieldType::UInt32, |f: &mut MemFile| {
        for &v in &object.uint32_values {
            f.write_u32(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.uint64_keys, FieldType::UInt64, |f: &mut MemFile| {
        for &v in &object.uint64_values {
            f.write_u64(v)?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.float_keys, FieldType::Float, |f: &mut MemFile| {
        for &v in &object.float_values {
            f.write_f32(v.into_inner())?;
        }
        Ok::<(), Error>(())
    });
    fixed_prop!(&object.string_keys, FieldType::String, |f: &mut MemFile| {
        for &v in &object.string_values {
            f.write_u64(v)?;
        }
        Ok::<(), Error>(())
    });

    // Object-valued properties carry a value-offset column because nested
    // objects have no fixed width.
    if !object.object_keys.is_empty() {
        let off = write_prop_header(
            file,
            Marker::Prop(FieldType::Object).symbol(),
            object.object_keys.len(),
        )?;
        write_key_column(file, &object.object_keys)?;

        let offsets_col = file.position();
        file.skip(object.object_values.len() * 8)?;

        let mut value_offs = Vec::with_capacity(object.object_values.len());
        for nested in &object.object_values {
            value_offs.push(file.position() - root_off);
            serialize_object(file, nested, root_off)?;
        }

        let continue_off = file.position();
        file.seek(offsets_col)?;
        for value_off in value_offs {
            file.write_u64(value_off)?;
        }
        file.seek(continue_off)?;
        group_offs.push(off);
    }

    macro_rules! array_prop {
        ($keys:expr, $values:expr, $ty:expr, $write_one:expr) => {
            if !$keys.is_empty() {
                debug_assert_eq!($keys.len(), $values.len());
                let off = write_prop_header(file, Marker::PropArray($ty).symbol(), $keys.len())?;
                write_key_column(file, $keys)?;
                for values in $values.iter() {
                    file.write_u32(values.len() as u32)?;
                }
                for values in $values.iter() {
                    for v in values.iter() {
                        $write_one(file, v)?;
                    }
                }
                group_offs.push(off);
            }
        };
    }

    if !object.null_array_keys.is_empty() {
        let off = write_prop_header(
            file,
            Marker::PropArray(FieldType::Null).symbol(),
            object.null_array_keys.len(),
        )?;
        write_key_column(file, &object.null_array_keys)?;
        for &len in &object.null_array_lengths {
            file.write_u32(len)?;
        }
        group_offs.push(off);
    }
    array_prop!(
        &object.bool_array_keys,
        &object.bool_array_values,
        FieldType::Boolean,
        |f: &mut MemFile, v: &bool| f.write_u8(*v as u8)
    );
    array_prop!(
        &object.int8_array_keys,
        &object.int8_array_values,
        FieldType::Int8,
        |f: &mut MemFile, v: &i8| f.write_i8(*v)
    );
    array_prop!(
        &object.int16_array_keys,
        &object.int16_array_values,
        FieldType::Int16,
        |f: &mut MemFile, v: &i16| f.write_i16(*v)
    );
    array_prop!(
        &object.int32_array_keys,
        &object.int32_array_values,
        FieldType::Int32,
        |f: &mut MemFile, v: &i32| f.write_i32(*v)
    );
    array_prop!(
        &object.int64_array_keys,
        &object.int64_array_values,
        FieldType::Int64,
        |f: &mut MemFile, v: &i64| f.write_i64(*v)
    );
    array_prop!(
        &object.uint8_array_keys,
        &object.uint8_array_values,
        FieldType::UInt8,
        |f: &mut MemFile, v: &u8| f.write_u8(*v)
    );
    array_prop!(
        &object.uint16_array_keys,
        &object.uint16_array_values,
        FieldType::UInt16,
        |f: &mut MemFile, v: &u16| f.write_u16(*v)
    );
    array_prop!(
        &object.uint32_array_keys,
        &object.uint32_array_values,
        FieldType::UInt32,
        |f: &mut MemFile, v: &u32| f.write_u32(*v)
    );
    array_prop!(
        &object.uint64_array_keys,
        &object.uint64_array_values,
        FieldType::UInt64,
        |f: &mut MemFile, v: &u64| f.write_u64(*v)
    );
    array_prop!(
        &object.float_array_keys,
        &object.float_array_values,
        FieldType::Float,
        |f: &mut MemFile, v: &ordered_float::OrderedFloat<f32>| f.write_f32(v.into_inner())
    );
    array_prop!(
        &object.string_array_keys,
        &object.string_array_values,
        FieldType::String,
        |f: &mut MemFile, v: &Sid| f.write_u64(*v)
    );

    if !object.object_array_groups.is_empty() {
        let off = write_object_array_groups(file, &object.object_array_groups, root_off)?;
        group_offs.push(off);
    }

    file.write_u8(Marker::ObjectEnd.symbol())?;

    let end_off = file.position();
    file.seek(header_off)?;
    file.write_u8(Marker::ObjectBegin.symbol())?;
    file.write_u64(oid::mint()?)?;
    file.write_u32(flags.0)?;
    debug_assert_eq!(group_offs.len(), flags.num_groups());
    for group_off in group_offs {
        file.write_u64(group_off - root_off)?;
    }
    file.seek(end_off)?;

    Ok(next_slot_off)
}

/// Emits the object-array section: its header, the per-group key column, a
/// back-patched per-group offset column, and each column group.
fn write_object_array_groups(
    file: &mut MemFile,
    groups: &[ColumnGroupModel],
    root_off: u64,
) -> Result<u64> {
    if groups.len() > u8::MAX as usize {
        return Err(Error::UnsupportedDocument(
            "more than 255 object-array keys in one object".to_string(),
        ));
    }

    let section_off = file.position();
    file.write_u8(Marker::PropArray(FieldType::Object).symbol())?;
    file.write_u8(groups.len() as u8)?;

    for group in groups {
        file.write_u64(group.key)?;
    }

    let group_offsets_col = file.position();
    file.skip(groups.len() * 8)?;

    for (i, group) in groups.iter().enumerate() {
        let group_off = file.position() - root_off;

        // One object slot per distinct array position across all columns.
        let num_objects = group
            .columns
            .iter()
            .flat_map(|column| column.positions.iter().copied())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        file.write_u8(Marker::ColumnGroup.symbol())?;
        file.write_u32(group.columns.len() as u32)?;
        file.write_u32(num_objects)?;
        for _ in 0..num_objects {
            file.write_u64(oid::mint()?)?;
        }

        let continue_off = file.position();
        file.seek(group_offsets_col + (i as u64) * 8)?;
        file.write_u64(group_off)?;
        file.seek(continue_off)?;

        let column_offsets_col = file.position();
        file.skip(group.columns.len() * 8)?;

        for (k, column) in group.columns.iter().enumerate() {
            let column_off = file.position() - root_off;
            let continue_off = file.position();
            file.seek(column_offsets_col + (k as u64) * 8)?;
            file.write_u64(column_off)?;
            file.seek(continue_off)?;
            write_column(file, column, root_off)?;
        }
    }
    Ok(section_off)
}

fn write_column(file: &mut MemFile, column: &ColumnModel, root_off: u64) -> Result<()> {
    debug_assert_eq!(column.positions.len(), column.entries.len());

    file.write_u8(Marker::Column.symbol())?;
    file.write_u64(column.name)?;
    file.write_u8(column.ty.array_marker())?;
    file.write_u32(column.entries.len() as u32)?;

    let entry_offsets_col = file.position();
    file.skip(column.entries.len() * 8)?;

    for &position in &column.positions {
        file.write_u32(position)?;
    }

    for (i, entry) in column.entries.iter().enumerate() {
        let entry_off = file.position() - root_off;
        let continue_off = file.position();
        file.seek(entry_offsets_col + (i as u64) * 8)?;
        file.write_u64(entry_off)?;
        file.seek(continue_off)?;
        write_column_entry(file, entry, root_off)?;
    }
    Ok(())
}

fn write_column_entry(file: &mut MemFile, entry: &ColumnEntry, root_off: u64) -> Result<()> {
    file.write_u32(entry.len() as u32)?;
    match entry {
        ColumnEntry::Null(_) => {}
        ColumnEntry::Boolean(values) => {
            for &v in values {
                file.write_u8(v as u8)?;
            }
        }
        ColumnEntry::Int8(values) => {
            for &v in values {
                file.write_i8(v)?;
            }
        }
        ColumnEntry::Int16(values) => {
            for &v in values {
                file.write_i16(v)?;
            }
        }
        ColumnEntry::Int32(values) => {
            for &v in values {
                file.write_i32(v)?;
            }
        }
        ColumnEntry::Int64(values) => {
            for &v in values {
                file.write_i64(v)?;
            }
        }
        ColumnEntry::UInt8(values) => {
            for &v in values {
                file.write_u8(v)?;
            }
        }
        ColumnEntry::UInt16(values) => {
            for &v in values {
                file.write_u16(v)?;
            }
        }
        ColumnEntry::UInt32(values) => {
            for &v in values {
                file.write_u32(v)?;
            }
        }
        ColumnEntry::UInt64(values) => {
            for &v in values {
                file.write_u64(v)?;
            }
        }
        ColumnEntry::Float(values) => {
            for &v in values {
                file.write_f32(v.into_inner())?;
            }
        }
        ColumnEntry::String(values) => {
            for &v in values {
                file.write_u64(v)?;
            }
        }
        ColumnEntry::Object(objects) => {
            // Chain the serialized objects through their "next" slots.
            let mut previous_next_slot = 0u64;
            for object in objects {
                if previous_next_slot != 0 {
                    let continue_off = file.position();
                    let relative = continue_off - root_off;
                    file.seek(previous_next_slot)?;
                    file.write_u64(relative)?;
                    file.seek(continue_off)?;
                }
                previous_next_slot = serialize_object(file, object, root_off)?;
            }
        }
    }
    Ok(())
}

/// Scans the string table of a finished image, appends the serialized
/// sid→offset index, and back-patches the file header's index offset.
fn bake_sid_index(image: Vec<u8>) -> Result<Vec<u8>> {
    let index = SidIndex::build_from_image(&image)?;
    let index_off = image.len() as u64;

    let mut file = MemFile::from_vec(image, crate::memfile::AccessMode::ReadWrite);
    file.seek(index_off)?;
    index.serialize(&mut file)?;
    file.shrink()?;

    // The index-offset slot sits behind the magic and version bytes.
    file.seek((MAGIC.len() + 1 + 8) as u64)?;
    file.write_u64(index_off)?;

    Ok(file.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_image_shape() {
        let options = ArchiveOptions {
            bake_sid_index: false,
            ..ArchiveOptions::default()
        };
        let image = archive_from_value(&json!({}), &options).unwrap();

        assert_eq!(&image[..MAGIC.len()], MAGIC);
        assert_eq!(image[MAGIC.len()], VERSION);

        // String table follows the file header and holds no entries.
        assert_eq!(image[FILE_HEADER_SIZE], Marker::StringTable.symbol());

        // The record body is exactly one empty object: a 13-byte header, the
        // 8-byte next slot, and the end marker.
        let root = image.len() - (OBJECT_HEADER_SIZE + 8 + 1);
        assert_eq!(image[root], Marker::ObjectBegin.symbol());
        assert_eq!(image[image.len() - 1], Marker::ObjectEnd.symbol());
    }

    #[test]
    fn test_image_is_stable_apart_from_oids() {
        let options = ArchiveOptions::default();
        let first = archive_from_value(&json!({"k": "v"}), &options).unwrap();
        let second = archive_from_value(&json!({"k": "v"}), &options).unwrap();
        assert_eq!(first.len(), second.len());
    }
}
