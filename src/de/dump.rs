//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Offset-annotated structural dump of an archive file, the backend of the
//! CLI's `view-cab` command. Every record is printed with its absolute file
//! offset and marker; string payloads are rendered through the packer.

use std::io::Write;

use nom::number::complete::le_u32;

use crate::de::parser::document::{file_header, record_header, string_entry_header, string_table_header};
use crate::de::parser::object::{
    column_group_header, column_header, object_array_header, object_header, prop_header, Scalar,
};
use crate::de::parser::utils::{sid_column, u32_column, u64_column};
use crate::de::Archive;
use crate::document::{FieldType, Marker};
use crate::error::{Error, Result};
use crate::memfile::{AccessMode, MemFile};
use crate::pack::STRATEGY_REGISTER;

pub(crate) fn dump_archive(archive: &Archive, out: &mut dyn Write) -> Result<()> {
    let bytes = std::fs::read(&archive.path)?;
    let mut file = MemFile::from_vec(bytes, AccessMode::ReadOnly);

    let header = apply(&mut file, file_header)?;
    writeln!(
        out,
        "{:#06x} [magic: {}] [version: {}] [record-offset: {:#06x}] [string-id-index-offset: {:#06x}]",
        0,
        String::from_utf8_lossy(crate::document::MAGIC),
        header.version,
        header.record_header_off,
        header.sid_index_off,
    )?;

    dump_string_table(archive, &mut file, out)?;

    let record_off = file.position();
    let record = apply(&mut file, record_header)?;
    writeln!(
        out,
        "{:#06x} [marker: R] [flags:{}] [record-size: {:#06x}]",
        record_off,
        if record.is_sorted() { " sorted" } else { " none" },
        record.body_size,
    )?;

    dump_object(&mut file, out, 0)?;
    Ok(())
}

fn dump_string_table(
    archive: &Archive,
    file: &mut MemFile,
    out: &mut dyn Write,
) -> Result<()> {
    let table_off = file.position();
    let table = apply(file, string_table_header)?;

    let mut flag_names = String::new();
    for entry in STRATEGY_REGISTER.iter() {
        if table.flags & entry.flag_bit != 0 {
            flag_names.push(' ');
            flag_names.push_str(entry.name);
        }
    }
    writeln!(
        out,
        "{:#06x} [marker: D] [nentries: {}] [flags:{}] [first-entry-off: {:#06x}] [extra-size: {}]",
        table_off, table.num_entries, flag_names, table.first_entry_off, table.extra_size,
    )?;

    let packer = &archive.string_table.packer;
    packer.print_extra(out, file)?;

    while file.remaining() > 0 && file.peek(1)?[0] == Marker::StringEntry.symbol() {
        let entry_off = file.position();
        let entry = apply(file, string_entry_header)?;
        write!(
            out,
            "{:#06x}    [marker: -] [next-entry-off: {:#06x}] [string-id: {}] [string-length: {}]",
            entry_off, entry.next_entry_off, entry.sid, entry.len,
        )?;
        packer.print_encoded(out, file, entry.len)?;
    }
    Ok(())
}

fn format_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Boolean(value) => value.to_string(),
        Scalar::Signed(value) => value.to_string(),
        Scalar::Unsigned(value) => value.to_string(),
        Scalar::Float(value) => value.to_string(),
        Scalar::String(sid) => format!("sid:{}", sid),
    }
}

fn format_scalars(scalars: &[Scalar]) -> String {
    let rendered: Vec<String> = scalars.iter().map(format_scalar).collect();
    rendered.join(", ")
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

fn dump_object(file: &mut MemFile, out: &mut dyn Write, level: usize) -> Result<()> {
    let object_off = file.position();
    let header = apply(file, object_header)?;
    let group_offs = apply(file, u64_column(header.flags.num_groups()))?;
    let next_slot = apply(file, u64_column(1))?[0];

    let offs: Vec<String> = group_offs.iter().map(|off| format!("{:#06x}", off)).collect();
    writeln!(
        out,
        "{:#06x} {}[marker: {{] [oid: {:#018x}] [flags: {:#010x}] [next: {:#06x}] [group-offs: {}]",
        object_off,
        indent(level),
        header.oid,
        header.flags.0,
        next_slot,
        offs.join(", "),
    )?;

    loop {
        let symbol = file.peek(1)?[0];
        if symbol == Marker::ObjectEnd.symbol() {
            let end_off = file.position();
            file.skip(1)?;
            writeln!(out, "{:#06x} {}[marker: }}]", end_off, indent(level))?;
            break;
        }
        if symbol == Marker::PropArray(FieldType::Object).symbol() {
            dump_object_array_section(file, out, level + 1)?;
            continue;
        }
        dump_prop_group(file, out, level + 1)?;
    }
    Ok(())
}

fn dump_prop_group(file: &mut MemFile, out: &mut dyn Write, level: usize) -> Result<()> {
    let group_off = file.position();
    let (header, ty, is_array) = apply(file, prop_header)?;
    let num = header.num_entries as usize;
    let keys = apply(file, sid_column(num))?;
    let keys_rendered: Vec<String> = keys.iter().map(|key| key.to_string()).collect();

    if ty == FieldType::Object && !is_array {
        let value_offs = apply(file, u64_column(num))?;
        let offs: Vec<String> = value_offs.iter().map(|off| format!("{:#06x}", off)).collect();
        writeln!(
            out,
            "{:#06x} {}[marker: {}] [num: {}] [keys: {}] [value-offs: {}]",
            group_off,
            indent(level),
            header.marker as char,
            num,
            keys_rendered.join(", "),
            offs.join(", "),
        )?;
        for _ in 0..num {
            dump_object(file, out, level + 1)?;
        }
    } else if is_array {
        let lens = apply(file, u32_column(num))?;
        let lens_rendered: Vec<String> = lens.iter().map(|len| len.to_string()).collect();
        write!(
            out,
            "{:#06x} {}[marker: {}] [num: {}] [keys: {}] [lens: {}] [values:",
            group_off,
            indent(level),
            header.marker as char,
            num,
            keys_rendered.join(", "),
            lens_rendered.join(", "),
        )?;
        for &len in &lens {
            let values = apply(file, crate::de::parser::object::value_column(ty, len as usize))?;
            write!(out, " [{}]", format_scalars(&values))?;
        }
        writeln!(out, "]")?;
    } else {
        let values = apply(file, crate::de::parser::object::value_column(ty, num))?;
        writeln!(
            out,
            "{:#06x} {}[marker: {}] [num: {}] [keys: {}] [values: [{}]]",
            group_off,
            indent(level),
            header.marker as char,
            num,
            keys_rendered.join(", "),
            format_scalars(&values),
        )?;
    }
    Ok(())
}

fn dump_object_array_section(file: &mut MemFile, out: &mut dyn Write, level: usize) -> Result<()> {
    let section_off = file.position();
    let num_groups = apply(file, object_array_header)? as usize;
    let keys = apply(file, sid_column(num_groups))?;
    let group_offs = apply(file, u64_column(num_groups))?;

    let keys_rendered: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
    let offs: Vec<String> = group_offs.iter().map(|off| format!("{:#06x}", off)).collect();
    writeln!(
        out,
        "{:#06x} {}[marker: O] [num-groups: {}] [keys: {}] [group-offs: {}]",
        section_off,
        indent(level),
        num_groups,
        keys_rendered.join(", "),
        offs.join(", "),
    )?;

    for _ in 0..num_groups {
        let group_off = file.position();
        let group = apply(file, column_group_header)?;
        let oids = apply(file, u64_column(group.num_objects as usize))?;
        let column_offs = apply(file, u64_column(group.num_columns as usize))?;

        let oids_rendered: Vec<String> =
            oids.iter().map(|oid| format!("{:#018x}", oid)).collect();
        let col_offs: Vec<String> =
            column_offs.iter().map(|off| format!("{:#06x}", off)).collect();
        writeln!(
            out,
            "{:#06x} {}[marker: G] [num-columns: {}] [num-objects: {}] [oids: {}] [column-offs: {}]",
            group_off,
            indent(level + 1),
            group.num_columns,
            group.num_objects,
            oids_rendered.join(", "),
            col_offs.join(", "),
        )?;

        for _ in 0..group.num_columns {
            dump_column(file, out, level + 2)?;
        }
    }
    Ok(())
}

fn dump_column(file: &mut MemFile, out: &mut dyn Write, level: usize) -> Result<()> {
    let column_off = file.position();
    let column = apply(file, column_header)?;
    let num = column.num_entries as usize;
    let entry_offs = apply(file, u64_column(num))?;
    let positions = apply(file, u32_column(num))?;

    let offs: Vec<String> = entry_offs.iter().map(|off| format!("{:#06x}", off)).collect();
    let positions_rendered: Vec<String> =
        positions.iter().map(|pos| pos.to_string()).collect();
    writeln!(
        out,
        "{:#06x} {}[marker: C] [name-sid: {}] [type: {}] [num: {}] [entry-offs: {}] [positions: {}]",
        column_off,
        indent(level),
        column.name,
        column.value_type.array_marker() as char,
        num,
        offs.join(", "),
        positions_rendered.join(", "),
    )?;

    for _ in 0..num {
        let len = apply(file, |i| le_u32(i))? as usize;
        if column.value_type == FieldType::Object {
            for _ in 0..len {
                dump_object(file, out, level + 1)?;
            }
        } else if column.value_type == FieldType::Null {
            writeln!(out, "{}[entry: {} nulls]", indent(level + 1), len)?;
        } else {
            let values = apply(file, crate::de::parser::object::value_column(column.value_type, len))?;
            writeln!(out, "{}[entry: [{}]]", indent(level + 1), format_scalars(&values))?;
        }
    }
    Ok(())
}

/// Applies a nom parser at the buffer cursor and advances past the consumed
/// bytes.
fn apply<T>(
    file: &mut MemFile,
    parser: impl for<'a> Fn(&'a [u8]) -> nom::IResult<&'a [u8], T>,
) -> Result<T> {
    let pos = file.position() as usize;
    let (consumed, value) = {
        let input = &file.as_slice()[pos..];
        let (rest, value) = parser(input).map_err(|_| Error::ScanFailed)?;
        (input.len() - rest.len(), value)
    };
    file.seek((pos + consumed) as u64)?;
    Ok(value)
}
