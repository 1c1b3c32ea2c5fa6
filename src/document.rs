//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The cabfile archive format.
//!
//! Constants and records defined in this module describe the sections of an
//! archive file. All values are little-endian and byte-packed.
//!
//! An archive is organized into five segments:
//!
//! 1. File header
//! 2. Embedded string table (with packer-specific extra data)
//! 3. Record header
//! 4. Record body (the root object)
//! 5. Optional string-id index at the file tail
//!
//! Every record inside the file starts with a single marker byte drawn from a
//! disjoint alphabet; readers reject any byte outside of it.

/// The number of bytes of data required to define an archive file header.
pub const FILE_HEADER_SIZE: usize = 26;

/// The archive magic number ("cabstream").
pub const MAGIC: &[u8] = b"cabstream";

/// The archive format version emitted by this library.
pub const VERSION: u8 = 1;

/// The number of bytes of a string-table header.
pub const STRING_TABLE_HEADER_SIZE: usize = 22;

/// The number of bytes of a single string-table entry header.
pub const STRING_ENTRY_HEADER_SIZE: usize = 21;

/// The number of bytes of a record header.
pub const RECORD_HEADER_SIZE: usize = 10;

/// The number of bytes of an object header, excluding the per-object
/// group-offset table and the trailing "next object" slot.
pub const OBJECT_HEADER_SIZE: usize = 13;

/// The number of bytes of a property-group header.
pub const PROP_HEADER_SIZE: usize = 5;

/// The number of bytes of an object-array group header.
pub const OBJECT_ARRAY_HEADER_SIZE: usize = 2;

/// The number of bytes of a column-group header.
pub const COLUMN_GROUP_HEADER_SIZE: usize = 9;

/// The number of bytes of a column header.
pub const COLUMN_HEADER_SIZE: usize = 14;

/// Record-header flag bit marking a read-optimized (sorted) archive.
pub const RECORD_FLAG_SORTED: u8 = 1 << 0;

/// A string identifier, resolvable through the archive's string table.
pub type Sid = u64;

/// The reserved string identifier of the null string.
pub const NULL_SID: Sid = 0;

/// The text the null string id decodes to.
pub const NULL_TEXT: &str = "null";

/// An object identifier, minted per serialized object.
pub type Oid = u64;

/// Marker byte identifying the kind of the record that follows it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Marker {
    /// Start of a serialized object (`{`).
    ObjectBegin,
    /// End of a serialized object (`}`).
    ObjectEnd,
    /// Header of the embedded string table (`D`).
    StringTable,
    /// A single embedded string entry (`-`).
    StringEntry,
    /// The record header preceding the record body (`R`).
    RecordHeader,
    /// A column group inside an object-array group (`G`).
    ColumnGroup,
    /// A single column inside a column group (`C`).
    Column,
    /// One letter of a serialized Huffman code table (`d`).
    HuffmanDicEntry,
    /// A scalar or array property group of the given field type.
    Prop(FieldType),
    /// An array property group of the given element type.
    PropArray(FieldType),
}

impl Marker {
    /// The byte this marker serializes to.
    pub fn symbol(self) -> u8 {
        use Marker::*;
        match self {
            ObjectBegin => b'{',
            ObjectEnd => b'}',
            StringTable => b'D',
            StringEntry => b'-',
            RecordHeader => b'R',
            ColumnGroup => b'G',
            Column => b'C',
            HuffmanDicEntry => b'd',
            Prop(ty) => ty.value_marker(),
            PropArray(ty) => ty.array_marker(),
        }
    }
}

/// The closed set of field types an archive can store.
///
/// Each type owns two marker symbols: one for its scalar property group and
/// one for its array property group. `Object` is the exception: its "array"
/// symbol marks the object-array column-group section.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum FieldType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    String,
    Object,
}

/// All field types in the canonical group order used on disk.
pub const FIELD_TYPES: [FieldType; 13] = [
    FieldType::Null,
    FieldType::Boolean,
    FieldType::Int8,
    FieldType::Int16,
    FieldType::Int32,
    FieldType::Int64,
    FieldType::UInt8,
    FieldType::UInt16,
    FieldType::UInt32,
    FieldType::UInt64,
    FieldType::Float,
    FieldType::String,
    FieldType::Object,
];

impl FieldType {
    /// The marker byte of this type's scalar property group.
    pub fn value_marker(self) -> u8 {
        use FieldType::*;
        match self {
            Null => b'n',
            Boolean => b'b',
            Int8 => b'c',
            Int16 => b's',
            Int32 => b'i',
            Int64 => b'l',
            UInt8 => b'u',
            UInt16 => b'h',
            UInt32 => b'e',
            UInt64 => b'g',
            Float => b'f',
            String => b't',
            Object => b'o',
        }
    }

    /// The marker byte of this type's array property group.
    pub fn array_marker(self) -> u8 {
        use FieldType::*;
        match self {
            Null => b'N',
            Boolean => b'B',
            Int8 => b'Z',
            Int16 => b'S',
            Int32 => b'I',
            Int64 => b'L',
            UInt8 => b'U',
            UInt16 => b'H',
            UInt32 => b'E',
            UInt64 => b'J',
            Float => b'F',
            String => b'T',
            Object => b'O',
        }
    }

    /// Resolves a scalar property-group marker back to its field type.
    pub fn from_value_marker(symbol: u8) -> Option<FieldType> {
        FIELD_TYPES.iter().copied().find(|ty| ty.value_marker() == symbol)
    }

    /// Resolves an array property-group marker back to its element type.
    pub fn from_array_marker(symbol: u8) -> Option<FieldType> {
        FIELD_TYPES.iter().copied().find(|ty| ty.array_marker() == symbol)
    }

    /// The serialized width of one value of this type, in bytes.
    ///
    /// Null values occupy no bytes: a null property group is fully described
    /// by its key column. Objects have no fixed width and answer `None`.
    pub fn size_of(self) -> Option<usize> {
        use FieldType::*;
        match self {
            Null => Some(0),
            Boolean | Int8 | UInt8 => Some(1),
            Int16 | UInt16 => Some(2),
            Int32 | UInt32 | Float => Some(4),
            Int64 | UInt64 | String => Some(8),
            Object => None,
        }
    }
}

/// Per-object bitmap of present property groups. 26 bits are used, one per
/// group, in the order of [`FIELD_TYPES`] followed by the array variants and
/// finally the object-array group.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ObjectFlags(pub u32);

impl ObjectFlags {
    /// Bit index of the scalar property group of `ty`.
    pub fn value_bit(ty: FieldType) -> u32 {
        ty as u32
    }

    /// Bit index of the array property group of `ty`. For `Object` this is
    /// the object-array column-group bit (bit 25).
    pub fn array_bit(ty: FieldType) -> u32 {
        13 + ty as u32
    }

    pub fn set_value(&mut self, ty: FieldType) {
        self.0 |= 1 << Self::value_bit(ty);
    }

    pub fn set_array(&mut self, ty: FieldType) {
        self.0 |= 1 << Self::array_bit(ty);
    }

    pub fn has_value(self, ty: FieldType) -> bool {
        self.0 & (1 << Self::value_bit(ty)) != 0
    }

    pub fn has_array(self, ty: FieldType) -> bool {
        self.0 & (1 << Self::array_bit(ty)) != 0
    }

    /// The number of present groups, which equals the number of entries in
    /// the object's group-offset table.
    pub fn num_groups(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the present groups in canonical on-disk order. Array groups
    /// report `(ty, true)`, scalar groups `(ty, false)`; the object-array
    /// group reports `(Object, true)`.
    pub fn groups(self) -> impl Iterator<Item = (FieldType, bool)> {
        let flags = self;
        FIELD_TYPES
            .iter()
            .copied()
            .map(|ty| (ty, false))
            .chain(FIELD_TYPES.iter().copied().map(|ty| (ty, true)))
            .filter(move |&(ty, array)| {
                if array {
                    flags.has_array(ty)
                } else {
                    flags.has_value(ty)
                }
            })
    }
}

/// Archive file header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct FileHeader {
    /// The format version of the file.
    pub version: u8,
    /// Absolute offset of the record header.
    pub record_header_off: u64,
    /// Absolute offset of the string-id index, or 0 if the file has none.
    pub sid_index_off: u64,
}

/// Embedded string-table header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct StringTableHeader {
    /// Number of embedded string entries.
    pub num_entries: u32,
    /// Packer flag byte; exactly one registered flag bit must be set.
    pub flags: u8,
    /// Absolute offset of the first string entry.
    pub first_entry_off: u64,
    /// Size in bytes of the packer's serialized extra data.
    pub extra_size: u64,
}

/// Header of a single embedded string entry. The packer-encoded payload
/// follows the header directly.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct StringEntryHeader {
    /// Absolute offset of the next entry, or 0 for the last entry.
    pub next_entry_off: u64,
    /// The string id this entry defines.
    pub sid: Sid,
    /// Length of the original string in bytes, before packing.
    pub len: u32,
}

/// Record header preceding the record body.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct RecordHeader {
    /// Bit 0 marks a read-optimized (sorted) record body.
    pub flags: u8,
    /// Size of the record body in bytes.
    pub body_size: u64,
}

impl RecordHeader {
    pub fn is_sorted(&self) -> bool {
        self.flags & RECORD_FLAG_SORTED != 0
    }
}

/// Object header. The group-offset table (one u64 per set flag bit) and the
/// "next object or nil" slot follow the header on disk.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct ObjectHeader {
    pub oid: Oid,
    pub flags: ObjectFlags,
}

/// Property-group header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct PropHeader {
    pub marker: u8,
    pub num_entries: u32,
}

/// Column-group header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct ColumnGroupHeader {
    pub num_columns: u32,
    pub num_objects: u32,
}

/// Column header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct ColumnHeader {
    /// Sid of the key this column stores values for.
    pub name: Sid,
    /// Element type of the column entries.
    pub value_type: FieldType,
    pub num_entries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_alphabet_is_disjoint() {
        let mut symbols = vec![
            Marker::ObjectBegin.symbol(),
            Marker::ObjectEnd.symbol(),
            Marker::StringTable.symbol(),
            Marker::StringEntry.symbol(),
            Marker::RecordHeader.symbol(),
            Marker::ColumnGroup.symbol(),
            Marker::Column.symbol(),
            Marker::HuffmanDicEntry.symbol(),
        ];
        for ty in FIELD_TYPES.iter() {
            symbols.push(Marker::Prop(*ty).symbol());
            symbols.push(Marker::PropArray(*ty).symbol());
        }
        let count = symbols.len();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), count);
    }

    #[test]
    fn test_marker_round_trip() {
        for ty in FIELD_TYPES.iter() {
            assert_eq!(FieldType::from_value_marker(ty.value_marker()), Some(*ty));
            assert_eq!(FieldType::from_array_marker(ty.array_marker()), Some(*ty));
        }
        assert_eq!(FieldType::from_value_marker(b'?'), None);
    }

    #[test]
    fn test_flags_group_order() {
        let mut flags = ObjectFlags::default();
        flags.set_value(FieldType::String);
        flags.set_array(FieldType::Int8);
        flags.set_array(FieldType::Object);
        assert_eq!(flags.num_groups(), 3);

        let groups: Vec<_> = flags.groups().collect();
        assert_eq!(
            groups,
            vec![
                (FieldType::String, false),
                (FieldType::Int8, true),
                (FieldType::Object, true),
            ]
        );
    }

    #[test]
    fn test_magic_is_nine_bytes() {
        assert_eq!(MAGIC.len(), 9);
    }
}
