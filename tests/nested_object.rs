use std::io::Write;

use serde_json::json;

use cabfile::ser::{self, ArchiveOptions};
use cabfile::Archive;

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

#[test]
fn test_nested_object_offsets_are_back_patched() {
    let options = ArchiveOptions {
        bake_sid_index: false,
        ..ArchiveOptions::default()
    };
    let image = ser::archive_from_value(&json!({"a": {"b": 1}}), &options).unwrap();

    let record_header_off = le_u64(&image, 10) as usize;
    let root = record_header_off + 10;

    // Only the object property group is present.
    let flags = le_u32(&image, root + 9);
    assert_eq!(flags, 1 << 12);

    // Group: marker 'o', one entry, the key column, then the value-offset
    // column whose single entry is the nested object's header offset
    // relative to the root header.
    let group = root + le_u64(&image, root + 13) as usize;
    assert_eq!(image[group], b'o');
    assert_eq!(le_u32(&image, group + 1), 1);
    let nested_off = le_u64(&image, group + 13) as usize;
    assert_eq!(image[root + nested_off], b'{');

    // The nested object follows the offset column directly.
    assert_eq!(root + nested_off, group + 21);

    // The nested object holds a single integer property.
    let nested = root + nested_off;
    let nested_flags = le_u32(&image, nested + 9);
    assert_eq!(nested_flags.count_ones(), 1);
    let nested_group = root + le_u64(&image, nested + 13) as usize;
    assert_eq!(image[nested_group], b'u');
    assert_eq!(le_u32(&image, nested_group + 1), 1);
    assert_eq!(image[nested_group + 13], 1);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();
    let archive = Archive::open(file.path()).unwrap();
    assert_eq!(archive.to_json().unwrap(), json!({"a": {"b": 1}}));

    let strings = archive.query().all_strings().unwrap();
    let mut names: Vec<&str> = strings.iter().map(|(_, s)| s.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_deeply_nested_round_trip() {
    let document = json!({
        "a": {"b": {"c": {"d": "deep"}, "sibling": 3}},
        "top": "level",
    });
    let image = ser::archive_from_value(&document, &ArchiveOptions::default()).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();
    let archive = Archive::open(file.path()).unwrap();
    assert_eq!(archive.to_json().unwrap(), document);
}
