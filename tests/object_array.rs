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
fn test_object_array_columns() {
    let options = ArchiveOptions {
        bake_sid_index: false,
        ..ArchiveOptions::default()
    };
    let image =
        ser::archive_from_value(&json!({"xs": [{"a": 1}, {"a": 2}]}), &options).unwrap();

    let record_header_off = le_u64(&image, 10) as usize;
    let root = record_header_off + 10;

    // Only the object-array group bit (25) is set.
    let flags = le_u32(&image, root + 9);
    assert_eq!(flags, 1 << 25);

    // Section: marker 'O', one group keyed by the sid of "xs".
    let section = root + le_u64(&image, root + 13) as usize;
    assert_eq!(image[section], b'O');
    assert_eq!(image[section + 1], 1);
    let group_key = le_u64(&image, section + 2);

    // Column group: one column, two object slots with distinct oids.
    let group = root + le_u64(&image, section + 10) as usize;
    assert_eq!(image[group], b'G');
    assert_eq!(le_u32(&image, group + 1), 1);
    assert_eq!(le_u32(&image, group + 5), 2);
    let oid_a = le_u64(&image, group + 9);
    let oid_b = le_u64(&image, group + 17);
    assert_ne!(oid_a, oid_b);

    // Column: named "a", uint8 entries, position column [0, 1], and two
    // length-1 payloads holding 1 and 2.
    let column = root + le_u64(&image, group + 25) as usize;
    assert_eq!(image[column], b'C');
    let column_name = le_u64(&image, column + 1);
    assert_eq!(image[column + 9], b'U');
    assert_eq!(le_u32(&image, column + 10), 2);

    let positions = column + 14 + 16;
    assert_eq!(le_u32(&image, positions), 0);
    assert_eq!(le_u32(&image, positions + 4), 1);

    let first_entry = root + le_u64(&image, column + 14) as usize;
    assert_eq!(le_u32(&image, first_entry), 1);
    assert_eq!(image[first_entry + 4], 1);
    let second_entry = root + le_u64(&image, column + 22) as usize;
    assert_eq!(le_u32(&image, second_entry), 1);
    assert_eq!(image[second_entry + 4], 2);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();
    let archive = Archive::open(file.path()).unwrap();

    let strings = archive.query().all_strings().unwrap();
    let sid_of = |needle: &str| {
        strings
            .iter()
            .find(|(_, s)| s == needle)
            .map(|(sid, _)| *sid)
            .unwrap()
    };
    assert_eq!(group_key, sid_of("xs"));
    assert_eq!(column_name, sid_of("a"));

    assert_eq!(
        archive.to_json().unwrap(),
        json!({"xs": [{"a": 1}, {"a": 2}]})
    );
}

#[test]
fn test_heterogeneous_object_array_round_trip() {
    let document = json!({
        "rows": [
            {"id": 1, "name": "first", "tags": ["x", "y"]},
            {"id": 2, "inner": {"deep": true}},
            {"name": "third", "id": 3},
        ],
    });
    let image = ser::archive_from_value(&document, &ArchiveOptions::default()).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();
    let archive = Archive::open(file.path()).unwrap();
    assert_eq!(archive.to_json().unwrap(), document);
}
