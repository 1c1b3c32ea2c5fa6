use std::io::Write;

use serde_json::json;

use cabfile::ser::{self, ArchiveOptions};
use cabfile::{Archive, Sid};

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

fn written(image: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(image).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_single_string_property() {
    let options = ArchiveOptions {
        bake_sid_index: false,
        ..ArchiveOptions::default()
    };
    let image = ser::archive_from_value(&json!({"k": "v"}), &options).unwrap();
    let file = written(&image);
    let archive = Archive::open(file.path()).unwrap();

    // Exactly two embedded strings: the key and the value.
    assert_eq!(archive.info().num_embedded_strings, 2);
    let strings = archive.query().all_strings().unwrap();
    assert_eq!(strings.len(), 2);

    let sid_of = |needle: &str| -> Sid {
        strings
            .iter()
            .find(|(_, string)| string == needle)
            .map(|(sid, _)| *sid)
            .unwrap()
    };
    assert_eq!(archive.query().fetch_string(sid_of("v")).unwrap(), "v");

    // The root object carries only the string property group: flag bit 11,
    // one offset-table entry.
    let record_header_off = le_u64(&image, 10) as usize;
    let root = record_header_off + 10;
    let flags = le_u32(&image, root + 9);
    assert_eq!(flags, 1 << 11);

    let group_off = le_u64(&image, root + 13) as usize;
    assert_eq!(image[root + group_off], b't');

    assert_eq!(archive.to_json().unwrap(), json!({"k": "v"}));
}

#[test]
fn test_mixed_scalar_array() {
    let options = ArchiveOptions {
        bake_sid_index: false,
        ..ArchiveOptions::default()
    };
    let image = ser::archive_from_value(&json!({"xs": [1, 2, 3]}), &options).unwrap();
    let file = written(&image);
    let archive = Archive::open(file.path()).unwrap();

    let record_header_off = le_u64(&image, 10) as usize;
    let root = record_header_off + 10;

    // One group only: the uint8 array group (bit 13 + 6).
    let flags = le_u32(&image, root + 9);
    assert_eq!(flags, 1 << 19);

    // Group layout: marker, count, key sid, length, payload 01 02 03.
    let group = root + le_u64(&image, root + 13) as usize;
    assert_eq!(image[group], b'U');
    assert_eq!(le_u32(&image, group + 1), 1);
    let key_sid = le_u64(&image, group + 5);
    let strings = archive.query().all_strings().unwrap();
    assert_eq!(strings, vec![(key_sid, "xs".to_string())]);

    assert_eq!(le_u32(&image, group + 13), 3);
    assert_eq!(&image[group + 17..group + 20], &[0x01, 0x02, 0x03]);

    assert_eq!(archive.to_json().unwrap(), json!({"xs": [1, 2, 3]}));
}

#[test]
fn test_scalar_round_trip() {
    let document = json!({
        "flag": true,
        "off": false,
        "small": 7,
        "wide": 123456,
        "negative": -42,
        "big": 9007199254740993u64,
        "fraction": 0.25,
        "name": "zaphod",
        "nothing": null,
        "bools": [true, false, true],
        "strings": ["a", "b", null],
        "empty": [],
    });
    let image = ser::archive_from_value(&document, &ArchiveOptions::default()).unwrap();
    let file = written(&image);
    let archive = Archive::open(file.path()).unwrap();
    assert_eq!(archive.to_json().unwrap(), document);
}
