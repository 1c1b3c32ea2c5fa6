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
fn test_empty_document() {
    let options = ArchiveOptions {
        bake_sid_index: false,
        ..ArchiveOptions::default()
    };
    let image = ser::archive_from_value(&json!({}), &options).unwrap();

    // The record body holds a single object with no property groups: the
    // flags bitmap is zero and the marker sequence is `{` then `}`.
    let record_header_off = le_u64(&image, 10) as usize;
    let root = record_header_off + 10;
    assert_eq!(image[root], b'{');
    assert_eq!(le_u32(&image, root + 9), 0);

    // Header (13) plus the empty offset table (0) plus the next slot (8).
    assert_eq!(image[root + 21], b'}');
    assert_eq!(root + 22, image.len());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();

    let archive = Archive::open(file.path()).unwrap();
    assert_eq!(archive.info().num_embedded_strings, 0);
    assert_eq!(archive.info().record_body_size, 22);

    assert_eq!(archive.to_json().unwrap(), json!({}));
    assert!(archive.query().all_strings().unwrap().is_empty());
}
