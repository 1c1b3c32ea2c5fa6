use std::io::Write;

use serde_json::json;

use cabfile::ser::{self, ArchiveOptions};
use cabfile::{Archive, Error};

fn image() -> Vec<u8> {
    let options = ArchiveOptions {
        bake_sid_index: false,
        ..ArchiveOptions::default()
    };
    ser::archive_from_value(&json!({"k": "v"}), &options).unwrap()
}

fn open_mutated(image: &[u8], at: usize) -> Result<Archive, Error> {
    let mut mutated = image.to_vec();
    mutated[at] ^= 0xFF;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&mutated).unwrap();
    file.flush().unwrap();
    Archive::open(file.path())
}

#[test]
fn test_corrupted_magic_is_rejected() {
    let image = image();
    assert_eq!(open_mutated(&image, 0).unwrap_err(), Error::NotAnArchive);
}

#[test]
fn test_corrupted_version_is_rejected() {
    let image = image();
    assert_eq!(open_mutated(&image, 9).unwrap_err(), Error::NotAnArchive);
}

#[test]
fn test_corrupted_string_table_marker_is_rejected() {
    let image = image();
    match open_mutated(&image, 26).unwrap_err() {
        Error::CorruptedMarker {
            expected, position, ..
        } => {
            assert_eq!(expected, b'D');
            assert_eq!(position, 26);
        }
        other => panic!("expected CorruptedMarker, got {:?}", other),
    }
}

#[test]
fn test_corrupted_record_marker_is_rejected() {
    let image = image();
    let record_header_off =
        u64::from_le_bytes(image[10..18].try_into().unwrap()) as usize;
    match open_mutated(&image, record_header_off).unwrap_err() {
        Error::CorruptedMarker { expected, .. } => assert_eq!(expected, b'R'),
        other => panic!("expected CorruptedMarker, got {:?}", other),
    }
}

#[test]
fn test_corrupted_root_object_marker_is_rejected() {
    let image = image();
    let record_header_off =
        u64::from_le_bytes(image[10..18].try_into().unwrap()) as usize;
    match open_mutated(&image, record_header_off + 10).unwrap_err() {
        Error::CorruptedMarker { expected, .. } => assert_eq!(expected, b'{'),
        other => panic!("expected CorruptedMarker, got {:?}", other),
    }
}

#[test]
fn test_corrupted_string_entry_marker_fails_scan() {
    let image = image();
    // First entry sits behind the 22-byte string-table header; the none
    // packer stores no extra data.
    let first_entry = 26 + 22;
    assert_eq!(image[first_entry], b'-');

    let mut mutated = image.clone();
    mutated[first_entry] ^= 0xFF;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&mutated).unwrap();
    file.flush().unwrap();

    let archive = Archive::open(file.path()).unwrap();
    match archive.query().all_strings().unwrap_err() {
        Error::CorruptedMarker { expected, .. } => assert_eq!(expected, b'-'),
        other => panic!("expected CorruptedMarker, got {:?}", other),
    }
}

#[test]
fn test_corrupted_group_marker_fails_traversal() {
    let image = image();
    let record_header_off =
        u64::from_le_bytes(image[10..18].try_into().unwrap()) as usize;
    let root = record_header_off + 10;
    // The single group offset points at the string property group header.
    let group = root + u64::from_le_bytes(image[root + 13..root + 21].try_into().unwrap()) as usize;
    assert_eq!(image[group], b't');

    let mut mutated = image.clone();
    mutated[group] = b'?';
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&mutated).unwrap();
    file.flush().unwrap();

    let archive = Archive::open(file.path()).unwrap();
    assert!(archive.to_json().is_err());
}
