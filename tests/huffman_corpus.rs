use std::collections::BTreeSet;
use std::io::Write;

use serde_json::json;

use cabfile::pack::PackerType;
use cabfile::ser::{self, ArchiveOptions};
use cabfile::Archive;

/// A corpus of mixed-ASCII strings with the skewed letter distribution of
/// ordinary English text.
fn corpus() -> Vec<String> {
    let words = [
        "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog",
        "pack", "my", "box", "with", "five", "dozen", "liquor", "jugs",
        "sphinx", "of", "black", "quartz", "judge", "vow", "how",
        "vexingly", "daft", "zebras", "jump", "amazingly", "few",
        "discotheques", "provide", "jukeboxes", "entropy", "histogram",
    ];
    words
        .iter()
        .map(|word| format!("{} jumps over the lazy dog and the quick brown fox", word))
        .collect()
}

fn build(packer: PackerType) -> (tempfile::NamedTempFile, u64) {
    let words = corpus();
    assert!(words.len() >= 32);
    let document = json!({ "words": words });
    let options = ArchiveOptions {
        packer,
        ..ArchiveOptions::default()
    };
    let image = ser::archive_from_value(&document, &options).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();

    let archive = Archive::open(file.path()).unwrap();
    let table_size = archive.info().string_table_size;
    (file, table_size)
}

#[test]
fn test_huffman_round_trip_restores_corpus() {
    let (file, _) = build(PackerType::Huffman);
    let archive = Archive::open(file.path()).unwrap();

    let mut expected: BTreeSet<String> = corpus().into_iter().collect();
    expected.insert("words".to_string());

    let fetched: BTreeSet<String> = archive
        .query()
        .all_strings()
        .unwrap()
        .into_iter()
        .map(|(_, string)| string)
        .collect();
    assert_eq!(fetched, expected);

    // Individual fetches go through the index fast path and decode too.
    for (sid, string) in archive.query().all_strings().unwrap() {
        assert_eq!(archive.query().fetch_string(sid).unwrap(), string);
    }
}

#[test]
fn test_huffman_table_is_smaller_for_skewed_corpus() {
    let (_plain_file, plain_size) = build(PackerType::None);
    let (_packed_file, packed_size) = build(PackerType::Huffman);
    assert!(
        packed_size < plain_size,
        "huffman table {} should undercut raw table {}",
        packed_size,
        plain_size
    );
}

#[test]
fn test_huffman_document_round_trip() {
    let words = corpus();
    let document = json!({ "words": words });
    let options = ArchiveOptions {
        packer: PackerType::Huffman,
        ..ArchiveOptions::default()
    };
    let image = ser::archive_from_value(&document, &options).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();

    let archive = Archive::open(file.path()).unwrap();
    assert_eq!(archive.to_json().unwrap(), document);
}
