//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The Huffman codec.
//!
//! Builds a prefix-code table from the byte-frequency histogram of an input
//! corpus, serializes the table into the archive, and encodes and decodes
//! individual strings against it.
//!
//! Tree construction works on an arena of nodes plus a list of live node
//! indices: the two lowest-frequency live nodes are merged under a fresh
//! parent until a single root remains. Ties are broken by the current list
//! order, and code assignment traverses the finished tree left edge first, so
//! the same corpus always yields the same table bit for bit.
//!
//! Every code is guarded by a sentinel `1` bit. Encoded strings emit the
//! sentinel first, followed by the root-to-leaf path, which keeps the bit
//! stream prefix-free. Serialized table entries emit the path leaf edge
//! first and end on the sentinel, so the last set bit of an entry delimits
//! the code and pad bits are unambiguous.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::document::Marker;
use crate::error::{Error, Result};
use crate::memfile::{AccessMode, MemFile};

/// One letter of the code table: the byte value and its root-to-leaf path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CodeEntry {
    pub letter: u8,
    /// Edge bits from the root to the letter's leaf, left = `false`. Empty
    /// when the corpus holds a single distinct letter.
    pub path: Vec<bool>,
}

/// A corpus-driven prefix-code table.
#[derive(Clone, Debug)]
pub struct Huffman {
    entries: Vec<CodeEntry>,
    by_letter: Vec<Option<u16>>,
}

impl Default for Huffman {
    fn default() -> Self {
        Huffman::new()
    }
}

struct Node {
    freq: u64,
    letter: Option<u8>,
    left: Option<usize>,
    right: Option<usize>,
}

impl Huffman {
    pub fn new() -> Huffman {
        Huffman {
            entries: Vec::new(),
            by_letter: vec![None; 256],
        }
    }

    /// The table entries in their stable serialization order.
    pub fn entries(&self) -> &[CodeEntry] {
        &self.entries
    }

    /// Builds the code table from the given corpus.
    ///
    /// The histogram covers all 256 byte values; letters that never occur in
    /// the corpus get no entry, and encoding them fails with
    /// [`Error::HuffmanMissingLetter`].
    pub fn build<'a, I>(strings: I) -> Huffman
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut frequencies = [0u64; 256];
        for string in strings {
            for &byte in string.as_bytes() {
                frequencies[byte as usize] += 1;
            }
        }
        Huffman::from_histogram(&frequencies)
    }

    /// Builds the code table from a precomputed byte-frequency histogram.
    pub fn from_histogram(frequencies: &[u64; 256]) -> Huffman {
        let mut nodes: Vec<Node> = Vec::with_capacity(512);
        let mut live: Vec<usize> = Vec::new();
        for letter in 0..=255u8 {
            let freq = frequencies[letter as usize];
            if freq > 0 {
                live.push(nodes.len());
                nodes.push(Node {
                    freq,
                    letter: Some(letter),
                    left: None,
                    right: None,
                });
            }
        }

        while live.len() > 1 {
            let lowest = last_minimum(&nodes, &live, None);
            let second = last_minimum(&nodes, &live, Some(lowest));
            let left = live[second];
            let right = live[lowest];

            let parent = nodes.len();
            nodes.push(Node {
                freq: nodes[left].freq + nodes[right].freq,
                letter: None,
                left: Some(left),
                right: Some(right),
            });

            // Remove the higher list position first so the lower one stays valid.
            let (first_out, second_out) = if lowest > second {
                (lowest, second)
            } else {
                (second, lowest)
            };
            live.remove(first_out);
            live.remove(second_out);
            live.push(parent);
        }

        let mut table = Huffman::new();
        if let Some(&root) = live.first() {
            let mut path = Vec::new();
            assign_codes(&nodes, root, &mut path, &mut table.entries);
        }
        for (index, entry) in table.entries.iter().enumerate() {
            table.by_letter[entry.letter as usize] = Some(index as u16);
        }
        table
    }

    /// Serializes the table: one `d`-marked entry per letter, carrying the
    /// letter byte, the code's byte length, and the code bits.
    pub fn serialize(&self, file: &mut MemFile) -> Result<()> {
        for entry in &self.entries {
            file.write_u8(Marker::HuffmanDicEntry.symbol())?;
            file.write_u8(entry.letter)?;

            let length_off = file.position();
            file.write_u8(0)?;

            file.begin_bits()?;
            for &bit in entry.path.iter().rev() {
                file.write_bit(bit)?;
            }
            file.write_bit(true)?;
            let num_bytes = file.end_bits()?;

            let continue_off = file.position();
            file.seek(length_off)?;
            file.write_u8(num_bytes as u8)?;
            file.seek(continue_off)?;
        }
        Ok(())
    }

    /// Reads one serialized table entry, or `None` when the byte under the
    /// cursor is not an entry marker.
    pub fn read_entry(file: &mut MemFile) -> Result<Option<CodeEntry>> {
        if file.peek(1)?[0] != Marker::HuffmanDicEntry.symbol() {
            return Ok(None);
        }
        file.skip(1)?;
        let letter = file.read_u8()?;
        let num_bytes = file.read_u8()? as usize;
        let code_bytes = file.read(num_bytes)?;

        let mut bits: Vec<bool> = Vec::with_capacity(num_bytes * 8);
        for &byte in code_bytes {
            for bit in 0..8 {
                bits.push(byte & (1 << bit) != 0);
            }
        }
        while bits.last() == Some(&false) {
            bits.pop();
        }
        if bits.pop() != Some(true) {
            return Err(Error::DecompressFailed);
        }
        bits.reverse();
        Ok(Some(CodeEntry { letter, path: bits }))
    }

    /// Parses a full serialized table starting at the cursor.
    pub fn parse(file: &mut MemFile) -> Result<Huffman> {
        let mut table = Huffman::new();
        while file.remaining() > 0 {
            match Huffman::read_entry(file)? {
                Some(entry) => table.entries.push(entry),
                None => break,
            }
        }
        for (index, entry) in table.entries.iter().enumerate() {
            table.by_letter[entry.letter as usize] = Some(index as u16);
        }
        Ok(table)
    }

    /// Encodes `string` at the cursor: a back-patched u32 byte count
    /// followed by the bit run of sentinel-prefixed codes.
    pub fn encode(&self, file: &mut MemFile, string: &str) -> Result<()> {
        let count_off = file.position();
        file.write_u32(0)?;

        file.begin_bits()?;
        for &byte in string.as_bytes() {
            let entry = self.by_letter[byte as usize]
                .map(|index| &self.entries[index as usize])
                .ok_or(Error::HuffmanMissingLetter(byte))?;
            file.write_bit(true)?;
            for &bit in entry.path.iter() {
                file.write_bit(bit)?;
            }
        }
        let num_bytes = file.end_bits()?;

        let continue_off = file.position();
        file.seek(count_off)?;
        file.write_u32(num_bytes as u32)?;
        file.seek(continue_off)?;
        Ok(())
    }

    /// Decodes a string of `plain_len` letters from `src`, which must be
    /// positioned on the u32 encoded-byte-count prefix.
    pub fn decode(&self, src: &mut dyn Read, plain_len: usize) -> Result<Vec<u8>> {
        let num_encoded = src.read_u32::<LittleEndian>()? as usize;
        let mut encoded = vec![0u8; num_encoded];
        src.read_exact(&mut encoded)?;
        self.decode_bytes(&encoded, plain_len)
    }

    /// Decodes `plain_len` letters from an already-read encoded payload by
    /// replaying the encoder's bit run through the bit-file's read mode.
    pub fn decode_bytes(&self, encoded: &[u8], plain_len: usize) -> Result<Vec<u8>> {
        let trie = self.decode_trie()?;
        let mut bits = MemFile::from_vec(encoded.to_vec(), AccessMode::ReadWrite);
        bits.begin_bits()?;

        let mut result = Vec::with_capacity(plain_len);
        for _ in 0..plain_len {
            // Sentinel bit first.
            if !next_bit(&mut bits)? {
                return Err(Error::DecompressFailed);
            }

            let mut node = 0usize;
            loop {
                if let Some(letter) = trie[node].letter {
                    result.push(letter);
                    break;
                }
                let bit = next_bit(&mut bits)? as usize;
                node = match trie[node].children[bit] {
                    Some(child) => child as usize,
                    None => return Err(Error::DecompressFailed),
                };
            }
        }
        bits.end_bits()?;
        Ok(result)
    }

    /// Rebuilds the code tree from the table entries for decoding.
    fn decode_trie(&self) -> Result<Vec<TrieNode>> {
        let mut trie = vec![TrieNode::default()];
        for entry in &self.entries {
            let mut node = 0usize;
            for &bit in &entry.path {
                let slot = bit as usize;
                node = match trie[node].children[slot] {
                    Some(child) => child as usize,
                    None => {
                        let child = trie.len();
                        trie.push(TrieNode::default());
                        trie[node].children[slot] = Some(child as u32);
                        child
                    }
                };
            }
            if trie[node].letter.is_some() {
                return Err(Error::DecompressFailed);
            }
            trie[node].letter = Some(entry.letter);
        }
        Ok(trie)
    }

    /// Reads the u32-prefixed encoded payload of one string without
    /// decoding it.
    pub fn read_string_info(file: &mut MemFile) -> Result<Vec<u8>> {
        let num_encoded = file.read_u32()? as usize;
        Ok(file.read(num_encoded)?.to_vec())
    }
}

#[derive(Clone, Debug, Default)]
struct TrieNode {
    children: [Option<u32>; 2],
    letter: Option<u8>,
}

/// Reads the next bit of an encoded payload; running out of bits means the
/// payload was truncated.
fn next_bit(bits: &mut MemFile) -> Result<bool> {
    bits.read_bit().map_err(|_| Error::DecompressFailed)
}

/// Position in `live` of the lowest-frequency node, preferring the last
/// occurrence on ties, optionally skipping one position.
fn last_minimum(nodes: &[Node], live: &[usize], skip: Option<usize>) -> usize {
    let mut best = usize::MAX;
    let mut best_freq = u64::MAX;
    for (position, &node) in live.iter().enumerate() {
        if Some(position) == skip {
            continue;
        }
        if nodes[node].freq <= best_freq {
            best_freq = nodes[node].freq;
            best = position;
        }
    }
    best
}

fn assign_codes(
    nodes: &[Node],
    node: usize,
    path: &mut Vec<bool>,
    table: &mut Vec<CodeEntry>,
) {
    match (nodes[node].left, nodes[node].right) {
        (None, None) => {
            table.push(CodeEntry {
                letter: nodes[node].letter.expect("leaf without letter"),
                path: path.clone(),
            });
        }
        (left, right) => {
            if let Some(left) = left {
                path.push(false);
                assign_codes(nodes, left, path, table);
                path.pop();
            }
            if let Some(right) = right {
                path.push(true);
                assign_codes(nodes, right, path, table);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfile::AccessMode;

    const CORPUS: &[&str] = &["the quick brown fox", "jumps over", "the lazy dog"];

    #[test]
    fn test_codes_are_prefix_free() {
        let table = Huffman::build(CORPUS.iter().copied());
        for a in table.entries() {
            for b in table.entries() {
                if a.letter != b.letter {
                    let shared = a.path.len().min(b.path.len());
                    assert_ne!(&a.path[..shared], &b.path[..shared]);
                }
            }
        }
    }

    #[test]
    fn test_frequent_letters_get_shorter_codes() {
        let mut frequencies = [0u64; 256];
        frequencies[b'a' as usize] = 1000;
        frequencies[b'b' as usize] = 10;
        frequencies[b'c' as usize] = 1;
        let table = Huffman::from_histogram(&frequencies);
        let path_of = |letter: u8| {
            table
                .entries()
                .iter()
                .find(|e| e.letter == letter)
                .unwrap()
                .path
                .len()
        };
        assert!(path_of(b'a') <= path_of(b'b'));
        assert!(path_of(b'b') <= path_of(b'c'));
    }

    #[test]
    fn test_table_serialization_round_trip() {
        let table = Huffman::build(CORPUS.iter().copied());
        let mut file = MemFile::new();
        table.serialize(&mut file).unwrap();
        file.shrink().unwrap();

        let mut reader = MemFile::from_vec(file.into_vec(), AccessMode::ReadOnly);
        let parsed = Huffman::parse(&mut reader).unwrap();
        assert_eq!(table.entries(), parsed.entries());
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let first = {
            let mut file = MemFile::new();
            Huffman::build(CORPUS.iter().copied())
                .serialize(&mut file)
                .unwrap();
            file.shrink().unwrap();
            file.into_vec()
        };
        let second = {
            let mut file = MemFile::new();
            Huffman::build(CORPUS.iter().copied())
                .serialize(&mut file)
                .unwrap();
            file.shrink().unwrap();
            file.into_vec()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let table = Huffman::build(CORPUS.iter().copied());
        for &string in CORPUS {
            let mut file = MemFile::new();
            table.encode(&mut file, string).unwrap();
            file.shrink().unwrap();

            let bytes = file.into_vec();
            let decoded = table
                .decode(&mut bytes.as_slice(), string.len())
                .unwrap();
            assert_eq!(decoded, string.as_bytes());
        }
    }

    #[test]
    fn test_single_letter_corpus() {
        let table = Huffman::build(std::iter::once("aaaa"));
        assert_eq!(table.entries().len(), 1);
        assert!(table.entries()[0].path.is_empty());

        let mut file = MemFile::new();
        table.encode(&mut file, "aaa").unwrap();
        file.shrink().unwrap();
        let bytes = file.into_vec();
        assert_eq!(table.decode(&mut bytes.as_slice(), 3).unwrap(), b"aaa");
    }

    #[test]
    fn test_missing_letter_is_rejected() {
        let table = Huffman::build(std::iter::once("abc"));
        let mut file = MemFile::new();
        assert_eq!(
            table.encode(&mut file, "abcx").unwrap_err(),
            Error::HuffmanMissingLetter(b'x')
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_encode_decode_round_trip(strings in proptest::collection::vec(".{0,24}", 1..8)) {
            let table = Huffman::build(strings.iter().map(|s| s.as_str()));
            for string in strings.iter() {
                let mut file = MemFile::new();
                table.encode(&mut file, string).unwrap();
                file.shrink().unwrap();
                let bytes = file.into_vec();
                let decoded = table.decode(&mut bytes.as_slice(), string.len()).unwrap();
                proptest::prop_assert_eq!(decoded, string.as_bytes());
            }
        }
    }
}
