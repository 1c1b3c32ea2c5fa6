//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The Huffman packer: the extra data is a serialized prefix-code table
//! built from the full corpus of embedded strings, and each payload is the
//! bit stream of sentinel-prefixed codes.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::huffman::Huffman;
use crate::memfile::MemFile;
use crate::pack::{Packer, PackerType};

#[derive(Debug, Default)]
pub struct HuffmanPacker {
    table: Huffman,
}

impl HuffmanPacker {
    pub fn new() -> HuffmanPacker {
        HuffmanPacker {
            table: Huffman::new(),
        }
    }
}

impl Packer for HuffmanPacker {
    fn packer_type(&self) -> PackerType {
        PackerType::Huffman
    }

    fn write_extra(&mut self, dst: &mut MemFile, strings: &[&str]) -> Result<()> {
        self.table = Huffman::build(strings.iter().copied());
        self.table.serialize(dst)
    }

    fn read_extra(&mut self, src: &mut MemFile, num_bytes: u64) -> Result<()> {
        let start = src.position();
        self.table = Huffman::parse(src)?;
        if src.position() - start != num_bytes {
            return Err(Error::DecompressFailed);
        }
        Ok(())
    }

    fn encode_string(&self, dst: &mut MemFile, string: &str) -> Result<()> {
        self.table.encode(dst, string)
    }

    fn decode_string(&self, src: &mut dyn Read, len: usize) -> Result<String> {
        let bytes = self.table.decode(src, len)?;
        String::from_utf8(bytes).map_err(|_| Error::DecompressFailed)
    }

    fn print_extra(&self, out: &mut dyn Write, src: &mut MemFile) -> Result<()> {
        loop {
            let offset = src.position();
            match Huffman::read_entry(src)? {
                Some(entry) => {
                    let code: String = std::iter::once('1')
                        .chain(entry.path.iter().map(|&bit| if bit { '1' } else { '0' }))
                        .collect();
                    writeln!(
                        out,
                        "{:#06x} [marker: d] [letter: {:?}] [code: 0b{}]",
                        offset, entry.letter as char, code
                    )?;
                }
                None => break,
            }
        }
        Ok(())
    }

    fn print_encoded(&self, out: &mut dyn Write, src: &mut MemFile, _len: u32) -> Result<()> {
        let encoded = Huffman::read_string_info(src)?;
        write!(out, " [nbytes_encoded: {}] [bytes:", encoded.len())?;
        for byte in encoded {
            write!(out, " {:#010b}", byte)?;
        }
        writeln!(out, "]")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfile::AccessMode;

    #[test]
    fn test_extra_round_trip_restores_codec() {
        let corpus = ["alpha", "beta", "gamma"];
        let refs: Vec<&str> = corpus.to_vec();

        let mut writer = HuffmanPacker::new();
        let mut extra = MemFile::new();
        writer.write_extra(&mut extra, &refs).unwrap();
        extra.shrink().unwrap();
        let extra_size = extra.size() as u64;

        let mut reader = HuffmanPacker::new();
        let mut src = MemFile::from_vec(extra.into_vec(), AccessMode::ReadOnly);
        reader.read_extra(&mut src, extra_size).unwrap();

        for &string in corpus.iter() {
            let mut encoded = MemFile::new();
            writer.encode_string(&mut encoded, string).unwrap();
            encoded.shrink().unwrap();
            let bytes = encoded.into_vec();
            let decoded = reader
                .decode_string(&mut bytes.as_slice(), string.len())
                .unwrap();
            assert_eq!(decoded, string);
        }
    }
}
