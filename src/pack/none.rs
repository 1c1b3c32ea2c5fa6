//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The uncompressed packer: string payloads are stored as raw bytes and no
//! extra data is kept.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::memfile::MemFile;
use crate::pack::{Packer, PackerType};

#[derive(Debug, Default)]
pub struct NonePacker;

impl NonePacker {
    pub fn new() -> NonePacker {
        NonePacker
    }
}

impl Packer for NonePacker {
    fn packer_type(&self) -> PackerType {
        PackerType::None
    }

    fn write_extra(&mut self, _dst: &mut MemFile, _strings: &[&str]) -> Result<()> {
        Ok(())
    }

    fn read_extra(&mut self, src: &mut MemFile, num_bytes: u64) -> Result<()> {
        src.skip(num_bytes as usize)?;
        Ok(())
    }

    fn encode_string(&self, dst: &mut MemFile, string: &str) -> Result<()> {
        dst.write(string.as_bytes())
    }

    fn decode_string(&self, src: &mut dyn Read, len: usize) -> Result<String> {
        let mut bytes = vec![0u8; len];
        src.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| Error::DecompressFailed)
    }

    fn print_extra(&self, _out: &mut dyn Write, _src: &mut MemFile) -> Result<()> {
        Ok(())
    }

    fn print_encoded(&self, out: &mut dyn Write, src: &mut MemFile, len: u32) -> Result<()> {
        let bytes = src.read(len as usize)?;
        writeln!(out, " [string: {}]", String::from_utf8_lossy(bytes))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_writes_raw_bytes() {
        let mut file = MemFile::new();
        let packer = NonePacker::new();
        packer.encode_string(&mut file, "hello").unwrap();
        file.shrink().unwrap();
        assert_eq!(file.as_slice(), b"hello");
    }

    #[test]
    fn test_decode_reads_exact_length() {
        let packer = NonePacker::new();
        let mut src: &[u8] = b"hello world";
        assert_eq!(packer.decode_string(&mut src, 5).unwrap(), "hello");
    }
}
