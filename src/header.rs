//! Fixed 8-byte container prefix.
//!
//! | offset | size | field                       |
//! |--------|------|-----------------------------|
//! | 0x00   | 5    | magic `b"plank"`            |
//! | 0x05   | 2    | reserved, must be zero      |
//! | 0x07   | 1    | flags                       |
//!
//! Flag bits: 0 = filenames in trailer, 1 = payloads encrypted,
//! 2 = payloads compressed.  Any other bit is a format error.

use byteorder::WriteBytesExt;
use std::io::{self, Cursor, Read, Write};

use crate::error::{PlankError, Result};

pub const MAGIC: &[u8; 5] = b"plank";
pub const HEADER_SIZE: usize = 8;
/// Byte offset of the flags byte within the header.
pub const FLAGS_OFFSET: usize = 7;

/// Feature bits recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const FILENAMES:  Flags = Flags(1 << 0);
    pub const ENCRYPTED:  Flags = Flags(1 << 1);
    pub const COMPRESSED: Flags = Flags(1 << 2);

    const KNOWN: u8 = 0b0000_0111;

    pub fn empty() -> Self {
        Flags(0)
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::KNOWN != 0 { None } else { Some(Flags(bits)) }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Flags, on: bool) {
        if on { self.0 |= other.0 } else { self.0 &= !other.0 }
    }

    pub fn has_filenames(self) -> bool { self.contains(Self::FILENAMES) }
    pub fn is_encrypted(self)  -> bool { self.contains(Self::ENCRYPTED) }
    pub fn is_compressed(self) -> bool { self.contains(Self::COMPRESSED) }
}

/// The fixed 8-byte prefix: magic, two reserved zero bytes, flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub flags: Flags,
}

impl Header {
    pub fn new(flags: Flags) -> Self {
        Self { flags }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&[0u8; 2])?;
        writer.write_u8(self.flags.bits())?;
        Ok(())
    }

    /// Parse the header from the start of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(PlankError::format(format!(
                "buffer is {} bytes, shorter than the {HEADER_SIZE}-byte header",
                buf.len()
            )));
        }
        let mut reader = Cursor::new(&buf[..HEADER_SIZE]);
        let mut magic = [0u8; 5];
        let mut reserved = [0u8; 2];
        read_or_format(reader.read_exact(&mut magic))?;
        if &magic != MAGIC {
            return Err(PlankError::format("bad magic, not a plank container"));
        }
        read_or_format(reader.read_exact(&mut reserved))?;
        if reserved != [0, 0] {
            return Err(PlankError::format("reserved header bytes are not zero"));
        }
        let bits = buf[FLAGS_OFFSET];
        let flags = Flags::from_bits(bits)
            .ok_or_else(|| PlankError::format(format!("reserved flag bits set: {bits:#04x}")))?;
        Ok(Self { flags })
    }
}

fn read_or_format<T>(res: io::Result<T>) -> Result<T> {
    res.map_err(|e| PlankError::format(format!("truncated header: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn header_layout() {
        let mut flags = Flags::empty();
        flags.set(Flags::FILENAMES, true);
        flags.set(Flags::COMPRESSED, true);
        let mut written = Vec::new();
        Header::new(flags).write(&mut written).unwrap();
        assert_eq!(written.len(), HEADER_SIZE);
        assert_eq!(&written, b"plank\x00\x00\x05");
        assert_eq!(written[FLAGS_OFFSET], 0x05);
    }

    #[test]
    fn parse_reads_flags() {
        let header = Header::parse(b"plank\x00\x00\x03trailing").unwrap();
        assert!(header.flags.has_filenames());
        assert!(header.flags.is_encrypted());
        assert!(!header.flags.is_compressed());
    }

    #[test]
    fn flags_come_from_flags_offset() {
        for bits in 0..=Flags::KNOWN {
            let mut buf = b"plank\x00\x00\x00".to_vec();
            buf[FLAGS_OFFSET] = bits;
            assert_eq!(Header::parse(&buf).unwrap().flags.bits(), bits);
        }
    }

    #[test]
    fn bad_magic_is_format_error() {
        let err = Header::parse(b"plonk\x00\x00\x00").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn short_buffer_is_format_error() {
        assert_eq!(Header::parse(b"plank").unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn reserved_bits_rejected() {
        assert_eq!(Header::parse(b"plank\x00\x00\x08").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(Header::parse(b"plank\x01\x00\x00").unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn flag_set_and_clear() {
        let mut flags = Flags::from_bits(0b111).unwrap();
        flags.set(Flags::ENCRYPTED, false);
        assert_eq!(flags.bits(), 0b101);
        assert!(Flags::from_bits(0x80).is_none());
    }
}
