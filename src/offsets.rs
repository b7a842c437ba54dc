//! Offset table: the index of per-entry byte ranges.
//!
//! Layout, directly after the header:
//!
//! ```text
//! 0x08  u64 LE  table size in bytes (= entries * 16)
//! 0x10  entries * (u64 LE start, u64 LE end)   end inclusive, absolute
//! ```
//!
//! Payload ranges are contiguous: the first one starts right after the
//! table and each following one starts at the previous end + 1.  An empty
//! payload is encoded as `(start, start - 1)`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};
use std::ops::Range;

use crate::error::{PlankError, Result};
use crate::header::HEADER_SIZE;

/// Width of the size field that follows the header.
pub const SIZE_FIELD_LEN: usize = 8;
/// Absolute position of the first offset pair.
pub const TABLE_OFFSET: usize = HEADER_SIZE + SIZE_FIELD_LEN;
/// Bytes per (start, end) pair.
pub const PAIR_SIZE: u64 = 16;

/// One entry's payload location, `end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPair {
    pub start: u64,
    pub end:   u64,
}

impl OffsetPair {
    pub fn len(&self) -> u64 {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Half-open byte range for slicing the buffer.
    pub fn range(&self) -> Range<usize> {
        self.start as usize..(self.end + 1) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OffsetTable {
    pairs: Vec<OffsetPair>,
}

impl OffsetTable {
    /// Lay out payloads of the given sizes after the three-region preamble
    /// (header, size field, table).
    pub fn from_sizes(sizes: &[u64]) -> Self {
        let mut cursor = TABLE_OFFSET as u64 + sizes.len() as u64 * PAIR_SIZE;
        let pairs = sizes
            .iter()
            .map(|&size| {
                let start = cursor;
                cursor += size;
                OffsetPair { start, end: cursor - 1 }
            })
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[OffsetPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Value of the size field: `entries * 16`.
    pub fn size_field(&self) -> u64 {
        self.pairs.len() as u64 * PAIR_SIZE
    }

    /// First byte of the payload region.
    pub fn data_start(&self) -> u64 {
        TABLE_OFFSET as u64 + self.size_field()
    }

    /// One past the last payload byte; the trailer begins here.
    pub fn data_end(&self) -> u64 {
        self.pairs.last().map_or_else(|| self.data_start(), |p| p.end + 1)
    }

    /// Write the size field followed by every pair.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.size_field())?;
        for pair in &self.pairs {
            writer.write_u64::<LittleEndian>(pair.start)?;
            writer.write_u64::<LittleEndian>(pair.end)?;
        }
        Ok(())
    }

    /// Read and validate the size field and table of a whole container
    /// buffer (header included).
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < TABLE_OFFSET {
            return Err(PlankError::format("buffer truncated before the offset table"));
        }
        let mut reader = Cursor::new(&buf[HEADER_SIZE..]);
        let size = read_u64(&mut reader)?;
        if size % PAIR_SIZE != 0 {
            return Err(PlankError::format(format!(
                "offset table size {size} is not a multiple of {PAIR_SIZE}"
            )));
        }
        let available = (buf.len() - TABLE_OFFSET) as u64;
        if size > available {
            return Err(PlankError::format(format!(
                "offset table declares {size} bytes, only {available} available"
            )));
        }

        let count = (size / PAIR_SIZE) as usize;
        let mut pairs = Vec::with_capacity(count);
        let mut expected = TABLE_OFFSET as u64 + size;
        for index in 0..count {
            let start = read_u64(&mut reader)?;
            let end = read_u64(&mut reader)?;
            if start != expected {
                return Err(PlankError::format(format!(
                    "entry {index} starts at {start:#x}, expected {expected:#x}"
                )));
            }
            let next = end
                .checked_add(1)
                .filter(|&next| next >= start)
                .ok_or_else(|| {
                    PlankError::format(format!("entry {index} has inverted range {start:#x}..={end:#x}"))
                })?;
            if next > buf.len() as u64 {
                return Err(PlankError::format(format!(
                    "entry {index} ends at {end:#x}, past the end of a {}-byte buffer",
                    buf.len()
                )));
            }
            pairs.push(OffsetPair { start, end });
            expected = next;
        }
        Ok(Self { pairs })
    }
}

fn read_u64(reader: &mut Cursor<&[u8]>) -> Result<u64> {
    reader
        .read_u64::<LittleEndian>()
        .map_err(|e| PlankError::format(format!("truncated offset table: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn with_header(table: &OffsetTable, payload_len: usize) -> Vec<u8> {
        let mut buf = b"plank\x00\x00\x00".to_vec();
        table.write(&mut buf).unwrap();
        buf.resize(buf.len() + payload_len, 0xee);
        buf
    }

    #[test]
    fn sizes_to_offsets() {
        let table = OffsetTable::from_sizes(&[5, 6]);
        assert_eq!(table.size_field(), 32);
        assert_eq!(table.data_start(), 0x30);
        assert_eq!(
            table.pairs(),
            &[OffsetPair { start: 0x30, end: 0x34 }, OffsetPair { start: 0x35, end: 0x3a }]
        );
        assert_eq!(table.data_end(), 0x3b);
    }

    #[test]
    fn empty_table() {
        let table = OffsetTable::from_sizes(&[]);
        assert_eq!(table.data_start(), TABLE_OFFSET as u64);
        assert_eq!(table.data_end(), TABLE_OFFSET as u64);
        let parsed = OffsetTable::parse(&with_header(&table, 0)).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn zero_length_payload() {
        let table = OffsetTable::from_sizes(&[3, 0, 2]);
        let p = table.pairs();
        assert!(p[1].is_empty());
        assert_eq!(p[1].start, p[2].start);
        assert_eq!(p[1].range(), p[1].start as usize..p[1].start as usize);

        let parsed = OffsetTable::parse(&with_header(&table, 5)).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn write_then_parse() {
        let table = OffsetTable::from_sizes(&[10, 1, 300]);
        let buf = with_header(&table, 311);
        assert_eq!(&buf[8..16], &48u64.to_le_bytes());
        assert_eq!(OffsetTable::parse(&buf).unwrap(), table);
    }

    #[test]
    fn misaligned_size_rejected() {
        let mut buf = b"plank\x00\x00\x00".to_vec();
        buf.extend_from_slice(&17u64.to_le_bytes());
        buf.resize(64, 0);
        assert_eq!(OffsetTable::parse(&buf).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn oversized_table_rejected() {
        let mut buf = b"plank\x00\x00\x00".to_vec();
        buf.extend_from_slice(&(1u64 << 40).to_le_bytes());
        assert_eq!(OffsetTable::parse(&buf).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn gap_between_entries_rejected() {
        let table = OffsetTable::from_sizes(&[4, 4]);
        let mut buf = with_header(&table, 8);
        // second start: 0x10 + 16 (first pair) = 0x20
        buf[0x20..0x28].copy_from_slice(&0x31u64.to_le_bytes());
        assert_eq!(OffsetTable::parse(&buf).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn range_past_buffer_rejected() {
        let table = OffsetTable::from_sizes(&[100]);
        let buf = with_header(&table, 10);
        assert_eq!(OffsetTable::parse(&buf).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn truncated_buffer_rejected() {
        assert_eq!(OffsetTable::parse(b"plank\x00\x00\x00\x10").unwrap_err().kind(), ErrorKind::Format);
    }
}
