//! Minimal TIFF structure reader.
//!
//! Enough of TIFF to locate tagged values in vendor files built on it:
//! the byte order mark, the IFD chain hanging off the header, and scalar
//! or string values of each entry. Sub-IFDs and MakerNotes are not
//! followed.
//!
//! ```text
//! "II" | "MM"  magic u16 (42, or 0x55 for RW2)  first IFD offset u32
//! IFD: count u16 | count x (tag u16, type u16, n u32, value/offset u32) | next u32
//! ```

use std::collections::HashSet;

use tracing::trace;

use crate::cursor::{ByteCursor, Endianness};
use crate::error::{RawError, Result};

pub const TIFF_MAGIC: u16 = 42;
pub const RW2_MAGIC: u16 = 0x55;

/// TIFF field types this reader interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    Undefined,
    /// Any type code without a scalar accessor here.
    Other(u16),
}

impl FieldType {
    fn from_u16(code: u16) -> Self {
        match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            7 => Self::Undefined,
            other => Self::Other(other),
        }
    }

    /// Bytes per value.
    fn size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::Undefined => 1,
            Self::Short => 2,
            Self::Long => 4,
            Self::Rational => 8,
            // SSHORT, SLONG, DOUBLE and friends; only the size matters.
            Self::Other(8) => 2,
            Self::Other(9) | Self::Other(11) => 4,
            Self::Other(10) | Self::Other(12) => 8,
            Self::Other(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    /// Absolute offset of the first value.
    pub value_offset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,
}

impl Ifd {
    pub fn entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn has(&self, tag: u16) -> bool {
        self.entry(tag).is_some()
    }
}

/// Parsed TIFF structure borrowing the file buffer.
#[derive(Debug, Clone)]
pub struct Tiff<'a> {
    data: &'a [u8],
    pub order: Endianness,
    pub magic: u16,
    pub ifds: Vec<Ifd>,
}

impl<'a> Tiff<'a> {
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// First IFD in the chain that carries `tag`.
    pub fn ifd_with(&self, tag: u16) -> Option<&Ifd> {
        self.ifds.iter().find(|ifd| ifd.has(tag))
    }

    /// First entry for `tag` anywhere in the chain.
    pub fn find(&self, tag: u16) -> Option<&IfdEntry> {
        self.ifds.iter().find_map(|ifd| ifd.entry(tag))
    }

    /// Value `index` of an integer entry, widened to u32.
    pub fn value_u32(&self, entry: &IfdEntry, index: u32) -> Result<u32> {
        if index >= entry.count {
            return Err(RawError::malformed(format!(
                "tag 0x{:x} has {} values, asked for #{}",
                entry.tag, entry.count, index
            )));
        }
        let size = entry.field_type.size();
        let mut cursor = ByteCursor::new(self.data, self.order);
        cursor.seek(entry.value_offset + index as usize * size)?;
        match entry.field_type {
            FieldType::Byte | FieldType::Undefined => Ok(cursor.read_u8()? as u32),
            FieldType::Short => Ok(cursor.read_u16()? as u32),
            FieldType::Long => cursor.read_u32(),
            other => Err(RawError::unsupported(format!(
                "tag 0x{:x} of type {:?} is not an integer",
                entry.tag, other
            ))),
        }
    }

    /// First value of `tag` as u32, if present.
    pub fn get_u32(&self, tag: u16) -> Result<Option<u32>> {
        self.find(tag).map(|e| self.value_u32(e, 0)).transpose()
    }

    /// ASCII value with trailing NULs and spaces stripped.
    pub fn string(&self, entry: &IfdEntry) -> Result<String> {
        let mut cursor = ByteCursor::new(self.data, self.order);
        cursor.seek(entry.value_offset)?;
        let bytes = cursor.slice(entry.count as usize)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).trim_end().to_string())
    }
}

pub struct TiffParser;

impl TiffParser {
    /// Longest IFD chain followed.
    pub const MAX_IFDS: usize = 16;
    /// Sanity ceiling on entries per IFD.
    pub const MAX_ENTRIES: u16 = 4096;
    pub const HEADER_SIZE: usize = 8;

    /// Byte order and magic, if `buffer` starts with a TIFF header.
    pub fn header(buffer: &[u8]) -> Option<(Endianness, u16)> {
        if buffer.len() < Self::HEADER_SIZE {
            return None;
        }
        let order = match &buffer[..2] {
            b"II" => Endianness::Little,
            b"MM" => Endianness::Big,
            _ => return None,
        };
        let mut cursor = ByteCursor::new(buffer, order);
        cursor.skip(2).ok()?;
        let magic = cursor.read_u16().ok()?;
        matches!(magic, TIFF_MAGIC | RW2_MAGIC).then_some((order, magic))
    }

    pub fn parse(buffer: &[u8]) -> Result<Tiff<'_>> {
        let (order, magic) =
            Self::header(buffer).ok_or_else(|| RawError::malformed("not a TIFF structure"))?;
        let mut cursor = ByteCursor::new(buffer, order);
        cursor.seek(4)?;
        let mut next = cursor.read_u32()? as usize;

        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        while next != 0 {
            if ifds.len() == Self::MAX_IFDS {
                return Err(RawError::malformed("IFD chain too long"));
            }
            if !seen.insert(next) {
                return Err(RawError::malformed(format!(
                    "IFD chain loops back to offset {}",
                    next
                )));
            }
            let (ifd, following) = Self::parse_ifd(&mut cursor, next)?;
            trace!(offset = next, entries = ifd.entries.len(), "IFD");
            ifds.push(ifd);
            next = following;
        }
        if ifds.is_empty() {
            return Err(RawError::malformed("TIFF structure has no IFD"));
        }

        Ok(Tiff {
            data: buffer,
            order,
            magic,
            ifds,
        })
    }

    fn parse_ifd(cursor: &mut ByteCursor<'_>, offset: usize) -> Result<(Ifd, usize)> {
        cursor.seek(offset).map_err(|_| bad_offset(offset))?;
        let count = cursor.read_u16().map_err(|_| bad_offset(offset))?;
        if count > Self::MAX_ENTRIES {
            return Err(RawError::malformed(format!(
                "unreasonable number of IFD entries: {}",
                count
            )));
        }
        if !cursor.is_valid(cursor.position(), count as usize * 12 + 4) {
            return Err(RawError::malformed(format!(
                "IFD at {} with {} entries runs past the end",
                offset, count
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = cursor.read_u16()?;
            let field_type = FieldType::from_u16(cursor.read_u16()?);
            let n = cursor.read_u32()?;
            let inline_at = cursor.position();
            let raw_offset = cursor.read_u32()? as usize;

            let total = (n as usize)
                .checked_mul(field_type.size())
                .ok_or_else(|| RawError::malformed(format!("tag 0x{:x} too large", tag)))?;
            let value_offset = if total <= 4 { inline_at } else { raw_offset };
            if !cursor.is_valid(value_offset, total) {
                return Err(RawError::malformed(format!(
                    "tag 0x{:x} values at {}+{} outside the file",
                    tag, value_offset, total
                )));
            }
            entries.push(IfdEntry {
                tag,
                field_type,
                count: n,
                value_offset,
            });
        }
        let next = cursor.read_u32()? as usize;
        Ok((Ifd { entries }, next))
    }
}

fn bad_offset(offset: usize) -> RawError {
    RawError::malformed(format!("IFD offset {} outside the file", offset))
}
