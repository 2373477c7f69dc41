//! Section directory parser.
//!
//! The last 4 bytes of a container hold the offset of its directory:
//!
//! ```text
//! "SECd" | version u32 | count u32 | count x entry
//! entry: offset u32 | length u32 | tag [u8; 4]
//! ```
//!
//! Each entry points at a section that starts with its own 4-byte
//! signature. Image (`IMAG`, `IMA2`) and property (`PROP`) entries are kept;
//! everything else is skipped after its bounds have been checked.

use tracing::{debug, trace};

use crate::cursor::{ByteCursor, Endianness};
use crate::error::{RawError, Result};

use super::container::{ContainerHeader, ContainerHeaderParser, MIN_VERSION};

pub const DIRECTORY_SIGNATURE: [u8; 4] = *b"SECd";

/// Kind of a retained section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Image,
    Property,
}

impl SectionKind {
    fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"IMAG" | b"IMA2" => Some(Self::Image),
            b"PROP" => Some(Self::Property),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub tag: [u8; 4],
    pub offset: u32,
    pub length: u32,
    /// Signature found at `offset`.
    pub section_id: [u8; 4],
}

impl DirectoryEntry {
    pub fn kind(&self) -> Option<SectionKind> {
        SectionKind::from_tag(&self.tag)
    }

    /// Byte range of the section inside the container.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.offset as usize + self.length as usize
    }

    /// Tag as text, for diagnostics.
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Retained entries of a container directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub header: ContainerHeader,
    pub version: u32,
    pub entries: Vec<DirectoryEntry>,
    /// Entries skipped because their tag is not an image or property tag.
    pub ignored: usize,
}

impl Directory {
    pub fn images(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind() == Some(SectionKind::Image))
    }

    pub fn properties(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind() == Some(SectionKind::Property))
    }
}

pub struct DirectoryParser;

impl DirectoryParser {
    /// Sanity ceiling on the directory entry count.
    pub const MAX_ENTRIES: u32 = 256;
    pub const ENTRY_SIZE: usize = 12;

    pub fn parse(buffer: &[u8]) -> Result<Directory> {
        let header = ContainerHeaderParser::parse(buffer)?;
        let mut cursor = ByteCursor::new(buffer, Endianness::Little);

        let trailer = buffer.len() - 4;
        let dir_offset = cursor.peek_u32_at(trailer)? as usize;
        if !cursor.is_valid(dir_offset, 12) || dir_offset + 12 > trailer {
            return Err(RawError::malformed(format!(
                "directory offset {} outside container of {} bytes",
                dir_offset,
                buffer.len()
            )));
        }
        cursor.seek(dir_offset)?;

        if cursor.read_tag()? != DIRECTORY_SIGNATURE {
            return Err(RawError::malformed("Unable to locate directory"));
        }
        let version = cursor.read_u32()?;
        if version < MIN_VERSION {
            return Err(RawError::malformed(format!(
                "directory version 0x{:08x} too old",
                version
            )));
        }
        let count = cursor.read_u32()?;
        if count > Self::MAX_ENTRIES {
            return Err(RawError::malformed(format!(
                "unreasonable number of directory entries: {}",
                count
            )));
        }
        let table_len = count as usize * Self::ENTRY_SIZE;
        if !cursor.is_valid(cursor.position(), table_len) {
            return Err(RawError::malformed(format!(
                "{} directory entries do not fit the container",
                count
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut ignored = 0;
        for index in 0..count {
            let entry = Self::parse_entry(&mut cursor)?;
            match entry.kind() {
                Some(kind) => {
                    debug!(index, ?kind, offset = entry.offset, length = entry.length, "section");
                    entries.push(entry);
                }
                None => {
                    trace!(index, tag = %entry.tag_str(), "ignoring section");
                    ignored += 1;
                }
            }
        }

        Ok(Directory {
            header,
            version,
            entries,
            ignored,
        })
    }

    /// Read one entry and the signature it points at, leaving the cursor
    /// after the entry.
    fn parse_entry(cursor: &mut ByteCursor<'_>) -> Result<DirectoryEntry> {
        let offset = cursor.read_u32()?;
        let length = cursor.read_u32()?;
        let tag = cursor.read_tag()?;

        if !cursor.is_valid(offset as usize, length as usize) {
            return Err(RawError::malformed(format!(
                "section {} at {}+{} outside container of {} bytes",
                String::from_utf8_lossy(&tag),
                offset,
                length,
                cursor.len()
            )));
        }
        if length < 4 {
            return Err(RawError::malformed(format!(
                "section {} too short for a signature",
                String::from_utf8_lossy(&tag)
            )));
        }

        let resume = cursor.position();
        cursor.seek(offset as usize)?;
        let section_id = cursor.read_tag()?;
        cursor.seek(resume)?;

        Ok(DirectoryEntry {
            tag,
            offset,
            length,
            section_id,
        })
    }
}
