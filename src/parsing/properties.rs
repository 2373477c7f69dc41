//! Property section parser.
//!
//! ```text
//! "SECp" | version | count | encoding (0) | reserved u32 | size u32
//! count x (key_offset u32, value_offset u32)
//! text pool: NUL-terminated UTF-16LE strings
//! ```
//!
//! Offsets count UTF-16 code units from the start of the text pool. Strings
//! are converted to UTF-8; surrogate pairs are joined and lone surrogates
//! become U+FFFD.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cursor::{ByteCursor, Endianness};
use crate::error::{RawError, Result};

use super::container::MIN_VERSION;
use super::directory::DirectoryEntry;

pub const PROPERTY_SIGNATURE: [u8; 4] = *b"SECp";

/// Key/value text stored in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    map: BTreeMap<String, String>,
}

impl Properties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add every pair of `other`, replacing existing keys.
    pub fn merge(&mut self, other: Properties) {
        self.map.extend(other.map);
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.map
    }
}

pub struct PropertyParser;

impl PropertyParser {
    /// Sanity ceiling on the pair count.
    pub const MAX_ENTRIES: u32 = 1000;
    pub const HEADER_SIZE: usize = 24;

    /// Read the pairs of one property section. A key or value offset that
    /// does not resolve inside the section fails the whole section with
    /// `MalformedContainer` instead of dropping that one pair.
    pub fn parse(buffer: &[u8], entry: &DirectoryEntry) -> Result<Properties> {
        let mut cursor = ByteCursor::sub(
            buffer,
            entry.offset as usize,
            entry.length as usize,
            Endianness::Little,
        )?;
        if cursor.len() < 12 || cursor.read_tag()? != PROPERTY_SIGNATURE {
            return Err(RawError::malformed("Unknown property signature"));
        }
        let version = cursor.read_u32()?;
        if version < MIN_VERSION {
            return Err(RawError::malformed(format!(
                "property section version 0x{:08x} too old",
                version
            )));
        }
        let count = cursor.read_u32()?;
        if count == 0 {
            return Ok(Properties::default());
        }

        let encoding = cursor.read_u32().map_err(|_| truncated_header())?;
        if encoding != 0 {
            return Err(RawError::malformed(format!(
                "unknown property character encoding {}",
                encoding
            )));
        }
        // Reserved word and pool size; the pool is bounded by the section.
        cursor.skip(8).map_err(|_| truncated_header())?;

        if count > Self::MAX_ENTRIES {
            return Err(RawError::malformed(format!(
                "unreasonable number of properties: {}",
                count
            )));
        }
        let table_len = count as usize * 8;
        if !cursor.is_valid(cursor.position(), table_len) {
            return Err(RawError::malformed(format!(
                "{} property pairs do not fit the section",
                count
            )));
        }
        let pool_start = cursor.position() + table_len;

        let mut properties = Properties::default();
        for _ in 0..count {
            let key_offset = cursor.read_u32()?;
            let value_offset = cursor.read_u32()?;
            let key = read_text(&cursor, pool_start, key_offset)?;
            let value = read_text(&cursor, pool_start, value_offset)?;
            properties.map.insert(key, value);
        }
        debug!(count = properties.len(), "properties");
        Ok(properties)
    }
}

fn truncated_header() -> RawError {
    RawError::malformed("property section header truncated")
}

/// The NUL-terminated string `unit_offset` code units into the pool. A
/// string that runs to the end of the section without a terminator reads
/// as empty.
fn read_text(section: &ByteCursor<'_>, pool_start: usize, unit_offset: u32) -> Result<String> {
    let start = (unit_offset as usize)
        .checked_mul(2)
        .and_then(|o| o.checked_add(pool_start));
    let start = match start {
        Some(start) if section.is_valid(start, 2) => start,
        _ => {
            return Err(RawError::malformed(format!(
                "property text offset {} outside the section",
                unit_offset
            )))
        }
    };

    let mut text = section.clone();
    text.seek(start)?;
    let bytes = text.remaining_slice();
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&u| u != 0)
        .collect();
    if units.len() == bytes.len() / 2 {
        return Ok(String::new());
    }

    Ok(char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}
