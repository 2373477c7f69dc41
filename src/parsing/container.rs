//! Container header parser.
//!
//! The vendor directory container starts with:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "FOVb" (0x62564f46 LE)
//! 4       4     version, >= 0x00020000
//! 8       16    file identifier
//! 24      4     mark bits
//! ```
//!
//! The directory pointer lives in the last 4 bytes of the file, so the
//! whole buffer is needed to validate a container.

use crate::cursor::{ByteCursor, Endianness};
use crate::error::{RawError, Result};

/// Container magic, "FOVb" read as a little-endian u32.
pub const CONTAINER_MAGIC: u32 = 0x6256_4f46;

/// Oldest header, directory and section version understood.
pub const MIN_VERSION: u32 = 0x0002_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u32,
    pub identifier: [u8; 16],
    pub mark_bits: u32,
}

impl ContainerHeader {
    pub fn major_version(&self) -> u16 {
        (self.version >> 16) as u16
    }

    pub fn minor_version(&self) -> u16 {
        self.version as u16
    }
}

pub struct ContainerHeaderParser;

impl ContainerHeaderParser {
    /// Smallest buffer that can hold a header, one section and the
    /// directory trailer.
    pub const MIN_FILE_SIZE: usize = 104 + 128;
    pub const HEADER_SIZE: usize = 28;

    pub fn parse(buffer: &[u8]) -> Result<ContainerHeader> {
        if buffer.len() < Self::MIN_FILE_SIZE {
            return Err(RawError::malformed(format!(
                "container too small: {} bytes, need at least {}",
                buffer.len(),
                Self::MIN_FILE_SIZE
            )));
        }

        let mut cursor = ByteCursor::new(buffer, Endianness::Little);
        if cursor.read_u32()? != CONTAINER_MAGIC {
            return Err(RawError::malformed("bad container signature"));
        }
        let version = cursor.read_u32()?;
        if version < MIN_VERSION {
            return Err(RawError::malformed(format!(
                "container version 0x{:08x} too old",
                version
            )));
        }
        let mut identifier = [0u8; 16];
        identifier.copy_from_slice(cursor.slice(16)?);
        let mark_bits = cursor.read_u32()?;

        Ok(ContainerHeader {
            version,
            identifier,
            mark_bits,
        })
    }

    /// Whether `buffer` starts with the container magic.
    pub fn is_container(buffer: &[u8]) -> bool {
        buffer.len() >= 4 && buffer[..4] == CONTAINER_MAGIC.to_le_bytes()
    }
}
