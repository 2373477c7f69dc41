//! Image section header parser.
//!
//! ```text
//! "SECi" | version | type | format | width | height | pitch | payload...
//! ```
//!
//! All fields are u32 LE. `pitch` is the byte distance between rows; a
//! pitch equal to the whole payload size carries no row information and is
//! normalized to 0.

use crate::cursor::{ByteCursor, Endianness};
use crate::error::{RawError, Result};

use super::container::MIN_VERSION;
use super::directory::DirectoryEntry;

pub const IMAGE_SIGNATURE: [u8; 4] = *b"SECi";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSection {
    pub version: u32,
    /// Image type (raw, preview, thumbnail). Kept as stored.
    pub image_type: u32,
    /// Payload encoding code.
    pub format: u32,
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes, 0 when rows are not padded.
    pub pitch: u32,
    /// Absolute offset of the payload in the container.
    pub data_offset: usize,
    pub data_size: usize,
}

impl ImageSection {
    pub fn payload<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.data_offset..self.data_offset + self.data_size]
    }
}

pub struct ImageSectionParser;

impl ImageSectionParser {
    pub const HEADER_SIZE: usize = 28;

    /// Parse the image section `entry` of `buffer`. The entry's range must
    /// already be validated against the buffer.
    pub fn parse(buffer: &[u8], entry: &DirectoryEntry) -> Result<ImageSection> {
        let mut cursor = ByteCursor::sub(
            buffer,
            entry.offset as usize,
            entry.length as usize,
            Endianness::Little,
        )?;
        if cursor.len() < Self::HEADER_SIZE {
            return Err(RawError::malformed(format!(
                "image section of {} bytes has no room for its header",
                cursor.len()
            )));
        }
        if cursor.read_tag()? != IMAGE_SIGNATURE {
            return Err(RawError::malformed("Unknown image signature"));
        }
        let version = cursor.read_u32()?;
        if version < MIN_VERSION {
            return Err(RawError::malformed(format!(
                "image section version 0x{:08x} too old",
                version
            )));
        }
        let image_type = cursor.read_u32()?;
        let format = cursor.read_u32()?;
        let width = cursor.read_u32()?;
        let height = cursor.read_u32()?;
        let mut pitch = cursor.read_u32()?;

        let data_size = cursor.remaining();
        if pitch as usize == data_size {
            pitch = 0;
        }

        Ok(ImageSection {
            version,
            image_type,
            format,
            width,
            height,
            pitch,
            data_offset: entry.offset as usize + cursor.position(),
            data_size,
        })
    }
}
