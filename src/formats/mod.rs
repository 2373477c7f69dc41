//! RAW container detection and signatures.

use crate::parsing::tiff::{TiffParser, RW2_MAGIC, TIFF_MAGIC};

/// Container family recognized from the first bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// Chunked section container (`FOVb`).
    Chunked,
    /// Panasonic RW2: TIFF structure with magic 0x55.
    Rw2,
    /// Plain TIFF structure; the vendor is decided from its tags.
    Tiff,
}

impl Signature {
    pub const CHUNKED: &[u8; 4] = b"FOVb";
    pub const RW2: &[u8; 4] = b"IIU\0";

    /// Bytes needed to tell the families apart.
    pub const SIGNATURE_SIZE: usize = 8;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(Self::CHUNKED) {
            return Some(Self::Chunked);
        }
        match TiffParser::header(data) {
            Some((_, RW2_MAGIC)) => Some(Self::Rw2),
            Some((_, TIFF_MAGIC)) => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chunked => "chunked container",
            Self::Rw2 => "RW2",
            Self::Tiff => "TIFF",
        }
    }
}
