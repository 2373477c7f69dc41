//! Container builders for tests.

use super::container::ContainerHeaderParser;
use super::directory::DIRECTORY_SIGNATURE;
use super::image_section::IMAGE_SIGNATURE;
use super::properties::PROPERTY_SIGNATURE;

/// Builds containers: header, sections, directory, trailer.
pub struct ContainerBuilder {
    buf: Vec<u8>,
    entries: Vec<(u32, u32, [u8; 4])>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"FOVb");
        buf.extend_from_slice(&0x0002_0002u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf.extend_from_slice(&[0u8; 4]);
        Self {
            buf,
            entries: Vec::new(),
        }
    }

    /// Append a section body (signature included) under `tag`.
    pub fn section(mut self, tag: &[u8; 4], body: &[u8]) -> Self {
        let offset = self.buf.len() as u32;
        self.buf.extend_from_slice(body);
        self.entries.push((offset, body.len() as u32, *tag));
        self
    }

    /// Add a raw entry without a body.
    pub fn entry(mut self, offset: u32, length: u32, tag: &[u8; 4]) -> Self {
        self.entries.push((offset, length, *tag));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        // Keep small test containers above the minimum size.
        if self.buf.len() < ContainerHeaderParser::MIN_FILE_SIZE {
            self.buf.resize(ContainerHeaderParser::MIN_FILE_SIZE, 0);
        }
        let dir = self.buf.len() as u32;
        self.buf.extend_from_slice(&DIRECTORY_SIGNATURE);
        self.buf.extend_from_slice(&0x0002_0000u32.to_le_bytes());
        self.buf
            .extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (offset, length, tag) in &self.entries {
            self.buf.extend_from_slice(&offset.to_le_bytes());
            self.buf.extend_from_slice(&length.to_le_bytes());
            self.buf.extend_from_slice(tag);
        }
        self.buf.extend_from_slice(&dir.to_le_bytes());
        self.buf
    }
}

/// `SECi` section body.
pub fn image_body(format: u32, width: u32, height: u32, pitch: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = IMAGE_SIGNATURE.to_vec();
    for v in [0x0002_0000, 2, format, width, height, pitch] {
        body.extend_from_slice(&u32::to_le_bytes(v));
    }
    body.extend_from_slice(payload);
    body
}

/// `SECp` section body from raw UTF-16 key/value units, NUL terminators
/// added.
pub fn property_body_utf16(pairs: &[(Vec<u16>, Vec<u16>)]) -> Vec<u8> {
    let mut pool: Vec<u16> = Vec::new();
    let mut table = Vec::new();
    for (key, value) in pairs {
        table.push(pool.len() as u32);
        pool.extend_from_slice(key);
        pool.push(0);
        table.push(pool.len() as u32);
        pool.extend_from_slice(value);
        pool.push(0);
    }

    let mut body = PROPERTY_SIGNATURE.to_vec();
    for v in [0x0002_0000, pairs.len() as u32, 0, 0, pool.len() as u32] {
        body.extend_from_slice(&u32::to_le_bytes(v));
    }
    for v in table {
        body.extend_from_slice(&v.to_le_bytes());
    }
    for unit in pool {
        body.extend_from_slice(&unit.to_le_bytes());
    }
    body
}

/// `SECp` section body from text pairs.
pub fn property_body(pairs: &[(&str, &str)]) -> Vec<u8> {
    let units: Vec<(Vec<u16>, Vec<u16>)> = pairs
        .iter()
        .map(|(k, v)| (k.encode_utf16().collect(), v.encode_utf16().collect()))
        .collect();
    property_body_utf16(&units)
}

enum TiffValue {
    Short(u16),
    Long(u32),
    Ascii(Vec<u8>),
    Strip,
}

/// Builds a little-endian TIFF file with a single IFD.
pub struct TiffBuilder {
    magic: u16,
    entries: Vec<(u16, TiffValue)>,
    payload: Vec<u8>,
}

impl TiffBuilder {
    pub fn new(magic: u16) -> Self {
        Self {
            magic,
            entries: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn short(mut self, tag: u16, value: u16) -> Self {
        self.entries.push((tag, TiffValue::Short(value)));
        self
    }

    pub fn long(mut self, tag: u16, value: u32) -> Self {
        self.entries.push((tag, TiffValue::Long(value)));
        self
    }

    pub fn ascii(mut self, tag: u16, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.entries.push((tag, TiffValue::Ascii(bytes)));
        self
    }

    /// LONG `tag` pointing at `payload`, which is placed at the end of the
    /// file.
    pub fn strip(mut self, tag: u16, payload: &[u8]) -> Self {
        self.entries.push((tag, TiffValue::Strip));
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let ifd_len = 2 + 12 * self.entries.len() + 4;
        let mut extra_at = 8 + ifd_len;
        let extra_len: usize = self
            .entries
            .iter()
            .map(|(_, v)| match v {
                TiffValue::Ascii(b) if b.len() > 4 => b.len(),
                _ => 0,
            })
            .sum();
        let payload_at = (extra_at + extra_len) as u32;

        let mut out = vec![b'I', b'I'];
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        let mut extra = Vec::new();
        for (tag, value) in &self.entries {
            out.extend_from_slice(&tag.to_le_bytes());
            match value {
                TiffValue::Short(v) => {
                    out.extend_from_slice(&3u16.to_le_bytes());
                    out.extend_from_slice(&1u32.to_le_bytes());
                    out.extend_from_slice(&v.to_le_bytes());
                    out.extend_from_slice(&[0, 0]);
                }
                TiffValue::Long(v) => {
                    out.extend_from_slice(&4u16.to_le_bytes());
                    out.extend_from_slice(&1u32.to_le_bytes());
                    out.extend_from_slice(&v.to_le_bytes());
                }
                TiffValue::Strip => {
                    out.extend_from_slice(&4u16.to_le_bytes());
                    out.extend_from_slice(&1u32.to_le_bytes());
                    out.extend_from_slice(&payload_at.to_le_bytes());
                }
                TiffValue::Ascii(bytes) => {
                    out.extend_from_slice(&2u16.to_le_bytes());
                    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                    if bytes.len() <= 4 {
                        let mut inline = [0u8; 4];
                        inline[..bytes.len()].copy_from_slice(bytes);
                        out.extend_from_slice(&inline);
                    } else {
                        out.extend_from_slice(&(extra_at as u32).to_le_bytes());
                        extra.extend_from_slice(bytes);
                        extra_at += bytes.len();
                    }
                }
            }
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&extra);
        out.extend_from_slice(&self.payload);
        out
    }
}
