//! Panasonic RW2 pipeline.
//!
//! The raw IFD is the one carrying the Panasonic strip offset (tag 0x118).
//! Older files only have a standard strip offset (0x111); their payload
//! size then decides the layout:
//!
//! | Payload bytes | Layout |
//! |---------------|--------|
//! | >= w*h*2 | 12-bit samples in 16-bit LE words |
//! | >= w*h*3/2 | 12-bit LE pairs with control bytes |
//! | less | compressed blocks, load flags 0 |
//!
//! Newer files are always compressed with load flags 0x2008.

use tracing::debug;

use crate::decompress::SliceScheduler;
use crate::error::{RawError, Result};
use crate::image::{CfaColor, DecodeReport, OutputPlane, RawMetadata};
use crate::options::DecodeOptions;
use crate::parsing::{Ifd, Tiff, TiffParser};

use super::panasonic::{PanasonicDecoder, LOAD_FLAGS};
use super::uncompressed::{decode_12bit_le_skip, decode_u16_le, row_bytes_12bit_le_skip};
use super::{check_payload_budget, MAX_DIMENSION};

const TAG_WIDTH: u16 = 0x2;
const TAG_HEIGHT: u16 = 0x3;
const TAG_WB_RED_OLD: u16 = 0x11;
const TAG_WB_BLUE_OLD: u16 = 0x12;
const TAG_BLACK_RED: u16 = 0x1c;
const TAG_BLACK_GREEN: u16 = 0x1d;
const TAG_BLACK_BLUE: u16 = 0x1e;
const TAG_WB_RED: u16 = 0x24;
const TAG_WB_GREEN: u16 = 0x25;
const TAG_WB_BLUE: u16 = 0x26;
const TAG_MAKE: u16 = 0x10f;
const TAG_MODEL: u16 = 0x110;
const TAG_STRIP_OFFSETS: u16 = 0x111;
const TAG_PANASONIC_STRIP_OFFSET: u16 = 0x118;

/// Panasonic sensors use a BGGR mosaic.
const CFA: [CfaColor; 4] = [CfaColor::Blue, CfaColor::Green, CfaColor::Green, CfaColor::Red];

/// Sample encoding of the raw strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rw2Encoding {
    Compressed { load_flags: u32 },
    Unpacked12,
    Packed12,
}

/// Raw IFD of an RW2 file, resolved to geometry and encoding.
#[derive(Debug, Clone)]
pub struct Rw2Layout {
    pub width: usize,
    pub height: usize,
    pub data_offset: usize,
    pub encoding: Rw2Encoding,
    pub metadata: RawMetadata,
}

impl Rw2Layout {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let tiff = TiffParser::parse(buffer)?;
        let (strip_tag, new_style) = if tiff.find(TAG_PANASONIC_STRIP_OFFSET).is_some() {
            (TAG_PANASONIC_STRIP_OFFSET, true)
        } else {
            (TAG_STRIP_OFFSETS, false)
        };
        let raw = tiff
            .ifd_with(strip_tag)
            .ok_or_else(|| RawError::malformed("no raw IFD with a strip offset"))?;

        let tag_u32 = |tag: u16| -> Result<u32> {
            let entry = raw
                .entry(tag)
                .ok_or_else(|| RawError::malformed(format!("raw IFD lacks tag 0x{:x}", tag)))?;
            tiff.value_u32(entry, 0)
        };
        let width = tag_u32(TAG_WIDTH)?;
        let height = tag_u32(TAG_HEIGHT)?;
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(RawError::malformed(format!(
                "unreasonable image dimensions {}x{}",
                width, height
            )));
        }
        let (width, height) = (width as usize, height as usize);

        let offsets = raw
            .entry(strip_tag)
            .ok_or_else(|| RawError::malformed("strip offset tag vanished"))?;
        if offsets.count != 1 {
            return Err(RawError::unsupported(format!(
                "multiple strips found: {}",
                offsets.count
            )));
        }
        let data_offset = tiff.value_u32(offsets, 0)? as usize;
        if data_offset >= buffer.len() {
            return Err(RawError::malformed(format!(
                "image data offset {} outside file of {} bytes",
                data_offset,
                buffer.len()
            )));
        }
        check_payload_budget(width, height, buffer.len() - data_offset)?;

        let encoding = if new_style {
            Rw2Encoding::Compressed {
                load_flags: LOAD_FLAGS,
            }
        } else {
            let size = buffer.len() - data_offset;
            if size >= width * height * 2 {
                Rw2Encoding::Unpacked12
            } else if size >= width * height * 3 / 2 {
                Rw2Encoding::Packed12
            } else {
                Rw2Encoding::Compressed { load_flags: 0 }
            }
        };
        if let Rw2Encoding::Compressed { .. } = encoding {
            PanasonicDecoder::check_width(width)?;
        }
        if encoding == Rw2Encoding::Packed12 && width % 2 != 0 {
            return Err(RawError::unsupported("packed 12-bit layout with odd width"));
        }
        debug!(width, height, data_offset, ?encoding, "RW2 layout");

        let metadata = read_metadata(&tiff, raw, width, height)?;
        Ok(Self {
            width,
            height,
            data_offset,
            encoding,
            metadata,
        })
    }

    pub fn scheduler(&self, options: &DecodeOptions) -> Result<SliceScheduler> {
        let (width, height) = (self.width, self.height);
        let stride = match self.encoding {
            Rw2Encoding::Compressed { .. } => PanasonicDecoder::row_offset(width, 1),
            Rw2Encoding::Unpacked12 => width * 2,
            Rw2Encoding::Packed12 => row_bytes_12bit_le_skip(width),
        };
        SliceScheduler::horizontal_bands(width, height, options.band_rows(height), |y, n| {
            (y * stride, n * stride)
        })
    }

    pub fn decode_into(
        &self,
        buffer: &[u8],
        plane: &mut OutputPlane<u16>,
        options: &DecodeOptions,
    ) -> Result<DecodeReport> {
        let payload = &buffer[self.data_offset..];
        let scheduler = self.scheduler(options)?;
        match self.encoding {
            Rw2Encoding::Compressed { load_flags } => {
                let decoder = PanasonicDecoder::new(load_flags, options.zero_is_bad);
                scheduler.run(payload, plane, options, |slice, window, ctx| {
                    decoder.decode_slice(slice, window, ctx)
                })
            }
            Rw2Encoding::Unpacked12 => scheduler.run(payload, plane, options, |_, window, ctx| {
                let src = ctx.source()?;
                if decode_u16_le(src, 12, window, ctx.policy())? {
                    ctx.mark_truncated();
                }
                Ok(())
            }),
            Rw2Encoding::Packed12 => scheduler.run(payload, plane, options, |_, window, ctx| {
                let src = ctx.source()?;
                if decode_12bit_le_skip(src, window, ctx.policy())? {
                    ctx.mark_truncated();
                }
                Ok(())
            }),
        }
    }
}

fn read_metadata(
    tiff: &Tiff<'_>,
    raw: &Ifd,
    width: usize,
    height: usize,
) -> Result<RawMetadata> {
    let value = |tag: u16| -> Result<Option<u32>> {
        raw.entry(tag).map(|e| tiff.value_u32(e, 0)).transpose()
    };
    let text = |tag: u16| -> Result<Option<String>> {
        tiff.find(tag).map(|e| tiff.string(e)).transpose()
    };

    let black_levels = match (
        value(TAG_BLACK_RED)?,
        value(TAG_BLACK_GREEN)?,
        value(TAG_BLACK_BLUE)?,
    ) {
        (Some(r), Some(g), Some(b)) => {
            let level = |v: u32| v.saturating_add(15).min(u16::MAX as u32) as u16;
            let (r, g, b) = (level(r), level(g), level(b));
            Some(CFA.map(|c| match c {
                CfaColor::Red => r,
                CfaColor::Green => g,
                CfaColor::Blue => b,
            }))
        }
        _ => None,
    };

    let wb_coeffs = match (value(TAG_WB_RED)?, value(TAG_WB_GREEN)?, value(TAG_WB_BLUE)?) {
        (Some(r), Some(g), Some(b)) => Some([r as f32, g as f32, b as f32]),
        _ => match (value(TAG_WB_RED_OLD)?, value(TAG_WB_BLUE_OLD)?) {
            (Some(r), Some(b)) => Some([r as f32, 256.0, b as f32]),
            _ => None,
        },
    };

    Ok(RawMetadata {
        width,
        height,
        make: text(TAG_MAKE)?,
        model: text(TAG_MODEL)?,
        cfa: Some(CFA),
        black_levels,
        wb_coeffs,
        properties: Default::default(),
    })
}
