//! Chunked section container pipeline.
//!
//! directory → properties → first decodable image section → slices →
//! scheduler.
//!
//! Image section format codes:
//!
//! | Code | Payload |
//! |------|---------|
//! | 8 | 8-bit samples |
//! | 12 | 12-bit samples, MSB-first packing |
//! | 16 | 16-bit little-endian samples |
//! | 30 | two-pixel Huffman differential stream in independent slices |
//!
//! Fixed-width rows are `pitch` bytes apart, or back to back when the
//! pitch is 0. A format 30 payload starts with its own slice table:
//!
//! ```text
//! counts [u8; 16] | symbols | base_offset i32 | rows_per_slice u32
//! slice_count u32 | slice_count x length u32 | slice bitstreams...
//! ```

use tracing::{debug, warn};

use crate::cursor::{ByteCursor, Endianness};
use crate::decompress::{HuffmanTable, Slice, SliceScheduler};
use crate::error::{RawError, Result};
use crate::image::{DecodeReport, OutputPlane, RawMetadata};
use crate::options::DecodeOptions;
use crate::parsing::{
    Directory, DirectoryEntry, DirectoryParser, ImageSection, ImageSectionParser, Properties, PropertyParser,
};

use super::hasselblad::PairDifferenceDecoder;
use super::uncompressed::{PackOrder, PackedRows};
use super::{check_payload_budget, MAX_DIMENSION};

pub const FORMAT_8BIT: u32 = 8;
pub const FORMAT_12BIT_PACKED: u32 = 12;
pub const FORMAT_16BIT: u32 = 16;
pub const FORMAT_PAIR_HUFFMAN: u32 = 30;

/// How the selected image section's payload is encoded.
#[derive(Clone)]
pub enum SectionEncoding {
    Packed(PackedRows),
    PairHuffman {
        decoder: PairDifferenceDecoder,
        rows_per_slice: usize,
        /// `(offset, length)` of each slice, relative to the payload.
        slices: Vec<(usize, usize)>,
    },
}

impl SectionEncoding {
    fn from_section(image: &ImageSection, payload: &[u8]) -> Result<Option<Self>> {
        let pitch = image.pitch as usize;
        let packed = match image.format {
            FORMAT_8BIT => PackedRows::new(8, PackOrder::Msb, pitch)?,
            FORMAT_12BIT_PACKED => PackedRows::new(12, PackOrder::Msb, pitch)?,
            FORMAT_16BIT => PackedRows::new(16, PackOrder::Lsb, pitch)?,
            FORMAT_PAIR_HUFFMAN => return Self::parse_pair_huffman(image, payload).map(Some),
            _ => return Ok(None),
        };
        Ok(Some(Self::Packed(packed)))
    }

    fn parse_pair_huffman(image: &ImageSection, payload: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(payload, Endianness::Little);
        let table = HuffmanTable::parse(&mut cursor)?;
        let base_offset = cursor.read_u32().map_err(|_| truncated_table())? as i32;
        let rows_per_slice = cursor.read_u32().map_err(|_| truncated_table())? as usize;
        let slice_count = cursor.read_u32().map_err(|_| truncated_table())? as usize;

        let height = image.height as usize;
        if rows_per_slice == 0 || slice_count != height.div_ceil(rows_per_slice) {
            return Err(RawError::malformed(format!(
                "{} slices of {} rows do not cover {} rows",
                slice_count, rows_per_slice, height
            )));
        }
        if !cursor.is_valid(cursor.position(), slice_count.saturating_mul(4)) {
            return Err(truncated_table());
        }

        let mut lengths = Vec::with_capacity(slice_count);
        for _ in 0..slice_count {
            lengths.push(cursor.read_u32()? as usize);
        }
        let mut offset = cursor.position();
        let mut slices = Vec::with_capacity(slice_count);
        for len in lengths {
            slices.push((offset, len));
            offset = offset
                .checked_add(len)
                .ok_or_else(|| RawError::malformed("slice lengths overflow"))?;
        }

        Ok(Self::PairHuffman {
            decoder: PairDifferenceDecoder::new(table, base_offset),
            rows_per_slice,
            slices,
        })
    }
}

fn truncated_table() -> RawError {
    RawError::malformed("slice table runs past the image payload")
}

/// Parsed layout of a chunked container.
#[derive(Clone)]
pub struct ChunkedLayout {
    pub directory: Directory,
    pub image: ImageSection,
    pub properties: Properties,
    pub encoding: SectionEncoding,
}

impl ChunkedLayout {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let directory = DirectoryParser::parse(buffer)?;

        let mut properties = Properties::default();
        for entry in directory.properties() {
            properties.merge(PropertyParser::parse(buffer, entry)?);
        }

        let images: Vec<DirectoryEntry> = directory.images().copied().collect();
        let mut seen_formats = Vec::new();
        for entry in &images {
            let image = ImageSectionParser::parse(buffer, entry)?;
            let encoding = match SectionEncoding::from_section(&image, image.payload(buffer))? {
                Some(encoding) => encoding,
                None => {
                    debug!(format = image.format, "skipping image section");
                    seen_formats.push(image.format);
                    continue;
                }
            };
            check_dimensions(image.width, image.height)?;
            check_payload_budget(image.width as usize, image.height as usize, image.data_size)?;
            debug!(
                format = image.format,
                width = image.width,
                height = image.height,
                payload = image.data_size,
                "image section"
            );
            return Ok(Self {
                directory,
                image,
                properties,
                encoding,
            });
        }

        if seen_formats.is_empty() {
            Err(RawError::malformed("container has no image section"))
        } else {
            Err(RawError::unsupported(format!(
                "no decodable image section, formats {:?}",
                seen_formats
            )))
        }
    }

    pub fn width(&self) -> usize {
        self.image.width as usize
    }

    pub fn height(&self) -> usize {
        self.image.height as usize
    }

    pub fn metadata(&self) -> RawMetadata {
        RawMetadata {
            width: self.width(),
            height: self.height(),
            make: self.properties.get("CAMMANUF").map(str::to_string),
            model: self.properties.get("CAMMODEL").map(str::to_string),
            properties: self.properties.clone().into_map(),
            ..RawMetadata::default()
        }
    }

    /// Slice plan for the payload.
    pub fn scheduler(&self, options: &DecodeOptions) -> Result<SliceScheduler> {
        let (width, height) = (self.width(), self.height());
        match &self.encoding {
            SectionEncoding::Packed(rows) => match rows.row_stride(width) {
                Some(stride) => {
                    SliceScheduler::horizontal_bands(width, height, options.band_rows(height), |y, n| {
                        (y * stride, n * stride)
                    })
                }
                None => {
                    // Rows not byte aligned: one slice for the whole image.
                    let bytes = (width * height * rows.bits as usize).div_ceil(8);
                    SliceScheduler::horizontal_bands(width, height, height, |_, _| (0, bytes))
                }
            },
            SectionEncoding::PairHuffman {
                rows_per_slice,
                slices,
                ..
            } => {
                let plan = slices
                    .iter()
                    .enumerate()
                    .map(|(i, &(offset, len))| {
                        let dest_y = i * rows_per_slice;
                        Slice {
                            source_byte_offset: offset,
                            source_byte_count: len,
                            dest_x: 0,
                            dest_y,
                            width,
                            height: (*rows_per_slice).min(height - dest_y),
                        }
                    })
                    .collect();
                SliceScheduler::new(width, height, plan)
            }
        }
    }

    pub fn decode_into(
        &self,
        buffer: &[u8],
        plane: &mut OutputPlane<u16>,
        options: &DecodeOptions,
    ) -> Result<DecodeReport> {
        let payload = self.image.payload(buffer);
        let scheduler = self.scheduler(options)?;
        let report = match &self.encoding {
            SectionEncoding::Packed(rows) => scheduler.run(payload, plane, options, |_, window, ctx| {
                let src = ctx.source()?;
                if rows.decode(src, window, ctx.policy())? {
                    ctx.mark_truncated();
                }
                Ok(())
            })?,
            SectionEncoding::PairHuffman { decoder, .. } => {
                scheduler.run(payload, plane, options, |_, window, ctx| {
                    let src = ctx.source()?;
                    if decoder.decode(src, window, ctx.policy())? {
                        ctx.mark_truncated();
                    }
                    Ok(())
                })?
            }
        };
        if report.truncated_slices > 0 {
            warn!(
                format = self.image.format,
                payload = payload.len(),
                "image payload shorter than its layout"
            );
        }
        Ok(report)
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RawError::malformed(format!(
            "unreasonable image dimensions {}x{}",
            width, height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::test_util::{image_body, ContainerBuilder};

    fn layout(format: u32, width: u32, height: u32, payload: &[u8]) -> ChunkedLayout {
        let data = ContainerBuilder::new()
            .section(b"IMAG", &image_body(format, width, height, 0, payload))
            .build();
        ChunkedLayout::parse(&data).unwrap()
    }

    #[test]
    fn test_byte_aligned_rows_are_banded() {
        let layout = layout(FORMAT_12BIT_PACKED, 4, 8, &[0; 48]);
        let opts = DecodeOptions::default().with_rows_per_slice(3);
        let sched = layout.scheduler(&opts).unwrap();
        let ranges: Vec<_> = sched
            .slices()
            .iter()
            .map(|s| (s.source_byte_offset, s.source_byte_count))
            .collect();
        assert_eq!(ranges, vec![(0, 18), (18, 18), (36, 12)]);
    }

    #[test]
    fn test_unaligned_rows_use_one_slice() {
        // 3 samples of 12 bits leave every other row mid-byte.
        let layout = layout(FORMAT_12BIT_PACKED, 3, 4, &[0; 18]);
        let sched = layout
            .scheduler(&DecodeOptions::default().with_rows_per_slice(1))
            .unwrap();
        assert_eq!(sched.slices().len(), 1);
        assert_eq!(sched.slices()[0].source_byte_count, 18);
    }

    #[test]
    fn test_metadata_without_properties() {
        let meta = layout(FORMAT_8BIT, 2, 2, &[0; 4]).metadata();
        assert_eq!((meta.width, meta.height), (2, 2));
        assert!(meta.make.is_none());
        assert!(meta.properties.is_empty());
    }
}
