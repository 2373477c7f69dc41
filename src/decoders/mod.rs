//! Format decoders.
//!
//! [`RawDecoder`] sniffs the container family, parses its structure once
//! and then fills caller-owned planes through the slice scheduler.
//!
//! ```text
//! bytes ─► Signature ─┬─► ChunkedLayout ──┐
//!                     └─► Rw2Layout ──────┴─► SliceScheduler ─► OutputPlane
//! ```
//!
//! Plain TIFF files are routed to the RW2 pipeline only when their make
//! names a Panasonic or Leica body.

pub mod chunked;
pub mod hasselblad;
pub mod panasonic;
pub mod rw2;
pub mod uncompressed;

use std::time::Instant;

use tracing::{debug, info};

use crate::error::{RawError, Result};
use crate::formats::Signature;
use crate::image::{DecodeReport, OutputPlane, RawImage, RawMetadata};
use crate::options::DecodeOptions;
use crate::parsing::TiffParser;

pub use chunked::{ChunkedLayout, SectionEncoding};
pub use hasselblad::PairDifferenceDecoder;
pub use panasonic::PanasonicDecoder;
pub use rw2::{Rw2Encoding, Rw2Layout};
pub use uncompressed::{PackOrder, PackedRows};

/// Largest width or height accepted from any container.
pub const MAX_DIMENSION: u32 = 65535;

/// Reject geometry that the payload cannot back with one bit per pixel,
/// the densest any supported encoding gets. Runs before the plane is
/// allocated, so a small file cannot declare a multi-gigabyte image.
pub(crate) fn check_payload_budget(width: usize, height: usize, payload_len: usize) -> Result<()> {
    let pixels = width.saturating_mul(height);
    if pixels > payload_len.saturating_mul(8) {
        return Err(RawError::malformed(format!(
            "{}x{} image cannot fit in a {} byte payload",
            width, height, payload_len
        )));
    }
    Ok(())
}

/// Makes whose plain TIFF files carry the Panasonic raw IFD.
const RW2_MAKES: [&str; 2] = ["Panasonic", "LEICA"];

#[derive(Clone)]
enum Layout {
    Chunked(ChunkedLayout),
    Rw2(Rw2Layout),
}

/// A parsed RAW file, ready to decode.
pub struct RawDecoder<'a> {
    buffer: &'a [u8],
    signature: Signature,
    metadata: RawMetadata,
    layout: Layout,
}

impl<'a> RawDecoder<'a> {
    /// Recognize and parse `buffer`. No pixel data is touched.
    pub fn new(buffer: &'a [u8]) -> Result<Self> {
        let signature = Signature::from_bytes(buffer)
            .ok_or_else(|| RawError::malformed("unrecognized file signature"))?;

        let layout = match signature {
            Signature::Chunked => Layout::Chunked(ChunkedLayout::parse(buffer)?),
            Signature::Rw2 => Layout::Rw2(Rw2Layout::parse(buffer)?),
            Signature::Tiff => {
                let tiff = TiffParser::parse(buffer)?;
                let make = tiff.find(0x10f).map(|e| tiff.string(e)).transpose()?;
                match make.as_deref() {
                    Some(make) if RW2_MAKES.contains(&make) => Layout::Rw2(Rw2Layout::parse(buffer)?),
                    other => {
                        return Err(RawError::unsupported(format!(
                            "TIFF from make {:?}",
                            other.unwrap_or("unknown")
                        )))
                    }
                }
            }
        };

        let metadata = match &layout {
            Layout::Chunked(chunked) => chunked.metadata(),
            Layout::Rw2(rw2) => rw2.metadata.clone(),
        };
        debug!(
            format = signature.name(),
            width = metadata.width,
            height = metadata.height,
            make = metadata.make.as_deref().unwrap_or(""),
            "parsed container"
        );

        Ok(Self {
            buffer,
            signature,
            metadata,
            layout,
        })
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn metadata(&self) -> &RawMetadata {
        &self.metadata
    }

    /// Decode into `plane`, which must match the image dimensions. Bad
    /// pixels and truncation are returned in the report.
    pub fn decode_into(
        &self,
        plane: &mut OutputPlane<u16>,
        options: &DecodeOptions,
    ) -> Result<DecodeReport> {
        let (width, height) = (self.metadata.width, self.metadata.height);
        if plane.width() != width || plane.height() != height {
            return Err(RawError::layout(format!(
                "output plane is {}x{}, image is {}x{}",
                plane.width(),
                plane.height(),
                width,
                height
            )));
        }

        let started = Instant::now();
        let report = match &self.layout {
            Layout::Chunked(chunked) => chunked.decode_into(self.buffer, plane, options)?,
            Layout::Rw2(rw2) => rw2.decode_into(self.buffer, plane, options)?,
        };
        info!(
            format = self.signature.name(),
            width,
            height,
            slices = report.slices,
            bad_pixels = report.bad_pixels.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "decoded image"
        );
        Ok(report)
    }

    /// Decode into a freshly allocated plane.
    pub fn decode(&self, options: &DecodeOptions) -> Result<RawImage> {
        let mut plane = OutputPlane::new(self.metadata.width, self.metadata.height);
        let report = self.decode_into(&mut plane, options)?;
        Ok(RawImage {
            metadata: self.metadata.clone(),
            plane,
            report,
        })
    }
}
