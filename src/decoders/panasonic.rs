//! Panasonic 14-pixel block decoding.
//!
//! Each row is a run of 16-byte blocks, each holding 14 pixels as two
//! interleaved predictor channels. Every third sample (starting with the
//! third) is preceded by a 2-bit shift selector. A channel starts with an
//! 8+4 bit absolute value; once non-zero it continues with 8-bit deltas
//! scaled by the current shift.
//!
//! Blocks are byte aligned (9 1/7 bits per pixel), so any row can be
//! reached by skipping `row * width / 14 * 16` bytes of the shuffled
//! stream. That makes every row band an independent slice.

use crate::decompress::{BitPump, PanasonicPump, Slice, SliceContext, SliceWindow};
use crate::error::{RawError, Result};

pub const PIXELS_PER_BLOCK: usize = 14;
pub const BYTES_PER_BLOCK: usize = 16;

/// Load flags of the current RW2 layout.
pub const LOAD_FLAGS: u32 = 0x2008;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanasonicDecoder {
    pub load_flags: u32,
    pub zero_is_bad: bool,
}

impl PanasonicDecoder {
    pub fn new(load_flags: u32, zero_is_bad: bool) -> Self {
        Self {
            load_flags,
            zero_is_bad,
        }
    }

    /// Bytes of stream before row `row` of an image `width` pixels wide.
    pub fn row_offset(width: usize, row: usize) -> usize {
        row * (width / PIXELS_PER_BLOCK) * BYTES_PER_BLOCK
    }

    pub fn check_width(width: usize) -> Result<()> {
        if width < PIXELS_PER_BLOCK {
            return Err(RawError::unsupported(format!(
                "width {} is narrower than one {}-pixel block",
                width, PIXELS_PER_BLOCK
            )));
        }
        Ok(())
    }

    /// Decode one full-width row band. The shuffled stream is the whole
    /// payload, since block alignment is counted from its start.
    pub fn decode_slice(
        &self,
        slice: &Slice,
        window: &mut SliceWindow<'_, u16>,
        ctx: &mut SliceContext<'_>,
    ) -> Result<()> {
        let blocks = window.width() / PIXELS_PER_BLOCK;
        let mut pump = PanasonicPump::new(ctx.stream(), self.load_flags, ctx.policy())?;
        pump.skip_bytes(Self::row_offset(window.width(), slice.dest_y))?;

        for row in 0..window.height() {
            let y = slice.dest_y + row;
            let out = window.row_mut(row);
            for block in 0..blocks {
                let base = block * PIXELS_PER_BLOCK;
                let pixels = &mut out[base..base + PIXELS_PER_BLOCK];
                decode_block(&mut pump, pixels)?;
                if self.zero_is_bad {
                    for (i, &v) in pixels.iter().enumerate() {
                        if v == 0 {
                            ctx.report_bad_pixel(slice.dest_x + base + i, y);
                        }
                    }
                }
            }
        }

        if pump.is_truncated() {
            ctx.mark_truncated();
        }
        Ok(())
    }
}

/// Decode the 14 pixels of one block.
fn decode_block<P: BitPump>(pump: &mut P, out: &mut [u16]) -> Result<()> {
    let mut pred = [0i32; 2];
    let mut nonz = [0u32; 2];
    let mut sh = 0u32;
    let mut u = 0;
    let mut i = 0;
    while i < PIXELS_PER_BLOCK {
        for c in 0..2 {
            if u == 2 {
                sh = 4 >> (3 - pump.get_bits(2)?);
                u = -1;
            }

            if nonz[c] != 0 {
                let j = pump.get_bits(8)? as i32;
                if j != 0 {
                    pred[c] -= 0x80 << sh;
                    if pred[c] < 0 || sh == 4 {
                        pred[c] &= (1 << sh) - 1;
                    }
                    pred[c] += j << sh;
                }
            } else {
                nonz[c] = pump.get_bits(8)?;
                if nonz[c] != 0 || i > 11 {
                    pred[c] = (nonz[c] << 4 | pump.get_bits(4)?) as i32;
                }
            }

            out[i] = pred[c] as u16;
            i += 1;
            u += 1;
        }
    }
    Ok(())
}
