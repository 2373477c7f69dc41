//! Fixed-width sample unpacking.
//!
//! Three layouts:
//!
//! - [`PackedRows`]: N-bit samples (1..=16) in one of the pump bit orders,
//!   rows either `pitch` bytes apart or running on without padding;
//! - [`decode_u16_le`]: one 16-bit little-endian word per sample, keeping
//!   the low N bits;
//! - [`decode_12bit_le_skip`]: 12-bit little-endian pairs packed in three
//!   bytes, with one control byte after every 10 pixels.
//!
//! Each function decodes the rows of one slice window and reports whether
//! it had to pad past the end of its input.

use std::borrow::Cow;

use crate::decompress::{BitOrder, BitPump, BitStream, Lsb, Msb, Msb32, SliceWindow};
use crate::error::{RawError, Result};
use crate::options::TruncationPolicy;

/// Bit order of a packed sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackOrder {
    Msb,
    Msb32,
    Lsb,
}

/// Fixed-width packed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRows {
    pub bits: u32,
    pub order: PackOrder,
    /// Bytes from one row start to the next, 0 when rows are not padded.
    pub pitch: usize,
}

impl PackedRows {
    pub fn new(bits: u32, order: PackOrder, pitch: usize) -> Result<Self> {
        if !(1..=16).contains(&bits) {
            return Err(RawError::unsupported(format!(
                "{}-bit packed samples",
                bits
            )));
        }
        Ok(Self { bits, order, pitch })
    }

    /// Bytes between row starts when every row starts on a byte boundary.
    pub fn row_stride(&self, width: usize) -> Option<usize> {
        if self.pitch != 0 {
            return Some(self.pitch);
        }
        let bits = width * self.bits as usize;
        (bits % 8 == 0).then_some(bits / 8)
    }

    /// Decode `window.height()` rows from `src`, which starts at the
    /// window's first row.
    pub fn decode(
        &self,
        src: &[u8],
        window: &mut SliceWindow<'_, u16>,
        policy: TruncationPolicy,
    ) -> Result<bool> {
        match self.order {
            PackOrder::Msb => self.unpack::<Msb>(src, window, policy),
            PackOrder::Msb32 => self.unpack::<Msb32>(src, window, policy),
            PackOrder::Lsb => self.unpack::<Lsb>(src, window, policy),
        }
    }

    fn unpack<O: BitOrder>(
        &self,
        src: &[u8],
        window: &mut SliceWindow<'_, u16>,
        policy: TruncationPolicy,
    ) -> Result<bool> {
        if self.pitch == 0 {
            let mut pump = BitStream::<O>::with_policy(src, policy);
            for row in 0..window.height() {
                for v in window.row_mut(row) {
                    *v = pump.get_bits(self.bits)? as u16;
                }
            }
            return Ok(pump.is_truncated());
        }

        let mut truncated = false;
        for row in 0..window.height() {
            let start = row.saturating_mul(self.pitch);
            let data = src.get(start..).unwrap_or(&[]);
            let mut pump = BitStream::<O>::with_policy(data, policy);
            for v in window.row_mut(row) {
                *v = pump.get_bits(self.bits)? as u16;
            }
            truncated |= pump.is_truncated();
        }
        Ok(truncated)
    }
}

/// `len` bytes of `src` at `start`, zero-extended under the tolerant
/// policy. The flag tells whether padding was needed.
fn row_bytes(
    src: &[u8],
    start: usize,
    len: usize,
    policy: TruncationPolicy,
) -> Result<(Cow<'_, [u8]>, bool)> {
    match start.checked_add(len) {
        Some(end) if end <= src.len() => Ok((Cow::Borrowed(&src[start..end]), false)),
        _ if policy.is_strict() => Err(RawError::out_of_bounds(start, len, src.len())),
        _ => {
            let mut padded = vec![0u8; len];
            if let Some(tail) = src.get(start..) {
                padded[..tail.len()].copy_from_slice(tail);
            }
            Ok((Cow::Owned(padded), true))
        }
    }
}

/// One little-endian u16 per sample, low `bits` bits kept.
pub fn decode_u16_le(
    src: &[u8],
    bits: u32,
    window: &mut SliceWindow<'_, u16>,
    policy: TruncationPolicy,
) -> Result<bool> {
    if !(1..=16).contains(&bits) {
        return Err(RawError::unsupported(format!("{}-bit word samples", bits)));
    }
    let mask = (1u32 << bits) - 1;
    let stride = window.width() * 2;
    let mut truncated = false;
    for row in 0..window.height() {
        let (bytes, padded) = row_bytes(src, row * stride, stride, policy)?;
        truncated |= padded;
        for (v, pair) in window.row_mut(row).iter_mut().zip(bytes.chunks_exact(2)) {
            *v = (u16::from_le_bytes([pair[0], pair[1]]) as u32 & mask) as u16;
        }
    }
    Ok(truncated)
}

/// Bytes per row of the 12-bit packing with control bytes.
pub fn row_bytes_12bit_le_skip(width: usize) -> usize {
    width * 3 / 2 + width / 10
}

/// 12-bit little-endian pairs, `g1 g2 g3` giving `g1 | (g2 & 0xf) << 8`
/// and `g2 >> 4 | g3 << 4`. A control byte follows every 10th pixel.
pub fn decode_12bit_le_skip(
    src: &[u8],
    window: &mut SliceWindow<'_, u16>,
    policy: TruncationPolicy,
) -> Result<bool> {
    let width = window.width();
    if width % 2 != 0 {
        return Err(RawError::unsupported(format!(
            "12-bit pair packing needs an even width, got {}",
            width
        )));
    }
    let stride = row_bytes_12bit_le_skip(width);
    let mut truncated = false;
    for row in 0..window.height() {
        let (bytes, padded) = row_bytes(src, row * stride, stride, policy)?;
        truncated |= padded;
        let out = window.row_mut(row);
        let mut i = 0;
        for x in (0..width).step_by(2) {
            let g1 = bytes[i] as u16;
            let g2 = bytes[i + 1] as u16;
            let g3 = bytes[i + 2] as u16;
            i += 3;
            out[x] = g1 | (g2 & 0xf) << 8;
            out[x + 1] = g2 >> 4 | g3 << 4;
            if x % 10 == 8 {
                i += 1;
            }
        }
    }
    Ok(truncated)
}
