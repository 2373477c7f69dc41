//! Two-pixel packed Huffman differential decoding.
//!
//! Unlike lossless JPEG, pixels come in pairs and both length codes precede
//! both differences:
//!
//! ```text
//! [len1 code][len2 code][diff1: len1 bits][diff2: len2 bits] | next pair
//! ```
//!
//! Two predictors, one per pixel of the pair, restart at `0x8000 + base`
//! at the beginning of every row. Predictor arithmetic wraps in `i32` and
//! samples keep the low 16 bits. Bits come from a [`BitPumpMsb32`].

use crate::decompress::{extend_difference, BitPump, BitPumpMsb32, HuffmanTable, SliceWindow};
use crate::error::Result;
use crate::options::TruncationPolicy;

/// Decoder state shared by every slice of one image.
#[derive(Clone)]
pub struct PairDifferenceDecoder {
    table: HuffmanTable,
    base_offset: i32,
}

impl PairDifferenceDecoder {
    pub fn new(table: HuffmanTable, base_offset: i32) -> Self {
        Self { table, base_offset }
    }

    pub fn table(&self) -> &HuffmanTable {
        &self.table
    }

    /// Decode every row of `window` from the bitstream `src`. Returns
    /// whether the stream ran out early.
    pub fn decode(
        &self,
        src: &[u8],
        window: &mut SliceWindow<'_, u16>,
        policy: TruncationPolicy,
    ) -> Result<bool> {
        let mut pump = BitPumpMsb32::with_policy(src, policy);
        let width = window.width();
        for row in 0..window.height() {
            let out = window.row_mut(row);
            let mut p1 = 0x8000i32.wrapping_add(self.base_offset);
            let mut p2 = p1;
            for x in (0..width).step_by(2) {
                let len1 = self.table.decode_length(&mut pump)?;
                let len2 = self.table.decode_length(&mut pump)?;
                p1 = p1.wrapping_add(extend_difference(pump.get_bits(len1)?, len1));
                p2 = p2.wrapping_add(extend_difference(pump.get_bits(len2)?, len2));
                out[x] = p1 as u16;
                // Odd widths drop the second pixel of the last pair.
                if let Some(v) = out.get_mut(x + 1) {
                    *v = p2 as u16;
                }
            }
        }
        Ok(pump.is_truncated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::test_util::{canonical_codes, BitWriter};
    use crate::decompress::{SliceScheduler, MAX_CODE_LENGTH};
    use crate::image::OutputPlane;
    use crate::options::DecodeOptions;

    fn table() -> (HuffmanTable, [u8; MAX_CODE_LENGTH], Vec<u8>) {
        let mut counts = [0u8; MAX_CODE_LENGTH];
        counts[1] = 3; // lengths 0, 2, 4 in two bits
        counts[2] = 2; // 8, 16 in three bits
        let symbols = vec![0, 2, 4, 8, 16];
        (HuffmanTable::new(&counts, &symbols).unwrap(), counts, symbols)
    }

    /// Encode a signed difference as (bits, len) JPEG-style.
    fn encode_diff(diff: i32, len: u32) -> u32 {
        if diff >= 0 {
            diff as u32
        } else {
            (diff + (1 << len) - 1) as u32
        }
    }

    fn decode(width: usize, height: usize, src: &[u8], base: i32) -> OutputPlane<u16> {
        let (table, _, _) = table();
        let decoder = PairDifferenceDecoder::new(table, base);
        let sched = SliceScheduler::horizontal_bands(width, height, height, |_, _| (0, src.len())).unwrap();
        let mut plane = OutputPlane::new(width, height);
        sched
            .run(src, &mut plane, &DecodeOptions::default(), |_, window, ctx| {
                let data = ctx.source()?;
                if decoder.decode(data, window, ctx.policy())? {
                    ctx.mark_truncated();
                }
                Ok(())
            })
            .unwrap();
        plane
    }

    #[test]
    fn test_pairs_and_row_reset() {
        let (_, counts, symbols) = table();
        let codes = canonical_codes(&counts, &symbols);
        // (diff1, len1, diff2, len2) per pair, two pairs per row.
        let rows: [[(i32, u32, i32, u32); 2]; 2] = [
            [(3, 2, -2, 2), (10, 4, 0, 0)],
            [(-9, 4, 200, 8), (-40000, 16, 2, 2)],
        ];
        let base = -16;
        let mut w = BitWriter::msb32();
        let mut expected = Vec::new();
        for row in rows {
            let (mut p1, mut p2) = (0x8000i32.wrapping_add(base), 0x8000i32.wrapping_add(base));
            for (d1, l1, d2, l2) in row {
                let (c1, n1) = codes[&(l1 as u8)];
                let (c2, n2) = codes[&(l2 as u8)];
                w.put(c1, n1);
                w.put(c2, n2);
                w.put(encode_diff(d1, l1), l1);
                w.put(encode_diff(d2, l2), l2);
                p1 = p1.wrapping_add(d1);
                p2 = p2.wrapping_add(d2);
                expected.push(p1 as u16);
                expected.push(p2 as u16);
            }
        }
        let src = w.finish();

        let plane = decode(4, 2, &src, base);
        assert_eq!(plane.data(), &expected[..]);
        assert_eq!(plane.get(0, 1), Some(&(0x8000 - 16 - 9)));
    }

    #[test]
    fn test_all_zero_stream_holds_predictor() {
        // Code "00" is length 0 for both pixels.
        let plane = decode(6, 3, &[0u8; 64], 0);
        assert!(plane.data().iter().all(|&v| v == 0x8000));
    }

    #[test]
    fn test_extreme_base_offset_wraps() {
        let plane = decode(4, 2, &[0u8; 64], i32::MAX);
        let start = 0x8000i32.wrapping_add(i32::MAX) as u16;
        assert_eq!(start, 0x7FFF);
        assert!(plane.data().iter().all(|&v| v == start));

        let plane = decode(4, 2, &[0u8; 64], i32::MIN);
        assert!(plane.data().iter().all(|&v| v == 0x8000));
    }
}
