//! Canonical Huffman decoder for lossless-JPEG style difference coding.
//!
//! Tables are described JPEG-style: the number of codes of each length
//! 1..=16 plus the symbols in code order. Codes of one length are assigned
//! consecutively before any code of the next length, so no explicit bit
//! patterns are stored. Each symbol is the bit length of a signed
//! difference that follows the code in the stream.

use crate::cursor::ByteCursor;
use crate::error::{RawError, Result};

use super::bit_reader::LookaheadPump;

/// Maximum code length in bits.
pub const MAX_CODE_LENGTH: usize = 16;

/// Largest difference length a symbol may announce.
pub const MAX_DIFF_BITS: u8 = 16;

/// Bits for quick lookup table.
const QUICK_BITS: u32 = 9;
const QUICK_SIZE: usize = 1 << QUICK_BITS;

/// Quick lookup table entry. `length == 0` means the code is longer than
/// `QUICK_BITS`.
#[derive(Clone, Copy, Default)]
struct QuickEntry {
    symbol: u8,
    length: u8,
}

/// Canonical Huffman decoding table.
#[derive(Clone)]
pub struct HuffmanTable {
    /// Codes per length, index 0 is length 1.
    counts: [u8; MAX_CODE_LENGTH],
    /// Symbols in canonical code order.
    symbols: Vec<u8>,
    /// First code of each length.
    min_code: [u32; MAX_CODE_LENGTH + 1],
    /// Last code of each length, -1 if the length is unused.
    max_code: [i32; MAX_CODE_LENGTH + 1],
    /// Index into `symbols` of the first code of each length.
    val_ptr: [usize; MAX_CODE_LENGTH + 1],
    quick_table: Vec<QuickEntry>,
}

impl HuffmanTable {
    /// Build a table from per-length code counts and the symbol list.
    pub fn new(counts: &[u8; MAX_CODE_LENGTH], symbols: &[u8]) -> Result<Self> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total == 0 {
            return Err(RawError::huffman("table has no codes"));
        }
        if total != symbols.len() {
            return Err(RawError::huffman(format!(
                "code counts announce {} symbols, {} given",
                total,
                symbols.len()
            )));
        }
        if let Some(&bad) = symbols.iter().find(|&&s| s > MAX_DIFF_BITS) {
            return Err(RawError::huffman(format!(
                "difference length {} exceeds {} bits",
                bad, MAX_DIFF_BITS
            )));
        }

        let mut table = Self {
            counts: *counts,
            symbols: symbols.to_vec(),
            min_code: [0; MAX_CODE_LENGTH + 1],
            max_code: [-1; MAX_CODE_LENGTH + 1],
            val_ptr: [0; MAX_CODE_LENGTH + 1],
            quick_table: vec![QuickEntry::default(); QUICK_SIZE],
        };

        // Calculate first/last code for each length (canonical Huffman)
        let mut code = 0u32;
        let mut idx = 0usize;
        for len in 1..=MAX_CODE_LENGTH {
            let count = counts[len - 1] as u32;
            table.min_code[len] = code;
            table.val_ptr[len] = idx;
            if count > 0 {
                table.max_code[len] = (code + count - 1) as i32;
            }
            code += count;
            idx += count as usize;
            if code > 1 << len {
                return Err(RawError::huffman(format!(
                    "{} codes of length {} overflow the code space",
                    count, len
                )));
            }
            code <<= 1;
        }

        // Build quick lookup table
        for len in 1..=QUICK_BITS as usize {
            if table.max_code[len] < 0 {
                continue;
            }
            let fill_bits = QUICK_BITS - len as u32;
            for code in table.min_code[len]..=table.max_code[len] as u32 {
                let symbol = table.symbols[table.val_ptr[len] + (code - table.min_code[len]) as usize];
                let start = (code << fill_bits) as usize;
                for entry in &mut table.quick_table[start..start + (1 << fill_bits)] {
                    *entry = QuickEntry {
                        symbol,
                        length: len as u8,
                    };
                }
            }
        }

        Ok(table)
    }

    /// Read a table stored as 16 count bytes followed by the symbols.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let mut counts = [0u8; MAX_CODE_LENGTH];
        counts.copy_from_slice(cursor.slice(MAX_CODE_LENGTH)?);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let symbols = cursor.slice(total)?;
        Self::new(&counts, symbols)
    }

    /// Codes per length, index 0 is length 1.
    pub fn counts(&self) -> &[u8; MAX_CODE_LENGTH] {
        &self.counts
    }

    /// Symbols in canonical code order.
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Decode one symbol: the bit length of the difference that follows.
    pub fn decode_length<P: LookaheadPump>(&self, pump: &mut P) -> Result<u32> {
        let bits = pump.peek_bits(QUICK_BITS);
        let entry = self.quick_table[bits as usize];

        if entry.length > 0 {
            pump.skip_bits(entry.length as u32)?;
            return Ok(entry.symbol as u32);
        }

        // Slow path for longer codes: walk one bit at a time.
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LENGTH {
            code = (code << 1) | pump.get_bits(1)?;
            if self.max_code[len] >= 0 && code <= self.max_code[len] as u32 {
                let idx = self.val_ptr[len] + (code - self.min_code[len]) as usize;
                return Ok(self.symbols[idx] as u32);
            }
        }

        Err(RawError::huffman(format!(
            "no code matches within {} bits",
            MAX_CODE_LENGTH
        )))
    }

    /// Decode a length code followed by that many difference bits.
    pub fn decode_difference<P: LookaheadPump>(&self, pump: &mut P) -> Result<i32> {
        let len = self.decode_length(pump)?;
        let bits = pump.get_bits(len)?;
        Ok(extend_difference(bits, len))
    }
}

/// Turn an `len`-bit difference field into a signed value.
///
/// Values with the top bit clear are negative (`bits - 2^len + 1`). The
/// 16-bit all-ones pattern means the saturated minimum, -32768.
#[inline]
pub fn extend_difference(bits: u32, len: u32) -> i32 {
    if len == 0 {
        return 0;
    }
    let diff = if bits & (1 << (len - 1)) == 0 {
        bits as i32 - (1i32 << len) + 1
    } else {
        bits as i32
    };
    if diff == 65535 {
        -32768
    } else {
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::bit_reader::{BitPump, BitPumpMsb, BitPumpMsb32};
    use crate::decompress::test_util::{canonical_codes, BitWriter};
    use crate::error::ErrorKind;

    fn counts(pairs: &[(usize, u8)]) -> [u8; MAX_CODE_LENGTH] {
        let mut out = [0u8; MAX_CODE_LENGTH];
        for &(len, n) in pairs {
            out[len - 1] = n;
        }
        out
    }

    #[test]
    fn test_huffman_table_simple() {
        // Symbol 4 = code 0, symbol 7 = code 1
        let table = HuffmanTable::new(&counts(&[(1, 2)]), &[4, 7]).unwrap();

        let data = [0b10000000];
        let mut reader = BitPumpMsb::new(&data);
        assert_eq!(table.decode_length(&mut reader).unwrap(), 7);
        assert_eq!(table.decode_length(&mut reader).unwrap(), 4);
    }

    #[test]
    fn test_huffman_table_varying_lengths() {
        // 0 -> "0", 1 -> "10", 2 -> "11"
        let table = HuffmanTable::new(&counts(&[(1, 1), (2, 2)]), &[0, 1, 2]).unwrap();

        let data = [0b01011000];
        let mut reader = BitPumpMsb::new(&data);

        assert_eq!(table.decode_length(&mut reader).unwrap(), 0);
        assert_eq!(table.decode_length(&mut reader).unwrap(), 1);
        assert_eq!(table.decode_length(&mut reader).unwrap(), 2);
    }

    #[test]
    fn test_single_code_all_zero_stream() {
        let table = HuffmanTable::new(&counts(&[(1, 1)]), &[0]).unwrap();
        let data = [0u8; 64];
        let mut reader = BitPumpMsb32::new(&data);

        for _ in 0..data.len() * 8 {
            assert_eq!(table.decode_difference(&mut reader).unwrap(), 0);
        }
        assert!(!reader.is_truncated());
    }

    #[test]
    fn test_single_code_rejects_unassigned() {
        let table = HuffmanTable::new(&counts(&[(1, 1)]), &[0]).unwrap();
        let data = [0xFFu8; 4];
        let mut reader = BitPumpMsb::new(&data);
        let err = table.decode_length(&mut reader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHuffmanTable);
    }

    #[test]
    fn test_round_trip_long_codes() {
        // Lengths 2..=12 so both the quick table and the slow walk are hit.
        let table_counts = counts(&[
            (2, 1),
            (3, 2),
            (4, 2),
            (5, 2),
            (6, 2),
            (8, 2),
            (10, 2),
            (12, 3),
        ]);
        let symbols: Vec<u8> = (0..16).collect();
        let table = HuffmanTable::new(&table_counts, &symbols).unwrap();
        let codes = canonical_codes(&table_counts, &symbols);

        let message: Vec<u8> = (0..400).map(|i| ((i * 7 + i / 3) % 16) as u8).collect();
        let mut writer = BitWriter::msb();
        for &sym in &message {
            let (code, len) = codes[&sym];
            writer.put(code, len);
        }
        let bytes = writer.finish();

        let mut reader = BitPumpMsb::new(&bytes);
        for &sym in &message {
            assert_eq!(table.decode_length(&mut reader).unwrap(), sym as u32);
        }
    }

    #[test]
    fn test_decode_difference_values() {
        // Two codes: "0" -> 3 extra bits, "1" -> 0 extra bits.
        let table = HuffmanTable::new(&counts(&[(1, 2)]), &[3, 0]).unwrap();
        let mut writer = BitWriter::msb();
        writer.put(0, 1);
        writer.put(0b101, 3); // +5
        writer.put(0, 1);
        writer.put(0b010, 3); // 2 - 8 + 1 = -5
        writer.put(1, 1); // 0
        let bytes = writer.finish();

        let mut reader = BitPumpMsb::new(&bytes);
        assert_eq!(table.decode_difference(&mut reader).unwrap(), 5);
        assert_eq!(table.decode_difference(&mut reader).unwrap(), -5);
        assert_eq!(table.decode_difference(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_extend_difference() {
        assert_eq!(extend_difference(0, 0), 0);
        assert_eq!(extend_difference(1, 1), 1);
        assert_eq!(extend_difference(0, 1), -1);
        assert_eq!(extend_difference(0b100, 3), 4);
        assert_eq!(extend_difference(0b011, 3), -4);
        assert_eq!(extend_difference(0x8000, 16), 32768);
        assert_eq!(extend_difference(0x0000, 16), -65535);
        assert_eq!(extend_difference(0xFFFF, 16), -32768);
    }

    #[test]
    fn test_malformed_tables() {
        let err = HuffmanTable::new(&counts(&[(1, 3)]), &[0, 1, 2]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedHuffmanTable);

        let err = HuffmanTable::new(&counts(&[(2, 2)]), &[0]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedHuffmanTable);

        let err = HuffmanTable::new(&counts(&[(2, 1)]), &[17]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedHuffmanTable);

        let err = HuffmanTable::new(&[0; MAX_CODE_LENGTH], &[]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedHuffmanTable);
    }

    #[test]
    fn test_parse_from_bytes() {
        let mut bytes = vec![0u8; MAX_CODE_LENGTH];
        bytes[0] = 1;
        bytes[1] = 2;
        bytes.extend_from_slice(&[9, 4, 2, 0xAA]);
        let mut cursor = ByteCursor::new(&bytes, crate::cursor::Endianness::Little);
        let table = HuffmanTable::parse(&mut cursor).unwrap();
        assert_eq!(table.symbols(), &[9, 4, 2]);
        assert_eq!(cursor.remaining(), 1);

        let mut short = ByteCursor::new(&bytes[..18], crate::cursor::Endianness::Little);
        assert_eq!(
            HuffmanTable::parse(&mut short).err().unwrap().kind(),
            ErrorKind::OutOfBounds
        );
    }
}
