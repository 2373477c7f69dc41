//! Stream builders for tests.

use std::collections::HashMap;

use super::huffman::MAX_CODE_LENGTH;

/// Packs bits MSB-first, either as plain bytes or as little-endian 32-bit
/// words (the layout [`BitPumpMsb32`](super::BitPumpMsb32) reads).
pub struct BitWriter {
    words: bool,
    acc: u64,
    nbits: u32,
    out: Vec<u8>,
}

impl BitWriter {
    pub fn msb() -> Self {
        Self {
            words: false,
            acc: 0,
            nbits: 0,
            out: Vec::new(),
        }
    }

    pub fn msb32() -> Self {
        Self {
            words: true,
            ..Self::msb()
        }
    }

    pub fn put(&mut self, value: u32, bits: u32) {
        if bits == 0 {
            return;
        }
        self.acc = (self.acc << bits) | (value as u64 & ((1u64 << bits) - 1));
        self.nbits += bits;
        let unit = if self.words { 32 } else { 8 };
        while self.nbits >= unit {
            let chunk = (self.acc >> (self.nbits - unit)) as u32;
            self.emit(chunk);
            self.nbits -= unit;
        }
    }

    fn emit(&mut self, chunk: u32) {
        if self.words {
            self.out.extend_from_slice(&chunk.to_le_bytes());
        } else {
            self.out.push(chunk as u8);
        }
    }

    /// Flush, zero-filling the last unit.
    pub fn finish(mut self) -> Vec<u8> {
        let unit = if self.words { 32 } else { 8 };
        if self.nbits > 0 {
            let pad = unit - self.nbits;
            self.put(0, pad);
        }
        self.out
    }
}

/// Canonical `(code, length)` for every symbol of a table.
pub fn canonical_codes(counts: &[u8; MAX_CODE_LENGTH], symbols: &[u8]) -> HashMap<u8, (u32, u32)> {
    let mut out = HashMap::new();
    let mut code = 0u32;
    let mut idx = 0usize;
    for len in 1..=MAX_CODE_LENGTH {
        for _ in 0..counts[len - 1] {
            out.insert(symbols[idx], (code, len as u32));
            code += 1;
            idx += 1;
        }
        code <<= 1;
    }
    out
}
