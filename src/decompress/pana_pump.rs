//! Block-shuffled bit reader used by Panasonic compressed payloads.
//!
//! The stream is consumed in 0x4000-byte blocks. Each block is loaded with
//! its first `load_flags` bytes rotated to the end, then read backwards in
//! 16-bit little-endian windows addressed through `byte ^ 0x3ff0`.

use crate::error::{RawError, Result};
use crate::options::TruncationPolicy;

use super::bit_reader::BitPump;

/// Size of one shuffled block.
pub const BLOCK_SIZE: usize = 0x4000;

/// Bit reader over Panasonic block-shuffled data.
pub struct PanasonicPump<'a> {
    data: &'a [u8],
    pos: usize,
    /// One spare byte so the 16-bit window at the last index stays in range.
    buf: Vec<u8>,
    /// Bits left in the current block, counted down modulo 2^17.
    vbits: u32,
    load_flags: usize,
    /// `buf[load_flags..tail_end]` and `buf[..head_end]` hold stream bytes.
    tail_end: usize,
    head_end: usize,
    policy: TruncationPolicy,
    truncated: bool,
}

impl<'a> PanasonicPump<'a> {
    pub fn new(data: &'a [u8], load_flags: u32, policy: TruncationPolicy) -> Result<Self> {
        let load_flags = load_flags as usize;
        if load_flags >= BLOCK_SIZE {
            return Err(RawError::unsupported(format!(
                "load flags 0x{:x} exceed block size",
                load_flags
            )));
        }
        Ok(Self {
            data,
            pos: 0,
            buf: vec![0; BLOCK_SIZE + 1],
            vbits: 0,
            load_flags,
            tail_end: load_flags,
            head_end: 0,
            policy,
            truncated: false,
        })
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Load the next block: bytes `[0, BLOCK_SIZE - load_flags)` of the
    /// stream land at `buf[load_flags..]`, the rest wraps to the front.
    fn load_block(&mut self) {
        let tail_len = BLOCK_SIZE - self.load_flags;
        let head_len = self.load_flags;
        if self.remaining() < BLOCK_SIZE {
            // Stale bytes from the previous block must not leak into output.
            self.buf.fill(0);
        }

        let n = self.remaining().min(tail_len);
        self.buf[self.load_flags..self.load_flags + n]
            .copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        self.tail_end = self.load_flags + n;

        let n = self.remaining().min(head_len);
        if n != 0 {
            self.buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
        }
        self.head_end = n;
    }

    #[inline]
    fn is_loaded(&self, index: usize) -> bool {
        index < self.head_end || (index >= self.load_flags && index < self.tail_end)
    }

    /// Skip `bytes` bytes of stream: whole blocks go straight through the
    /// input, the remainder is consumed through the shuffle.
    pub fn skip_bytes(&mut self, bytes: usize) -> Result<()> {
        let blocks = (bytes / BLOCK_SIZE) * BLOCK_SIZE;
        if blocks > self.remaining() {
            if self.policy.is_strict() {
                return Err(RawError::out_of_bounds(self.pos, blocks, self.data.len()));
            }
            self.truncated = true;
        }
        self.pos = self.pos.saturating_add(blocks).min(self.data.len());
        for _ in blocks..bytes {
            self.get_bits(8)?;
        }
        Ok(())
    }
}

impl BitPump for PanasonicPump<'_> {
    #[inline]
    fn get_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        if n > 8 {
            // The 16-bit window only covers 8 bits at every shift. Wider
            // reads are the concatenation of consecutive narrow ones.
            let hi = self.get_bits(n - 8)?;
            let lo = self.get_bits(8)?;
            return Ok(hi << 8 | lo);
        }
        if self.vbits == 0 {
            self.load_block();
        }
        let vbits = self.vbits.wrapping_sub(n) & 0x1ffff;
        let byte = ((vbits >> 3) ^ 0x3ff0) as usize;
        let shift = vbits & 7;
        let spans = shift + n > 8;
        if !self.is_loaded(byte) || (spans && byte + 1 < BLOCK_SIZE && !self.is_loaded(byte + 1)) {
            if self.policy.is_strict() {
                return Err(RawError::out_of_bounds(self.pos, 1, self.data.len()));
            }
            self.truncated = true;
        }
        self.vbits = vbits;
        let window = self.buf[byte] as u32 | (self.buf[byte + 1] as u32) << 8;
        Ok((window >> shift) & ((1u32 << n) - 1))
    }

    fn skip_bits(&mut self, n: u32) -> Result<()> {
        let mut left = n;
        while left > 0 {
            let step = left.min(8);
            self.get_bits(step)?;
            left -= step;
        }
        Ok(())
    }

    fn is_truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Byte the pump serves as the k-th 8-bit read of a block.
    fn served_index(k: usize) -> usize {
        // vbits after k+1 reads of 8 bits is 0x20000 - 8*(k+1).
        let vbits = (0x20000 - 8 * (k + 1)) & 0x1ffff;
        (vbits >> 3) ^ 0x3ff0
    }

    #[test]
    fn test_first_bytes_come_from_block_end() {
        let data: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
        let mut pump = PanasonicPump::new(&data, 0, TruncationPolicy::Tolerant).unwrap();

        for k in 0..32 {
            let idx = served_index(k);
            assert_eq!(pump.get_bits(8).unwrap(), data[idx] as u32, "read {}", k);
        }
        assert!(!pump.is_truncated());
    }

    #[test]
    fn test_load_flags_rotate_block() {
        let data: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i % 253) as u8).collect();
        let load_flags = 0x2008usize;
        let mut pump = PanasonicPump::new(&data, load_flags as u32, TruncationPolicy::Tolerant).unwrap();

        // buf[i] holds stream byte (i - load_flags) mod BLOCK_SIZE.
        for k in 0..16 {
            let idx = served_index(k);
            let stream = (idx + BLOCK_SIZE - load_flags) % BLOCK_SIZE;
            assert_eq!(pump.get_bits(8).unwrap(), data[stream] as u32);
        }
    }

    #[test]
    fn test_skip_bytes_matches_reading() {
        let data: Vec<u8> = (0..BLOCK_SIZE * 3).map(|i| (i * 7 % 256) as u8).collect();
        let mut skipped = PanasonicPump::new(&data, 0x2008, TruncationPolicy::Tolerant).unwrap();
        skipped.skip_bytes(BLOCK_SIZE + 40).unwrap();

        let mut read = PanasonicPump::new(&data, 0x2008, TruncationPolicy::Tolerant).unwrap();
        for _ in 0..BLOCK_SIZE + 40 {
            read.get_bits(8).unwrap();
        }

        for _ in 0..64 {
            assert_eq!(skipped.get_bits(8).unwrap(), read.get_bits(8).unwrap());
        }
    }

    #[test]
    fn test_short_block_is_zero_padded() {
        let data = vec![0xFFu8; 10];
        let mut pump = PanasonicPump::new(&data, 0, TruncationPolicy::Tolerant).unwrap();
        // Reads walk buf[15], buf[14], ...; only buf[..10] holds data.
        for _ in 0..6 {
            assert_eq!(pump.get_bits(8).unwrap(), 0);
        }
        for _ in 0..10 {
            assert_eq!(pump.get_bits(8).unwrap(), 0xFF);
        }
        assert!(pump.is_truncated());
    }

    #[test]
    fn test_short_block_strict() {
        let data = vec![0xFFu8; 100];
        let mut pump = PanasonicPump::new(&data, 0, TruncationPolicy::Strict).unwrap();
        // Reads come in groups of 16 walking down: 15..0, 31..16, ... The
        // group 111..96 is the first to touch bytes past the data.
        for _ in 0..96 {
            assert_eq!(pump.get_bits(8).unwrap(), 0xFF);
        }
        assert_eq!(pump.get_bits(8).unwrap_err().kind(), ErrorKind::OutOfBounds);
        assert!(!pump.is_truncated());
    }

    #[test]
    fn test_wide_reads_at_odd_offset() {
        let data = vec![0xFFu8; BLOCK_SIZE];
        let mut pump = PanasonicPump::new(&data, 0, TruncationPolicy::Strict).unwrap();
        assert_eq!(pump.get_bits(4).unwrap(), 0xF);
        assert_eq!(pump.get_bits(13).unwrap(), 0x1FFF);
        assert_eq!(pump.get_bits(15).unwrap(), 0x7FFF);
        assert_eq!(pump.get_bits(32).unwrap(), u32::MAX);
    }

    #[test]
    fn test_wide_read_equals_narrow_reads() {
        let data: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i * 37 % 256) as u8).collect();
        let mut wide = PanasonicPump::new(&data, 0x2008, TruncationPolicy::Tolerant).unwrap();
        let mut narrow = PanasonicPump::new(&data, 0x2008, TruncationPolicy::Tolerant).unwrap();
        wide.get_bits(3).unwrap();
        narrow.get_bits(3).unwrap();

        for n in [12u32, 9, 16, 20, 24, 32] {
            let mut expected = 0u64;
            let mut left = n;
            while left > 0 {
                let step = if left % 8 == 0 { 8 } else { left % 8 };
                expected = expected << step | narrow.get_bits(step).unwrap() as u64;
                left -= step;
            }
            assert_eq!(wide.get_bits(n).unwrap() as u64, expected, "width {}", n);
        }
    }

    #[test]
    fn test_zero_bits() {
        let data = vec![0xABu8; BLOCK_SIZE];
        let mut pump = PanasonicPump::new(&data, 0, TruncationPolicy::Strict).unwrap();
        assert_eq!(pump.get_bits(0).unwrap(), 0);
        assert_eq!(pump.pos, 0);
    }

    #[test]
    fn test_oversized_load_flags_rejected() {
        let data = [0u8; 4];
        assert!(PanasonicPump::new(&data, BLOCK_SIZE as u32, TruncationPolicy::Tolerant).is_err());
    }
}
