//! Bit readers for packed sample and entropy-coded streams.
//!
//! [`BitStream`] serves up to 32 bits at a time from a 64-bit cache. The
//! order in which bytes enter the cache and bits leave it is chosen by a
//! [`BitOrder`] marker:
//!
//! | Reader | Order | Used by |
//! |--------|-------|---------|
//! | [`BitPumpMsb`] | bytes in order, MSB first | 12-bit packed rows, generic unpack |
//! | [`BitPumpMsb32`] | 32-bit LE words, MSB first | Huffman differential streams |
//! | [`BitPumpLsb`] | bytes in order, LSB first | little-endian packed rows |
//!
//! Reading past the end either zero-pads (tolerant) or fails (strict); see
//! [`TruncationPolicy`].

use std::marker::PhantomData;

use crate::error::{RawError, Result};
use crate::options::TruncationPolicy;

/// Bit-level reader interface shared by every pump.
pub trait BitPump {
    /// Read the next `n` bits (`n <= 32`). `n == 0` returns 0 and consumes
    /// nothing.
    fn get_bits(&mut self, n: u32) -> Result<u32>;

    /// Discard `n` bits.
    fn skip_bits(&mut self, n: u32) -> Result<()>;

    /// Whether any consumed bit came from zero padding past the data.
    fn is_truncated(&self) -> bool;

    #[inline]
    fn get_bit(&mut self) -> Result<bool> {
        Ok(self.get_bits(1)? != 0)
    }
}

/// Pumps that can show upcoming bits without consuming them.
pub trait LookaheadPump: BitPump {
    /// Next `n` bits (`n <= 32`), zero-padded past the end.
    fn peek_bits(&mut self, n: u32) -> u32;
}

/// Byte-to-cache arrangement for a [`BitStream`].
pub trait BitOrder {
    /// Bytes loaded per refill step (1 or 4).
    const CHUNK: usize;

    /// Turn `CHUNK` bytes into a cache chunk.
    fn load(bytes: &[u8]) -> u64;

    /// Add a freshly loaded chunk to a cache holding `fill` bits.
    fn insert(cache: u64, fill: u32, chunk: u64) -> u64;

    /// The next `n` bits (`1..=32`) of a cache holding `fill >= n` bits.
    fn peek(cache: u64, fill: u32, n: u32) -> u32;

    /// Drop `n` bits from the front of the cache.
    fn consume(cache: u64, n: u32) -> u64;
}

#[inline(always)]
fn mask(n: u32) -> u64 {
    (1u64 << n) - 1
}

/// MSB-first, one byte at a time.
#[derive(Debug, Clone, Copy)]
pub struct Msb;

impl BitOrder for Msb {
    const CHUNK: usize = 1;

    #[inline(always)]
    fn load(bytes: &[u8]) -> u64 {
        bytes[0] as u64
    }

    #[inline(always)]
    fn insert(cache: u64, _fill: u32, chunk: u64) -> u64 {
        (cache << 8) | chunk
    }

    #[inline(always)]
    fn peek(cache: u64, fill: u32, n: u32) -> u32 {
        ((cache >> (fill - n)) & mask(n)) as u32
    }

    #[inline(always)]
    fn consume(cache: u64, _n: u32) -> u64 {
        // Stale high bits are masked off by `peek`.
        cache
    }
}

/// MSB-first over little-endian 32-bit words.
#[derive(Debug, Clone, Copy)]
pub struct Msb32;

impl BitOrder for Msb32 {
    const CHUNK: usize = 4;

    #[inline(always)]
    fn load(bytes: &[u8]) -> u64 {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64
    }

    #[inline(always)]
    fn insert(cache: u64, _fill: u32, chunk: u64) -> u64 {
        (cache << 32) | chunk
    }

    #[inline(always)]
    fn peek(cache: u64, fill: u32, n: u32) -> u32 {
        ((cache >> (fill - n)) & mask(n)) as u32
    }

    #[inline(always)]
    fn consume(cache: u64, _n: u32) -> u64 {
        cache
    }
}

/// LSB-first, one byte at a time.
#[derive(Debug, Clone, Copy)]
pub struct Lsb;

impl BitOrder for Lsb {
    const CHUNK: usize = 1;

    #[inline(always)]
    fn load(bytes: &[u8]) -> u64 {
        bytes[0] as u64
    }

    #[inline(always)]
    fn insert(cache: u64, fill: u32, chunk: u64) -> u64 {
        cache | (chunk << fill)
    }

    #[inline(always)]
    fn peek(cache: u64, _fill: u32, n: u32) -> u32 {
        (cache & mask(n)) as u32
    }

    #[inline(always)]
    fn consume(cache: u64, n: u32) -> u64 {
        cache >> n
    }
}

/// Bit reader over a byte slice in the order given by `O`.
pub struct BitStream<'a, O: BitOrder> {
    data: &'a [u8],
    /// Bytes loaded into the cache so far, padding included. May run past
    /// `data.len()` once the stream is exhausted.
    pos: usize,
    cache: u64,
    /// Valid bits in `cache`.
    fill: u32,
    policy: TruncationPolicy,
    truncated: bool,
    _order: PhantomData<O>,
}

pub type BitPumpMsb<'a> = BitStream<'a, Msb>;
pub type BitPumpMsb32<'a> = BitStream<'a, Msb32>;
pub type BitPumpLsb<'a> = BitStream<'a, Lsb>;

impl<'a, O: BitOrder> BitStream<'a, O> {
    /// Tolerant reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_policy(data, TruncationPolicy::Tolerant)
    }

    pub fn with_policy(data: &'a [u8], policy: TruncationPolicy) -> Self {
        Self {
            data,
            pos: 0,
            cache: 0,
            fill: 0,
            policy,
            truncated: false,
            _order: PhantomData,
        }
    }

    /// Load whole chunks until another one would not fit.
    #[inline]
    fn refill(&mut self) {
        let chunk_bits = (O::CHUNK * 8) as u32;
        while self.fill + chunk_bits <= 64 {
            let mut tmp = [0u8; 4];
            let start = self.pos.min(self.data.len());
            let end = self.pos.saturating_add(O::CHUNK).min(self.data.len());
            tmp[..end - start].copy_from_slice(&self.data[start..end]);
            self.cache = O::insert(self.cache, self.fill, O::load(&tmp[..O::CHUNK]));
            self.fill += chunk_bits;
            self.pos += O::CHUNK;
        }
    }

    /// Bits consumed from the start of the stream.
    pub fn bit_position(&self) -> u64 {
        self.pos as u64 * 8 - self.fill as u64
    }

    /// Bytes consumed, rounded up to the next whole byte.
    pub fn byte_position(&self) -> usize {
        self.bit_position().div_ceil(8) as usize
    }

    /// Real bits not yet consumed.
    pub fn remaining_bits(&self) -> u64 {
        (self.data.len() as u64 * 8).saturating_sub(self.bit_position())
    }

    /// Account for `n` bits about to be consumed.
    #[inline]
    fn check_overread(&mut self, n: u32) -> Result<()> {
        let end = self.bit_position() + n as u64;
        if end > self.data.len() as u64 * 8 {
            if self.policy.is_strict() {
                return Err(RawError::out_of_bounds(
                    (self.bit_position() / 8) as usize,
                    (n as usize).div_ceil(8),
                    self.data.len(),
                ));
            }
            self.truncated = true;
        }
        Ok(())
    }
}

impl<O: BitOrder> BitPump for BitStream<'_, O> {
    #[inline]
    fn get_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        if self.fill < n {
            self.refill();
        }
        self.check_overread(n)?;
        let value = O::peek(self.cache, self.fill, n);
        self.cache = O::consume(self.cache, n);
        self.fill -= n;
        Ok(value)
    }

    fn skip_bits(&mut self, n: u32) -> Result<()> {
        if n <= self.fill {
            self.check_overread(n)?;
            self.cache = O::consume(self.cache, n);
            self.fill -= n;
            return Ok(());
        }

        self.check_overread(n)?;
        // Drain the cache, then step over whole chunks without loading them.
        let mut left = n - self.fill;
        self.cache = 0;
        self.fill = 0;
        let chunk_bits = (O::CHUNK * 8) as u32;
        let chunks = left / chunk_bits;
        self.pos = self.pos.saturating_add(chunks as usize * O::CHUNK);
        left -= chunks * chunk_bits;
        if left > 0 {
            self.refill();
            self.cache = O::consume(self.cache, left);
            self.fill -= left;
        }
        Ok(())
    }

    fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl<O: BitOrder> LookaheadPump for BitStream<'_, O> {
    #[inline]
    fn peek_bits(&mut self, n: u32) -> u32 {
        debug_assert!(n <= 32);
        if n == 0 {
            return 0;
        }
        if self.fill < n {
            self.refill();
        }
        O::peek(self.cache, self.fill, n)
    }
}
