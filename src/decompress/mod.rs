//! Bit-level decoding primitives and the slice scheduler.
//!
//! ## Readers
//!
//! | Reader | Order | Refill |
//! |--------|-------|--------|
//! | [`BitPumpMsb`] | MSB first, byte at a time | 64-bit cache |
//! | [`BitPumpMsb32`] | MSB first, 32-bit LE words | 64-bit cache |
//! | [`BitPumpLsb`] | LSB first, byte at a time | 64-bit cache |
//! | [`PanasonicPump`] | 0x4000-byte shuffled blocks | whole block |
//!
//! ## Pipeline
//!
//! ```text
//! payload bytes
//!       ↓
//! ┌───────────────┐
//! │ SliceScheduler│ ← cuts the image into disjoint slices, runs workers
//! └───────────────┘
//!       ↓ per slice
//! ┌───────────────┐
//! │ BitPump       │ ← bit groups in the format's order
//! └───────────────┘
//!       ↓
//! ┌───────────────┐
//! │ HuffmanTable  │ ← length codes and signed differences (entropy formats)
//! └───────────────┘
//!       ↓
//! SliceWindow rows of the shared OutputPlane
//! ```
//!
//! ## Truncation
//!
//! Readers follow [`TruncationPolicy`](crate::TruncationPolicy): tolerant
//! readers pad with zero bits and latch [`BitPump::is_truncated`], strict
//! readers return [`OutOfBounds`](crate::RawError::OutOfBounds).

mod bit_reader;
mod huffman;
mod pana_pump;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_util;


pub use bit_reader::{
    BitOrder, BitPump, BitPumpLsb, BitPumpMsb, BitPumpMsb32, BitStream, LookaheadPump, Lsb, Msb,
    Msb32,
};
pub use huffman::{extend_difference, HuffmanTable, MAX_CODE_LENGTH, MAX_DIFF_BITS};
pub use pana_pump::{PanasonicPump, BLOCK_SIZE as PANASONIC_BLOCK_SIZE};
pub use scheduler::{Slice, SliceContext, SliceScheduler, SliceWindow};
