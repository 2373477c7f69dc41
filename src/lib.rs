//! Decoding core for vendor RAW sensor images.
//!
//! Reads a camera file held in memory and fills a 16-bit sample plane,
//! decoding independent slices of the image on a worker pool.
//!
//! ## Supported containers
//!
//! - Chunked section containers (`FOVb` header, section directory in the
//!   trailer) with 8/12/16-bit packed or two-pixel Huffman payloads
//! - Panasonic RW2, compressed 14-pixel blocks or 12-bit unpacked
//!
//! ## Features
//! - `parallel` (default) - Decode slices on a rayon pool
//!
//! ## Example
//!
//! ```rust,ignore
//! use rawpump::{DecodeOptions, RawDecoder};
//!
//! let bytes = std::fs::read("frame.rw2")?;
//! let decoder = RawDecoder::new(&bytes)?;
//! let image = decoder.decode(&DecodeOptions::default().with_threads(4))?;
//! println!("{} bad pixels", image.report.bad_pixels.len());
//! ```

// unsafe is limited to the scheduler's disjoint slice windows, each block
// with a SAFETY comment

pub mod cursor;
pub mod decoders;
pub mod decompress;
pub mod error;
pub mod formats;
pub mod image;
pub mod options;
pub mod parsing;

pub use cursor::{ByteCursor, Endianness};
pub use decoders::{RawDecoder, MAX_DIMENSION};
pub use decompress::{
    BitPump, BitPumpLsb, BitPumpMsb, BitPumpMsb32, HuffmanTable, LookaheadPump, PanasonicPump, Slice,
    SliceScheduler,
};
pub use error::{ErrorKind, RawError, Result};
pub use formats::Signature;
pub use image::{BadPixel, BadPixelList, CfaColor, DecodeReport, OutputPlane, RawImage, RawMetadata};
pub use options::{DecodeOptions, TruncationPolicy};
