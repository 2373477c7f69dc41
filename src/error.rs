//! Error types for container parsing and pixel decoding.
//!
//! This module provides the [`RawError`] type which covers every failure the
//! decoding core can report, from a single out-of-range read up to a failed
//! slice inside the worker pool.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Bounds | [`OutOfBounds`] | A read or seek past the validated buffer |
//! | Container | [`MalformedContainer`] | Bad signature, version, counts or offsets |
//! | Entropy | [`MalformedHuffmanTable`] | Inconsistent canonical code table |
//! | Support | [`UnsupportedVariant`] | Recognized but unimplemented layout |
//! | Layout | [`InvalidLayout`] | Slice geometry violating the scheduler invariants |
//! | Workers | [`SliceDecodeFailure`] | Any of the above raised inside a slice |
//!
//! ## Example
//!
//! ```rust,ignore
//! use rawpump::{ErrorKind, RawDecoder, RawError};
//!
//! match RawDecoder::new(&bytes) {
//!     Ok(decoder) => println!("{}x{}", decoder.metadata().width, decoder.metadata().height),
//!     Err(e) if e.kind() == ErrorKind::MalformedContainer => eprintln!("Not a supported file"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! [`OutOfBounds`]: RawError::OutOfBounds
//! [`MalformedContainer`]: RawError::MalformedContainer
//! [`MalformedHuffmanTable`]: RawError::MalformedHuffmanTable
//! [`UnsupportedVariant`]: RawError::UnsupportedVariant
//! [`InvalidLayout`]: RawError::InvalidLayout
//! [`SliceDecodeFailure`]: RawError::SliceDecodeFailure

use thiserror::Error;

/// Error type for decoding operations.
#[derive(Debug, Error)]
pub enum RawError {
    /// A read of `len` bytes at `offset` would cross the end of the
    /// `available` bytes. The read was not performed.
    #[error("Out of bounds: {len} bytes at offset {offset} (buffer holds {available})")]
    OutOfBounds {
        /// Requested start offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Validated buffer length.
        available: usize,
    },

    /// The container structure is invalid.
    ///
    /// Covers bad signatures, versions below the supported minimum, entry
    /// counts above the sanity ceiling and offsets that do not resolve.
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// A canonical Huffman table could not be built or a code walked past
    /// the longest length without matching.
    #[error("Malformed Huffman table: {0}")]
    MalformedHuffmanTable(String),

    /// The file is recognized but uses a compression or layout combination
    /// this crate does not implement.
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Slice geometry handed to the scheduler is unusable, e.g. two slices
    /// share destination pixels.
    #[error("Invalid slice layout: {0}")]
    InvalidLayout(String),

    /// A slice failed inside a worker. The wrapped error is the first one
    /// reported; other slices were allowed to finish.
    #[error("Slice {slice} failed: {source}")]
    SliceDecodeFailure {
        /// Index of the failing slice in the scheduler's slice list.
        slice: usize,
        /// Underlying error.
        #[source]
        source: Box<RawError>,
    },
}

/// Flat discriminant of [`RawError`], with slice failures resolved to the
/// kind of their underlying error by [`RawError::root_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfBounds,
    MalformedContainer,
    MalformedHuffmanTable,
    UnsupportedVariant,
    InvalidLayout,
    SliceDecodeFailure,
}

impl RawError {
    pub(crate) fn out_of_bounds(offset: usize, len: usize, available: usize) -> Self {
        Self::OutOfBounds {
            offset,
            len,
            available,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedContainer(msg.into())
    }

    pub(crate) fn huffman(msg: impl Into<String>) -> Self {
        Self::MalformedHuffmanTable(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedVariant(msg.into())
    }

    pub(crate) fn layout(msg: impl Into<String>) -> Self {
        Self::InvalidLayout(msg.into())
    }

    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::MalformedContainer(_) => ErrorKind::MalformedContainer,
            Self::MalformedHuffmanTable(_) => ErrorKind::MalformedHuffmanTable,
            Self::UnsupportedVariant(_) => ErrorKind::UnsupportedVariant,
            Self::InvalidLayout(_) => ErrorKind::InvalidLayout,
            Self::SliceDecodeFailure { .. } => ErrorKind::SliceDecodeFailure,
        }
    }

    /// Kind of the innermost error, looking through slice failures.
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            Self::SliceDecodeFailure { source, .. } => source.root_kind(),
            other => other.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RawError>;
