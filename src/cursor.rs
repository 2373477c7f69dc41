//! Bounds-checked byte cursor.
//!
//! Every read validates `position + size <= len` before touching the
//! buffer. A failed read returns [`RawError::OutOfBounds`] and leaves the
//! position where it was.

use crate::error::{RawError, Result};

/// Byte order used for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Cursor over a borrowed byte region.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    order: Endianness,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], order: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    /// Cursor over `len` bytes starting at `offset` of `data`.
    pub fn sub(data: &'a [u8], offset: usize, len: usize, order: Endianness) -> Result<Self> {
        let end = checked_end(offset, len, data.len())?;
        Ok(Self::new(&data[offset..end], order))
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn set_order(&mut self, order: Endianness) {
        self.order = order;
    }

    /// Validated length of the underlying region.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unread part of the region.
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Whether `len` bytes at absolute `offset` are inside the region.
    pub fn is_valid(&self, offset: usize, len: usize) -> bool {
        checked_end(offset, len, self.data.len()).is_ok()
    }

    /// Move to an absolute position. `pos == len` is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(RawError::out_of_bounds(pos, 0, self.data.len()));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance by `count` bytes.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        let end = checked_end(self.pos, count, self.data.len())?;
        self.pos = end;
        Ok(())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = checked_end(self.pos, len, self.data.len())?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_u16_with(self.order)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_u32_with(self.order)
    }

    /// Read a u16 in an explicit byte order, ignoring the cursor default.
    #[inline]
    pub fn read_u16_with(&mut self, order: Endianness) -> Result<u16> {
        let bytes = self.take::<2>()?;
        Ok(match order {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        })
    }

    /// Read a u32 in an explicit byte order, ignoring the cursor default.
    #[inline]
    pub fn read_u32_with(&mut self, order: Endianness) -> Result<u32> {
        let bytes = self.take::<4>()?;
        Ok(match order {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Read a 4-byte identifier such as `SECd`.
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        self.take::<4>()
    }

    /// Read a u32 at an absolute offset without moving the cursor.
    pub fn peek_u32_at(&self, offset: usize) -> Result<u32> {
        let mut peek = self.clone();
        peek.seek(offset)?;
        peek.read_u32()
    }
}

/// `offset + len`, provided it does not exceed `available`.
#[inline]
pub(crate) fn checked_end(offset: usize, len: usize, available: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(end),
        _ => Err(RawError::out_of_bounds(offset, len, available)),
    }
}
