//! Bounds-checked reads over the input buffer.

use std::mem;

use bytemuck::AnyBitPattern;

use crate::error::Eof;

/// A position-tracking view over an immutable byte buffer.
///
/// All reads are bounds-checked and fail with [`Eof`] instead of panicking. The position only ever
/// moves forward.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// Creates an independent cursor over the same buffer, positioned at `pos`.
    ///
    /// `pos` is clamped to the end of the buffer.
    pub fn sub_cursor_at(&self, pos: usize) -> ByteCursor<'a> {
        ByteCursor {
            buf: self.buf,
            position: pos.min(self.buf.len()),
        }
    }

    /// Restricts the cursor to the next `len` bytes.
    ///
    /// Reads past them fail with [`Eof`], even if the underlying buffer continues.
    pub fn limited(&self, len: usize) -> ByteCursor<'a> {
        let end = self.position.saturating_add(len).min(self.buf.len());
        ByteCursor {
            buf: &self.buf[..end],
            position: self.position,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Returns the bytes from the current position to the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.position..]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    fn eof(&self, needed: usize) -> Eof {
        Eof {
            offset: self.position,
            needed,
        }
    }

    /// Reads the byte `offset` bytes past the current position without advancing.
    pub fn peek_u8_at(&self, offset: usize) -> Result<u8, Eof> {
        match self.remaining().get(offset) {
            Some(&byte) => Ok(byte),
            None => Err(self.eof(offset + 1)),
        }
    }

    #[inline]
    pub fn peek_u8(&self) -> Result<u8, Eof> {
        self.peek_u8_at(0)
    }

    /// Reads a big-endian `u16` without advancing.
    pub fn peek_u16_be(&self) -> Result<u16, Eof> {
        match self.remaining() {
            [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
            _ => Err(self.eof(2)),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, Eof> {
        let byte = self.peek_u8()?;
        self.position += 1;
        Ok(byte)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, Eof> {
        let value = self.peek_u16_be()?;
        self.position += 2;
        Ok(value)
    }

    /// Borrows the next `count` bytes and advances past them.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], Eof> {
        let Some(slice) = self.remaining().get(..count) else {
            return Err(self.eof(count));
        };
        self.position += count;
        Ok(slice)
    }

    /// Moves the cursor forward by `count` bytes.
    pub fn advance(&mut self, count: usize) -> Result<(), Eof> {
        self.read_bytes(count).map(|_| ())
    }

    /// Reinterprets the next bytes as a `T` and advances past them.
    ///
    /// `T` must have an alignment of 1 (it is read directly out of the byte buffer).
    pub fn read_obj<T: AnyBitPattern>(&mut self) -> Result<&'a T, Eof> {
        debug_assert_eq!(mem::align_of::<T>(), 1);

        let bytes = self.read_bytes(mem::size_of::<T>())?;
        Ok(bytemuck::from_bytes(bytes))
    }

    /// Reinterprets the next bytes as `count` consecutive `T`s and advances past them.
    pub fn read_objs<T: AnyBitPattern>(&mut self, count: usize) -> Result<&'a [T], Eof> {
        debug_assert_eq!(mem::align_of::<T>(), 1);

        let byte_count = count.saturating_mul(mem::size_of::<T>());
        let bytes = self.read_bytes(byte_count)?;
        Ok(bytemuck::cast_slice(bytes))
    }
}
