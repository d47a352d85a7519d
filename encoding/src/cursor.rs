//! Endian-aware byte cursors.
//!
//! [`ReadCursor`] walks a shared byte buffer
//! and can hand out bounded sub-cursors with [`ReadCursor::more`],
//! which is how a single PDV payload or sequence item is isolated
//! without copying.
//! [`WriteCursor`] appends to an owned, growable buffer.
//!
//! Both cursors carry a byte order which applies to every multi-byte read or write.
//! Nested routines that need a different byte order
//! should go through [`ReadCursor::scoped`] or [`WriteCursor::scoped`],
//! which restore the caller's byte order on return.

use crate::text;
use byteordered::{ByteOrdered, Endianness};
use bytes::Bytes;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::fmt::Write as _;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display(
        "unexpected end of data: wanted {} bytes at position {}, but only {} available",
        wanted,
        position,
        available
    ))]
    UnexpectedEnd {
        wanted: usize,
        position: usize,
        available: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("cannot move back {} bytes from position {}", by, position))]
    Rewind {
        by: usize,
        position: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("could not read primitive value"))]
    ReadValue {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("could not write primitive value"))]
    WriteValue {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("invalid hexadecimal string `{}`", text))]
    InvalidHex { text: String, backtrace: Backtrace },
    #[snafu(display("could not encode text"))]
    EncodeText {
        #[snafu(backtrace)]
        source: text::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A read cursor over a shared byte buffer.
#[derive(Debug, Clone)]
pub struct ReadCursor {
    buf: Bytes,
    pos: usize,
    endianness: Endianness,
}

impl ReadCursor {
    /// Create a cursor at the start of the given buffer.
    pub fn new(buf: impl Into<Bytes>, endianness: Endianness) -> Self {
        ReadCursor {
            buf: buf.into(),
            pos: 0,
            endianness,
        }
    }

    /// The byte order currently in effect.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Change the byte order for subsequent reads.
    #[inline]
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Run `f` with the given byte order,
    /// restoring the previous byte order afterwards.
    pub fn scoped<F, R>(&mut self, endianness: Endianness, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let old = std::mem::replace(&mut self.endianness, endianness);
        let out = f(self);
        self.endianness = old;
        out
    }

    /// The current read position, relative to the start of this cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The total number of bytes covered by this cursor.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the cursor covers no bytes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The number of bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether all bytes have been read.
    #[inline]
    pub fn end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Move back to the start of the buffer.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Advance the position without reading.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Move the position back by `n` bytes.
    pub fn rewind(&mut self, n: usize) -> Result<()> {
        ensure!(
            n <= self.pos,
            RewindSnafu {
                by: n,
                position: self.pos
            }
        );
        self.pos -= n;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let available = self.remaining();
        ensure!(
            n <= available,
            UnexpectedEndSnafu {
                wanted: n,
                position: self.pos,
                available,
            }
        );
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let e = self.endianness;
        ByteOrdered::runtime(self.take(2)?, e)
            .read_u16()
            .context(ReadValueSnafu)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let e = self.endianness;
        ByteOrdered::runtime(self.take(2)?, e)
            .read_i16()
            .context(ReadValueSnafu)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let e = self.endianness;
        ByteOrdered::runtime(self.take(4)?, e)
            .read_u32()
            .context(ReadValueSnafu)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let e = self.endianness;
        ByteOrdered::runtime(self.take(4)?, e)
            .read_i32()
            .context(ReadValueSnafu)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let e = self.endianness;
        ByteOrdered::runtime(self.take(4)?, e)
            .read_f32()
            .context(ReadValueSnafu)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let e = self.endianness;
        ByteOrdered::runtime(self.take(8)?, e)
            .read_f64()
            .context(ReadValueSnafu)
    }

    /// Read the next 16-bit word without advancing.
    pub fn peek_u16(&self) -> Result<u16> {
        self.clone().read_u16()
    }

    /// Read `n` bytes of text in the default character repertoire.
    pub fn read_ascii(&mut self, n: usize) -> Result<String> {
        Ok(text::decode(self.take(n)?))
    }

    /// Read `n` bytes as a lowercase hexadecimal string.
    pub fn read_hex(&mut self, n: usize) -> Result<String> {
        let bytes = self.take(n)?;
        let mut out = String::with_capacity(n * 2);
        for b in bytes {
            // writing to a String cannot fail
            let _ = write!(out, "{:02x}", b);
        }
        Ok(out)
    }

    /// Read `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        let available = self.remaining();
        ensure!(
            n <= available,
            UnexpectedEndSnafu {
                wanted: n,
                position: self.pos,
                available,
            }
        );
        let out = self.buf.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    /// Split off the next `n` bytes as a separate cursor
    /// with the same byte order, advancing this cursor past them.
    pub fn more(&mut self, n: usize) -> Result<ReadCursor> {
        let endianness = self.endianness;
        let buf = self.read_bytes(n)?;
        Ok(ReadCursor {
            buf,
            pos: 0,
            endianness,
        })
    }

    /// The bytes not yet read.
    pub fn rest(&self) -> Bytes {
        self.buf.slice(self.pos..)
    }
}

/// A write cursor over an owned, growable buffer.
///
/// Reallocation is amortized: the backing storage doubles
/// whenever it runs out of room.
#[derive(Debug, Clone)]
pub struct WriteCursor {
    buf: Vec<u8>,
    endianness: Endianness,
}

impl WriteCursor {
    /// Create an empty write cursor.
    pub fn new(endianness: Endianness) -> Self {
        WriteCursor {
            buf: Vec::new(),
            endianness,
        }
    }

    /// Create an empty write cursor with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize, endianness: Endianness) -> Self {
        WriteCursor {
            buf: Vec::with_capacity(capacity),
            endianness,
        }
    }

    /// The byte order currently in effect.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Change the byte order for subsequent writes.
    #[inline]
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Run `f` with the given byte order,
    /// restoring the previous byte order afterwards.
    pub fn scoped<F, R>(&mut self, endianness: Endianness, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let old = std::mem::replace(&mut self.endianness, endianness);
        let out = f(self);
        self.endianness = old;
        out
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn ordered(&mut self) -> ByteOrdered<&mut Vec<u8>, Endianness> {
        ByteOrdered::runtime(&mut self.buf, self.endianness)
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buf.push(v);
        Ok(())
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.buf.push(v as u8);
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.ordered().write_u16(v).context(WriteValueSnafu)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.ordered().write_i16(v).context(WriteValueSnafu)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.ordered().write_u32(v).context(WriteValueSnafu)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.ordered().write_i32(v).context(WriteValueSnafu)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.ordered().write_f32(v).context(WriteValueSnafu)
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.ordered().write_f64(v).context(WriteValueSnafu)
    }

    /// Write text in the default character repertoire.
    pub fn write_ascii(&mut self, text: &str) -> Result<()> {
        let bytes = text::encode(text).context(EncodeTextSnafu)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Write the bytes described by a hexadecimal string.
    pub fn write_hex(&mut self, hex: &str) -> Result<()> {
        ensure!(hex.len() % 2 == 0, InvalidHexSnafu { text: hex });
        let digits = hex.as_bytes();
        for pair in digits.chunks(2) {
            let byte = std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .context(InvalidHexSnafu { text: hex })?;
            self.buf.push(byte);
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write `n` copies of the same byte.
    pub fn fill(&mut self, byte: u8, n: usize) -> Result<()> {
        self.buf.resize(self.buf.len() + n, byte);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    #[test]
    fn read_in_both_byte_orders() {
        let mut cursor = ReadCursor::new(vec![0x01, 0x02, 0x01, 0x02], Endianness::Little);
        assert_eq!(cursor.read_u16().unwrap(), 0x0201);
        cursor.set_endianness(Endianness::Big);
        assert_eq!(cursor.read_u16().unwrap(), 0x0102);
        assert!(cursor.end());
    }

    #[test]
    fn scoped_read_restores_byte_order() {
        let mut cursor = ReadCursor::new(vec![0, 0, 0, 1], Endianness::Little);
        let v = cursor.scoped(Endianness::Big, |c| c.read_u32()).unwrap();
        assert_eq!(v, 1);
        assert_eq!(cursor.endianness(), Endianness::Little);
    }

    #[test]
    fn sub_cursor_is_bounded() {
        let mut cursor = ReadCursor::new(b"ABCDEFGH".to_vec(), Endianness::Big);
        cursor.skip(2).unwrap();
        let mut sub = cursor.more(3).unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.read_ascii(3).unwrap(), "CDE");
        assert!(sub.end());
        assert_matches!(sub.read_u8(), Err(Error::UnexpectedEnd { wanted: 1, .. }));
        assert_eq!(cursor.position(), 5);
        assert_eq!(&cursor.rest()[..], b"FGH");
    }

    #[test]
    fn truncated_read_fails() {
        let mut cursor = ReadCursor::new(vec![0x00, 0x01, 0x02], Endianness::Big);
        assert_matches!(
            cursor.read_u32(),
            Err(Error::UnexpectedEnd {
                wanted: 4,
                available: 3,
                ..
            })
        );
        // nothing consumed
        assert_eq!(cursor.position(), 0);
        cursor.skip(3).unwrap();
        cursor.rewind(2).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_matches!(cursor.rewind(5), Err(Error::Rewind { .. }));
    }

    #[test]
    fn hex_strings() {
        let mut cursor = ReadCursor::new(vec![0xAB, 0x01], Endianness::Little);
        assert_eq!(cursor.read_hex(2).unwrap(), "ab01");

        let mut w = WriteCursor::new(Endianness::Little);
        w.write_hex("20ff").unwrap();
        assert_eq!(w.as_slice(), &[0x20, 0xFF]);
        assert_matches!(w.write_hex("2"), Err(Error::InvalidHex { .. }));
        assert_matches!(w.write_hex("zz"), Err(Error::InvalidHex { .. }));
    }

    #[test]
    fn write_numbers_and_text() {
        let mut w = WriteCursor::new(Endianness::Big);
        w.write_u16(0x0102).unwrap();
        w.scoped(Endianness::Little, |w| w.write_u32(0x0A0B0C0D))
            .unwrap();
        w.write_ascii("OK").unwrap();
        w.fill(0x20, 2).unwrap();
        w.write_f32(1.0).unwrap();
        assert_eq!(
            w.as_slice(),
            &[0x01, 0x02, 0x0D, 0x0C, 0x0B, 0x0A, b'O', b'K', b' ', b' ', 0x3F, 0x80, 0, 0]
        );
        assert_eq!(w.endianness(), Endianness::Big);
    }

    #[test]
    fn floats_round_trip_little_endian() {
        let mut w = WriteCursor::new(Endianness::Little);
        w.write_f64(-2.5).unwrap();
        w.write_i16(-2).unwrap();
        let mut r = ReadCursor::new(w.into_inner(), Endianness::Little);
        assert_eq!(r.read_f64().unwrap(), -2.5);
        assert_eq!(r.read_i16().unwrap(), -2);
    }
}
