//! Write-side field primitives.
//!
//! A [`Field`] is a single typed piece of an outgoing byte layout.
//! PDUs, items and data elements are all described as lists of fields,
//! so that their total length is known before anything is written,
//! and the byte order is only decided by the [`WriteCursor`]
//! that eventually receives them.

use crate::cursor::{self, WriteCursor};
use crate::text;
use byteordered::Endianness;
use bytes::Bytes;
use snafu::{ensure, Backtrace, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("text `{}` does not fit in a field of {} bytes", text, len))]
    TooLong {
        text: String,
        len: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("could not write field"))]
    Write {
        #[snafu(backtrace)]
        source: cursor::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A typed piece of an outgoing byte layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    F32(f32),
    F64(f64),
    /// Text, one byte per character.
    Str(String),
    /// Text right-padded to an exact width.
    Filled { text: String, len: usize, pad: u8 },
    /// Bytes given as a hexadecimal string.
    Hex(String),
    /// Raw bytes.
    Buffer(Bytes),
    /// A run of zero bytes.
    Reserved(usize),
}

impl Field {
    /// Create a text field padded to exactly `len` bytes.
    ///
    /// Fails if the text is longer than the field.
    pub fn filled(text: impl Into<String>, len: usize, pad: u8) -> Result<Field> {
        let text = text.into();
        ensure!(text::encoded_len(&text) <= len, TooLongSnafu { text, len });
        Ok(Field::Filled { text, len, pad })
    }

    /// Create a text field.
    pub fn text(text: impl Into<String>) -> Field {
        Field::Str(text.into())
    }

    /// The number of bytes this field writes.
    pub fn len(&self) -> usize {
        match self {
            Field::U8(_) | Field::I8(_) => 1,
            Field::U16(_) | Field::I16(_) => 2,
            Field::U32(_) | Field::I32(_) | Field::F32(_) => 4,
            Field::F64(_) => 8,
            Field::Str(s) => text::encoded_len(s),
            Field::Filled { len, .. } => *len,
            Field::Hex(h) => h.len() / 2,
            Field::Buffer(b) => b.len(),
            Field::Reserved(n) => *n,
        }
    }

    /// Whether the field writes no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the field holds a number,
    /// so that its bytes depend on the byte order.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Field::U8(_)
                | Field::U16(_)
                | Field::U32(_)
                | Field::I8(_)
                | Field::I16(_)
                | Field::I32(_)
                | Field::F32(_)
                | Field::F64(_)
        )
    }

    /// Write the field at the cursor's position.
    pub fn write(&self, cursor: &mut WriteCursor) -> Result<()> {
        match self {
            Field::U8(v) => cursor.write_u8(*v),
            Field::U16(v) => cursor.write_u16(*v),
            Field::U32(v) => cursor.write_u32(*v),
            Field::I8(v) => cursor.write_i8(*v),
            Field::I16(v) => cursor.write_i16(*v),
            Field::I32(v) => cursor.write_i32(*v),
            Field::F32(v) => cursor.write_f32(*v),
            Field::F64(v) => cursor.write_f64(*v),
            Field::Str(s) => cursor.write_ascii(s),
            Field::Filled { text, len, pad } => {
                let n = text::encoded_len(text);
                ensure!(
                    n <= *len,
                    TooLongSnafu {
                        text: text.as_str(),
                        len: *len
                    }
                );
                cursor
                    .write_ascii(text)
                    .and_then(|_| cursor.fill(*pad, len - n))
            }
            Field::Hex(h) => cursor.write_hex(h),
            Field::Buffer(b) => cursor.write_bytes(b),
            Field::Reserved(n) => cursor.fill(0, *n),
        }
        .context(WriteSnafu)
    }
}

/// The total number of bytes a list of fields writes.
pub fn fields_len(fields: &[Field]) -> usize {
    fields.iter().map(Field::len).sum()
}

/// Write all fields in order.
pub fn write_fields(cursor: &mut WriteCursor, fields: &[Field]) -> Result<()> {
    for field in fields {
        field.write(cursor)?;
    }
    Ok(())
}

/// Write all fields into a freshly allocated buffer
/// of exactly the right size.
pub fn fields_to_vec(fields: &[Field], endianness: Endianness) -> Result<Vec<u8>> {
    let mut cursor = WriteCursor::with_capacity(fields_len(fields), endianness);
    write_fields(&mut cursor, fields)?;
    Ok(cursor.into_inner())
}
