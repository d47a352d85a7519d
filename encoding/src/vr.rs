//! Value codec for each value representation.
//!
//! [`read_value`] turns the value bytes of an element into a [`Value`],
//! and [`value_fields`] lays a [`Value`] out as write-side [`Field`]s.
//! The rules of each representation
//! (fixed width, maximum length, padding byte, whitespace handling)
//! are described by a [`VrDescriptor`].
//!
//! Decoded values take a canonical form:
//! text is held as a [`Value::Str`], except for
//! dates (`DA`), ages (`AS`) and single person names (`PN`),
//! which are parsed when they are well formed.
//! Binary numbers are always held as arrays.

use crate::cursor::{self, ReadCursor};
use crate::element::ElementCodec;
use crate::error::{
    FixedLengthMismatchSnafu, ReadSnafu, Result, UnsupportedValueSnafu, ValueTooLongSnafu,
    WriteSnafu,
};
use crate::field::{fields_len, Field};
use crate::text;
use bytes::Bytes;
use netdicom_core::chrono::NaiveDate;
use netdicom_core::dictionary::DataDictionary;
use netdicom_core::value::{Age, PersonName, Value, C};
use netdicom_core::{Tag, VR};
use snafu::{ensure, OptionExt, ResultExt};
use std::borrow::Cow;
use std::fmt;

/// Length value marking an undefined length.
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Whitespace removed from decoded text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Trim {
    /// Keep the text as is.
    None,
    /// Trim leading and trailing whitespace.
    Both,
    /// Trim trailing whitespace only.
    End,
}

/// The encoding rules of a value representation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VrDescriptor {
    pub vr: VR,
    /// Exact width of a single value, for fixed-width representations.
    pub fixed_len: Option<u32>,
    /// Maximum number of characters in a single value.
    /// For person names this applies to each name component.
    pub max_len: Option<usize>,
    /// Byte appended to odd-length values.
    pub pad: u8,
    /// Whitespace trimmed from decoded text.
    pub trim: Trim,
}

const fn text_vr(vr: VR, max_len: Option<usize>, trim: Trim) -> VrDescriptor {
    VrDescriptor {
        vr,
        fixed_len: None,
        max_len,
        pad: b' ',
        trim,
    }
}

const fn fixed_vr(vr: VR, len: u32) -> VrDescriptor {
    VrDescriptor {
        vr,
        fixed_len: Some(len),
        max_len: None,
        pad: 0,
        trim: Trim::None,
    }
}

const fn bytes_vr(vr: VR) -> VrDescriptor {
    VrDescriptor {
        vr,
        fixed_len: None,
        max_len: None,
        pad: 0,
        trim: Trim::None,
    }
}

/// Obtain the encoding rules of the given value representation.
pub fn descriptor(vr: VR) -> VrDescriptor {
    match vr {
        VR::AE => text_vr(vr, Some(16), Trim::Both),
        VR::AS => VrDescriptor {
            fixed_len: Some(4),
            ..text_vr(vr, None, Trim::Both)
        },
        VR::AT => fixed_vr(vr, 4),
        VR::CS => text_vr(vr, Some(16), Trim::Both),
        // ranges are allowed in queries
        VR::DA => text_vr(vr, Some(18), Trim::Both),
        VR::DS => text_vr(vr, Some(16), Trim::Both),
        VR::DT => text_vr(vr, Some(26), Trim::End),
        VR::FL => fixed_vr(vr, 4),
        VR::FD => fixed_vr(vr, 8),
        VR::IS => text_vr(vr, Some(12), Trim::Both),
        VR::LO => text_vr(vr, Some(64), Trim::Both),
        VR::LT => text_vr(vr, Some(10240), Trim::End),
        VR::OB | VR::OD | VR::OF | VR::OW | VR::UN => bytes_vr(vr),
        VR::PN => text_vr(vr, Some(64), Trim::End),
        VR::SH => text_vr(vr, Some(16), Trim::Both),
        VR::SL => fixed_vr(vr, 4),
        VR::SQ => bytes_vr(vr),
        VR::SS => fixed_vr(vr, 2),
        VR::ST => text_vr(vr, Some(1024), Trim::End),
        VR::TM => text_vr(vr, Some(16), Trim::End),
        VR::UC => text_vr(vr, None, Trim::End),
        VR::UI => VrDescriptor {
            pad: 0,
            ..text_vr(vr, Some(64), Trim::End)
        },
        VR::UL => fixed_vr(vr, 4),
        VR::UR => text_vr(vr, None, Trim::End),
        VR::US => fixed_vr(vr, 2),
        VR::UT => text_vr(vr, None, Trim::End),
    }
}

/// Whether the explicit VR header of this representation
/// has two reserved bytes followed by a 32-bit length,
/// rather than a 16-bit length.
pub fn has_long_explicit_length(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OW | VR::SQ | VR::UC | VR::UN | VR::UR | VR::UT
    )
}

impl VrDescriptor {
    /// The value decoded from a zero-length fixed-width element.
    fn default_value(&self) -> Value {
        match self.vr {
            VR::US => Value::from(0u16),
            VR::SS => Value::from(0i16),
            VR::UL => Value::from(0u32),
            VR::SL => Value::from(0i32),
            VR::FL => Value::from(0f32),
            VR::FD => Value::from(0f64),
            VR::AT => Value::Tags(C::new()),
            _ => Value::Str(String::new()),
        }
    }
}

/// Decode the value of an element with the given representation and length,
/// starting at the cursor's position.
///
/// Sequences and undefined-length values are handed back to the codec
/// for recursive decoding.
pub fn read_value<D>(
    codec: &ElementCodec<D>,
    vr: VR,
    cursor: &mut ReadCursor,
    length: u32,
) -> Result<Value>
where
    D: DataDictionary,
{
    if vr == VR::SQ || length == UNDEFINED_LENGTH {
        return codec.read_sequence(cursor, length).map(Value::Items);
    }

    let desc = descriptor(vr);
    if let Some(width) = desc.fixed_len {
        if length == 0 {
            return Ok(desc.default_value());
        }
        let repeats = vr.is_binary_number() || vr == VR::AT;
        ensure!(
            length == width || (repeats && length % width == 0),
            FixedLengthMismatchSnafu {
                vr,
                expected: width,
                got: length
            }
        );
    }

    let len = length as usize;
    let value = match vr {
        VR::AT => {
            let mut tags = C::new();
            for _ in 0..len / 4 {
                let group = cursor.read_u16().context(ReadSnafu { what: "tag value" })?;
                let element = cursor.read_u16().context(ReadSnafu { what: "tag value" })?;
                tags.push(Tag(group, element));
            }
            Value::Tags(tags)
        }
        VR::US => Value::U16(read_array(cursor, len / 2, ReadCursor::read_u16)?),
        VR::SS => Value::I16(read_array(cursor, len / 2, ReadCursor::read_i16)?),
        VR::UL => Value::U32(read_array(cursor, len / 4, ReadCursor::read_u32)?),
        VR::SL => Value::I32(read_array(cursor, len / 4, ReadCursor::read_i32)?),
        VR::FL => Value::F32(read_array(cursor, len / 4, ReadCursor::read_f32)?),
        VR::FD => Value::F64(read_array(cursor, len / 8, ReadCursor::read_f64)?),
        VR::OB | VR::OD | VR::OF | VR::OW | VR::UN => Value::Bytes(
            cursor
                .read_bytes(len)
                .context(ReadSnafu {
                    what: "binary value",
                })?
                .to_vec(),
        ),
        _ => {
            let text = read_text(cursor, len, desc.trim)?;
            text_value(vr, text)
        }
    };
    Ok(value)
}

fn read_array<T>(
    cursor: &mut ReadCursor,
    n: usize,
    read: fn(&mut ReadCursor) -> cursor::Result<T>,
) -> Result<C<T>> {
    (0..n)
        .map(|_| read(cursor))
        .collect::<cursor::Result<C<T>>>()
        .context(ReadSnafu {
            what: "numeric value",
        })
}

/// Read null-padded text: a single trailing null byte is dropped
/// before trimming.
fn read_text(cursor: &mut ReadCursor, len: usize, trim: Trim) -> Result<String> {
    let mut text = cursor
        .read_ascii(len)
        .context(ReadSnafu { what: "text value" })?;
    if text.ends_with('\0') {
        text.pop();
    }
    Ok(match trim {
        Trim::None => text,
        Trim::Both => text.trim().to_owned(),
        Trim::End => {
            let n = text.trim_end().len();
            text.truncate(n);
            text
        }
    })
}

fn text_value(vr: VR, text: String) -> Value {
    match vr {
        VR::DA => match parse_date(&text) {
            Some(date) => Value::Date(date),
            None => Value::Str(text),
        },
        VR::AS => match Age::parse(&text) {
            Some(age) => Value::Age(age),
            None => Value::Str(text),
        },
        VR::PN if !text.is_empty() && !text.contains('\\') => {
            Value::PersonName(PersonName::parse(&text))
        }
        _ => Value::Str(text),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y%m%d").ok()
}

fn unsupported<T>(vr: VR, value: &Value) -> Result<T> {
    UnsupportedValueSnafu {
        vr,
        got: value.value_type(),
    }
    .fail()
}

/// Lay out a value as fields, padded to an even length.
///
/// Sequences are handed back to the codec,
/// which writes them with undefined lengths.
pub fn value_fields<D>(codec: &ElementCodec<D>, vr: VR, value: &Value) -> Result<Vec<Field>>
where
    D: DataDictionary,
{
    let desc = descriptor(vr);
    let mut fields = match (vr, value) {
        (VR::SQ, Value::Items(items)) => return codec.sequence_fields(items),
        (VR::SQ, Value::Empty) => return codec.sequence_fields(&[]),
        (VR::SQ, _) => return unsupported(vr, value),
        (_, Value::Empty) => Vec::new(),
        (VR::AT, Value::Tags(tags)) => tags
            .iter()
            .flat_map(|t| [Field::U16(t.group()), Field::U16(t.element())])
            .collect(),
        (VR::US | VR::OW, Value::U16(v)) => v.iter().map(|x| Field::U16(*x)).collect(),
        (VR::SS, Value::I16(v)) => v.iter().map(|x| Field::I16(*x)).collect(),
        (VR::UL, Value::U32(v)) => v.iter().map(|x| Field::U32(*x)).collect(),
        (VR::SL, Value::I32(v)) => v.iter().map(|x| Field::I32(*x)).collect(),
        (VR::FL | VR::OF, Value::F32(v)) => v.iter().map(|x| Field::F32(*x)).collect(),
        (VR::FD | VR::OD, Value::F64(v)) => v.iter().map(|x| Field::F64(*x)).collect(),
        (VR::OB | VR::OD | VR::OF | VR::OW | VR::UN, Value::Bytes(b)) => {
            vec![Field::Buffer(Bytes::copy_from_slice(b))]
        }
        (VR::OB | VR::UN, Value::Str(s)) => vec![Field::text(s.as_str())],
        (
            VR::AT
            | VR::US
            | VR::SS
            | VR::UL
            | VR::SL
            | VR::FL
            | VR::FD
            | VR::OB
            | VR::OD
            | VR::OF
            | VR::OW
            | VR::UN,
            _,
        ) => return unsupported(vr, value),
        _ => {
            let text = text_of(vr, value)?;
            check_text(&desc, &text)?;
            // a single AE value, empty or not, always takes 16 bytes;
            // multiple values are only padded to even length
            if vr == VR::AE && !text.contains('\\') {
                vec![Field::filled(text.into_owned(), 16, desc.pad)
                    .context(WriteSnafu { what: "AE value" })?]
            } else {
                vec![Field::text(text.into_owned())]
            }
        }
    };
    if fields_len(&fields) % 2 == 1 {
        fields.push(Field::U8(desc.pad));
    }
    Ok(fields)
}

/// The textual form of a value, if the representation accepts it.
fn text_of(vr: VR, value: &Value) -> Result<Cow<'_, str>> {
    match (vr, value) {
        (VR::DS, Value::F32(v)) => return Ok(Cow::Owned(join_decimals(v))),
        (VR::DS, Value::F64(v)) => return Ok(Cow::Owned(join_decimals(v))),
        _ => {}
    }
    let accepted = matches!(
        (vr, value),
        (_, Value::Str(_))
            | (VR::DA, Value::Date(_))
            | (VR::TM, Value::Time(_))
            | (VR::DT, Value::DateTime(_))
            | (VR::PN, Value::PersonName(_))
            | (VR::AS, Value::Age(_))
            | (
                VR::IS,
                Value::I16(_) | Value::U16(_) | Value::I32(_) | Value::U32(_)
            )
    );
    if !accepted {
        return unsupported(vr, value);
    }
    value.to_str().ok().context(UnsupportedValueSnafu {
        vr,
        got: value.value_type(),
    })
}

fn join_decimals<T>(values: &[T]) -> String
where
    T: Copy + fmt::Display + fmt::LowerExp,
{
    values
        .iter()
        .map(|v| format_decimal(*v))
        .collect::<Vec<_>>()
        .join("\\")
}

/// Format a number as a decimal string of at most 16 characters,
/// switching to scientific notation when needed.
fn format_decimal<T>(v: T) -> String
where
    T: Copy + fmt::Display + fmt::LowerExp,
{
    let plain = v.to_string();
    if plain.len() <= 16 {
        return plain;
    }
    for precision in (0..=10).rev() {
        let s = format!("{:.*e}", precision, v);
        if s.len() <= 16 {
            return s;
        }
    }
    format!("{:e}", v)
}

fn check_text(desc: &VrDescriptor, text: &str) -> Result<()> {
    if let Some(width) = desc.fixed_len {
        let len = text::encoded_len(text);
        ensure!(
            len == 0 || len == width as usize,
            FixedLengthMismatchSnafu {
                vr: desc.vr,
                expected: width,
                got: len as u32
            }
        );
        return Ok(());
    }
    let Some(max) = desc.max_len else {
        return Ok(());
    };
    for value in text.split('\\') {
        if desc.vr == VR::PN {
            for component in value.split(['=', '^']) {
                check_len(desc.vr, max, component)?;
            }
        } else {
            check_len(desc.vr, max, value)?;
        }
    }
    Ok(())
}

fn check_len(vr: VR, max: usize, value: &str) -> Result<()> {
    ensure!(
        text::encoded_len(value) <= max,
        ValueTooLongSnafu { vr, max, value }
    );
    Ok(())
}
