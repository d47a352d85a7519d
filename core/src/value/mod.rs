//! Decoded DICOM element values.
//!
//! A [`Value`] is what the VR codec produces when reading an element
//! and what it consumes when writing one.
//! Textual values keep the backslash separator between multiple values,
//! whereas binary numbers are held as arrays.

use crate::dataset::DataSet;
use crate::error::CastValueError;
use crate::header::Tag;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use itertools::Itertools;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;

mod person_name;

pub use person_name::PersonName;

/// An aggregation of one or more elements in a value.
pub type C<T> = SmallVec<[T; 2]>;

/// A decoded element value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No data. Used for zero-length values.
    Empty,
    /// Text of any string VR.
    /// Multiple values are kept separated by backslashes.
    Str(String),
    /// A calendar date (DA).
    Date(NaiveDate),
    /// A time of day (TM).
    Time(NaiveTime),
    /// A date and time with UTC offset (DT).
    DateTime(DateTime<FixedOffset>),
    /// A structured person name (PN).
    PersonName(PersonName),
    /// An age (AS).
    Age(Age),
    /// Attribute tags (AT).
    Tags(C<Tag>),
    /// Signed 16-bit integers (SS).
    I16(C<i16>),
    /// Unsigned 16-bit integers (US).
    U16(C<u16>),
    /// Signed 32-bit integers (SL).
    I32(C<i32>),
    /// Unsigned 32-bit integers (UL).
    U32(C<u32>),
    /// Single precision floats (FL).
    F32(C<f32>),
    /// Double precision floats (FD).
    F64(C<f64>),
    /// Raw bytes (OB, OD, OF, OW, UN).
    Bytes(Vec<u8>),
    /// Sequence items (SQ).
    Items(Vec<DataSet>),
}

/// The kind of a [`Value`], used in error reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// [`Value::Empty`]
    Empty,
    /// [`Value::Str`]
    Str,
    /// [`Value::Date`]
    Date,
    /// [`Value::Time`]
    Time,
    /// [`Value::DateTime`]
    DateTime,
    /// [`Value::PersonName`]
    PersonName,
    /// [`Value::Age`]
    Age,
    /// [`Value::Tags`]
    Tags,
    /// [`Value::I16`]
    I16,
    /// [`Value::U16`]
    U16,
    /// [`Value::I32`]
    I32,
    /// [`Value::U32`]
    U32,
    /// [`Value::F32`]
    F32,
    /// [`Value::F64`]
    F64,
    /// [`Value::Bytes`]
    Bytes,
    /// [`Value::Items`]
    Items,
}

impl Value {
    /// The kind of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Empty => ValueType::Empty,
            Value::Str(_) => ValueType::Str,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::DateTime(_) => ValueType::DateTime,
            Value::PersonName(_) => ValueType::PersonName,
            Value::Age(_) => ValueType::Age,
            Value::Tags(_) => ValueType::Tags,
            Value::I16(_) => ValueType::I16,
            Value::U16(_) => ValueType::U16,
            Value::I32(_) => ValueType::I32,
            Value::U32(_) => ValueType::U32,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Items(_) => ValueType::Items,
        }
    }

    /// Whether the value holds nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Str(s) => s.is_empty(),
            Value::Tags(v) => v.is_empty(),
            Value::I16(v) => v.is_empty(),
            Value::U16(v) => v.is_empty(),
            Value::I32(v) => v.is_empty(),
            Value::U32(v) => v.is_empty(),
            Value::F32(v) => v.is_empty(),
            Value::F64(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Items(v) => v.is_empty(),
            _ => false,
        }
    }

    /// Render the value in its DICOM textual form.
    ///
    /// Dates, times and date-times use the `YYYYMMDD`, `HHMMSS.ffffff`
    /// and `YYYYMMDDHHMMSS.ffffff+0000` patterns,
    /// the latter always normalized to UTC.
    /// Numbers are joined by backslashes.
    pub fn to_str(&self) -> Result<Cow<'_, str>, CastValueError> {
        match self {
            Value::Empty => Ok(Cow::Borrowed("")),
            Value::Str(s) => Ok(Cow::Borrowed(s.as_str())),
            Value::Date(d) => Ok(Cow::Owned(d.format("%Y%m%d").to_string())),
            Value::Time(t) => Ok(Cow::Owned(t.format("%H%M%S%.6f").to_string())),
            Value::DateTime(dt) => Ok(Cow::Owned(
                dt.with_timezone(&Utc)
                    .format("%Y%m%d%H%M%S%.6f+0000")
                    .to_string(),
            )),
            Value::PersonName(p) => Ok(Cow::Owned(p.to_dicom_string())),
            Value::Age(a) => Ok(Cow::Owned(a.to_string())),
            Value::I16(v) => Ok(Cow::Owned(v.iter().join("\\"))),
            Value::U16(v) => Ok(Cow::Owned(v.iter().join("\\"))),
            Value::I32(v) => Ok(Cow::Owned(v.iter().join("\\"))),
            Value::U32(v) => Ok(Cow::Owned(v.iter().join("\\"))),
            Value::F32(v) => Ok(Cow::Owned(v.iter().join("\\"))),
            Value::F64(v) => Ok(Cow::Owned(v.iter().join("\\"))),
            Value::Tags(_) | Value::Bytes(_) | Value::Items(_) => Err(CastValueError {
                requested: "string",
                got: self.value_type(),
            }),
        }
    }

    /// The first value as an unsigned 16-bit integer.
    ///
    /// Other integer types are converted if the number fits,
    /// and text is parsed.
    pub fn uint16(&self) -> Result<u16, CastValueError> {
        let err = || CastValueError {
            requested: "u16",
            got: self.value_type(),
        };
        match self {
            Value::U16(v) => v.first().copied().ok_or_else(err),
            Value::U32(v) => v
                .first()
                .and_then(|x| u16::try_from(*x).ok())
                .ok_or_else(err),
            Value::I16(v) => v
                .first()
                .and_then(|x| u16::try_from(*x).ok())
                .ok_or_else(err),
            Value::I32(v) => v
                .first()
                .and_then(|x| u16::try_from(*x).ok())
                .ok_or_else(err),
            Value::Str(s) => s
                .split('\\')
                .next()
                .and_then(|x| x.trim().parse().ok())
                .ok_or_else(err),
            _ => Err(err()),
        }
    }

    /// The first value as an unsigned 32-bit integer.
    pub fn uint32(&self) -> Result<u32, CastValueError> {
        let err = || CastValueError {
            requested: "u32",
            got: self.value_type(),
        };
        match self {
            Value::U32(v) => v.first().copied().ok_or_else(err),
            Value::U16(v) => v.first().map(|x| u32::from(*x)).ok_or_else(err),
            Value::I16(v) => v
                .first()
                .and_then(|x| u32::try_from(*x).ok())
                .ok_or_else(err),
            Value::I32(v) => v
                .first()
                .and_then(|x| u32::try_from(*x).ok())
                .ok_or_else(err),
            Value::Str(s) => s
                .split('\\')
                .next()
                .and_then(|x| x.trim().parse().ok())
                .ok_or_else(err),
            _ => Err(err()),
        }
    }

    /// The value as a date.
    pub fn to_date(&self) -> Result<NaiveDate, CastValueError> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Str(s) => NaiveDate::parse_from_str(s.trim(), "%Y%m%d").map_err(|_| {
                CastValueError {
                    requested: "date",
                    got: ValueType::Str,
                }
            }),
            _ => Err(CastValueError {
                requested: "date",
                got: self.value_type(),
            }),
        }
    }
}

macro_rules! impl_from_number {
    ($typ: ty, $variant: ident) => {
        impl From<$typ> for Value {
            fn from(value: $typ) -> Self {
                Value::$variant(smallvec::smallvec![value])
            }
        }

        impl From<C<$typ>> for Value {
            fn from(value: C<$typ>) -> Self {
                Value::$variant(value)
            }
        }

        impl From<Vec<$typ>> for Value {
            fn from(value: Vec<$typ>) -> Self {
                Value::$variant(C::from_vec(value))
            }
        }
    };
}

impl_from_number!(i16, I16);
impl_from_number!(u16, U16);
impl_from_number!(i32, I32);
impl_from_number!(u32, U32);
impl_from_number!(f32, F32);
impl_from_number!(f64, F64);
impl_from_number!(Tag, Tags);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<PersonName> for Value {
    fn from(value: PersonName) -> Self {
        Value::PersonName(value)
    }
}

impl From<Age> for Value {
    fn from(value: Age) -> Self {
        Value::Age(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<DataSet>> for Value {
    fn from(value: Vec<DataSet>) -> Self {
        Value::Items(value)
    }
}

/// Unit of an age string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AgeUnit {
    /// `D`
    Days,
    /// `W`
    Weeks,
    /// `M`
    Months,
    /// `Y`
    Years,
}

/// An age, as encoded by the AS value representation (`nnnU`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Age {
    /// Number of units, at most 999.
    pub count: u16,
    /// The unit of the count.
    pub unit: AgeUnit,
}

impl Age {
    /// Create an age of the given count and unit.
    pub fn new(count: u16, unit: AgeUnit) -> Self {
        Age { count, unit }
    }

    /// Parse the 4-character `nnnU` form.
    pub fn parse(text: &str) -> Option<Age> {
        let text = text.trim();
        if text.len() != 4 || !text.is_ascii() {
            return None;
        }
        let (digits, unit) = text.split_at(3);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let count = digits.parse().ok()?;
        let unit = match unit {
            "D" => AgeUnit::Days,
            "W" => AgeUnit::Weeks,
            "M" => AgeUnit::Months,
            "Y" => AgeUnit::Years,
            _ => return None,
        };
        Some(Age { count, unit })
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            AgeUnit::Days => 'D',
            AgeUnit::Weeks => 'W',
            AgeUnit::Months => 'M',
            AgeUnit::Years => 'Y',
        };
        write!(f, "{:03}{}", self.count, unit)
    }
}
