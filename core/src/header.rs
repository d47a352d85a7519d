//! This module contains the data types of a DICOM element header:
//! tags, value representations and value lengths,
//! as well as the [`DataElement`] type which binds them to a value.

use crate::dictionary::VM;
use crate::error::CastValueError;
use crate::value::{Value, ValueType};
use crate::DataSet;
use std::borrow::Cow;
use std::fmt;
use std::str::{from_utf8, FromStr};

/// An enum type for a DICOM value representation.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    /// Application Entity
    AE,
    /// Age String
    AS,
    /// Attribute Tag
    AT,
    /// Code String
    CS,
    /// Date
    DA,
    /// Decimal String
    DS,
    /// Date Time
    DT,
    /// Floating Point Single
    FL,
    /// Floating Point Double
    FD,
    /// Integer String
    IS,
    /// Long String
    LO,
    /// Long Text
    LT,
    /// Other Byte
    OB,
    /// Other Double
    OD,
    /// Other Float
    OF,
    /// Other Word
    OW,
    /// Person Name
    PN,
    /// Short String
    SH,
    /// Signed Long
    SL,
    /// Sequence of Items
    SQ,
    /// Signed Short
    SS,
    /// Short Text
    ST,
    /// Time
    TM,
    /// Unlimited Characters
    UC,
    /// Unique Identifier (UID)
    UI,
    /// Unsigned Long
    UL,
    /// Unknown
    UN,
    /// Universal Resource Identifier or Universal Resource Locator (URI/URL)
    UR,
    /// Unsigned Short
    US,
    /// Unlimited Text
    UT,
}

impl VR {
    /// Obtain the value representation corresponding to the given two bytes.
    /// Each byte should represent an alphabetic character in upper case.
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        from_utf8(chars.as_ref())
            .ok()
            .and_then(|s| VR::from_str(s).ok())
    }

    /// Retrieve a string representation of this VR.
    pub fn to_string(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UC => "UC",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            UR => "UR",
            US => "US",
            UT => "UT",
        }
    }

    /// Retrieve a copy of this VR's byte representation.
    /// The function returns two alphabetic characters in upper case.
    pub fn to_bytes(self) -> [u8; 2] {
        let bytes = self.to_string().as_bytes();
        [bytes[0], bytes[1]]
    }

    /// Whether the value is a sequence of binary numbers
    /// (FL, FD, SL, SS, UL, US),
    /// which expand into an array when the value length
    /// exceeds the width of a single number.
    pub fn is_binary_number(self) -> bool {
        matches!(self, VR::FL | VR::FD | VR::SL | VR::SS | VR::UL | VR::US)
    }

    /// Whether this is the sequence of items representation.
    #[inline]
    pub fn is_sequence(self) -> bool {
        self == VR::SQ
    }
}

/// Obtain the value representation corresponding to the given string.
/// The string should hold exactly two UTF-8 encoded alphabetic characters
/// in upper case, otherwise no match is made.
impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> std::result::Result<Self, Self::Err> {
        use VR::*;
        match string {
            "AE" => Ok(AE),
            "AS" => Ok(AS),
            "AT" => Ok(AT),
            "CS" => Ok(CS),
            "DA" => Ok(DA),
            "DS" => Ok(DS),
            "DT" => Ok(DT),
            "FL" => Ok(FL),
            "FD" => Ok(FD),
            "IS" => Ok(IS),
            "LO" => Ok(LO),
            "LT" => Ok(LT),
            "OB" => Ok(OB),
            "OD" => Ok(OD),
            "OF" => Ok(OF),
            "OW" => Ok(OW),
            "PN" => Ok(PN),
            "SH" => Ok(SH),
            "SL" => Ok(SL),
            "SQ" => Ok(SQ),
            "SS" => Ok(SS),
            "ST" => Ok(ST),
            "TM" => Ok(TM),
            "UC" => Ok(UC),
            "UI" => Ok(UI),
            "UL" => Ok(UL),
            "UN" => Ok(UN),
            "UR" => Ok(UR),
            "US" => Ok(US),
            "UT" => Ok(UT),
            _ => Err("no such value representation"),
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(VR::to_string(*self))
    }
}

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The data type for DICOM data element tags.
///
/// Tags are ordered by group, then by element,
/// which is also the order in which elements are encoded.
/// Both `(u16, u16)` and `u32` can be converted to this type.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// Sequence item tag `(FFFE,E000)`.
    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    /// Item delimitation tag `(FFFE,E00D)`.
    pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
    /// Sequence delimitation tag `(FFFE,E0DD)`.
    pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// The 32-bit form of the tag, `(group << 16) | element`.
    #[inline]
    pub fn to_u32(self) -> u32 {
        (u32::from(self.0) << 16) | u32::from(self.1)
    }

    /// Whether this is one of the item or delimitation tags in group `FFFE`.
    #[inline]
    pub fn is_item_related(self) -> bool {
        self.0 == 0xFFFE
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from(value: (u16, u16)) -> Tag {
        Tag(value.0, value.1)
    }
}

impl From<u32> for Tag {
    #[inline]
    fn from(value: u32) -> Tag {
        Tag((value >> 16) as u16, value as u16)
    }
}

/// A type for representing a value length, in bytes,
/// as found in data element and sequence item headers.
/// An internal value of `0xFFFF_FFFF` represents an undefined length,
/// in which case the extent of the value is determined
/// by a delimitation item.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Length(pub u32);

const UNDEFINED_LEN: u32 = 0xFFFF_FFFF;

impl Length {
    /// A length that is undefined.
    pub const UNDEFINED: Self = Length(UNDEFINED_LEN);

    /// Create a new defined length.
    #[inline]
    pub fn defined(len: u32) -> Self {
        debug_assert_ne!(len, UNDEFINED_LEN);
        Length(len)
    }

    /// Check whether this length is undefined (unknown).
    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0 == UNDEFINED_LEN
    }

    /// Check whether this length is well defined (not undefined).
    #[inline]
    pub fn is_defined(self) -> bool {
        !self.is_undefined()
    }

    /// Fetch the concrete length value, if available.
    /// Returns `None` if it represents an undefined length.
    #[inline]
    pub fn get(self) -> Option<u32> {
        match self.0 {
            UNDEFINED_LEN => None,
            v => Some(v),
        }
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("Length(Undefined)"),
            l => f.debug_tuple("Length").field(&l).finish(),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("U/L"),
            l => write!(f, "{}", &l),
        }
    }
}

/// A data element: a tag, its value representation and multiplicity,
/// and the decoded value.
///
/// The transfer syntax is not part of the element:
/// it is provided to the codec whenever the element is read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    tag: Tag,
    vr: VR,
    vm: VM,
    value: Value,
}

impl DataElement {
    /// Create a single-valued data element.
    pub fn new<V>(tag: Tag, vr: VR, value: V) -> Self
    where
        V: Into<Value>,
    {
        DataElement {
            tag,
            vr,
            vm: VM::Single,
            value: value.into(),
        }
    }

    /// Create a data element with an explicit value multiplicity.
    pub fn with_vm<V>(tag: Tag, vr: VR, vm: VM, value: V) -> Self
    where
        V: Into<Value>,
    {
        DataElement {
            tag,
            vr,
            vm,
            value: value.into(),
        }
    }

    /// The element's tag.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The element's value representation.
    #[inline]
    pub fn vr(&self) -> VR {
        self.vr
    }

    /// The element's value multiplicity class.
    #[inline]
    pub fn vm(&self) -> VM {
        self.vm
    }

    /// A reference to the element's value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Take the element's value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The value as a single string.
    /// Multiple values remain joined by backslashes.
    pub fn to_str(&self) -> Result<Cow<'_, str>, CastValueError> {
        self.value.to_str()
    }

    /// The textual values of the element.
    ///
    /// When the element's multiplicity allows more than one value,
    /// the text is split on the backslash separator.
    pub fn strings(&self) -> Result<Vec<String>, CastValueError> {
        let text = self.value.to_str()?;
        if self.vm.is_single() {
            Ok(vec![text.into_owned()])
        } else {
            Ok(text.split('\\').map(str::to_owned).collect())
        }
    }

    /// The first value as an unsigned 16-bit integer.
    pub fn uint16(&self) -> Result<u16, CastValueError> {
        self.value.uint16()
    }

    /// The first value as an unsigned 32-bit integer.
    pub fn uint32(&self) -> Result<u32, CastValueError> {
        self.value.uint32()
    }

    /// The sequence items of the element.
    pub fn items(&self) -> Result<&[DataSet], CastValueError> {
        match &self.value {
            Value::Items(items) => Ok(items),
            other => Err(CastValueError {
                requested: "items",
                got: other.value_type(),
            }),
        }
    }

    /// The type of the held value.
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_from_u16_pair() {
        let t = Tag::from((0x0010u16, 0x0020u16));
        assert_eq!(0x0010u16, t.group());
        assert_eq!(0x0020u16, t.element());
    }

    #[test]
    fn tag_from_u32() {
        let t = Tag::from(0x0020_000Du32);
        assert_eq!(t, Tag(0x0020, 0x000D));
        assert_eq!(t.to_u32(), 0x0020_000D);
        assert_eq!(t.to_string(), "(0020,000D)");
    }

    #[test]
    fn tags_order_by_group_then_element() {
        assert!(Tag(0x0000, 0x0900) < Tag(0x0000, 0x1000));
        assert!(Tag(0x0008, 0xFFFF) < Tag(0x0010, 0x0000));
    }

    #[test]
    fn vr_from_binary() {
        assert_eq!(VR::from_binary(*b"SQ"), Some(VR::SQ));
        assert_eq!(VR::from_binary(*b"UT"), Some(VR::UT));
        assert_eq!(VR::from_binary(*b"XX"), None);
        assert_eq!(VR::from_binary([0xFF, 0x00]), None);
        assert_eq!(VR::PN.to_bytes(), *b"PN");
    }

    #[test]
    fn undefined_length() {
        assert!(Length::UNDEFINED.is_undefined());
        assert_eq!(Length::UNDEFINED.get(), None);
        assert_eq!(Length::defined(12).get(), Some(12));
    }

    #[test]
    fn multi_valued_strings() {
        let elem = DataElement::with_vm(
            Tag(0x0008, 0x0008),
            VR::CS,
            VM::AtLeast(2),
            "ORIGINAL\\PRIMARY\\AXIAL",
        );
        assert_eq!(elem.strings().unwrap(), vec!["ORIGINAL", "PRIMARY", "AXIAL"]);

        let single = DataElement::new(Tag(0x0008, 0x1030), VR::LO, "A\\B");
        assert_eq!(single.strings().unwrap(), vec!["A\\B"]);
    }
}
