//! This module contains the concept of a DICOM data dictionary.
//!
//! The standard dictionary is provided by the `netdicom-dictionary-std` crate.
//! Under the implicit VR transfer syntax,
//! a dictionary is the only way of knowing
//! the value representation of an element read from the wire.

use crate::header::{Tag, VR};
use std::fmt::Debug;

/// Value multiplicity class of an attribute, as declared in PS3.6.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VM {
    /// Exactly one value (`1`)
    Single,
    /// A fixed number of values (e.g. `2`, `3`, `16`)
    Exactly(u16),
    /// At least the given number of values (`1-n`, `2-n`)
    AtLeast(u16),
    /// A bounded range of values (e.g. `1-2`, `1-32`)
    Range(u16, u16),
}

impl VM {
    /// Whether only one value is allowed.
    pub fn is_single(self) -> bool {
        matches!(self, VM::Single | VM::Exactly(1))
    }
}

impl Default for VM {
    fn default() -> Self {
        VM::Single
    }
}

/// Type trait for a dictionary of DICOM attributes.
pub trait DataDictionary: Debug {
    /// The type of the dictionary entry.
    type Entry: DictionaryEntry;

    /// Fetch an entry by its usual alias (e.g. "PatientName" or "SOPInstanceUID").
    /// Aliases are usually case sensitive and not separated by spaces.
    fn by_name(&self, name: &str) -> Option<&Self::Entry>;

    /// Fetch an entry by its tag.
    fn by_tag(&self, tag: Tag) -> Option<&Self::Entry>;
}

impl<D> DataDictionary for &D
where
    D: DataDictionary,
{
    type Entry = D::Entry;

    fn by_name(&self, name: &str) -> Option<&Self::Entry> {
        (**self).by_name(name)
    }

    fn by_tag(&self, tag: Tag) -> Option<&Self::Entry> {
        (**self).by_tag(tag)
    }
}

/// The dictionary entry data type, representing a DICOM attribute.
pub trait DictionaryEntry {
    /// The attribute tag.
    fn tag(&self) -> Tag;
    /// The alias of the attribute, with no spaces, usually in UpperCamelCase.
    fn alias(&self) -> &str;
    /// The _typical_ value representation of the attribute.
    fn vr(&self) -> VR;
    /// The value multiplicity of the attribute.
    fn vm(&self) -> VM;
}

/// A data type for a dictionary entry with a string slice for its alias.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DataDictionaryEntryRef<'a> {
    /// The attribute tag
    pub tag: Tag,
    /// The alias of the attribute, with no spaces, usually InCapitalizedCamelCase
    pub alias: &'a str,
    /// The _typical_ value representation of the attribute
    pub vr: VR,
    /// The value multiplicity of the attribute
    pub vm: VM,
}

impl<'a> DictionaryEntry for DataDictionaryEntryRef<'a> {
    fn tag(&self) -> Tag {
        self.tag
    }
    fn alias(&self) -> &str {
        self.alias
    }
    fn vr(&self) -> VR {
        self.vr
    }
    fn vm(&self) -> VM {
        self.vm
    }
}
