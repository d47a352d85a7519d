#![crate_type = "lib"]
#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]

//! This is the core library of netdicom containing the concepts
//! and data structures shared by the encoding and upper layer crates.
//!
//! The current structure of this crate is as follows:
//!
//! - [`header`] comprises the data types of a DICOM element header,
//!   namely tags, value representations and lengths,
//!   plus the [`DataElement`] type itself.
//! - [`dictionary`] describes common behavior of DICOM data dictionaries,
//!   which translate attribute names and/or tags to a dictionary entry
//!   containing the typical VR and value multiplicity of the attribute.
//! - [`value`] holds the decoded form of DICOM element values,
//!   including person names, ages and nested sequence items.
//! - [`dataset`] holds [`DataSet`], the tag-indexed element table
//!   used both for DIMSE command sets and data sets.
//! - [`error`] contains the value casting error type.

pub mod dataset;
pub mod dictionary;
pub mod error;
pub mod header;
pub mod value;

pub use dataset::DataSet;
pub use dictionary::{DataDictionary, VM};
pub use error::CastValueError;
pub use header::{DataElement, Length, Tag, VR};
pub use value::{Age, AgeUnit, PersonName, Value, C};

// re-export crates that are part of the public API
pub use chrono;
pub use smallvec;
