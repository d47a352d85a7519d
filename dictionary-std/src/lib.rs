//! This crate implements the standard DICOM attribute dictionary
//! and constants used by the netdicom network stack.
//!
//! ## Run-time dictionary
//!
//! - [`data_element`]: Contains the DICOM attributes
//!   that travel in DIMSE command sets and query/retrieve identifiers,
//!   with their typical value representation and multiplicity.
//!   It is the dictionary used by default when decoding
//!   implicit VR content.
//!
//! The dictionary is provided as a singleton
//! behind the unit type [`StandardDataDictionary`].
//!
//! ## Constants
//!
//! - [`tags`], which map an attribute alias to a DICOM tag
//! - [`uids`], for transfer syntaxes, the application context
//!   and the SOP classes used by query/retrieve and storage
pub mod data_element;
pub mod tags;
pub mod uids;

pub use data_element::{StandardDataDictionary, StandardDataDictionaryRegistry};
