//! DICOM encoding and decoding primitives for the upper layer protocol.
//!
//! This crate provides the byte-level building blocks
//! shared by PDUs, DIMSE messages and data sets:
//!
//! - [`cursor`]: endian-aware read and write cursors over byte buffers;
//! - [`field`]: typed write-side fields, so that a layout's length
//!   is known before it is written;
//! - [`vr`]: the per-VR value codec;
//! - [`element`]: the data element and data set codec,
//!   in implicit or explicit VR and with nested sequences;
//! - [`transfer_syntax`]: the supported uncompressed transfer syntaxes.
//!
//! All APIs work on in-memory buffers.
//! Reading from or writing to the network is left to `netdicom-ul`.

pub mod cursor;
pub mod element;
pub mod error;
pub mod field;
pub mod text;
pub mod transfer_syntax;
pub mod vr;

pub use cursor::{ReadCursor, WriteCursor};
pub use element::{element_by_tag, ElementCodec};
pub use error::{Error, Result};
pub use field::Field;
pub use transfer_syntax::{Endianness, TransferSyntax};

// re-export crates that are part of the public API
pub use byteordered;
pub use bytes;
