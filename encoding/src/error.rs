//! Crate-level error types.
use crate::{cursor, field};
use netdicom_core::value::ValueType;
use netdicom_core::{Tag, VR};
use snafu::{Backtrace, Snafu};

/// Type alias for a result from this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main data type for errors in the data element codec.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Could not read from the input cursor.
    #[snafu(display("could not read {}", what))]
    Read {
        what: &'static str,
        #[snafu(backtrace)]
        source: cursor::Error,
    },
    /// Could not lay out or write a field.
    #[snafu(display("could not write {}", what))]
    Write {
        what: &'static str,
        #[snafu(backtrace)]
        source: field::Error,
    },
    /// The tag has no entry in the data dictionary,
    /// so its value representation cannot be inferred.
    #[snafu(display("unknown tag {} in implicit VR content", tag))]
    UnknownTag { tag: Tag, backtrace: Backtrace },
    /// An explicit VR header named no known value representation.
    #[snafu(display("unknown value representation {:02X?} for tag {}", bytes, tag))]
    UnknownVr {
        tag: Tag,
        bytes: [u8; 2],
        backtrace: Backtrace,
    },
    /// A fixed-width value had the wrong length.
    #[snafu(display(
        "invalid length {} for value representation {}, expected {}",
        got,
        vr,
        expected
    ))]
    FixedLengthMismatch {
        vr: VR,
        expected: u32,
        got: u32,
        backtrace: Backtrace,
    },
    /// A value exceeded the maximum length of its value representation.
    #[snafu(display("value `{}` is longer than {} characters allowed by {}", value, max, vr))]
    ValueTooLong {
        vr: VR,
        max: usize,
        value: String,
        backtrace: Backtrace,
    },
    /// The value cannot be written with this value representation.
    #[snafu(display("cannot encode a {:?} value as {}", got, vr))]
    UnsupportedValue {
        vr: VR,
        got: ValueType,
        backtrace: Backtrace,
    },
    /// The encoded value does not fit in a 16-bit length field.
    #[snafu(display("value of {} bytes is too long for the header of {} ({})", len, tag, vr))]
    LengthOverflow {
        tag: Tag,
        vr: VR,
        len: usize,
        backtrace: Backtrace,
    },
    /// An unexpected tag was found where a sequence item was expected.
    #[snafu(display("unexpected tag {} inside sequence", tag))]
    UnexpectedSequenceTag { tag: Tag, backtrace: Backtrace },
    /// A sequence item or delimiter tag was found outside of a sequence.
    #[snafu(display("unexpected delimiter {} outside of a sequence", tag))]
    UnexpectedDelimiter { tag: Tag, backtrace: Backtrace },
}
