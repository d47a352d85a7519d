//! The transfer syntaxes understood by the data element codec.
//!
//! Only the three uncompressed syntaxes are supported.
//! Commands always travel in [`TransferSyntax::ImplicitVrLittleEndian`],
//! while data sets use whichever syntax was accepted
//! for their presentation context.

use netdicom_dictionary_std::uids;
use std::fmt;

pub use byteordered::Endianness;

/// A supported DICOM transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransferSyntax {
    /// Implicit VR Little Endian: Default Transfer Syntax for DICOM
    ImplicitVrLittleEndian,
    /// Explicit VR Little Endian
    ExplicitVrLittleEndian,
    /// Explicit VR Big Endian
    ExplicitVrBigEndian,
}

impl TransferSyntax {
    /// All supported transfer syntaxes,
    /// in the order in which they are proposed by default.
    pub const ALL: [TransferSyntax; 3] = [
        TransferSyntax::ImplicitVrLittleEndian,
        TransferSyntax::ExplicitVrLittleEndian,
        TransferSyntax::ExplicitVrBigEndian,
    ];

    /// Obtain a transfer syntax by its UID.
    ///
    /// Trailing null characters and whitespace are ignored.
    pub fn from_uid(uid: &str) -> Option<TransferSyntax> {
        match uid.trim_end_matches(|c: char| c == '\0' || c.is_whitespace()) {
            uids::IMPLICIT_VR_LITTLE_ENDIAN => Some(TransferSyntax::ImplicitVrLittleEndian),
            uids::EXPLICIT_VR_LITTLE_ENDIAN => Some(TransferSyntax::ExplicitVrLittleEndian),
            uids::EXPLICIT_VR_BIG_ENDIAN => Some(TransferSyntax::ExplicitVrBigEndian),
            _ => None,
        }
    }

    /// The unique identifier of the transfer syntax.
    pub fn uid(self) -> &'static str {
        match self {
            TransferSyntax::ImplicitVrLittleEndian => uids::IMPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVrLittleEndian => uids::EXPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVrBigEndian => uids::EXPLICIT_VR_BIG_ENDIAN,
        }
    }

    /// The name of the transfer syntax.
    pub fn name(self) -> &'static str {
        match self {
            TransferSyntax::ImplicitVrLittleEndian => "Implicit VR Little Endian",
            TransferSyntax::ExplicitVrLittleEndian => "Explicit VR Little Endian",
            TransferSyntax::ExplicitVrBigEndian => "Explicit VR Big Endian",
        }
    }

    /// The byte order of data.
    pub fn endianness(self) -> Endianness {
        match self {
            TransferSyntax::ExplicitVrBigEndian => Endianness::Big,
            _ => Endianness::Little,
        }
    }

    /// Whether the value representation is written out
    /// in each data element header.
    pub fn is_explicit_vr(self) -> bool {
        !matches!(self, TransferSyntax::ImplicitVrLittleEndian)
    }
}

impl Default for TransferSyntax {
    fn default() -> Self {
        TransferSyntax::ImplicitVrLittleEndian
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.840.10008.1.2", TransferSyntax::ImplicitVrLittleEndian)]
    #[case("1.2.840.10008.1.2\0", TransferSyntax::ImplicitVrLittleEndian)]
    #[case("1.2.840.10008.1.2.1", TransferSyntax::ExplicitVrLittleEndian)]
    #[case("1.2.840.10008.1.2.2 ", TransferSyntax::ExplicitVrBigEndian)]
    fn lookup_by_uid(#[case] uid: &str, #[case] expected: TransferSyntax) {
        assert_eq!(TransferSyntax::from_uid(uid), Some(expected));
        assert_eq!(expected.uid(), uid.trim_end_matches(&['\0', ' '][..]));
    }

    #[test]
    fn unsupported_syntax() {
        // JPEG baseline
        assert_eq!(TransferSyntax::from_uid("1.2.840.10008.1.2.4.50"), None);
    }

    #[test]
    fn byte_order_and_vr() {
        let ts = TransferSyntax::ExplicitVrBigEndian;
        assert_eq!(ts.endianness(), Endianness::Big);
        assert!(ts.is_explicit_vr());
        assert!(!TransferSyntax::default().is_explicit_vr());
        assert_eq!(TransferSyntax::default().endianness(), Endianness::Little);
    }
}
