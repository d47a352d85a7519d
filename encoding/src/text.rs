//! Text handling for the default character repertoire.
//!
//! Every string that travels in the upper layer protocol,
//! from AE titles and UIDs in association items
//! to the text values of data elements,
//! is read and written one byte per character (ISO 8859-1).
//! Characters outside of that range cannot be encoded.

use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, EncoderTrap, Encoding};
use snafu::{Backtrace, Snafu};
use std::borrow::Cow;

/// An error type for text encoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The text holds a character outside of the default repertoire.
    #[snafu(display("could not encode `{}`: {}", text, message))]
    Encode {
        text: String,
        message: Cow<'static, str>,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Decode bytes as text.
///
/// All byte values map to a character, so this never fails.
pub fn decode(bytes: &[u8]) -> String {
    ISO_8859_1
        .decode(bytes, DecoderTrap::Replace)
        .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect())
}

/// Encode text to bytes.
pub fn encode(text: &str) -> Result<Vec<u8>> {
    ISO_8859_1
        .encode(text, EncoderTrap::Strict)
        .map_err(|message| EncodeSnafu { text, message }.build())
}

/// The number of bytes `text` occupies once encoded.
#[inline]
pub fn encoded_len(text: &str) -> usize {
    text.chars().count()
}
