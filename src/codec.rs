//! Transport and header text codecs
//!
//! Raw messages travel to and from the mailbox API as URL-safe base64 with
//! padding stripped. Header values that carry non-ASCII text are written as
//! RFC 2047 "B" encoded words. Header decoding happens inside the MIME parser,
//! so this module only encodes header text.

use base64::engine::general_purpose::{
    GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE_NO_PAD,
};
use base64::{Engine, alphabet};

use crate::errors::{AppError, AppResult};

/// Standard alphabet decoder that ignores non-zero bits in the final symbol
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Encode raw message bytes into a transport blob
///
/// Uses the URL-safe alphabet (`-` and `_` in place of `+` and `/`) and never
/// emits `=` padding.
pub fn encode_transport(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a transport blob back into raw message bytes
///
/// Padding is restored to a multiple of four characters, the URL-safe
/// characters are mapped back to the standard alphabet, and the result is
/// decoded as standard base64. Already padded input is accepted unchanged.
///
/// # Errors
///
/// Returns `Decode` if the blob contains characters outside the alphabet or
/// has an impossible length. Non-zero trailing bits are tolerated.
pub fn decode_transport(blob: &str) -> AppResult<Vec<u8>> {
    let pad = (4 - blob.len() % 4) % 4;
    let mut standard = String::with_capacity(blob.len() + pad);
    for ch in blob.chars() {
        standard.push(match ch {
            '-' => '+',
            '_' => '/',
            other => other,
        });
    }
    standard.extend(std::iter::repeat_n('=', pad));

    LENIENT_STANDARD
        .decode(standard.as_bytes())
        .map_err(|e| AppError::Decode(format!("invalid transport encoding: {e}")))
}

/// Encode header text for emission
///
/// Pure ASCII is returned unchanged; anything else becomes a single
/// `=?UTF-8?B?...?=` encoded word.
pub fn encode_header_text(text: &str) -> String {
    if text.is_ascii() {
        text.to_owned()
    } else {
        encode_word(text)
    }
}

/// Wrap text as an RFC 2047 "B" encoded word regardless of content
pub fn encode_word(text: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}
