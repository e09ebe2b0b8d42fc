//! Shift-JIS text helpers. All strings in scripts, and all hashed
//! identifiers, are Shift-JIS on the wire.

use std::borrow::Cow;

use encoding_rs::SHIFT_JIS;

/// Decode bytes without replacement characters. `None` on malformed input.
pub fn decode(bytes: &[u8]) -> Option<Cow<'_, str>> {
    SHIFT_JIS.decode_without_bom_handling_and_without_replacement(bytes)
}

/// Decode bytes, replacing malformed sequences with U+FFFD.
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    SHIFT_JIS.decode_without_bom_handling(bytes).0
}

/// Encode text. `None` if any character has no Shift-JIS mapping.
pub fn encode(text: &str) -> Option<Cow<'_, [u8]>> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors { None } else { Some(bytes) }
}

/// Hash an identifier the way the engine does.
pub fn hash_name(name: &str) -> Option<u32> {
    encode(name).map(|bytes| crate::crc::hash32(&bytes))
}
