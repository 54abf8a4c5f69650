//! Byte level helpers for UTF-8 data

/// Maximum number of UTF-8 bytes needed to encode one Unicode `char`
pub(crate) const MAX_BYTES_PER_CHAR: usize = 4;

/// Whether the byte continues a char which is encoded as 2, 3 or 4 bytes
pub(crate) fn is_continuation(b: u8) -> bool {
    // 10xx_xxxx
    b & 0b1100_0000 == 0b1000_0000
}

/// Number of bytes of the char whose encoding starts with `b`
///
/// Returns `None` for continuation bytes and for bytes which never occur in UTF-8 data.
pub(crate) fn encoded_len(b: u8) -> Option<usize> {
    // The number of leading 1 bits of the start byte is the encoded length, except for ASCII
    match b.leading_ones() {
        0 => Some(1),
        n @ 2..=4 => Some(n as usize),
        _ => None,
    }
}

/// Decodes the UTF-8 encoding of exactly one char
///
/// Returns `None` if `bytes` is not the complete and valid encoding of a single char; overlong
/// encodings and encoded surrogates are invalid.
pub(crate) fn decode_char(bytes: &[u8]) -> Option<char> {
    let mut chars = std::str::from_utf8(bytes).ok()?.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
