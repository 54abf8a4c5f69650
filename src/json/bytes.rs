//! Functions operating on complete in-memory JSON documents

use super::{
    encoder::{write_unicode_escape, ValueFormatter},
    *,
};

/// Decodes a document consisting of exactly one JSON value
///
/// The value may be surrounded by whitespace. Numbers keep their exact source text. Empty
/// input fails with [`SyntaxErrorKind::IncompleteDocument`], data after the value fails with
/// [`SyntaxErrorKind::TrailingData`].
pub fn decode(bytes: &[u8]) -> Result<JsonValue, JsonError> {
    let mut decoder = JsonDecoder::new_custom(
        crate::io::BytesSource::new(bytes),
        DecoderSettings {
            use_number: true,
            ..Default::default()
        },
    );
    decoder.decode_single_value()
}

/// Checks the syntax of a complete document without creating a value
fn check_syntax(bytes: &[u8]) -> Result<(), JsonError> {
    JsonDecoder::new(crate::io::BytesSource::new(bytes)).skip_single_value()
}

/// Checks whether the bytes are a valid JSON document, as accepted by [`decode`]
pub fn validate(bytes: &[u8]) -> bool {
    check_syntax(bytes).is_ok()
}

/// Removes all insignificant whitespace from a JSON document
///
/// Everything else, including string escape sequences, number text and duplicate object
/// members, is preserved byte by byte. The document is validated first.
pub fn compact(bytes: &[u8]) -> Result<Vec<u8>, JsonError> {
    check_syntax(bytes)?;
    Ok(compact_valid(bytes))
}

fn compact_valid(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut is_escaped = false;

    for &b in bytes {
        if in_string {
            if is_escaped {
                is_escaped = false;
            } else if b == b'\\' {
                is_escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            out.push(b);
        } else if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
            in_string = b == b'"';
            out.push(b);
        }
    }
    out
}

/// Re-formats a JSON document with one array item or object member per line
///
/// Every line except the first starts with `prefix` followed by `indent` once per nesting
/// level. Empty arrays and objects are written as `[]` and `{}`, and object member names are
/// followed by `": "`. The document is validated first.
///
/// # Examples
/// ```
/// # use textstream::json::indent;
/// let formatted = indent(br#"{"a":[1,{}]}"#, "", "  ")?;
/// assert_eq!(
///     "{\n  \"a\": [\n    1,\n    {}\n  ]\n}",
///     String::from_utf8(formatted)?
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn indent(bytes: &[u8], prefix: &str, indent: &str) -> Result<Vec<u8>, JsonError> {
    check_syntax(bytes)?;
    let compacted = compact_valid(bytes);

    let mut out = Vec::with_capacity(compacted.len() * 2);
    let write_line_start = |out: &mut Vec<u8>, level: usize| {
        out.push(b'\n');
        out.extend_from_slice(prefix.as_bytes());
        for _ in 0..level {
            out.extend_from_slice(indent.as_bytes());
        }
    };

    let mut level = 0_usize;
    let mut in_string = false;
    let mut is_escaped = false;
    let mut index = 0;
    while index < compacted.len() {
        let b = compacted[index];
        index += 1;

        if in_string {
            if is_escaped {
                is_escaped = false;
            } else if b == b'\\' {
                is_escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            out.push(b);
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                out.push(b);
            }
            b'[' | b'{' => {
                out.push(b);
                // Keep empty containers on one line
                if matches!(compacted.get(index), Some(b']' | b'}')) {
                    out.push(compacted[index]);
                    index += 1;
                } else {
                    level += 1;
                    write_line_start(&mut out, level);
                }
            }
            b']' | b'}' => {
                level = level.saturating_sub(1);
                write_line_start(&mut out, level);
                out.push(b);
            }
            b',' => {
                out.push(b);
                write_line_start(&mut out, level);
            }
            b':' => out.extend_from_slice(b": "),
            _ => out.push(b),
        }
    }
    Ok(out)
}

/// Escapes `<`, `>`, `&`, U+2028 and U+2029 in JSON data
///
/// The characters are replaced by their six-character `\u` escapes, so the result can be
/// embedded safely in HTML `<script>` tags. The data is not validated; this function never fails.
pub fn html_escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut next_to_write_index = 0;

    for (index, &b) in bytes.iter().enumerate() {
        if index < next_to_write_index {
            continue;
        }
        if matches!(b, b'<' | b'>' | b'&') {
            out.extend_from_slice(&bytes[next_to_write_index..index]);
            write_unicode_escape(&mut out, u32::from(b));
            next_to_write_index = index + 1;
        } else if b == 0xE2
            && bytes.get(index + 1) == Some(&0x80)
            && matches!(bytes.get(index + 2), Some(0xA8 | 0xA9))
        {
            // UTF-8 encoding of U+2028 and U+2029
            out.extend_from_slice(&bytes[next_to_write_index..index]);
            write_unicode_escape(&mut out, 0x2000 | u32::from(bytes[index + 2] & 0x2F));
            next_to_write_index = index + 3;
        }
    }
    out.extend_from_slice(&bytes[next_to_write_index..]);
    out
}

/// Encodes a value as compact JSON, escaping `<`, `>` and `&`
pub fn encode(value: &JsonValue) -> Vec<u8> {
    encode_indent(value, "", "")
}

/// Encodes a value as JSON with one array item or object member per line
///
/// See [`indent`] for the format. Output is compact if `prefix` and `indent` are both empty.
pub fn encode_indent(value: &JsonValue, prefix: &str, indent: &str) -> Vec<u8> {
    let mut out = Vec::new();
    ValueFormatter {
        out: &mut out,
        escape_html: true,
        prefix,
        indent,
        indentation_level: 0,
    }
    .write_value(value);
    out
}
