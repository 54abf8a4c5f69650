//! Encoder writing JSON values to a byte sink

use std::fmt::{Debug, Formatter};

use super::*;
use crate::io::{write_to_sink, ByteSink, WriteError};

/// Settings to customize the JSON encoder behavior
///
/// These settings are used by [`JsonEncoder::new_custom`]. To avoid repeating the
/// default values for unchanged settings `..Default::default()` can be used:
/// ```
/// # use textstream::json::*;
/// EncoderSettings {
///     indent: "  ".to_owned(),
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    /// Whether to escape `<`, `>` and `&` in strings
    ///
    /// This allows embedding the output safely in HTML `<script>` tags.
    ///
    /// Default: `true`
    pub escape_html: bool,

    /// String written at the start of every line except the first one of a value
    ///
    /// Pretty printing is enabled if either `prefix` or `indent` is not empty.
    ///
    /// Default: empty
    pub prefix: String,

    /// String written once per nesting level at the start of every line except the first one
    ///
    /// Default: empty
    pub indent: String,

    /// String written after every top-level value
    ///
    /// Without a terminator successive values are written directly after each other, which
    /// is only unambiguous for objects, arrays and strings.
    ///
    /// Default: `None`
    pub value_terminator: Option<String>,
}

impl Default for EncoderSettings {
    /// Creates the default JSON encoder settings
    ///
    /// - escape HTML: true
    /// - prefix: empty
    /// - indent: empty (compact output)
    /// - value terminator: none
    fn default() -> Self {
        EncoderSettings {
            escape_html: true,
            prefix: String::new(),
            indent: String::new(),
            value_terminator: None,
        }
    }
}

/// A JSON encoder writing top-level values to a [`ByteSink`]
///
/// Every value is first serialized into an internal buffer and then written to the sink with
/// a single call. If the sink does not accept all bytes, a [`WriteError`] is returned.
///
/// # Examples
/// ```
/// # use textstream::json::*;
/// let mut encoder = JsonEncoder::new(Vec::new());
/// encoder.set_indent("", "  ");
/// encoder.encode_value(&decode(br#"{"a": [1, 2]}"#)?)?;
///
/// let json = String::from_utf8(encoder.into_inner())?;
/// assert_eq!("{\n  \"a\": [\n    1,\n    2\n  ]\n}", json);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JsonEncoder<S: ByteSink> {
    sink: S,
    settings: EncoderSettings,
    buf: Vec<u8>,
}

impl<S: ByteSink> JsonEncoder<S> {
    /// Creates an encoder with [default settings](EncoderSettings::default)
    pub fn new(sink: S) -> Self {
        JsonEncoder::new_custom(sink, EncoderSettings::default())
    }

    /// Creates an encoder with custom settings
    pub fn new_custom(sink: S, settings: EncoderSettings) -> Self {
        JsonEncoder {
            sink,
            settings,
            buf: Vec::new(),
        }
    }

    /// Sets whether `<`, `>` and `&` are escaped in strings
    pub fn set_escape_html(&mut self, escape_html: bool) {
        self.settings.escape_html = escape_html;
    }

    /// Sets the indentation used for subsequently encoded values
    ///
    /// Every array item and object member is written on its own line, starting with `prefix`
    /// followed by `indent` once per nesting level. Pretty printing is disabled if both are empty.
    pub fn set_indent(&mut self, prefix: &str, indent: &str) {
        self.settings.prefix = prefix.to_owned();
        self.settings.indent = indent.to_owned();
    }

    /// Encodes a value and writes it to the sink
    pub fn encode_value(&mut self, value: &JsonValue) -> Result<(), WriteError> {
        self.buf.clear();
        ValueFormatter {
            out: &mut self.buf,
            escape_html: self.settings.escape_html,
            prefix: &self.settings.prefix,
            indent: &self.settings.indent,
            indentation_level: 0,
        }
        .write_value(value);
        if let Some(terminator) = &self.settings.value_terminator {
            self.buf.extend_from_slice(terminator.as_bytes());
        }
        write_to_sink(&mut self.sink, &self.buf)
    }

    /// Gets a mutable reference to the underlying sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Unwraps this encoder, returning the underlying sink
    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S: ByteSink + Debug> Debug for JsonEncoder<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonEncoder")
            .field("sink", &self.sink)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Remaining items of a container which is currently written
enum Remaining<'v> {
    Array(std::slice::Iter<'v, JsonValue>),
    Object(indexmap::map::Iter<'v, String, JsonValue>),
}

struct OpenContainer<'v> {
    remaining: Remaining<'v>,
    is_empty: bool,
}

enum Step<'v> {
    Element {
        name: Option<&'v str>,
        value: &'v JsonValue,
        is_first: bool,
    },
    End(u8),
}

/// Serializes values into a byte buffer
pub(crate) struct ValueFormatter<'a> {
    pub(crate) out: &'a mut Vec<u8>,
    pub(crate) escape_html: bool,
    pub(crate) prefix: &'a str,
    pub(crate) indent: &'a str,
    pub(crate) indentation_level: usize,
}

impl ValueFormatter<'_> {
    fn is_pretty_print(&self) -> bool {
        !self.prefix.is_empty() || !self.indent.is_empty()
    }

    /// Starts a new line, if pretty printing is enabled
    fn write_line_start(&mut self) {
        if self.is_pretty_print() {
            self.out.push(b'\n');
            self.out.extend_from_slice(self.prefix.as_bytes());
            for _ in 0..self.indentation_level {
                self.out.extend_from_slice(self.indent.as_bytes());
            }
        }
    }

    /// Writes a value, visiting nested containers without recursion
    pub(crate) fn write_value(&mut self, value: &JsonValue) {
        let mut stack: Vec<OpenContainer<'_>> = Vec::new();
        let mut next = Some(value);

        loop {
            if let Some(value) = next.take() {
                match value {
                    JsonValue::Array(items) if !items.is_empty() => {
                        self.out.push(b'[');
                        stack.push(OpenContainer {
                            remaining: Remaining::Array(items.iter()),
                            is_empty: true,
                        });
                    }
                    JsonValue::Object(members) if !members.is_empty() => {
                        self.out.push(b'{');
                        stack.push(OpenContainer {
                            remaining: Remaining::Object(members.iter()),
                            is_empty: true,
                        });
                    }
                    JsonValue::Array(_) => self.out.extend_from_slice(b"[]"),
                    JsonValue::Object(_) => self.out.extend_from_slice(b"{}"),
                    JsonValue::Null => self.out.extend_from_slice(b"null"),
                    JsonValue::Bool(true) => self.out.extend_from_slice(b"true"),
                    JsonValue::Bool(false) => self.out.extend_from_slice(b"false"),
                    JsonValue::Number(number) => self.out.extend_from_slice(number.as_str().as_bytes()),
                    JsonValue::String(s) => self.write_string(s),
                }
            }

            let step = match stack.last_mut() {
                None => return,
                Some(container) => {
                    let is_first = container.is_empty;
                    container.is_empty = false;
                    match &mut container.remaining {
                        Remaining::Array(items) => match items.next() {
                            Some(item) => Step::Element {
                                name: None,
                                value: item,
                                is_first,
                            },
                            None => Step::End(b']'),
                        },
                        Remaining::Object(members) => match members.next() {
                            Some((name, value)) => Step::Element {
                                name: Some(name.as_str()),
                                value,
                                is_first,
                            },
                            None => Step::End(b'}'),
                        },
                    }
                }
            };

            match step {
                Step::Element {
                    name,
                    value,
                    is_first,
                } => {
                    if is_first {
                        self.indentation_level += 1;
                    } else {
                        self.out.push(b',');
                    }
                    self.write_line_start();
                    if let Some(name) = name {
                        self.write_string(name);
                        self.out.push(b':');
                        if self.is_pretty_print() {
                            self.out.push(b' ');
                        }
                    }
                    next = Some(value);
                }
                Step::End(closing_bracket) => {
                    stack.pop();
                    self.indentation_level -= 1;
                    self.write_line_start();
                    self.out.push(closing_bracket);
                }
            }
        }
    }

    fn should_escape(&self, c: char) -> bool {
        matches!(c, '"' | '\\')
        // Control characters which must be escaped in JSON strings
        || matches!(c, '\u{0}'..='\u{1F}')
            // Line and paragraph separator are not allowed in JavaScript string literals
            || matches!(c, '\u{2028}' | '\u{2029}')
            || (self.escape_html && matches!(c, '<' | '>' | '&'))
    }

    fn write_escaped_char(&mut self, c: char) {
        let escape: &[u8] = match c {
            '"' => b"\\\"",
            '\\' => b"\\\\",
            '\u{0008}' => b"\\b",
            '\u{000C}' => b"\\f",
            '\n' => b"\\n",
            '\r' => b"\\r",
            '\t' => b"\\t",
            _ => {
                write_unicode_escape(self.out, u32::from(c));
                return;
            }
        };
        self.out.extend_from_slice(escape);
    }

    pub(crate) fn write_string(&mut self, value: &str) {
        self.out.push(b'"');
        let bytes = value.as_bytes();
        let mut next_to_write_index = 0;

        for (index, char) in value.char_indices() {
            if self.should_escape(char) {
                self.out.extend_from_slice(&bytes[next_to_write_index..index]);
                self.write_escaped_char(char);
                next_to_write_index = index + char.len_utf8();
            }
        }
        // Write remaining bytes
        self.out.extend_from_slice(&bytes[next_to_write_index..]);
        self.out.push(b'"');
    }
}

/// Writes a `\u` escape with four lower-case hex digits
pub(crate) fn write_unicode_escape(out: &mut Vec<u8>, value: u32) {
    // Only used for chars in the Basic Multilingual Plane
    debug_assert!(value <= 0xFFFF);

    const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
    out.extend_from_slice(b"\\u");
    for shift in [12, 8, 4, 0] {
        out.push(HEX_DIGITS[(value >> shift & 0xF) as usize]);
    }
}
