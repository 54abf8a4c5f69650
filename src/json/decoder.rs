//! Streaming decoder reading a sequence of JSON values

use std::{
    fmt::{Debug, Formatter},
    fs::File,
    path::Path,
};

use super::{
    number::{consume_json_number, normalize_number, NumberBytesProvider},
    *,
};
use crate::{
    io::{ByteSource, BytesSource, ReadSource, SourceBuffer},
    utf8,
};

/// How the decoder handles an object member name which appears more than once in an object
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub enum DuplicateKeys {
    /// The last value wins; the member keeps the position of its first occurrence
    #[default]
    LastWins,
    /// A duplicate name is a [`SyntaxErrorKind::DuplicateMemberName`] error
    Reject,
}

/// Settings to customize the JSON decoder behavior
///
/// These settings are used by [`JsonDecoder::new_custom`]. To avoid repeating the
/// default values for unchanged settings `..Default::default()` can be used:
/// ```
/// # use textstream::json::*;
/// DecoderSettings {
///     duplicate_keys: DuplicateKeys::Reject,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct DecoderSettings {
    /// Whether numbers keep their exact source text
    ///
    /// When disabled, numbers are converted to `f64` and rendered again in their shortest
    /// form, for example `1.0` becomes `1` and `1e3` becomes `1000`. Numbers which exceed
    /// the `f64` range keep their text.
    ///
    /// Default: `false`
    pub use_number: bool,

    /// Handling of duplicate object member names
    ///
    /// Default: [`DuplicateKeys::LastWins`]
    pub duplicate_keys: DuplicateKeys,

    /// Maximum number of arrays and objects a value may be nested in
    ///
    /// A bracket which would open a container beyond this depth is a
    /// [`SyntaxErrorKind::MaxNestingDepthExceeded`] error.
    ///
    /// Default: 10000
    pub max_nesting_depth: u32,
}

impl Default for DecoderSettings {
    /// Creates the default JSON decoder settings
    ///
    /// - use number: false
    /// - duplicate keys: [`DuplicateKeys::LastWins`]
    /// - max nesting depth: 10000
    fn default() -> Self {
        DecoderSettings {
            use_number: false,
            duplicate_keys: DuplicateKeys::LastWins,
            max_nesting_depth: 10_000,
        }
    }
}

/// Partially decoded container
enum Frame {
    Array(Vec<JsonValue>),
    Object {
        members: JsonObject,
        /// Name of the member whose value is currently decoded
        name: String,
        name_position: Position,
    },
}

/// A JSON decoder reading a sequence of top-level values from a [`ByteSource`]
///
/// Top-level values may be separated by whitespace, which allows decoding streams of values
/// such as `{"a":1} {"a":2}`. After a top-level number or literal the next byte must be
/// whitespace or the end of input.
///
/// Once a syntax error occurred the decoder is *poisoned*: every further call to
/// [`decode_value`](Self::decode_value) returns the same error.
///
/// The decoder reads ahead of the value it decodes. The look-ahead bytes can be obtained
/// with [`buffered_bytes`](Self::buffered_bytes) or [`into_parts`](Self::into_parts).
///
/// # Examples
/// ```
/// # use textstream::{io::BytesSource, json::*};
/// let mut decoder = JsonDecoder::new(BytesSource::new(br#"{"x": 1} {"y": 2}"#));
/// let first = decoder.decode_value()?.unwrap();
/// assert_eq!(Some(&JsonValue::from(1)), first.get("x")?);
///
/// let second = decoder.decode_value()?.unwrap();
/// assert_eq!(Some(&JsonValue::from(2)), second.get("y")?);
///
/// // End of input
/// assert_eq!(None, decoder.decode_value()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JsonDecoder<S: ByteSource> {
    input: SourceBuffer<S>,
    settings: DecoderSettings,
    has_decoded_value: bool,
    /// Syntax error which poisoned this decoder
    error: Option<JsonSyntaxError>,
}

impl<S: ByteSource> JsonDecoder<S> {
    /// Creates a decoder with [default settings](DecoderSettings::default)
    pub fn new(source: S) -> Self {
        JsonDecoder::new_custom(source, DecoderSettings::default())
    }

    /// Creates a decoder with custom settings
    pub fn new_custom(source: S, settings: DecoderSettings) -> Self {
        JsonDecoder {
            input: SourceBuffer::new(source),
            settings,
            has_decoded_value: false,
            error: None,
        }
    }

    /// Makes the decoder keep the exact source text of numbers
    ///
    /// Calling this method multiple times has no additional effect.
    ///
    /// # Panics
    /// Panics when called for the first time after a value has already been decoded.
    pub fn use_number(&mut self) {
        if self.settings.use_number {
            return;
        }
        if self.has_decoded_value {
            panic!("Incorrect decoder usage: Cannot enable exact numbers after a value has been decoded");
        }
        self.settings.use_number = true;
    }

    /// Gets the number of bytes consumed from the source so far
    ///
    /// Look-ahead bytes which have been read but not consumed are not included.
    pub fn input_offset(&self) -> u64 {
        self.input.offset()
    }

    /// Gets the current position of the decoder
    pub fn current_position(&self) -> Position {
        self.input.position()
    }

    /// Gets the bytes which have been read from the source but not consumed yet
    ///
    /// After a value has been decoded these bytes are either empty or start with the byte
    /// following the value.
    pub fn buffered_bytes(&self) -> &[u8] {
        self.input.buffered()
    }

    /// Gets a mutable reference to the underlying source
    ///
    /// Reading from the source directly skips the bytes buffered by this decoder.
    pub fn source_mut(&mut self) -> &mut S {
        self.input.source_mut()
    }

    /// Unwraps this decoder, returning the source and the bytes buffered but not consumed
    pub fn into_parts(self) -> (S, Vec<u8>) {
        self.input.into_parts()
    }

    fn check_poisoned(&self) -> Result<(), JsonError> {
        match &self.error {
            Some(e) => Err(e.clone().into()),
            None => Ok(()),
        }
    }

    /// Whether another value follows in the current array or object, or at top-level
    ///
    /// Returns `false` if the next non-whitespace byte is a closing bracket or the input ended.
    pub fn more(&mut self) -> Result<bool, JsonError> {
        self.check_poisoned()?;
        Ok(matches!(self.skip_whitespace()?, Some(b) if b != b']' && b != b'}'))
    }

    /// Decodes the next top-level value
    ///
    /// Returns `Ok(None)` once only whitespace remains in the input.
    pub fn decode_value(&mut self) -> Result<Option<JsonValue>, JsonError> {
        self.check_poisoned()?;
        if self.skip_whitespace()?.is_none() {
            return Ok(None);
        }
        let value = self.read_value(true)?;
        self.has_decoded_value = true;
        Ok(Some(value))
    }

    /// Skips the next top-level value after checking its syntax
    ///
    /// No value is created, but duplicate member names are still rejected if the settings
    /// say so. Returns `false` once only whitespace remains in the input.
    pub fn skip_value(&mut self) -> Result<bool, JsonError> {
        self.check_poisoned()?;
        if self.skip_whitespace()?.is_none() {
            return Ok(false);
        }
        self.read_value(false)?;
        self.has_decoded_value = true;
        Ok(true)
    }

    /// Decodes exactly one value, which may only be surrounded by whitespace
    pub(crate) fn decode_single_value(&mut self) -> Result<JsonValue, JsonError> {
        self.check_poisoned()?;
        if self.skip_whitespace()?.is_none() {
            return self.syntax_error(SyntaxErrorKind::IncompleteDocument);
        }
        let value = self.read_value(true)?;
        self.has_decoded_value = true;
        self.consume_trailing_whitespace()?;
        Ok(value)
    }

    /// Checks the syntax of exactly one value, which may only be surrounded by whitespace
    pub(crate) fn skip_single_value(&mut self) -> Result<(), JsonError> {
        self.check_poisoned()?;
        if self.skip_whitespace()?.is_none() {
            return self.syntax_error(SyntaxErrorKind::IncompleteDocument);
        }
        self.read_value(false)?;
        self.has_decoded_value = true;
        self.consume_trailing_whitespace()
    }

    /// Consumes whitespace at the end of the input, failing if any other data follows
    ///
    /// This can be used after the last expected value to verify that the input contains no
    /// further values.
    pub fn consume_trailing_whitespace(&mut self) -> Result<(), JsonError> {
        self.check_poisoned()?;
        match self.skip_whitespace()? {
            None => Ok(()),
            Some(_) => self.syntax_error(SyntaxErrorKind::TrailingData),
        }
    }

    fn io_error(&self, error: IoError) -> JsonError {
        JsonError::IoError {
            error,
            position: self.input.position(),
        }
    }

    fn syntax_error<T>(&mut self, kind: SyntaxErrorKind) -> Result<T, JsonError> {
        let position = self.input.position();
        self.syntax_error_at(kind, position)
    }

    fn syntax_error_at<T>(&mut self, kind: SyntaxErrorKind, position: Position) -> Result<T, JsonError> {
        let error = JsonSyntaxError { kind, position };
        self.error = Some(error.clone());
        Err(error.into())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, JsonError> {
        match self.input.peek() {
            Ok(b) => Ok(b),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn peek_byte_at(&mut self, ahead: usize) -> Result<Option<u8>, JsonError> {
        match self.input.peek_at(ahead) {
            Ok(b) => Ok(b),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Skips whitespace and peeks at the next byte
    fn skip_whitespace(&mut self) -> Result<Option<u8>, JsonError> {
        loop {
            match self.peek_byte()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.input.consume(1),
                other => return Ok(other),
            }
        }
    }

    fn skip_whitespace_no_eof(&mut self) -> Result<u8, JsonError> {
        match self.skip_whitespace()? {
            Some(b) => Ok(b),
            None => self.syntax_error(SyntaxErrorKind::IncompleteDocument),
        }
    }

    /// Reads a complete value, starting at the next non-whitespace byte
    ///
    /// Nested containers are tracked on an explicit stack instead of the call stack. Without
    /// `keep_values` only the syntax is checked, and the returned containers are empty.
    fn read_value(&mut self, keep_values: bool) -> Result<JsonValue, JsonError> {
        let mut stack: Vec<Frame> = Vec::new();
        let max_depth = self.settings.max_nesting_depth as usize;

        'values: loop {
            let is_top_level = stack.is_empty();
            let mut value = match self.skip_whitespace_no_eof()? {
                b'[' | b'{' if stack.len() >= max_depth => {
                    return self.syntax_error(SyntaxErrorKind::MaxNestingDepthExceeded)
                }
                b'{' => {
                    self.input.consume(1);
                    if self.skip_whitespace_no_eof()? == b'}' {
                        self.input.consume(1);
                        JsonValue::Object(JsonObject::new())
                    } else {
                        let (name, name_position) = self.read_member_name()?;
                        stack.push(Frame::Object {
                            members: JsonObject::new(),
                            name,
                            name_position,
                        });
                        continue 'values;
                    }
                }
                b'[' => {
                    self.input.consume(1);
                    if self.skip_whitespace_no_eof()? == b']' {
                        self.input.consume(1);
                        JsonValue::Array(Vec::new())
                    } else {
                        stack.push(Frame::Array(Vec::new()));
                        continue 'values;
                    }
                }
                b'"' => {
                    self.input.consume(1);
                    JsonValue::String(self.read_string()?)
                }
                b @ (b'-' | b'0'..=b'9') => JsonValue::Number(self.read_number(b, is_top_level)?),
                b't' => {
                    self.read_literal(b"true", is_top_level)?;
                    JsonValue::Bool(true)
                }
                b'f' => {
                    self.read_literal(b"false", is_top_level)?;
                    JsonValue::Bool(false)
                }
                b'n' => {
                    self.read_literal(b"null", is_top_level)?;
                    JsonValue::Null
                }
                b']' | b'}' => return self.syntax_error(SyntaxErrorKind::UnexpectedClosingBracket),
                b',' => return self.syntax_error(SyntaxErrorKind::UnexpectedComma),
                b':' => return self.syntax_error(SyntaxErrorKind::UnexpectedColon),
                _ => return self.syntax_error(SyntaxErrorKind::MalformedJson),
            };

            // Add the value to the enclosing container, and complete all containers which end here
            loop {
                match stack.last_mut() {
                    None => return Ok(value),
                    Some(Frame::Array(items)) => {
                        if keep_values {
                            items.push(value);
                        }
                        match self.skip_whitespace_no_eof()? {
                            b',' => {
                                self.input.consume(1);
                                continue 'values;
                            }
                            b']' => self.input.consume(1),
                            b'}' => {
                                return self.syntax_error(SyntaxErrorKind::UnexpectedClosingBracket)
                            }
                            b':' => return self.syntax_error(SyntaxErrorKind::UnexpectedColon),
                            _ => return self.syntax_error(SyntaxErrorKind::MissingComma),
                        }
                    }
                    Some(Frame::Object {
                        members,
                        name,
                        name_position,
                    }) => {
                        let member_name = std::mem::take(name);
                        if self.settings.duplicate_keys == DuplicateKeys::Reject
                            && members.contains_key(&member_name)
                        {
                            return self.syntax_error_at(
                                SyntaxErrorKind::DuplicateMemberName,
                                *name_position,
                            );
                        }
                        if keep_values {
                            members.insert(member_name, value);
                        } else if self.settings.duplicate_keys == DuplicateKeys::Reject {
                            // Only the names are needed to detect duplicates
                            members.insert(member_name, JsonValue::Null);
                        }

                        match self.skip_whitespace_no_eof()? {
                            b',' => {
                                self.input.consume(1);
                                let (next_name, next_name_position) = self.read_member_name()?;
                                *name = next_name;
                                *name_position = next_name_position;
                                continue 'values;
                            }
                            b'}' => self.input.consume(1),
                            b']' => {
                                return self.syntax_error(SyntaxErrorKind::UnexpectedClosingBracket)
                            }
                            b':' => return self.syntax_error(SyntaxErrorKind::UnexpectedColon),
                            _ => return self.syntax_error(SyntaxErrorKind::MissingComma),
                        }
                    }
                }

                value = match stack.pop() {
                    Some(Frame::Array(items)) => JsonValue::Array(items),
                    Some(Frame::Object { members, .. }) => JsonValue::Object(members),
                    None => unreachable!("stack should not be empty"),
                };
            }
        }
    }

    /// Reads a member name including the following colon
    fn read_member_name(&mut self) -> Result<(String, Position), JsonError> {
        if self.skip_whitespace_no_eof()? != b'"' {
            return self.syntax_error(SyntaxErrorKind::ExpectingMemberName);
        }
        let position = self.input.position();
        self.input.consume(1);
        let name = self.read_string()?;

        if self.skip_whitespace_no_eof()? != b':' {
            return self.syntax_error(SyntaxErrorKind::MissingColon);
        }
        self.input.consume(1);
        Ok((name, position))
    }

    fn read_literal(&mut self, literal: &[u8], is_top_level: bool) -> Result<(), JsonError> {
        for &expected in literal {
            match self.peek_byte()? {
                Some(b) if b == expected => self.input.consume(1),
                Some(_) => return self.syntax_error(SyntaxErrorKind::InvalidLiteral),
                None => return self.syntax_error(SyntaxErrorKind::IncompleteDocument),
            }
        }
        if is_top_level {
            self.verify_top_level_end(SyntaxErrorKind::TrailingDataAfterLiteral)?;
        }
        Ok(())
    }

    /// Verifies that a top-level scalar is followed by whitespace or the end of input
    fn verify_top_level_end(&mut self, error_kind: SyntaxErrorKind) -> Result<(), JsonError> {
        match self.peek_byte()? {
            None | Some(b' ' | b'\t' | b'\n' | b'\r') => Ok(()),
            Some(_) => self.syntax_error(error_kind),
        }
    }

    fn read_number(&mut self, first_byte: u8, is_top_level: bool) -> Result<JsonNumber, JsonError> {
        let mut reader = NumberTextReader {
            decoder: self,
            text: String::new(),
            current: first_byte,
        };
        let is_valid = consume_json_number(&mut reader, first_byte)?;
        let text = reader.text;

        if !is_valid {
            return self.syntax_error(SyntaxErrorKind::MalformedNumber);
        }
        if is_top_level {
            self.verify_top_level_end(SyntaxErrorKind::TrailingDataAfterNumber)?;
        }

        if self.settings.use_number {
            Ok(JsonNumber::from_valid_text(text))
        } else {
            let normalized = normalize_number(&text).unwrap_or(text);
            Ok(JsonNumber::from_valid_text(normalized))
        }
    }

    /// Reads a string value; the opening quote has already been consumed
    ///
    /// Malformed UTF-8 data and unpaired surrogate escapes are replaced with U+FFFD.
    fn read_string(&mut self) -> Result<String, JsonError> {
        let mut bytes = Vec::new();
        loop {
            let stop = self
                .input
                .copy_until(|b| b == b'"' || b == b'\\' || b < 0x20, &mut bytes);
            match stop {
                Err(e) => return Err(self.io_error(e)),
                Ok(None) => return self.syntax_error(SyntaxErrorKind::IncompleteDocument),
                Ok(Some(b'"')) => {
                    self.input.consume(1);
                    break;
                }
                Ok(Some(b'\\')) => {
                    self.input.consume(1);
                    self.read_escape_sequence(&mut bytes)?;
                }
                Ok(Some(_)) => return self.syntax_error(SyntaxErrorKind::NotEscapedControlCharacter),
            }
        }

        Ok(match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// Reads an escape sequence; the backslash has already been consumed
    fn read_escape_sequence(&mut self, bytes: &mut Vec<u8>) -> Result<(), JsonError> {
        let escape_char = match self.peek_byte()? {
            Some(b) => b,
            None => return self.syntax_error(SyntaxErrorKind::IncompleteDocument),
        };
        let unescaped = match escape_char {
            b'"' | b'\\' | b'/' => escape_char,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                self.input.consume(1);
                let c = self.read_unicode_escape_char()?;
                let mut encode_buf = [0; utf8::MAX_BYTES_PER_CHAR];
                bytes.extend_from_slice(c.encode_utf8(&mut encode_buf).as_bytes());
                return Ok(());
            }
            _ => return self.syntax_error(SyntaxErrorKind::UnknownEscapeSequence),
        };
        self.input.consume(1);
        bytes.push(unescaped);
        Ok(())
    }

    /// Reads the four hex digits of a `\u` escape
    fn read_hex_escape(&mut self) -> Result<u32, JsonError> {
        let mut value = 0;
        for _ in 0..4 {
            let digit = match self.peek_byte()? {
                Some(b) => match hex_digit_value(b) {
                    Some(digit) => digit,
                    None => return self.syntax_error(SyntaxErrorKind::MalformedEscapeSequence),
                },
                None => return self.syntax_error(SyntaxErrorKind::IncompleteDocument),
            };
            self.input.consume(1);
            value = value << 4 | digit;
        }
        Ok(value)
    }

    /// Peeks at a complete `\u` escape starting `ahead` bytes after the cursor
    fn peek_unicode_escape_at(&mut self, ahead: usize) -> Result<Option<u32>, JsonError> {
        if self.peek_byte_at(ahead)? != Some(b'\\') || self.peek_byte_at(ahead + 1)? != Some(b'u') {
            return Ok(None);
        }
        let mut value = 0;
        for i in 0..4 {
            match self.peek_byte_at(ahead + 2 + i)?.and_then(hex_digit_value) {
                Some(digit) => value = value << 4 | digit,
                None => return Ok(None),
            }
        }
        Ok(Some(value))
    }

    /// Reads the remainder of a `\u` escape, combining surrogate pairs
    fn read_unicode_escape_char(&mut self) -> Result<char, JsonError> {
        let code_point = self.read_hex_escape()?;
        if (0xD800..=0xDBFF).contains(&code_point) {
            // Only combine with a directly following escaped low surrogate; otherwise leave the
            // following data for regular processing
            if let Some(low) = self.peek_unicode_escape_at(0)? {
                if (0xDC00..=0xDFFF).contains(&low) {
                    self.input.consume(6);
                    let combined = 0x10000 + ((code_point - 0xD800) << 10) + (low - 0xDC00);
                    return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        // Unpaired low surrogates are not valid chars either
        Ok(char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

fn hex_digit_value(b: u8) -> Option<u32> {
    char::from(b).to_digit(16)
}

impl<'a> JsonDecoder<BytesSource<'a>> {
    /// Creates a decoder for in-memory JSON data
    pub fn from_bytes(data: &'a [u8]) -> Self {
        JsonDecoder::new(BytesSource::new(data))
    }
}

impl JsonDecoder<ReadSource<File>> {
    /// Creates a decoder reading the file at `path`
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        Ok(JsonDecoder::new(ReadSource::open_path(path)?))
    }
}

/// Collects the bytes of a number while the number grammar consumes them
struct NumberTextReader<'d, S: ByteSource> {
    decoder: &'d mut JsonDecoder<S>,
    text: String,
    current: u8,
}

impl<S: ByteSource> NumberBytesProvider<JsonError> for NumberTextReader<'_, S> {
    fn consume_current_peek_next(&mut self) -> Result<Option<u8>, JsonError> {
        // Number chars are all ASCII
        self.text.push(char::from(self.current));
        self.decoder.input.consume(1);
        let next = self.decoder.peek_byte()?;
        if let Some(b) = next {
            self.current = b;
        }
        Ok(next)
    }
}

impl<S: ByteSource + Debug> Debug for JsonDecoder<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug_struct = f.debug_struct("JsonDecoder");
        self.input.debug_buffer(&mut debug_struct);
        debug_struct.field("position", &self.input.position());
        debug_struct.field("settings", &self.settings);
        if let Some(error) = &self.error {
            debug_struct.field("error", error);
        }
        debug_struct.finish_non_exhaustive()
    }
}
