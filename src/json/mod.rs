//! Module for reading and writing JSON data
//!
//! [`JsonDecoder`] reads a stream of top-level JSON values from a [`ByteSource`](crate::io::ByteSource)
//! and [`JsonEncoder`] writes values to a [`ByteSink`](crate::io::ByteSink). Decoded values are
//! represented as [`JsonValue`]. For complete in-memory documents the functions [`decode`],
//! [`validate`], [`compact`], [`indent`], [`html_escape`] and [`encode`] are more convenient.
//!
//! # Examples
//! ```
//! # use textstream::json::*;
//! let value = decode(br#"{"name": "value", "list": [1, 2.50]}"#)?;
//! assert_eq!("value", value.get("name")?.unwrap().as_str()?);
//! // Numbers keep their original text
//! assert_eq!("2.50", value.get("list")?.unwrap().array_get(1)?.as_number()?.as_str());
//!
//! assert_eq!(br#"{"name":"value","list":[1,2.50]}"#.as_slice(), encode(&value));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

use crate::{position::Position, ErrorKind};

mod bytes;
mod decoder;
mod encoder;
mod number;
mod value;

pub use bytes::*;
pub use decoder::*;
pub use encoder::*;
pub use value::*;

type IoError = std::io::Error;

/// JSON syntax error
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("JSON syntax error {kind} at {position}")]
pub struct JsonSyntaxError {
    /// Kind of the error
    pub kind: SyntaxErrorKind,
    /// Position of the byte at which the error was detected
    pub position: Position,
}

/// Describes why a syntax error occurred
#[non_exhaustive]
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum SyntaxErrorKind {
    /// A literal value is incomplete or invalid, for example `nul`
    InvalidLiteral,
    /// A top-level literal value is directly followed by data which is not whitespace, for example `truey`
    TrailingDataAfterLiteral,
    /// A closing bracket was encountered where no value, or a different closing bracket, was expected
    UnexpectedClosingBracket,
    /// A comma was encountered where a value was expected, for example `[1,,2]`
    UnexpectedComma,
    /// A colon was encountered outside of an object member, for example `[1:2]`
    UnexpectedColon,
    /// Two values or members are not separated by a comma, for example `[1 2]`
    MissingComma,
    /// The colon between member name and value is missing, for example `{"a" 1}`
    MissingColon,
    /// A member name was expected, for example `{1: 2}` or `{"a": 1,}`
    ExpectingMemberName,
    /// A number is malformed, for example `01` or `1.`
    MalformedNumber,
    /// A top-level number is directly followed by data which is not whitespace, for example `1a`
    TrailingDataAfterNumber,
    /// A byte was encountered which cannot start a JSON value
    MalformedJson,
    /// A control character (U+0000 to U+001F) appeared unescaped in a string
    NotEscapedControlCharacter,
    /// An unknown escape sequence such as `\x` appeared in a string
    UnknownEscapeSequence,
    /// A `\u` escape sequence is not followed by four hex digits
    MalformedEscapeSequence,
    /// The input ended before the current value was complete, or contained no value at all
    IncompleteDocument,
    /// A complete value was followed by further data where only a single value was expected
    TrailingData,
    /// An object member name appeared twice and duplicates are rejected
    DuplicateMemberName,
    /// An array or object is nested deeper than [`DecoderSettings::max_nesting_depth`] allows
    MaxNestingDepthExceeded,
}

/// Error which occurred while decoding JSON
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JsonError {
    /// The JSON data is malformed
    #[error("syntax error: {0}")]
    SyntaxError(#[from] JsonSyntaxError),
    /// The byte source failed
    #[error("IO error '{error}' at (roughly) {position}")]
    IoError {
        /// The IO error which occurred
        error: IoError,
        /// Position of the decoder when the error occurred
        position: Position,
    },
}

impl JsonError {
    /// Gets the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            JsonError::SyntaxError(_) => ErrorKind::SyntaxError,
            JsonError::IoError { .. } => ErrorKind::OtherError,
        }
    }

    /// Gets the position at which the error occurred
    pub fn position(&self) -> Position {
        match self {
            JsonError::SyntaxError(e) => e.position,
            JsonError::IoError { position, .. } => *position,
        }
    }
}
