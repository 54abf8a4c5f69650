//! Module for reading and writing XML data
//!
//! [`XmlDecoder`] is a pull tokenizer which reads [`Token`]s from a
//! [`ByteSource`](crate::io::ByteSource), and [`XmlEncoder`] writes tokens to a
//! [`ByteSink`](crate::io::ByteSink). The functions [`escape`] and [`escape_text`] escape raw
//! bytes for embedding them in XML documents.
//!
//! # Examples
//! ```
//! # use textstream::xml::*;
//! let mut decoder = XmlDecoder::from_bytes(b"<greeting lang='en'>Hello &amp; welcome</greeting>");
//! let mut encoder = XmlEncoder::new(Vec::new());
//!
//! while let Some(token) = decoder.token()? {
//!     if let Token::StartElement(start) = &token {
//!         assert_eq!("greeting", start.name.local);
//!         assert_eq!(Some("en"), start.attr("lang"));
//!     }
//!     encoder.encode_token(&token)?;
//! }
//! encoder.close()?;
//!
//! assert_eq!(
//!     r#"<greeting lang="en">Hello &amp; welcome</greeting>"#.as_bytes(),
//!     encoder.into_inner()
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

use crate::{io::WriteError, position::Position, ErrorKind};

mod decoder;
mod encoder;
mod escape;
mod token;

pub use decoder::*;
pub use encoder::*;
pub use escape::{escape, escape_text};
pub use token::*;

type IoError = std::io::Error;

/// XML syntax error
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("XML syntax error: {kind} at {position}")]
pub struct XmlSyntaxError {
    /// Kind of the error
    pub kind: XmlSyntaxErrorKind,
    /// Position at which the error was detected
    pub position: Position,
}

/// Describes why an XML syntax error occurred
#[non_exhaustive]
#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum XmlSyntaxErrorKind {
    #[error("unexpected EOF")]
    UnexpectedEof,
    #[error("element <{open}> closed by </{close}>")]
    MismatchedEndElement { open: String, close: String },
    #[error("unexpected end element </{name}>")]
    UnexpectedEndElement { name: String },
    #[error("expected element name after <")]
    ExpectedElementName,
    #[error("invalid character {found:?} {context}")]
    UnexpectedCharacter {
        found: char,
        /// Describes where the character was found, for example "in element"
        context: &'static str,
    },
    #[error("expected attribute name in element")]
    ExpectedAttributeName,
    #[error("unquoted or missing attribute value in element")]
    UnquotedAttributeValue,
    #[error("attribute name without = in element")]
    MissingAttributeEquals,
    #[error("unescaped < inside quoted string")]
    UnescapedLessThanInAttribute,
    #[error("invalid character entity &{entity};")]
    InvalidEntity { entity: String },
    #[error("illegal character code U+{code_point:04X}")]
    IllegalCharacter { code_point: u32 },
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("unescaped ]]> not in CDATA section")]
    UnescapedCdataEnd,
    #[error("invalid sequence <!- not part of <!--")]
    MalformedCommentStart,
    #[error("invalid sequence \"--\" not allowed in comments")]
    DoubleHyphenInComment,
    #[error("invalid <![ sequence")]
    InvalidCdataSection,
    #[error("expected target name after <?")]
    ExpectedProcInstTarget,
    #[error("unsupported version {version:?}; only version 1.0 is supported")]
    UnsupportedVersion { version: String },
    #[error("xml declaration specifies unsupported encoding {encoding:?}")]
    UnsupportedEncoding { encoding: String },
}

/// Error which occurred while decoding XML
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum XmlError {
    /// The XML data is malformed
    #[error("syntax error: {0}")]
    SyntaxError(#[from] XmlSyntaxError),
    /// The byte source failed
    #[error("IO error '{error}' at (roughly) {position}")]
    IoError {
        /// The IO error which occurred
        error: IoError,
        /// Position of the decoder when the error occurred
        position: Position,
    },
}

impl XmlError {
    /// Gets the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            XmlError::SyntaxError(_) => ErrorKind::SyntaxError,
            XmlError::IoError { .. } => ErrorKind::OtherError,
        }
    }

    /// Gets the position at which the error occurred
    pub fn position(&self) -> Position {
        match self {
            XmlError::SyntaxError(e) => e.position,
            XmlError::IoError { position, .. } => *position,
        }
    }
}

/// Describes why the tokens written to an [`XmlEncoder`] do not form a well-formed document
#[non_exhaustive]
#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum StructuralErrorKind {
    #[error("end element </{name}> without start element")]
    EndWithoutStart { name: String },
    #[error("end element </{close}> does not match start element <{open}>")]
    MismatchedEnd { open: String, close: String },
    #[error("unclosed tag <{name}>")]
    UnclosedElement { name: String },
}

/// Error which occurred while encoding XML
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum XmlEncodeError {
    /// The encoder has already been closed
    #[error("encoder has already been closed")]
    UseAfterClose,
    /// The tokens do not form well-formed XML
    #[error("structural error: {0}")]
    Structural(#[from] StructuralErrorKind),
    /// The token cannot be represented in XML, for example a comment containing `--`
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The byte sink failed
    #[error("write error: {0}")]
    WriteError(#[from] WriteError),
}

impl XmlEncodeError {
    /// Gets the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            XmlEncodeError::UseAfterClose => ErrorKind::UseAfterClose,
            XmlEncodeError::Structural(_) | XmlEncodeError::InvalidToken(_) => {
                ErrorKind::StructuralError
            }
            XmlEncodeError::WriteError(_) => ErrorKind::WriteError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let error = XmlSyntaxError {
            kind: XmlSyntaxErrorKind::MismatchedEndElement {
                open: "a".to_owned(),
                close: "b".to_owned(),
            },
            position: Position {
                offset: 7,
                line: 1,
                column: 8,
            },
        };
        assert_eq!(
            "XML syntax error: element <a> closed by </b> at line 1, column 8 (byte offset 7)",
            error.to_string()
        );
        assert_eq!(ErrorKind::SyntaxError, XmlError::from(error).kind());

        assert_eq!(
            "illegal character code U+0001",
            XmlSyntaxErrorKind::IllegalCharacter { code_point: 1 }.to_string()
        );
        assert_eq!(
            ErrorKind::StructuralError,
            XmlEncodeError::from(StructuralErrorKind::UnclosedElement {
                name: "a".to_owned()
            })
            .kind()
        );
        assert_eq!(ErrorKind::UseAfterClose, XmlEncodeError::UseAfterClose.kind());
    }
}
