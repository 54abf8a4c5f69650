#![forbid(unsafe_code)]
// Allow needless `return` because that makes it sometimes more obvious that
// an expression is the result of the function
#![allow(clippy::needless_return)]
// Allow `assert_eq!(true, ...)` because in some cases it is used to check a bool
// value and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]
// When `docsrs` configuration flag is set enable banner for features in documentation
// See https://stackoverflow.com/q/61417452
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Textstream provides streaming codecs for JSON and XML.
//!
//! Both formats follow the same shape: a pull-based decoder reads incrementally from a
//! [`ByteSource`](io::ByteSource), which may deliver its data in chunks of any size, and a
//! symmetric encoder writes to a [`ByteSink`](io::ByteSink). Decoders track the byte offset
//! as well as line and column of the consumed input, and report them in syntax errors.
//!
//! - [`json`]: a [`JsonValue`](json::JsonValue) model, a decoder for sequences of top-level
//!   values, an encoder with optional pretty printing, and functions operating on complete
//!   in-memory documents ([`json::decode`], [`json::compact`], [`json::indent`], ...)
//! - [`xml`]: a pull tokenizer producing [`Token`](xml::Token)s with resolved namespaces, an
//!   encoder consuming the same tokens, and escaping functions
//!
//! All error types of this crate map to a common [`ErrorKind`].
//!
//! # Usage examples
//!
//! ## JSON
//!
//! ```
//! # use textstream::json::*;
//! // In this example JSON data comes from a byte slice;
//! // normally it would come from a file or a network connection
//! let mut decoder = JsonDecoder::from_bytes(br#"{"a": [1, true]} {"a": []}"#);
//! let mut encoder = JsonEncoder::new(Vec::new());
//!
//! while let Some(value) = decoder.decode_value()? {
//!     assert!(value.get("a")?.is_some());
//!     encoder.encode_value(&value)?;
//! }
//!
//! assert_eq!(br#"{"a":[1,true]}{"a":[]}"#, encoder.into_inner().as_slice());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## XML
//! ```
//! # use textstream::xml::*;
//! let mut decoder = XmlDecoder::from_bytes(b"<a><b x='1'/></a>");
//! let mut names = Vec::new();
//! while let Some(token) = decoder.token()? {
//!     if let Token::StartElement(start) = token {
//!         names.push(start.name.local);
//!     }
//! }
//! assert_eq!(vec!["a", "b"], names);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Serde integration
//! Optional integration with [Serde](https://docs.rs/serde/latest/serde/) exists to
//! convert a [`JsonValue`](json::JsonValue) to and from other Serde data formats.
//! See the `serde` module of this crate for more information.

pub mod error;
pub mod io;
pub mod json;
pub mod position;
pub mod xml;

#[cfg(feature = "serde")]
pub mod serde;

mod utf8;

pub use error::ErrorKind;
pub use position::Position;
