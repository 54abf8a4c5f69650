//! Classification shared by all error types of this crate

/// Kind of an error, independent of the format it occurred for
///
/// Every public error type of this crate provides a `kind()` method returning one of these
/// values, which allows callers to handle JSON and XML failures uniformly.
#[non_exhaustive]
#[derive(PartialEq, Eq, Clone, Copy, Hash, strum::Display, Debug)]
pub enum ErrorKind {
    /// The input is malformed
    SyntaxError,
    /// An index or a number is outside of the supported range
    RangeError,
    /// A value has a different type than the one requested
    TypeMismatch,
    /// Tokens passed to an encoder do not form a well-nested document
    StructuralError,
    /// A byte sink failed or did not accept all bytes
    WriteError,
    /// An encoder was used after it had been closed
    UseAfterClose,
    /// Any other failure, such as an IO error of a byte source
    OtherError,
}
