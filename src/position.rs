//! Positions within the input of a decoder

use std::fmt::{Display, Formatter};

/// Position of a decoder in its input
///
/// The position can be used for troubleshooting malformed input. Every syntax error of this
/// crate carries the position of the byte at which the problem was detected.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Position {
    /// Number of bytes consumed from the byte source before this position
    ///
    /// Bytes which the decoder has only looked ahead at are not included.
    pub offset: u64,
    /// Line number, starting at 1
    ///
    /// Only the line feed character (U+000A) starts a new line.
    pub line: u64,
    /// Character column within the current line, starting at 1
    ///
    /// Every Unicode character advances the column by one, regardless of how many bytes its
    /// UTF-8 encoding uses. Malformed UTF-8 data may make the column inaccurate.
    pub column: u64,
}

impl Position {
    /// Position in front of the first byte of the input
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl Default for Position {
    fn default() -> Self {
        Position::START
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, column {} (byte offset {})",
            self.line, self.column, self.offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!("line 1, column 1 (byte offset 0)", Position::START.to_string());
        assert_eq!(
            "line 3, column 7 (byte offset 25)",
            Position {
                offset: 25,
                line: 3,
                column: 7
            }
            .to_string()
        );
    }
}
