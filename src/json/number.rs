//! Internal module for parsing / validating JSON numbers

use std::convert::Infallible;

pub(crate) trait NumberBytesProvider<E> {
    /// Consumes the byte which is currently processed, and peeks at the next.
    ///
    /// Returns `None` if the end of the input has been reached.
    fn consume_current_peek_next(&mut self) -> Result<Option<u8>, E>;
}

/// Consumes a JSON number whose first byte is `first_byte`, returning whether it is valid
///
/// The number ends at the first byte which cannot be part of a number; that byte is not
/// consumed. A number directly followed by a number char which is not allowed at that point,
/// e.g. "01" or "1.e5", is invalid.
pub(crate) fn consume_json_number<E, R: NumberBytesProvider<E>>(
    reader: &mut R,
    first_byte: u8,
) -> Result<bool, E> {
    #[derive(PartialEq, Clone, Copy)]
    enum State {
        Start,
        Minus,
        IntZero,
        IntNonZero,
        DecimalPoint,
        DecimalDigit,
        ExpE,
        ExpSign,
        ExpDigit,
    }

    let mut byte = first_byte;
    let mut state = State::Start;

    loop {
        state = match (state, byte) {
            (State::Start, b'-') => State::Minus,
            (State::Start | State::Minus, b'0') => State::IntZero,
            (State::Start | State::Minus | State::IntNonZero, b'0'..=b'9') => State::IntNonZero,
            (State::IntZero | State::IntNonZero, b'.') => State::DecimalPoint,
            (State::DecimalPoint | State::DecimalDigit, b'0'..=b'9') => State::DecimalDigit,
            (State::IntZero | State::IntNonZero | State::DecimalDigit, b'e' | b'E') => State::ExpE,
            (State::ExpE, b'+' | b'-') => State::ExpSign,
            (State::ExpE | State::ExpSign | State::ExpDigit, b'0'..=b'9') => State::ExpDigit,
            // Number char which is not allowed at this point
            (_, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') => return Ok(false),
            _ => break,
        };

        // In the first iteration this consumes the `first_byte` argument
        match reader.consume_current_peek_next()? {
            Some(peeked_byte) => byte = peeked_byte,
            None => break,
        }
    }

    Ok(matches!(
        state,
        State::IntZero | State::IntNonZero | State::DecimalDigit | State::ExpDigit
    ))
}

struct SliceNumberBytesProvider<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl NumberBytesProvider<Infallible> for SliceNumberBytesProvider<'_> {
    fn consume_current_peek_next(&mut self) -> Result<Option<u8>, Infallible> {
        self.index += 1;
        Ok(self.bytes.get(self.index).copied())
    }
}

/// Whether the complete string is a valid JSON number
pub(crate) fn is_valid_json_number(value: &str) -> bool {
    let bytes = value.as_bytes();
    let Some(&first_byte) = bytes.first() else {
        return false;
    };

    let mut provider = SliceNumberBytesProvider { bytes, index: 0 };
    let is_valid = matches!(consume_json_number(&mut provider, first_byte), Ok(true));
    is_valid && provider.index == bytes.len()
}

/// Formats a finite `f64` in its shortest representation which parses back to the same value
///
/// Exponent notation with explicit sign and at least two exponent digits is used for absolute
/// values below 1e-6 and from 1e21 onwards, for example `1e+21` and `1.5e-07`.
pub(crate) fn format_f64(value: f64) -> String {
    let abs = value.abs();
    if abs == 0.0 || (1e-6..1e21).contains(&abs) {
        // `Display` never uses exponent notation and omits a trailing ".0"
        return format!("{value}");
    }

    let formatted = format!("{value:e}");
    let (mantissa, exponent) = formatted
        .split_once('e')
        .unwrap_or((formatted.as_str(), "0"));
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    let padding = if digits.len() < 2 { "0" } else { "" };
    format!("{mantissa}e{sign}{padding}{digits}")
}

/// Re-renders a valid JSON number through `f64`
///
/// Returns `None` if the number is not representable as finite `f64`.
pub(crate) fn normalize_number(text: &str) -> Option<String> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(format_f64)
}
