//! Escaping of XML special characters

use crate::io::{write_to_sink, ByteSink, WriteError};

/// Writes `bytes` to the sink with the XML special characters replaced by entities
///
/// `<`, `>`, `&`, `'` and `"` are replaced by `&lt;`, `&gt;`, `&amp;`, `&#39;` and `&#34;`.
/// All other bytes, including malformed UTF-8 data, are written unchanged. Fails only if the
/// sink fails.
pub fn escape<S: ByteSink + ?Sized>(sink: &mut S, bytes: &[u8]) -> Result<(), WriteError> {
    let mut out = Vec::with_capacity(bytes.len());
    escape_into(&mut out, bytes, EscapeMode::Markup);
    write_to_sink(sink, &out)
}

/// Writes character data to the sink with the XML special characters replaced by entities
///
/// In addition to the replacements of [`escape`], carriage returns are written as `&#xD;` so
/// that they survive the line break normalization of XML parsers. Malformed UTF-8 data and
/// characters which are not allowed in XML are written unchanged. Fails only if the sink fails.
///
/// # Examples
/// ```
/// # use textstream::xml::escape_text;
/// let mut out = Vec::new();
/// escape_text(&mut out, b"1 < 2 & \xFF")?;
/// assert_eq!(b"1 &lt; 2 &amp; \xFF", out.as_slice());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn escape_text<S: ByteSink + ?Sized>(sink: &mut S, bytes: &[u8]) -> Result<(), WriteError> {
    let mut out = Vec::with_capacity(bytes.len());
    escape_into(&mut out, bytes, EscapeMode::Text);
    write_to_sink(sink, &out)
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) enum EscapeMode {
    /// Only the characters with special meaning in markup
    Markup,
    /// Additionally carriage returns, for character data
    Text,
    /// Additionally all line breaks and tabs, for attribute values
    Attribute,
}

pub(crate) fn escape_into(out: &mut Vec<u8>, bytes: &[u8], mode: EscapeMode) {
    let mut next_to_write_index = 0;
    for (index, &b) in bytes.iter().enumerate() {
        let entity: &[u8] = match b {
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'&' => b"&amp;",
            b'\'' => b"&#39;",
            b'"' => b"&#34;",
            b'\r' if mode != EscapeMode::Markup => b"&#xD;",
            b'\n' if mode == EscapeMode::Attribute => b"&#xA;",
            b'\t' if mode == EscapeMode::Attribute => b"&#x9;",
            _ => continue,
        };
        out.extend_from_slice(&bytes[next_to_write_index..index]);
        out.extend_from_slice(entity);
        next_to_write_index = index + 1;
    }
    out.extend_from_slice(&bytes[next_to_write_index..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn escape_special_chars() -> TestResult {
        let mut out = Vec::new();
        escape(&mut out, b"a<b>&'\"\r\n")?;
        assert_eq!(b"a&lt;b&gt;&amp;&#39;&#34;\r\n".as_slice(), out);
        Ok(())
    }

    #[test]
    fn escape_text_carriage_return() -> TestResult {
        let mut out = Vec::new();
        escape_text(&mut out, b"x\r\ny\t")?;
        assert_eq!(b"x&#xD;\ny\t".as_slice(), out);
        Ok(())
    }

    #[test]
    fn escape_attribute() {
        let mut out = Vec::new();
        escape_into(&mut out, b"a\tb\r\nc\"", EscapeMode::Attribute);
        assert_eq!(b"a&#x9;b&#xD;&#xA;c&#34;".as_slice(), out);
    }

    #[test]
    fn malformed_data_preserved() -> TestResult {
        let mut out = Vec::new();
        escape_text(&mut out, b"<\xff>\x00")?;
        assert_eq!(b"&lt;\xff&gt;\x00".as_slice(), out);

        out.clear();
        escape(&mut out, "\u{E9}".as_bytes())?;
        assert_eq!("\u{E9}".as_bytes(), out);
        Ok(())
    }

    #[test]
    fn sink_failure() {
        struct FailingSink;
        impl ByteSink for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> Result<usize, std::io::Error> {
                Err(std::io::Error::other("closed"))
            }
        }

        let error = escape(&mut FailingSink, b"<").unwrap_err();
        assert_eq!(crate::ErrorKind::WriteError, error.kind());
        // Nothing to write, so the sink is not called
        assert!(escape(&mut FailingSink, b"").is_ok());
    }
}
