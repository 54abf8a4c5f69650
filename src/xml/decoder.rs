//! Pull decoder reading XML tokens

use std::{
    fmt::{Debug, Formatter},
    fs::File,
    path::Path,
};

use super::{
    token::{is_name_byte, is_name_start_byte},
    *,
};
use crate::{
    io::{ByteSource, BytesSource, ReadSource, SourceBuffer},
    utf8,
};

/// Namespace bound to the predefined `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
const XML_PREFIX: &str = "xml";
const XMLNS_PREFIX: &str = "xmlns";

/// Maximum length of the name of a character entity
const MAX_ENTITY_LEN: usize = 32;

/// Element which has been started but not ended yet
#[derive(Debug)]
struct OpenElement {
    /// Name as written in the document, without namespace translation
    name: Name,
    /// Length of the namespace bindings before the element declared its own
    bindings_start: usize,
}

/// A pull decoder reading [`Token`]s from a [`ByteSource`]
///
/// [`token`](Self::token) returns one token per call and `Ok(None)` once the input is
/// exhausted. End elements are verified to match the corresponding start element, and
/// namespace prefixes are resolved against the `xmlns` declarations currently in effect.
///
/// Once a syntax error occurred the decoder is *poisoned*: every further call to
/// [`token`](Self::token) returns the same error. IO errors do not poison the decoder.
///
/// # Examples
/// ```
/// # use textstream::xml::*;
/// let mut decoder = XmlDecoder::from_bytes(b"<list><item>1</item></list>");
/// let mut text = Vec::new();
/// while let Some(token) = decoder.token()? {
///     if let Token::CharData(data) = token {
///         text.extend(data);
///     }
/// }
/// assert_eq!(b"1", text.as_slice());
/// assert_eq!((1, 28), decoder.input_pos());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct XmlDecoder<S: ByteSource> {
    input: SourceBuffer<S>,
    stack: Vec<OpenElement>,
    /// Namespace bindings in declaration order as `(prefix, namespace)`; the empty prefix is
    /// the default namespace
    bindings: Vec<(String, String)>,
    /// Name of a self-closing element whose synthetic end element is returned next
    pending_end: Option<Name>,
    /// Syntax error which poisoned this decoder
    error: Option<XmlSyntaxError>,
}

impl<S: ByteSource> XmlDecoder<S> {
    /// Creates a decoder reading from the source
    pub fn new(source: S) -> Self {
        XmlDecoder {
            input: SourceBuffer::new(source),
            stack: Vec::new(),
            bindings: Vec::new(),
            pending_end: None,
            error: None,
        }
    }

    /// Byte offset directly after the most recently returned token
    pub fn input_offset(&self) -> u64 {
        self.input.offset()
    }

    /// Line and column directly after the most recently returned token
    ///
    /// Both start at 1. Columns are counted in characters; only `\n` starts a new line.
    pub fn input_pos(&self) -> (u64, u64) {
        let position = self.input.position();
        (position.line, position.column)
    }

    /// Position directly after the most recently returned token
    pub fn current_position(&self) -> Position {
        self.input.position()
    }

    /// Unwraps this decoder, returning the source
    ///
    /// Bytes which the decoder has read ahead are lost.
    pub fn into_inner(self) -> S {
        self.input.into_parts().0
    }

    fn check_poisoned(&self) -> Result<(), XmlError> {
        match &self.error {
            Some(e) => Err(e.clone().into()),
            None => Ok(()),
        }
    }

    /// Reads the next token
    ///
    /// Namespace prefixes of element and attribute names are resolved, see [`Name::space`].
    /// A self-closing element `<a/>` is returned as start element followed by end element.
    /// Returns `Ok(None)` at the end of a well-formed input, and a syntax error if the input
    /// ends while elements are still open.
    pub fn token(&mut self) -> Result<Option<Token>, XmlError> {
        self.check_poisoned()?;
        let token = match self.read_raw_token()? {
            Some(token) => token,
            None => {
                if self.stack.is_empty() {
                    return Ok(None);
                }
                return self.syntax_error(XmlSyntaxErrorKind::UnexpectedEof);
            }
        };

        Ok(Some(match token {
            Token::StartElement(mut start) => {
                let bindings_start = self.bindings.len();
                for attr in &start.attrs {
                    if attr.name.prefix == XMLNS_PREFIX {
                        self.bindings
                            .push((attr.name.local.clone(), attr.value.clone()));
                    } else if attr.name.prefix.is_empty() && attr.name.local == XMLNS_PREFIX {
                        self.bindings.push((String::new(), attr.value.clone()));
                    }
                }
                self.stack.push(OpenElement {
                    name: start.name.clone(),
                    bindings_start,
                });

                self.translate(&mut start.name, true);
                for attr in &mut start.attrs {
                    self.translate(&mut attr.name, false);
                }
                Token::StartElement(start)
            }
            Token::EndElement(mut end) => {
                let open = match self.stack.pop() {
                    Some(open) => open,
                    None => {
                        return self.syntax_error(XmlSyntaxErrorKind::UnexpectedEndElement {
                            name: end.name.qualified(),
                        })
                    }
                };
                if open.name.prefix != end.name.prefix || open.name.local != end.name.local {
                    return self.syntax_error(XmlSyntaxErrorKind::MismatchedEndElement {
                        open: open.name.qualified(),
                        close: end.name.qualified(),
                    });
                }
                // Declarations of the element still apply to its end element
                self.translate(&mut end.name, true);
                self.bindings.truncate(open.bindings_start);
                Token::EndElement(end)
            }
            other => other,
        }))
    }

    /// Reads the next token without namespace resolution and end element verification
    ///
    /// Names keep an empty [`Name::space`]. Mixing calls of this method and of
    /// [`token`](Self::token) leaves the element stack of `token` incomplete.
    pub fn raw_token(&mut self) -> Result<Option<Token>, XmlError> {
        self.check_poisoned()?;
        self.read_raw_token()
    }

    /// Consumes tokens through the end element of the most recently started element
    ///
    /// Nested elements are skipped as a whole. If called directly after a start element was
    /// returned, the whole element is skipped.
    pub fn skip(&mut self) -> Result<(), XmlError> {
        let mut depth = 0_usize;
        loop {
            match self.token()? {
                Some(Token::StartElement(_)) => depth += 1,
                Some(Token::EndElement(_)) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Some(_) => {}
                None => return Ok(()),
            }
        }
    }

    /// Resolves the namespace of a name against the bindings currently in effect
    fn translate(&self, name: &mut Name, is_element_name: bool) {
        if name.prefix == XMLNS_PREFIX {
            name.space = XMLNS_PREFIX.to_owned();
            return;
        }
        if name.prefix.is_empty() && (!is_element_name || name.local == XMLNS_PREFIX) {
            return;
        }
        if name.prefix == XML_PREFIX {
            name.space = XML_NAMESPACE.to_owned();
            return;
        }

        let binding = self
            .bindings
            .iter()
            .rev()
            .find(|(prefix, _)| *prefix == name.prefix);
        name.space = match binding {
            Some((_, space)) => space.clone(),
            // Unknown prefixes are kept as namespace
            None => name.prefix.clone(),
        };
    }

    fn io_error(&self, error: IoError) -> XmlError {
        XmlError::IoError {
            error,
            position: self.input.position(),
        }
    }

    fn syntax_error<T>(&mut self, kind: XmlSyntaxErrorKind) -> Result<T, XmlError> {
        let error = XmlSyntaxError {
            kind,
            position: self.input.position(),
        };
        self.error = Some(error.clone());
        Err(error.into())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, XmlError> {
        match self.input.peek() {
            Ok(b) => Ok(b),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn peek_byte_at(&mut self, ahead: usize) -> Result<Option<u8>, XmlError> {
        match self.input.peek_at(ahead) {
            Ok(b) => Ok(b),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Peeks at the next byte, which must exist because markup is incomplete
    fn peek_byte_no_eof(&mut self) -> Result<u8, XmlError> {
        match self.peek_byte()? {
            Some(b) => Ok(b),
            None => self.syntax_error(XmlSyntaxErrorKind::UnexpectedEof),
        }
    }

    fn read_byte_no_eof(&mut self) -> Result<u8, XmlError> {
        let b = self.peek_byte_no_eof()?;
        self.input.consume(1);
        Ok(b)
    }

    fn skip_whitespace(&mut self) -> Result<(), XmlError> {
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek_byte()? {
            self.input.consume(1);
        }
        Ok(())
    }

    fn read_raw_token(&mut self) -> Result<Option<Token>, XmlError> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(Token::EndElement(EndElement { name })));
        }

        match self.peek_byte()? {
            None => return Ok(None),
            Some(b'<') => self.input.consume(1),
            Some(_) => return Ok(Some(Token::CharData(self.read_text(None, false)?))),
        }

        let token = match self.peek_byte_no_eof()? {
            b'/' => {
                self.input.consume(1);
                let name = match self.read_name()? {
                    Some(name) => name,
                    None => return self.syntax_error(XmlSyntaxErrorKind::ExpectedElementName),
                };
                self.skip_whitespace()?;
                let b = self.read_byte_no_eof()?;
                if b != b'>' {
                    return self.syntax_error(XmlSyntaxErrorKind::UnexpectedCharacter {
                        found: char::from(b),
                        context: "between </name and >",
                    });
                }
                Token::EndElement(EndElement { name })
            }
            b'?' => {
                self.input.consume(1);
                Token::ProcInst(self.read_proc_inst()?)
            }
            b'!' => {
                self.input.consume(1);
                match self.peek_byte_no_eof()? {
                    b'-' => {
                        self.input.consume(1);
                        if self.read_byte_no_eof()? != b'-' {
                            return self.syntax_error(XmlSyntaxErrorKind::MalformedCommentStart);
                        }
                        Token::Comment(self.read_comment()?)
                    }
                    b'[' => {
                        for &expected in b"[CDATA[" {
                            if self.read_byte_no_eof()? != expected {
                                return self.syntax_error(XmlSyntaxErrorKind::InvalidCdataSection);
                            }
                        }
                        Token::CharData(self.read_text(None, true)?)
                    }
                    _ => Token::Directive(self.read_directive()?),
                }
            }
            _ => self.read_start_element()?,
        };
        Ok(Some(token))
    }

    /// Reads a start tag; the `<` has already been consumed
    fn read_start_element(&mut self) -> Result<Token, XmlError> {
        let name = match self.read_name()? {
            Some(name) => name,
            None => return self.syntax_error(XmlSyntaxErrorKind::ExpectedElementName),
        };
        let mut start = StartElement::new(name);

        loop {
            self.skip_whitespace()?;
            match self.peek_byte_no_eof()? {
                b'/' => {
                    self.input.consume(1);
                    let b = self.read_byte_no_eof()?;
                    if b != b'>' {
                        return self.syntax_error(XmlSyntaxErrorKind::UnexpectedCharacter {
                            found: char::from(b),
                            context: "after / in element",
                        });
                    }
                    self.pending_end = Some(start.name.clone());
                    break;
                }
                b'>' => {
                    self.input.consume(1);
                    break;
                }
                _ => {}
            }

            let attr_name = match self.read_name()? {
                Some(name) => name,
                None => return self.syntax_error(XmlSyntaxErrorKind::ExpectedAttributeName),
            };
            self.skip_whitespace()?;
            if self.peek_byte_no_eof()? != b'=' {
                return self.syntax_error(XmlSyntaxErrorKind::MissingAttributeEquals);
            }
            self.input.consume(1);
            self.skip_whitespace()?;

            let quote = self.peek_byte_no_eof()?;
            if quote != b'"' && quote != b'\'' {
                return self.syntax_error(XmlSyntaxErrorKind::UnquotedAttributeValue);
            }
            self.input.consume(1);
            let value = self.read_text(Some(quote), false)?;
            let value = match String::from_utf8(value) {
                Ok(value) => value,
                Err(_) => return self.syntax_error(XmlSyntaxErrorKind::InvalidUtf8),
            };
            start.attrs.push(Attr::new(attr_name, value));
        }
        Ok(Token::StartElement(start))
    }

    /// Reads a name and splits it into prefix and local part
    ///
    /// Returns `None` without consuming anything if the next byte cannot start a name.
    fn read_name(&mut self) -> Result<Option<Name>, XmlError> {
        if !is_name_start_byte(self.peek_byte_no_eof()?) {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        while let Some(b) = self.peek_byte()? {
            if !is_name_byte(b) {
                break;
            }
            bytes.push(b);
            self.input.consume(1);
        }
        match String::from_utf8(bytes) {
            Ok(name) => Ok(Some(Name::parse_qualified(&name))),
            Err(_) => self.syntax_error(XmlSyntaxErrorKind::InvalidUtf8),
        }
    }

    /// Reads character data, an attribute value or a CDATA section
    ///
    /// Attribute values end at `quote`, which is consumed. CDATA sections end at `]]>`, which
    /// is consumed, and do not decode entities. Plain character data ends before the next `<`
    /// or at the end of the input.
    fn read_text(&mut self, quote: Option<u8>, is_cdata: bool) -> Result<Vec<u8>, XmlError> {
        let mut text = Vec::new();
        loop {
            let stop = self.input.copy_until(
                |b| match b {
                    b'<' | b'&' => !is_cdata,
                    b'\r' | b']' => true,
                    b'\t' | b'\n' => false,
                    _ => b < 0x20 || b >= 0x80 || Some(b) == quote,
                },
                &mut text,
            );
            let b = match stop {
                Err(e) => return Err(self.io_error(e)),
                Ok(Some(b)) => b,
                Ok(None) => {
                    if quote.is_some() || is_cdata {
                        return self.syntax_error(XmlSyntaxErrorKind::UnexpectedEof);
                    }
                    return Ok(text);
                }
            };

            match b {
                b'<' => {
                    if quote.is_some() {
                        return self.syntax_error(XmlSyntaxErrorKind::UnescapedLessThanInAttribute);
                    }
                    return Ok(text);
                }
                b'&' => {
                    self.input.consume(1);
                    self.read_entity(&mut text)?;
                }
                b'\r' => {
                    // Normalize line breaks
                    self.input.consume(1);
                    if self.peek_byte()? == Some(b'\n') {
                        self.input.consume(1);
                    }
                    text.push(b'\n');
                }
                b']' => {
                    if self.peek_byte_at(1)? == Some(b']') && self.peek_byte_at(2)? == Some(b'>') {
                        if is_cdata {
                            self.input.consume(3);
                            return Ok(text);
                        }
                        return self.syntax_error(XmlSyntaxErrorKind::UnescapedCdataEnd);
                    }
                    self.input.consume(1);
                    text.push(b);
                }
                _ if Some(b) == quote => {
                    self.input.consume(1);
                    return Ok(text);
                }
                _ if b >= 0x80 => self.read_multi_byte_char(b, &mut text)?,
                _ => {
                    return self.syntax_error(XmlSyntaxErrorKind::IllegalCharacter {
                        code_point: u32::from(b),
                    })
                }
            }
        }
    }

    /// Reads a non-ASCII char starting with the byte `b0`, which has been peeked
    fn read_multi_byte_char(&mut self, b0: u8, text: &mut Vec<u8>) -> Result<(), XmlError> {
        let len = match utf8::encoded_len(b0) {
            Some(len) if len > 1 => len,
            _ => return self.syntax_error(XmlSyntaxErrorKind::InvalidUtf8),
        };
        let mut bytes = [0; utf8::MAX_BYTES_PER_CHAR];
        for (i, byte) in bytes[..len].iter_mut().enumerate() {
            match self.peek_byte_at(i)? {
                Some(b) => *byte = b,
                None => return self.syntax_error(XmlSyntaxErrorKind::InvalidUtf8),
            }
        }
        let c = match utf8::decode_char(&bytes[..len]) {
            Some(c) => c,
            None => return self.syntax_error(XmlSyntaxErrorKind::InvalidUtf8),
        };
        if !is_xml_char(c) {
            return self.syntax_error(XmlSyntaxErrorKind::IllegalCharacter {
                code_point: u32::from(c),
            });
        }
        self.input.consume(len);
        text.extend_from_slice(&bytes[..len]);
        Ok(())
    }

    /// Reads a character entity; the `&` has already been consumed
    fn read_entity(&mut self, text: &mut Vec<u8>) -> Result<(), XmlError> {
        let mut entity = String::new();
        while let Some(b) = self.peek_byte()? {
            if !(b.is_ascii_alphanumeric() || b == b'#') || entity.len() >= MAX_ENTITY_LEN {
                break;
            }
            entity.push(char::from(b));
            self.input.consume(1);
        }
        if self.peek_byte()? != Some(b';') {
            return self.syntax_error(XmlSyntaxErrorKind::InvalidEntity { entity });
        }
        self.input.consume(1);

        let c = match entity.as_str() {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "apos" => Some('\''),
            "quot" => Some('"'),
            _ => {
                let code_point = match entity.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => entity
                        .strip_prefix('#')
                        .and_then(|decimal| decimal.parse::<u32>().ok()),
                };
                code_point.and_then(char::from_u32).filter(|&c| is_xml_char(c))
            }
        };
        match c {
            Some(c) => {
                let mut encode_buf = [0; utf8::MAX_BYTES_PER_CHAR];
                text.extend_from_slice(c.encode_utf8(&mut encode_buf).as_bytes());
                Ok(())
            }
            None => self.syntax_error(XmlSyntaxErrorKind::InvalidEntity { entity }),
        }
    }

    /// Reads a comment; the `<!--` has already been consumed
    fn read_comment(&mut self) -> Result<Vec<u8>, XmlError> {
        let mut content = Vec::new();
        loop {
            match self.input.copy_until(|b| b == b'-', &mut content) {
                Err(e) => return Err(self.io_error(e)),
                Ok(None) => return self.syntax_error(XmlSyntaxErrorKind::UnexpectedEof),
                Ok(Some(_)) => self.input.consume(1),
            }
            if self.peek_byte_no_eof()? == b'-' {
                self.input.consume(1);
                if self.peek_byte_no_eof()? != b'>' {
                    return self.syntax_error(XmlSyntaxErrorKind::DoubleHyphenInComment);
                }
                self.input.consume(1);
                return Ok(content);
            }
            content.push(b'-');
        }
    }

    /// Reads a processing instruction; the `<?` has already been consumed
    fn read_proc_inst(&mut self) -> Result<ProcInst, XmlError> {
        let target = match self.read_name()? {
            Some(name) => name.qualified(),
            None => return self.syntax_error(XmlSyntaxErrorKind::ExpectedProcInstTarget),
        };
        self.skip_whitespace()?;

        let mut inst = Vec::new();
        loop {
            match self.input.copy_until(|b| b == b'?', &mut inst) {
                Err(e) => return Err(self.io_error(e)),
                Ok(None) => return self.syntax_error(XmlSyntaxErrorKind::UnexpectedEof),
                Ok(Some(_)) => self.input.consume(1),
            }
            if self.peek_byte_no_eof()? == b'>' {
                self.input.consume(1);
                break;
            }
            inst.push(b'?');
        }

        if target == XML_PREFIX {
            if let Some(version) = proc_inst_param(&inst, "version") {
                if version != "1.0" {
                    return self.syntax_error(XmlSyntaxErrorKind::UnsupportedVersion { version });
                }
            }
            if let Some(encoding) = proc_inst_param(&inst, "encoding") {
                let is_supported = ["utf-8", "utf8", "us-ascii", "ascii"]
                    .iter()
                    .any(|supported| encoding.eq_ignore_ascii_case(supported));
                if !is_supported {
                    return self.syntax_error(XmlSyntaxErrorKind::UnsupportedEncoding { encoding });
                }
            }
        }
        Ok(ProcInst { target, inst })
    }

    /// Reads a directive such as `<!DOCTYPE ...>`; the `<!` has already been consumed
    ///
    /// Nested `<...>` pairs and quoted strings are part of the directive. Comments inside the
    /// directive are replaced with a single space.
    fn read_directive(&mut self) -> Result<Vec<u8>, XmlError> {
        let mut content = Vec::new();
        let mut quote = None;
        let mut depth = 0_usize;
        loop {
            let b = self.read_byte_no_eof()?;
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => match b {
                    b'>' if depth == 0 => return Ok(content),
                    b'>' => depth -= 1,
                    b'\'' | b'"' => quote = Some(b),
                    b'<' => {
                        if self.peek_byte()? == Some(b'!')
                            && self.peek_byte_at(1)? == Some(b'-')
                            && self.peek_byte_at(2)? == Some(b'-')
                        {
                            self.input.consume(3);
                            self.skip_directive_comment()?;
                            content.push(b' ');
                            continue;
                        }
                        depth += 1;
                    }
                    _ => {}
                },
            }
            content.push(b);
        }
    }

    /// Skips the rest of a comment nested in a directive, including the `-->`
    fn skip_directive_comment(&mut self) -> Result<(), XmlError> {
        let (mut b0, mut b1) = (0, 0);
        loop {
            let b = self.read_byte_no_eof()?;
            if b0 == b'-' && b1 == b'-' && b == b'>' {
                return Ok(());
            }
            (b0, b1) = (b1, b);
        }
    }
}

/// Whether the char matches the `Char` production of XML 1.0
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(
        u32::from(c),
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Finds the quoted value of `param="..."` in the content of an XML declaration
fn proc_inst_param(inst: &[u8], param: &str) -> Option<String> {
    let content = String::from_utf8_lossy(inst);
    let pattern = format!("{param}=");
    let mut search_start = 0;
    while let Some(index) = content[search_start..].find(&pattern) {
        let value_start = search_start + index + pattern.len();
        match content[value_start..].chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let value = &content[value_start + 1..];
                return value.find(quote).map(|end| value[..end].to_owned());
            }
            _ => search_start = value_start,
        }
    }
    None
}

impl<'a> XmlDecoder<BytesSource<'a>> {
    /// Creates a decoder for in-memory XML data
    pub fn from_bytes(data: &'a [u8]) -> Self {
        XmlDecoder::new(BytesSource::new(data))
    }
}

impl XmlDecoder<ReadSource<File>> {
    /// Creates a decoder reading the file at `path`
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        Ok(XmlDecoder::new(ReadSource::open_path(path)?))
    }
}

impl<S: ByteSource + Debug> Debug for XmlDecoder<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug_struct = f.debug_struct("XmlDecoder");
        self.input.debug_buffer(&mut debug_struct);
        debug_struct.field("position", &self.input.position());
        let open_elements: Vec<String> = self.stack.iter().map(|e| e.name.qualified()).collect();
        debug_struct.field("open_elements", &open_elements);
        if let Some(error) = &self.error {
            debug_struct.field("error", error);
        }
        debug_struct.finish_non_exhaustive()
    }
}
