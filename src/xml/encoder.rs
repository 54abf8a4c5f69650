//! Encoder writing XML tokens to a byte sink

use std::fmt::{Debug, Formatter};

use super::{
    decoder::XML_NAMESPACE,
    escape::{escape_into, EscapeMode},
    token::is_valid_name,
    *,
};
use crate::io::{write_to_sink, ByteSink};

/// Size of the internal buffer above which output is written to the sink without explicit flush
const FLUSH_THRESHOLD: usize = 4096;

/// Settings to customize the XML encoder behavior
///
/// These settings are used by [`XmlEncoder::new_custom`]. To avoid repeating the
/// default values for unchanged settings `..Default::default()` can be used:
/// ```
/// # use textstream::xml::*;
/// EncoderSettings {
///     self_close_empty: true,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    /// String written at the start of every line except the first one
    ///
    /// Indentation is enabled if either `prefix` or `indent` is not empty. Start and end tags
    /// of elements are then written on their own lines, unless an element only contains
    /// character data.
    ///
    /// Default: empty
    pub prefix: String,

    /// String written once per nesting level at the start of every line except the first one
    ///
    /// Default: empty
    pub indent: String,

    /// Whether an element whose end element directly follows its start element is written as
    /// self-closing tag `<a/>` instead of `<a></a>`
    ///
    /// Default: `false`
    pub self_close_empty: bool,
}

impl Default for EncoderSettings {
    /// Creates the default XML encoder settings
    ///
    /// - prefix: empty
    /// - indent: empty (no indentation)
    /// - self close empty: false
    fn default() -> Self {
        EncoderSettings {
            prefix: String::new(),
            indent: String::new(),
            self_close_empty: false,
        }
    }
}

/// Element which has been started but not ended yet
#[derive(Debug)]
struct OpenTag {
    name: Name,
    /// Default namespace in effect for the content of the element
    default_space: String,
    /// Length of the prefix bindings before the element declared its own
    bindings_start: usize,
}

/// An XML encoder writing [`Token`]s to a [`ByteSink`]
///
/// Output is collected in an internal buffer which is written to the sink by
/// [`flush`](Self::flush), by [`close`](Self::close), and whenever it grows large. The encoder
/// verifies that end elements match their start elements, and rejects tokens which cannot be
/// represented in XML, such as comments containing `--`. Rejected tokens leave the encoder
/// unchanged.
///
/// Names are written as `prefix:local`. Missing namespace declarations are added: an element
/// without prefix whose namespace differs from the default namespace in effect gets an
/// `xmlns="..."` attribute, and an attribute without prefix in a namespace gets a generated
/// prefix.
///
/// # Examples
/// ```
/// # use textstream::xml::*;
/// let mut encoder = XmlEncoder::new(Vec::new());
/// let start = StartElement::new(Name::with_space("urn:example", "note"));
/// encoder.encode_token(&Token::StartElement(start.clone()))?;
/// encoder.encode_token(&Token::CharData(b"a < b".to_vec()))?;
/// encoder.encode_token(&Token::EndElement(start.end()))?;
/// encoder.close()?;
///
/// assert_eq!(
///     r#"<note xmlns="urn:example">a &lt; b</note>"#.as_bytes(),
///     encoder.into_inner()
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct XmlEncoder<S: ByteSink> {
    sink: S,
    settings: EncoderSettings,
    buf: Vec<u8>,
    stack: Vec<OpenTag>,
    /// Prefix bindings in declaration order as `(prefix, namespace)`
    bindings: Vec<(String, String)>,
    next_prefix_id: u32,
    /// Whether the `>` of the most recent start tag has not been written yet
    start_pending: bool,
    has_encoded_token: bool,
    closed: bool,
    // Indentation state
    depth: usize,
    indented_in: bool,
    put_newline: bool,
}

impl<S: ByteSink> XmlEncoder<S> {
    /// Creates an encoder with [default settings](EncoderSettings::default)
    pub fn new(sink: S) -> Self {
        XmlEncoder::new_custom(sink, EncoderSettings::default())
    }

    /// Creates an encoder with custom settings
    pub fn new_custom(sink: S, settings: EncoderSettings) -> Self {
        XmlEncoder {
            sink,
            settings,
            buf: Vec::new(),
            stack: Vec::new(),
            bindings: Vec::new(),
            next_prefix_id: 0,
            start_pending: false,
            has_encoded_token: false,
            closed: false,
            depth: 0,
            indented_in: false,
            put_newline: false,
        }
    }

    /// Sets the indentation used for subsequently encoded tokens
    ///
    /// Every start and end tag is written on its own line, starting with `prefix` followed by
    /// `indent` once per nesting level. Indentation is disabled if both are empty.
    pub fn indent(&mut self, prefix: &str, indent: &str) {
        self.settings.prefix = prefix.to_owned();
        self.settings.indent = indent.to_owned();
    }

    /// Encodes a token
    ///
    /// Fails with [`XmlEncodeError::Structural`] if an end element does not match the innermost
    /// open element, and with [`XmlEncodeError::InvalidToken`] for tokens which cannot be
    /// written as XML.
    pub fn encode_token(&mut self, token: &Token) -> Result<(), XmlEncodeError> {
        if self.closed {
            return Err(XmlEncodeError::UseAfterClose);
        }
        self.verify_token(token)?;

        match token {
            Token::StartElement(start) => self.write_start(start),
            Token::EndElement(end) => self.write_end(end),
            Token::CharData(data) => {
                self.finish_pending_start();
                escape_into(&mut self.buf, data, EscapeMode::Text);
            }
            Token::Comment(content) => {
                self.finish_pending_start();
                self.buf.extend_from_slice(b"<!--");
                self.buf.extend_from_slice(content);
                self.buf.extend_from_slice(b"-->");
            }
            Token::ProcInst(proc_inst) => {
                self.finish_pending_start();
                self.buf.extend_from_slice(b"<?");
                self.buf.extend_from_slice(proc_inst.target.as_bytes());
                if !proc_inst.inst.is_empty() {
                    self.buf.push(b' ');
                    self.buf.extend_from_slice(&proc_inst.inst);
                }
                self.buf.extend_from_slice(b"?>");
            }
            Token::Directive(content) => {
                self.finish_pending_start();
                self.buf.extend_from_slice(b"<!");
                self.buf.extend_from_slice(content);
                self.buf.push(b'>');
            }
        }
        self.has_encoded_token = true;

        if self.buf.len() >= FLUSH_THRESHOLD {
            self.write_buffered()?;
        }
        Ok(())
    }

    /// Checks that the token can be written, without changing any state
    fn verify_token(&self, token: &Token) -> Result<(), XmlEncodeError> {
        match token {
            Token::StartElement(start) => {
                if !is_valid_written_name(&start.name) {
                    return Err(XmlEncodeError::InvalidToken(format!(
                        "start element with invalid name {:?}",
                        start.name.qualified()
                    )));
                }
                if let Some(attr) = start.attrs.iter().find(|attr| !is_valid_written_name(&attr.name)) {
                    return Err(XmlEncodeError::InvalidToken(format!(
                        "attribute with invalid name {:?} in element <{}>",
                        attr.name.qualified(),
                        start.name
                    )));
                }
            }
            Token::EndElement(end) => match self.stack.last() {
                None => {
                    return Err(StructuralErrorKind::EndWithoutStart {
                        name: end.name.qualified(),
                    }
                    .into())
                }
                Some(open) if open.name != end.name => {
                    return Err(StructuralErrorKind::MismatchedEnd {
                        open: open.name.qualified(),
                        close: end.name.qualified(),
                    }
                    .into())
                }
                Some(_) => {}
            },
            Token::CharData(_) => {}
            Token::Comment(content) => {
                if content.windows(2).any(|w| w == b"--") || content.last() == Some(&b'-') {
                    return Err(XmlEncodeError::InvalidToken(
                        "comment containing \"--\" or ending with \"-\"".to_owned(),
                    ));
                }
            }
            Token::ProcInst(proc_inst) => {
                if proc_inst.target == "xml" && self.has_encoded_token {
                    return Err(XmlEncodeError::InvalidToken(
                        "processing instruction with target xml is only valid as first token"
                            .to_owned(),
                    ));
                }
                if !is_valid_name(&proc_inst.target) {
                    return Err(XmlEncodeError::InvalidToken(format!(
                        "processing instruction with invalid target {:?}",
                        proc_inst.target
                    )));
                }
                if proc_inst.inst.windows(2).any(|w| w == b"?>") {
                    return Err(XmlEncodeError::InvalidToken(
                        "processing instruction containing \"?>\"".to_owned(),
                    ));
                }
            }
            Token::Directive(content) => {
                if !is_balanced_directive(content) {
                    return Err(XmlEncodeError::InvalidToken(
                        "directive containing unbalanced < or > markers".to_owned(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn write_start(&mut self, start: &StartElement) {
        self.finish_pending_start();
        let bindings_start = self.bindings.len();
        let mut default_space = match self.stack.last() {
            Some(open) => open.default_space.clone(),
            None => String::new(),
        };

        // Declarations which are explicitly part of the attributes
        let mut has_explicit_default = false;
        for attr in &start.attrs {
            if attr.name.prefix == "xmlns" {
                self.bindings
                    .push((attr.name.local.clone(), attr.value.clone()));
            } else if is_default_declaration(&attr.name) {
                default_space = attr.value.clone();
                has_explicit_default = true;
            }
        }

        let mut declarations = Vec::new();
        if start.name.prefix.is_empty() {
            if !has_explicit_default && start.name.space != default_space {
                declarations.push(("xmlns".to_owned(), start.name.space.clone()));
                default_space = start.name.space.clone();
            }
        } else {
            self.declare_prefix(&start.name, &mut declarations);
        }

        let mut attrs_out = Vec::new();
        for attr in &start.attrs {
            let name = &attr.name;
            let qualified = if name.prefix == "xmlns" || is_default_declaration(name) {
                name.qualified()
            } else if !name.prefix.is_empty() {
                self.declare_prefix(name, &mut declarations);
                name.qualified()
            } else if !name.space.is_empty() {
                let prefix = self.attr_prefix(&name.space, &mut declarations);
                format!("{prefix}:{}", name.local)
            } else {
                name.local.clone()
            };
            write_attr(&mut attrs_out, &qualified, &attr.value);
        }

        self.write_indent(1);
        self.buf.push(b'<');
        self.buf.extend_from_slice(start.name.qualified().as_bytes());
        for (name, space) in &declarations {
            write_attr(&mut self.buf, name, space);
        }
        self.buf.extend_from_slice(&attrs_out);
        if self.settings.self_close_empty {
            self.start_pending = true;
        } else {
            self.buf.push(b'>');
        }

        self.stack.push(OpenTag {
            name: start.name.clone(),
            default_space,
            bindings_start,
        });
    }

    fn write_end(&mut self, end: &EndElement) {
        let open = match self.stack.pop() {
            Some(open) => open,
            // Already verified
            None => return,
        };
        self.write_indent(-1);
        if self.start_pending {
            self.start_pending = false;
            self.buf.extend_from_slice(b"/>");
        } else {
            self.buf.extend_from_slice(b"</");
            self.buf.extend_from_slice(end.name.qualified().as_bytes());
            self.buf.push(b'>');
        }
        self.bindings.truncate(open.bindings_start);
    }

    fn lookup_prefix(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, space)| space.as_str())
    }

    /// Declares the prefix of a name unless it is already bound to the namespace of the name
    fn declare_prefix(&mut self, name: &Name, declarations: &mut Vec<(String, String)>) {
        // Names with unknown prefix carry the prefix as namespace
        if name.space.is_empty() || name.space == name.prefix || name.prefix == "xml" {
            return;
        }
        if self.lookup_prefix(&name.prefix) == Some(name.space.as_str()) {
            return;
        }
        self.bindings.push((name.prefix.clone(), name.space.clone()));
        declarations.push((format!("xmlns:{}", name.prefix), name.space.clone()));
    }

    /// Gets a prefix bound to the namespace, declaring a new one if necessary
    fn attr_prefix(&mut self, space: &str, declarations: &mut Vec<(String, String)>) -> String {
        if space == XML_NAMESPACE {
            return "xml".to_owned();
        }
        let existing = self
            .bindings
            .iter()
            .rev()
            .find(|(_, s)| s == space)
            .map(|(prefix, _)| prefix.clone());
        if let Some(prefix) = existing {
            // Prefix might have been rebound to a different namespace by a nested element
            if self.lookup_prefix(&prefix) == Some(space) {
                return prefix;
            }
        }

        loop {
            self.next_prefix_id += 1;
            let prefix = format!("_ns{}", self.next_prefix_id);
            if self.lookup_prefix(&prefix).is_none() {
                self.bindings.push((prefix.clone(), space.to_owned()));
                declarations.push((format!("xmlns:{prefix}"), space.to_owned()));
                return prefix;
            }
        }
    }

    /// Writes the `>` of the most recent start tag if it has been deferred
    fn finish_pending_start(&mut self) {
        if self.start_pending {
            self.start_pending = false;
            self.buf.push(b'>');
        }
    }

    fn write_indent(&mut self, depth_delta: isize) {
        if self.settings.prefix.is_empty() && self.settings.indent.is_empty() {
            return;
        }
        if depth_delta < 0 {
            self.depth = self.depth.saturating_sub(1);
            if self.indented_in {
                // Element only contained character data; keep end tag on the same line
                self.indented_in = false;
                return;
            }
        }

        if self.put_newline {
            self.buf.push(b'\n');
        } else {
            self.put_newline = true;
        }
        self.buf.extend_from_slice(self.settings.prefix.as_bytes());
        for _ in 0..self.depth {
            self.buf.extend_from_slice(self.settings.indent.as_bytes());
        }
        if depth_delta > 0 {
            self.depth += 1;
            self.indented_in = true;
        }
    }

    fn write_buffered(&mut self) -> Result<(), XmlEncodeError> {
        // Output is lost if the sink fails
        let result = write_to_sink(&mut self.sink, &self.buf);
        self.buf.clear();
        result.map_err(XmlEncodeError::from)
    }

    /// Writes all buffered output to the sink and flushes the sink
    ///
    /// A start tag whose `>` has been deferred to allow writing it as self-closing tag is
    /// completed first.
    pub fn flush(&mut self) -> Result<(), XmlEncodeError> {
        if self.closed {
            return Err(XmlEncodeError::UseAfterClose);
        }
        self.finish_pending_start();
        self.write_buffered()?;
        self.sink.flush().map_err(WriteError::from)?;
        Ok(())
    }

    /// Flushes the encoder and prevents any further use
    ///
    /// Fails with [`StructuralErrorKind::UnclosedElement`] if elements are still open; the
    /// output written so far is flushed regardless. Afterwards [`encode_token`](Self::encode_token)
    /// and [`flush`](Self::flush) fail with [`XmlEncodeError::UseAfterClose`]. Closing an
    /// already closed encoder has no effect.
    pub fn close(&mut self) -> Result<(), XmlEncodeError> {
        if self.closed {
            return Ok(());
        }
        let flush_result = self.flush();
        self.closed = true;
        flush_result?;

        match self.stack.last() {
            Some(open) => Err(StructuralErrorKind::UnclosedElement {
                name: open.name.qualified(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Gets a mutable reference to the underlying sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Unwraps this encoder, returning the underlying sink
    ///
    /// Output which has not been flushed yet is lost.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

/// Whether the local part and the prefix, if any, are valid XML names
fn is_valid_written_name(name: &Name) -> bool {
    is_valid_name(&name.local) && (name.prefix.is_empty() || is_valid_name(&name.prefix))
}

fn is_default_declaration(name: &Name) -> bool {
    name.prefix.is_empty() && name.local == "xmlns"
}

fn write_attr(out: &mut Vec<u8>, name: &str, value: &str) {
    out.push(b' ');
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b"=\"");
    escape_into(out, value.as_bytes(), EscapeMode::Attribute);
    out.push(b'"');
}

/// Whether `<` and `>` in the directive are balanced, ignoring quoted strings and comments
fn is_balanced_directive(content: &[u8]) -> bool {
    let mut depth = 0_usize;
    let mut quote = None;
    let mut in_comment = false;
    for (i, &b) in content.iter().enumerate() {
        if in_comment {
            if b == b'>' && i >= 2 && &content[i - 2..=i] == b"-->" {
                in_comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'<' => {
                if content[i..].starts_with(b"<!--") {
                    in_comment = true;
                } else {
                    depth += 1;
                }
            }
            b'>' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    depth == 0 && quote.is_none() && !in_comment
}

impl<S: ByteSink + Debug> Debug for XmlEncoder<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let open_elements: Vec<String> = self.stack.iter().map(|t| t.name.qualified()).collect();
        f.debug_struct("XmlEncoder")
            .field("sink", &self.sink)
            .field("settings", &self.settings)
            .field("buf_count", &self.buf.len())
            .field("open_elements", &open_elements)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
