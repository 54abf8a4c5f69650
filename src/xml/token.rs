//! XML tokens produced by the decoder and consumed by the encoder

use std::fmt::{Display, Formatter};

/// Name of an element or attribute
///
/// The decoder splits qualified names of the form `prefix:local` at the first colon. When
/// namespace translation is performed, `space` holds the namespace URI bound to the prefix
/// (or the default namespace for unprefixed element names).
#[derive(PartialEq, Eq, Clone, Hash, Default, Debug)]
pub struct Name {
    /// Namespace prefix as written in the document; empty if the name has no prefix
    pub prefix: String,
    /// Local part of the name
    pub local: String,
    /// Namespace URI; empty if the name is not in a namespace
    pub space: String,
}

impl Name {
    /// Creates a name without prefix and namespace
    pub fn new(local: impl Into<String>) -> Self {
        Name {
            prefix: String::new(),
            local: local.into(),
            space: String::new(),
        }
    }

    /// Creates a name without prefix in the given namespace
    ///
    /// When encoded, an element with such a name declares the namespace as default namespace
    /// unless it is already in effect.
    pub fn with_space(space: impl Into<String>, local: impl Into<String>) -> Self {
        Name {
            prefix: String::new(),
            local: local.into(),
            space: space.into(),
        }
    }

    /// Splits a qualified name into prefix and local part
    ///
    /// Names without colon, or with a colon at the start or end, have no prefix.
    pub(crate) fn parse_qualified(qualified: &str) -> Self {
        match qualified.find(':') {
            Some(index) if index > 0 && index < qualified.len() - 1 => Name {
                prefix: qualified[..index].to_owned(),
                local: qualified[index + 1..].to_owned(),
                space: String::new(),
            },
            _ => Name::new(qualified),
        }
    }

    /// Gets the name as written in a document: `prefix:local`, or `local` without prefix
    pub fn qualified(&self) -> String {
        if self.prefix.is_empty() {
            self.local.clone()
        } else {
            format!("{}:{}", self.prefix, self.local)
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, "{}:", self.prefix)?;
        }
        f.write_str(&self.local)
    }
}

pub(crate) fn is_name_start_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

pub(crate) fn is_name_byte(b: u8) -> bool {
    is_name_start_byte(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

/// Whether the string is a valid XML name; non-ASCII chars are all accepted
pub(crate) fn is_valid_name(name: &str) -> bool {
    match name.as_bytes().split_first() {
        Some((&first, rest)) => is_name_start_byte(first) && rest.iter().all(|&b| is_name_byte(b)),
        None => false,
    }
}

/// Attribute of a start element
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Attr {
    /// Attribute name
    pub name: Name,
    /// Attribute value with entities already decoded
    pub value: String,
}

impl Attr {
    /// Creates an attribute
    pub fn new(name: Name, value: impl Into<String>) -> Self {
        Attr {
            name,
            value: value.into(),
        }
    }
}

/// Start tag of an element, `<name attr="value">`
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct StartElement {
    /// Element name
    pub name: Name,
    /// Attributes in document order, including namespace declarations
    pub attrs: Vec<Attr>,
}

impl StartElement {
    /// Creates a start element without attributes
    pub fn new(name: Name) -> Self {
        StartElement {
            name,
            attrs: Vec::new(),
        }
    }

    /// Gets the value of the first attribute with the given local name
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name.local == local)
            .map(|attr| attr.value.as_str())
    }

    /// Creates the matching end element
    pub fn end(&self) -> EndElement {
        EndElement {
            name: self.name.clone(),
        }
    }
}

/// End tag of an element, `</name>`
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct EndElement {
    /// Element name, matching the name of the start element
    pub name: Name,
}

/// Processing instruction, `<?target inst?>`
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ProcInst {
    /// Target name, for example `xml` for the XML declaration
    pub target: String,
    /// Instruction content after the target, without leading whitespace
    pub inst: Vec<u8>,
}

/// Type of a [`Token`]
#[derive(PartialEq, Eq, Clone, Copy, Hash, strum::Display, Debug)]
pub enum TokenType {
    /// [`Token::StartElement`]
    StartElement,
    /// [`Token::EndElement`]
    EndElement,
    /// [`Token::CharData`]
    CharData,
    /// [`Token::Comment`]
    Comment,
    /// [`Token::ProcInst`]
    ProcInst,
    /// [`Token::Directive`]
    Directive,
}

/// XML token
///
/// Tokens are owned values; they stay valid regardless of what happens to the decoder
/// which produced them.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Token {
    /// Start tag; a self-closing tag `<a/>` is reported as start element followed by end element
    StartElement(StartElement),
    /// End tag
    EndElement(EndElement),
    /// Character data with entities decoded, or the content of a CDATA section
    CharData(Vec<u8>),
    /// Comment content without the `<!--` and `-->` delimiters
    Comment(Vec<u8>),
    /// Processing instruction, including the XML declaration `<?xml ...?>`
    ProcInst(ProcInst),
    /// Directive content without the `<!` and `>` delimiters, for example a `DOCTYPE`
    Directive(Vec<u8>),
}

impl Token {
    /// Gets the type of this token
    pub fn token_type(&self) -> TokenType {
        match self {
            Token::StartElement(_) => TokenType::StartElement,
            Token::EndElement(_) => TokenType::EndElement,
            Token::CharData(_) => TokenType::CharData,
            Token::Comment(_) => TokenType::Comment,
            Token::ProcInst(_) => TokenType::ProcInst,
            Token::Directive(_) => TokenType::Directive,
        }
    }
}
