//! Common library module for integration tests
// See https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

// Not every test file uses every helper
#![allow(dead_code)]

use std::{fmt::Debug, path::PathBuf};

use textstream::{json::JsonValue, xml::Token};

fn get_test_data_path(file_name: &str) -> PathBuf {
    // Get path of test file, see https://stackoverflow.com/a/30004252
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push(file_name);
    path
}

pub fn get_json_test_data_file_path() -> PathBuf {
    get_test_data_path("test_data.json")
}

pub fn get_xml_test_data_file_path() -> PathBuf {
    get_test_data_path("test_data.xml")
}

/// Assertion for slices which provides more useful error messages than `assert_eq!`
pub fn assert_slice_eq<T: PartialEq + Debug>(left: &[T], right: &[T]) {
    let iter_len = left.len().min(right.len());

    for i in 0..iter_len {
        assert_eq!(left[i], right[i], "Elements at index {i} don't match");
    }

    // Only check length mismatch afterwards, to detect mismatching items (if any) first
    assert_eq!(left.len(), right.len(), "Slices have different lengths");
}

#[derive(PartialEq, Eq, Debug)]
pub enum JsonEvent {
    ArrayStart,
    ArrayEnd,
    ObjectStart,
    ObjectEnd,
    MemberName(String),

    StringValue(String),
    // Contains string representation of number value
    NumberValue(String),
    BoolValue(bool),
    NullValue,
}

/// Flattens a value into events, in document order
pub fn json_events(value: &JsonValue) -> Vec<JsonEvent> {
    fn push_events(value: &JsonValue, events: &mut Vec<JsonEvent>) {
        match value {
            JsonValue::Null => events.push(JsonEvent::NullValue),
            JsonValue::Bool(b) => events.push(JsonEvent::BoolValue(*b)),
            JsonValue::Number(n) => events.push(JsonEvent::NumberValue(n.as_str().to_owned())),
            JsonValue::String(s) => events.push(JsonEvent::StringValue(s.clone())),
            JsonValue::Array(items) => {
                events.push(JsonEvent::ArrayStart);
                for item in items {
                    push_events(item, events);
                }
                events.push(JsonEvent::ArrayEnd);
            }
            JsonValue::Object(members) => {
                events.push(JsonEvent::ObjectStart);
                for (name, member_value) in members {
                    events.push(JsonEvent::MemberName(name.clone()));
                    push_events(member_value, events);
                }
                events.push(JsonEvent::ObjectEnd);
            }
        }
    }

    let mut events = Vec::new();
    push_events(value, &mut events);
    events
}

/// Gets the events expected for the JSON document at the path returned by
/// [`get_json_test_data_file_path`], when numbers keep their exact source text
pub fn get_expected_json_events() -> Vec<JsonEvent> {
    vec![
        JsonEvent::ArrayStart,
        JsonEvent::ArrayStart,
        JsonEvent::ArrayEnd,
        JsonEvent::ArrayStart,
        JsonEvent::NumberValue("1".to_owned()),
        JsonEvent::ArrayEnd,
        JsonEvent::ArrayStart,
        JsonEvent::NumberValue("1".to_owned()),
        JsonEvent::StringValue("a".to_owned()),
        JsonEvent::BoolValue(true),
        JsonEvent::ObjectStart,
        JsonEvent::MemberName("nested".to_owned()),
        JsonEvent::ArrayStart,
        JsonEvent::ObjectStart,
        JsonEvent::MemberName("nested2".to_owned()),
        JsonEvent::ArrayStart,
        JsonEvent::NumberValue("2".to_owned()),
        JsonEvent::ArrayEnd,
        JsonEvent::ObjectEnd,
        JsonEvent::ArrayEnd,
        JsonEvent::ObjectEnd,
        JsonEvent::ArrayEnd,
        JsonEvent::ObjectStart,
        JsonEvent::ObjectEnd,
        JsonEvent::ObjectStart,
        JsonEvent::MemberName("name".to_owned()),
        JsonEvent::NumberValue("1".to_owned()),
        JsonEvent::ObjectEnd,
        // Duplicate member "name1": last value wins, position of first occurrence is kept
        JsonEvent::ObjectStart,
        JsonEvent::MemberName("name1".to_owned()),
        JsonEvent::NumberValue("2".to_owned()),
        JsonEvent::MemberName("name2".to_owned()),
        JsonEvent::StringValue("value".to_owned()),
        JsonEvent::MemberName("".to_owned()),
        JsonEvent::NumberValue("3".to_owned()),
        JsonEvent::ObjectEnd,
        JsonEvent::StringValue("string".to_owned()),
        JsonEvent::StringValue("".to_owned()),
        JsonEvent::StringValue("\0\u{1F}\"\\/\u{8}\u{C}\n\r\t\u{E9}\u{1F600}".to_owned()),
        JsonEvent::NumberValue("0".to_owned()),
        JsonEvent::NumberValue("-1234".to_owned()),
        JsonEvent::NumberValue("567.89".to_owned()),
        JsonEvent::NumberValue("1e-5".to_owned()),
        JsonEvent::NumberValue("-0.0E+12".to_owned()),
        JsonEvent::NumberValue("123456789012345678901234567890".to_owned()),
        JsonEvent::BoolValue(true),
        JsonEvent::BoolValue(false),
        JsonEvent::NullValue,
        JsonEvent::ArrayEnd,
    ]
}

/// Simplified view of an XML token, with names in qualified form
#[derive(PartialEq, Eq, Debug)]
pub enum XmlEvent {
    Start {
        name: String,
        space: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
        space: String,
    },
    Text(String),
    Comment(String),
    ProcInst {
        target: String,
        inst: String,
    },
    Directive(String),
}

/// Converts tokens to events, leaving out character data consisting only of whitespace
pub fn xml_events(tokens: &[Token]) -> Vec<XmlEvent> {
    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    tokens
        .iter()
        .filter_map(|token| {
            Some(match token {
                Token::StartElement(start) => XmlEvent::Start {
                    name: start.name.qualified(),
                    space: start.name.space.clone(),
                    attrs: start
                        .attrs
                        .iter()
                        .map(|attr| (attr.name.qualified(), attr.value.clone()))
                        .collect(),
                },
                Token::EndElement(end) => XmlEvent::End {
                    name: end.name.qualified(),
                    space: end.name.space.clone(),
                },
                Token::CharData(data) => {
                    if data.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    XmlEvent::Text(text(data))
                }
                Token::Comment(content) => XmlEvent::Comment(text(content)),
                Token::ProcInst(proc_inst) => XmlEvent::ProcInst {
                    target: proc_inst.target.clone(),
                    inst: text(&proc_inst.inst),
                },
                Token::Directive(content) => XmlEvent::Directive(text(content)),
            })
        })
        .collect()
}

fn start(name: &str, space: &str, attrs: &[(&str, &str)]) -> XmlEvent {
    XmlEvent::Start {
        name: name.to_owned(),
        space: space.to_owned(),
        attrs: attrs
            .iter()
            .map(|(n, v)| ((*n).to_owned(), (*v).to_owned()))
            .collect(),
    }
}

fn end(name: &str, space: &str) -> XmlEvent {
    XmlEvent::End {
        name: name.to_owned(),
        space: space.to_owned(),
    }
}

/// Gets the events expected for the XML document at the path returned by
/// [`get_xml_test_data_file_path`]
pub fn get_expected_xml_events() -> Vec<XmlEvent> {
    const CATALOG: &str = "urn:catalog";
    const META: &str = "urn:meta";

    vec![
        XmlEvent::ProcInst {
            target: "xml".to_owned(),
            inst: "version=\"1.0\" encoding=\"UTF-8\"".to_owned(),
        },
        XmlEvent::Directive("DOCTYPE catalog".to_owned()),
        XmlEvent::Comment(" product catalog ".to_owned()),
        start(
            "catalog",
            CATALOG,
            &[("xmlns", CATALOG), ("xmlns:m", META)],
        ),
        start("item", CATALOG, &[("id", "1"), ("m:state", "new")]),
        start("name", CATALOG, &[]),
        XmlEvent::Text("Tea & biscuits".to_owned()),
        end("name", CATALOG),
        start("price", CATALOG, &[("currency", "EUR")]),
        XmlEvent::Text("4.50".to_owned()),
        end("price", CATALOG),
        start("m:note", META, &[]),
        XmlEvent::Text("<b>bold</b>".to_owned()),
        end("m:note", META),
        start("empty", CATALOG, &[]),
        end("empty", CATALOG),
        end("item", CATALOG),
        XmlEvent::ProcInst {
            target: "render".to_owned(),
            inst: "fast".to_owned(),
        },
        end("catalog", CATALOG),
    ]
}
