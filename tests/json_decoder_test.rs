use std::{error::Error, io::Read};

use textstream::{
    io::{ByteSource, ReadSource, SourceChunk},
    json::*,
    ErrorKind, Position,
};

use crate::test_lib::{
    assert_slice_eq, get_expected_json_events, get_json_test_data_file_path, json_events,
};

mod test_lib;

type TestResult = Result<(), Box<dyn Error>>;

/// Source which provides its data in chunks of at most `chunk_size` bytes
struct ChunkedSource<'a> {
    data: &'a [u8],
    chunk_size: usize,
}

impl ByteSource for ChunkedSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, std::io::Error> {
        let len = self.chunk_size.min(buf.len()).min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        self.data = &self.data[len..];
        Ok(SourceChunk {
            len,
            is_final: self.data.is_empty(),
        })
    }
}

#[test]
fn decoder_test() -> TestResult {
    let mut decoder = JsonDecoder::open_path(get_json_test_data_file_path())?;
    decoder.use_number();

    let value = decoder.decode_value()?.unwrap();
    assert_slice_eq(&get_expected_json_events(), &json_events(&value));
    assert_eq!(None, decoder.decode_value()?);
    Ok(())
}

#[test]
fn decoder_chunk_sizes() -> TestResult {
    let data = std::fs::read(get_json_test_data_file_path())?;
    let expected = decode(&data)?;

    for chunk_size in [1, 2, 3, 7, 64, 4096] {
        let mut decoder = JsonDecoder::new_custom(
            ChunkedSource {
                data: &data,
                chunk_size,
            },
            DecoderSettings {
                use_number: true,
                ..Default::default()
            },
        );
        let value = decoder.decode_value()?.unwrap();
        assert_eq!(expected, value, "chunk size: {chunk_size}");
        assert_slice_eq(&json_events(&expected), &json_events(&value));
        decoder.consume_trailing_whitespace()?;
        assert_eq!(data.len() as u64, decoder.input_offset());
    }
    Ok(())
}

#[test]
fn normalized_numbers() -> TestResult {
    let mut decoder = JsonDecoder::from_bytes(b"[1.0, 1e3, -0.5E1, 1e400, 12345678901234567890]");
    let value = decoder.decode_value()?.unwrap();
    let numbers: Vec<&str> = value
        .as_array()?
        .iter()
        .map(|v| v.as_number().map(JsonNumber::as_str))
        .collect::<Result<_, _>>()?;
    // Numbers exceeding the f64 range keep their text
    assert_eq!(
        vec!["1", "1000", "-5", "1e400", "12345678901234567000"],
        numbers
    );
    Ok(())
}

#[test]
fn value_stream() -> TestResult {
    let json = b" {\"id\": 1}\n[2]\t\"three\" 4 true null ";
    let mut decoder = JsonDecoder::from_bytes(json);

    let mut values = Vec::new();
    while decoder.more()? {
        values.push(decoder.decode_value()?.unwrap());
    }
    assert_eq!(
        vec![
            [("id", JsonValue::from(1))].into_iter().collect::<JsonValue>(),
            JsonValue::from(vec![JsonValue::from(2)]),
            JsonValue::from("three"),
            JsonValue::from(4),
            JsonValue::from(true),
            JsonValue::Null,
        ],
        values
    );
    assert_eq!(None, decoder.decode_value()?);
    assert_eq!(json.len() as u64, decoder.input_offset());
    Ok(())
}

#[test]
fn buffered_bytes_after_value() -> TestResult {
    let mut decoder = JsonDecoder::from_bytes(br#"{"x":1} {"y":2}"#);
    let first = decoder.decode_value()?.unwrap();
    assert_eq!(Some(&JsonValue::from(1)), first.get("x")?);
    let buffered = decoder.buffered_bytes();
    assert!(buffered.is_empty() || buffered.starts_with(b" "), "{buffered:?}");

    let second = decoder.decode_value()?.unwrap();
    assert_eq!(Some(&JsonValue::from(2)), second.get("y")?);
    assert_eq!(None, decoder.decode_value()?);
    Ok(())
}

#[test]
fn remaining_input() -> TestResult {
    let mut decoder = JsonDecoder::from_bytes(b"{\"a\": 1} trailing data");
    let value = decoder.decode_value()?.unwrap();
    assert_eq!(Some(&JsonValue::from(1)), value.get("a")?);

    // Look-ahead bytes and unread source data together form the rest of the input
    let (source, buffered) = decoder.into_parts();
    let mut rest = buffered;
    rest.extend_from_slice(source.remaining());
    assert_eq!(b" trailing data".as_slice(), rest);
    Ok(())
}

#[test]
fn syntax_error_position() {
    let json = b"{\n  \"a\": [1,\n  2,,\n]}";
    let mut decoder = JsonDecoder::from_bytes(json);
    match decoder.decode_value() {
        Err(JsonError::SyntaxError(e)) => {
            assert_eq!(SyntaxErrorKind::UnexpectedComma, e.kind);
            assert_eq!(
                Position {
                    offset: 17,
                    line: 3,
                    column: 5,
                },
                e.position
            );
        }
        r => panic!("Unexpected result: {r:?}"),
    }

    // Decoder stays poisoned
    let error = decoder.decode_value().unwrap_err();
    assert_eq!(ErrorKind::SyntaxError, error.kind());
    assert_eq!(17, error.position().offset);
}

#[test]
fn malformed_documents() {
    for json in [
        "a,\"b\"c",
        "[1,]",
        "{\"a\" 1}",
        "[\"unterminated",
        "01",
        "\"\\x\"",
        "{\"a\":1}}",
        "",
    ] {
        assert!(!validate(json.as_bytes()), "JSON: {json}");
        let error = decode(json.as_bytes()).unwrap_err();
        assert_eq!(ErrorKind::SyntaxError, error.kind(), "JSON: {json}");
    }
}

#[test]
fn excessive_nesting() -> TestResult {
    fn assert_depth_error<T: std::fmt::Debug>(expected_offset: u64, result: Result<T, JsonError>) {
        match result {
            Err(JsonError::SyntaxError(e)) => {
                assert_eq!(SyntaxErrorKind::MaxNestingDepthExceeded, e.kind);
                assert_eq!(expected_offset, e.position.offset);
            }
            r => panic!("Unexpected result: {r:?}"),
        }
    }

    // Offset of the bracket which opens the 10001st container
    for (open, close, offset) in [("[", "]", 10_000), ("{\"a\":[", "]}", 30_000)] {
        let json = format!("{}{}", open.repeat(1_000_000), close.repeat(1_000_000)).into_bytes();
        assert!(!validate(&json));
        assert_depth_error(offset, decode(&json));
        assert_depth_error(offset, compact(&json));
        assert_depth_error(offset, indent(&json, "", "  "));
        assert_depth_error(offset, JsonDecoder::from_bytes(&json).decode_value());
        assert_depth_error(offset, JsonDecoder::from_bytes(&json).skip_value());
    }

    // Values at the maximum depth are decoded and dropped normally
    let json = format!("{}{}", "[".repeat(10_000), "]".repeat(10_000)).into_bytes();
    assert!(validate(&json));
    let value = decode(&json)?;
    assert_eq!(json, encode(&value));
    Ok(())
}

#[test]
fn io_error() {
    struct FailingReader {
        remaining: &'static [u8],
    }
    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.remaining.is_empty() {
                return Err(std::io::Error::other("connection reset"));
            }
            let len = buf.len().min(self.remaining.len());
            buf[..len].copy_from_slice(&self.remaining[..len]);
            self.remaining = &self.remaining[len..];
            Ok(len)
        }
    }

    let mut decoder = JsonDecoder::new(ReadSource::new(FailingReader {
        remaining: b"[1, 2",
    }));
    match decoder.decode_value() {
        Err(JsonError::IoError { error, position }) => {
            assert_eq!("connection reset", error.to_string());
            assert_eq!(5, position.offset);
        }
        r => panic!("Unexpected result: {r:?}"),
    }
}
