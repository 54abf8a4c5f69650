//! Byte sources and byte sinks which the codecs read from and write to
//!
//! A [`ByteSource`] is pulled for chunks of input and reports together with each chunk
//! whether it is the final one. A [`ByteSink`] is pushed chunks of output and reports how many
//! bytes it accepted. Adapters exist for in-memory data ([`BytesSource`], `Vec<u8>`) and for
//! any [`Read`] or [`Write`] implementation ([`ReadSource`], [`WriteSink`]).

use std::{
    fmt::Debug,
    fs::File,
    io::{ErrorKind, Read, Write},
    path::Path,
};

use thiserror::Error;

use crate::{position::Position, utf8};

type IoError = std::io::Error;

/// Metadata of a chunk read by [`ByteSource::read`]
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct SourceChunk {
    /// Number of bytes which were written to the start of the buffer
    pub len: usize,
    /// Whether no further data follows this chunk
    ///
    /// A chunk with `len == 0` and `is_final == true` is a clean end of input.
    pub is_final: bool,
}

/// Pull-style provider of input bytes
///
/// Decoders call [`read`](Self::read) whenever they need more input. A source which
/// temporarily has no data may return an empty non-final chunk; decoders retry a limited number
/// of times before failing with an IO error.
pub trait ByteSource {
    /// Reads the next chunk of bytes into the start of `buf`
    ///
    /// `buf` is never empty. Errors of kind [`ErrorKind::Interrupted`] are retried by the caller.
    fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, IoError>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, IoError> {
        (**self).read(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, IoError> {
        (**self).read(buf)
    }
}

/// Byte source reading from a byte slice
///
/// The chunk containing the last byte of the slice is reported as final.
#[derive(Clone, Debug)]
pub struct BytesSource<'a> {
    data: &'a [u8],
}

impl<'a> BytesSource<'a> {
    /// Creates a source for the given bytes
    pub fn new(data: &'a [u8]) -> Self {
        BytesSource { data }
    }

    /// Gets the bytes which have not been read yet
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }
}

impl ByteSource for BytesSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, IoError> {
        let len = buf.len().min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        self.data = &self.data[len..];
        Ok(SourceChunk {
            len,
            is_final: self.data.is_empty(),
        })
    }
}

/// Byte source adapter for a [`Read`]
///
/// The source is considered final once `read` returns 0 bytes. Reads are not buffered by this
/// adapter; the decoders already read in chunks.
#[derive(Debug)]
pub struct ReadSource<R: Read> {
    reader: R,
}

impl<R: Read> ReadSource<R> {
    /// Creates a source reading from `reader`
    pub fn new(reader: R) -> Self {
        ReadSource { reader }
    }

    /// Gets a mutable reference to the underlying reader
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Unwraps this source, returning the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReadSource<File> {
    /// Opens the file at `path` for reading
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        Ok(ReadSource::new(File::open(path)?))
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, IoError> {
        let len = self.reader.read(buf)?;
        Ok(SourceChunk {
            len,
            is_final: len == 0,
        })
    }
}

/// Push-style consumer of output bytes
pub trait ByteSink {
    /// Writes bytes, returning how many of them were accepted
    ///
    /// The encoders of this crate write each chunk with a single call and treat accepting
    /// fewer bytes than provided as a failure ([`WriteError::ShortWrite`]).
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError>;

    /// Flushes data which the sink buffers internally
    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), IoError> {
        (**self).flush()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), IoError> {
        (**self).flush()
    }
}

/// Byte sink adapter for a [`Write`]
///
/// Each chunk is written completely using [`Write::write_all`].
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    writer: W,
}

impl<W: Write> WriteSink<W> {
    /// Creates a sink writing to `writer`
    pub fn new(writer: W) -> Self {
        WriteSink { writer }
    }

    /// Gets a mutable reference to the underlying writer
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwraps this sink, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.writer.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.writer.flush()
    }
}

/// Error which occurred while writing to a [`ByteSink`]
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WriteError {
    /// The sink failed with an IO error
    #[error("IO error: {0}")]
    Io(#[from] IoError),
    /// The sink accepted fewer bytes than it was given
    #[error("byte sink accepted only {accepted} of {len} bytes")]
    ShortWrite {
        /// Number of bytes the sink reported as accepted
        accepted: usize,
        /// Number of bytes which were provided
        len: usize,
    },
}

impl WriteError {
    /// Gets the kind of this error, which is always [`ErrorKind::WriteError`](crate::ErrorKind::WriteError)
    pub fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::WriteError
    }
}

/// Writes all bytes to the sink with a single call
pub(crate) fn write_to_sink<S: ByteSink + ?Sized>(
    sink: &mut S,
    bytes: &[u8],
) -> Result<(), WriteError> {
    if bytes.is_empty() {
        return Ok(());
    }

    let accepted = loop {
        match sink.write(bytes) {
            Ok(accepted) => break accepted,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    };
    if accepted < bytes.len() {
        return Err(WriteError::ShortWrite {
            accepted,
            len: bytes.len(),
        });
    }
    Ok(())
}

const READ_CHUNK_SIZE: usize = 1024;
/// Number of consecutive empty non-final chunks after which reading fails
const MAX_EMPTY_READS: u32 = 100;

/// Look-ahead buffer over a [`ByteSource`] which tracks the position of the consumed bytes
///
/// Bytes are first peeked and then consumed; only consumed bytes count towards the position.
pub(crate) struct SourceBuffer<S> {
    source: S,
    buf: Vec<u8>,
    /// Index of the first unconsumed byte in `buf`
    pos: usize,
    /// Number of bytes which were consumed before the start of `buf`
    buf_offset: u64,
    reached_final: bool,
    line: u64,
    column: u64,
}

impl<S: ByteSource> SourceBuffer<S> {
    pub(crate) fn new(source: S) -> Self {
        SourceBuffer {
            source,
            buf: Vec::with_capacity(READ_CHUNK_SIZE),
            pos: 0,
            buf_offset: 0,
            reached_final: false,
            line: 1,
            column: 1,
        }
    }

    /// Reads the next chunk from the source and appends it to the unconsumed bytes
    ///
    /// Returns `false` if the source has no more data.
    pub(crate) fn fill(&mut self) -> Result<bool, IoError> {
        if self.reached_final {
            return Ok(false);
        }

        // Drop consumed bytes
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.buf_offset += self.pos as u64;
            self.pos = 0;
        }

        let start = self.buf.len();
        let mut empty_reads = 0;
        loop {
            self.buf.resize(start + READ_CHUNK_SIZE, 0);
            let chunk = match self.source.read(&mut self.buf[start..]) {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            };
            // Guard against a misbehaving source reporting more bytes than fit into the buffer
            let len = chunk.len.min(READ_CHUNK_SIZE);
            self.buf.truncate(start + len);
            self.reached_final = chunk.is_final;

            if len > 0 {
                return Ok(true);
            }
            if chunk.is_final {
                return Ok(false);
            }
            empty_reads += 1;
            if empty_reads >= MAX_EMPTY_READS {
                return Err(IoError::new(
                    ErrorKind::Other,
                    format!("byte source made no progress after {MAX_EMPTY_READS} reads"),
                ));
            }
        }
    }

    pub(crate) fn peek(&mut self) -> Result<Option<u8>, IoError> {
        self.peek_at(0)
    }

    /// Peeks at the byte `ahead` bytes after the first unconsumed byte
    pub(crate) fn peek_at(&mut self, ahead: usize) -> Result<Option<u8>, IoError> {
        while self.pos + ahead >= self.buf.len() {
            if !self.fill()? {
                return Ok(None);
            }
        }
        Ok(Some(self.buf[self.pos + ahead]))
    }

    /// Consumes `count` bytes which have been peeked before
    pub(crate) fn consume(&mut self, count: usize) {
        debug_assert!(
            self.pos + count <= self.buf.len(),
            "consuming bytes which have not been peeked"
        );
        let (mut line, mut column) = (self.line, self.column);
        for &b in &self.buf[self.pos..self.pos + count] {
            if b == b'\n' {
                line += 1;
                column = 1;
            } else if !utf8::is_continuation(b) {
                column += 1;
            }
        }
        self.line = line;
        self.column = column;
        self.pos += count;
    }

    /// Consumes bytes and copies them to `out` until a byte matching `is_stop` is found
    ///
    /// The stop byte is returned but not consumed. Returns `None` once the end of input is
    /// reached.
    pub(crate) fn copy_until<P: Fn(u8) -> bool>(
        &mut self,
        is_stop: P,
        out: &mut Vec<u8>,
    ) -> Result<Option<u8>, IoError> {
        loop {
            let available = &self.buf[self.pos..];
            match available.iter().position(|&b| is_stop(b)) {
                Some(index) => {
                    let stop = available[index];
                    out.extend_from_slice(&available[..index]);
                    self.consume(index);
                    return Ok(Some(stop));
                }
                None => {
                    out.extend_from_slice(available);
                    let count = available.len();
                    self.consume(count);
                    if !self.fill()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    pub(crate) fn position(&self) -> Position {
        Position {
            offset: self.offset(),
            line: self.line,
            column: self.column,
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.buf_offset + self.pos as u64
    }

    /// Bytes which have been read from the source but not consumed yet
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub(crate) fn into_parts(mut self) -> (S, Vec<u8>) {
        self.buf.drain(..self.pos);
        (self.source, self.buf)
    }
}

impl<S> SourceBuffer<S> {
    /// Adds a short preview of the unconsumed bytes to a `Debug` representation
    pub(crate) fn debug_buffer(&self, debug_struct: &mut std::fmt::DebugStruct<'_, '_>) {
        let buf_content = &self.buf[self.pos..];
        if self.reached_final && buf_content.is_empty() {
            debug_struct.field("reached_final", &true);
            return;
        }
        debug_struct.field("buf_count", &buf_content.len());

        const PREVIEW_CHARS: usize = 45;
        let preview = String::from_utf8_lossy(buf_content);
        match preview.char_indices().nth(PREVIEW_CHARS) {
            None => debug_struct.field("buf_str", &preview),
            Some((index, _)) => debug_struct.field("buf_str", &format!("{}...", &preview[..index])),
        };
    }
}

impl<S: Debug> Debug for SourceBuffer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug_struct = f.debug_struct("SourceBuffer");
        debug_struct.field("source", &self.source);
        self.debug_buffer(&mut debug_struct);
        debug_struct.field("offset", &(self.buf_offset + self.pos as u64));
        debug_struct.finish()
    }
}

#[cfg(test)]
pub(crate) mod test_sources {
    use super::*;

    /// Source which returns at most one byte per read, and an empty chunk before every byte
    pub(crate) struct TrickleSource<'a> {
        data: &'a [u8],
        next_empty: bool,
    }

    impl<'a> TrickleSource<'a> {
        pub(crate) fn new(data: &'a [u8]) -> Self {
            TrickleSource {
                data,
                next_empty: true,
            }
        }
    }

    impl ByteSource for TrickleSource<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<SourceChunk, IoError> {
            if self.data.is_empty() {
                return Ok(SourceChunk {
                    len: 0,
                    is_final: true,
                });
            }
            if self.next_empty {
                self.next_empty = false;
                return Ok(SourceChunk {
                    len: 0,
                    is_final: false,
                });
            }
            self.next_empty = true;
            buf[0] = self.data[0];
            self.data = &self.data[1..];
            Ok(SourceChunk {
                len: 1,
                is_final: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_sources::TrickleSource, *};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn bytes_source() -> TestResult {
        let mut source = BytesSource::new(b"abc");
        let mut buf = [0; 2];
        assert_eq!(
            SourceChunk {
                len: 2,
                is_final: false
            },
            source.read(&mut buf)?
        );
        assert_eq!(b"ab", &buf);
        assert_eq!(b"c", source.remaining());

        assert_eq!(
            SourceChunk {
                len: 1,
                is_final: true
            },
            source.read(&mut buf)?
        );
        assert_eq!(b'c', buf[0]);
        Ok(())
    }

    #[test]
    fn read_source() -> TestResult {
        let mut source = ReadSource::new(&b"xy"[..]);
        let mut buf = [0; 10];
        assert_eq!(
            SourceChunk {
                len: 2,
                is_final: false
            },
            source.read(&mut buf)?
        );
        assert_eq!(
            SourceChunk {
                len: 0,
                is_final: true
            },
            source.read(&mut buf)?
        );
        Ok(())
    }

    #[test]
    fn source_buffer_position() -> TestResult {
        let mut buffer = SourceBuffer::new(BytesSource::new("a\u{E9}\nbc".as_bytes()));
        assert_eq!(Position::START, buffer.position());

        assert_eq!(Some(b'a'), buffer.peek()?);
        // Peeking does not consume
        assert_eq!(Position::START, buffer.position());

        buffer.consume(1);
        assert_eq!(
            Position {
                offset: 1,
                line: 1,
                column: 2
            },
            buffer.position()
        );

        // Two byte char counts as one column
        buffer.peek_at(1)?;
        buffer.consume(2);
        assert_eq!(
            Position {
                offset: 3,
                line: 1,
                column: 3
            },
            buffer.position()
        );

        buffer.peek()?;
        buffer.consume(1);
        assert_eq!(
            Position {
                offset: 4,
                line: 2,
                column: 1
            },
            buffer.position()
        );
        assert_eq!(b"bc", buffer.buffered());

        let (_, remaining) = buffer.into_parts();
        assert_eq!(b"bc", remaining.as_slice());
        Ok(())
    }

    #[test]
    fn source_buffer_copy_until() -> TestResult {
        let mut buffer = SourceBuffer::new(TrickleSource::new(b"abc;def"));
        let mut out = Vec::new();
        assert_eq!(Some(b';'), buffer.copy_until(|b| b == b';', &mut out)?);
        assert_eq!(b"abc", out.as_slice());
        assert_eq!(3, buffer.offset());

        buffer.consume(1);
        out.clear();
        assert_eq!(None, buffer.copy_until(|b| b == b';', &mut out)?);
        assert_eq!(b"def", out.as_slice());
        assert_eq!(7, buffer.offset());
        assert_eq!(None, buffer.peek()?);
        Ok(())
    }

    #[test]
    fn source_buffer_no_progress() {
        struct EmptySource;
        impl ByteSource for EmptySource {
            fn read(&mut self, _buf: &mut [u8]) -> Result<SourceChunk, IoError> {
                Ok(SourceChunk {
                    len: 0,
                    is_final: false,
                })
            }
        }

        let mut buffer = SourceBuffer::new(EmptySource);
        match buffer.peek() {
            Err(e) => assert_eq!(ErrorKind::Other, e.kind()),
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn vec_sink() -> TestResult {
        let mut sink = Vec::new();
        write_to_sink(&mut sink, b"abc")?;
        write_to_sink(&mut sink, b"")?;
        assert_eq!(b"abc", sink.as_slice());
        Ok(())
    }

    #[test]
    fn short_write() {
        struct HalfSink;
        impl ByteSink for HalfSink {
            fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
                Ok(buf.len() / 2)
            }
        }

        match write_to_sink(&mut HalfSink, b"abcd") {
            Err(WriteError::ShortWrite { accepted, len }) => {
                assert_eq!(2, accepted);
                assert_eq!(4, len);
            }
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn write_sink() -> TestResult {
        let mut sink = WriteSink::new(Vec::new());
        write_to_sink(&mut sink, b"test")?;
        sink.flush()?;
        assert_eq!(b"test", sink.into_inner().as_slice());
        Ok(())
    }
}
