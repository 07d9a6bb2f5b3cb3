//! Line reassembly for newline-delimited text messages.
//!
//! Both transports carry plain text where each message is terminated by
//! `\n`, `\r\n` or a bare `\r`. [`LineCodec`] implements the splitting rule as
//! a [`tokio_util::codec::Decoder`] so it can drive a `FramedRead` over a TCP
//! stream. [`Framer`] applies the same rule to a buffer it owns, for push-style
//! use where datagram payloads arrive as discrete chunks.
//!
//! Lines are decoded as UTF-8 after splitting. Invalid byte sequences are
//! dropped rather than replaced, so decoding never fails. Because the
//! terminators are ASCII, splitting on raw bytes never cuts a valid
//! multibyte character, and a character split across two receives is
//! reassembled intact.

use std::io;

use bytes::{Buf, BytesMut};
use log::debug;
use tokio_util::codec::Decoder;


/// Decoder splitting a byte buffer into text lines.
///
/// The earliest terminator in the buffer always wins and a `\r` immediately
/// followed by `\n` counts as a single terminator. A `\r` that ends the
/// buffer terminates its line straight away; the codec then remembers to
/// swallow a `\n` that opens the next chunk, so a `\r\n` split across two
/// reads still counts once.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineCodec {
    skip_lf: bool,
}

impl LineCodec {
    /// Create a new line codec.
    #[must_use]
    pub const fn new() -> Self { Self { skip_lf: false } }

    /// Remove the first terminated line from `buf`, returning its text.
    pub fn next_line(&mut self, buf: &mut BytesMut) -> Option<String> {
        if self.skip_lf {
            let first = *buf.first()?;
            self.skip_lf = false;
            if first == b'\n' {
                buf.advance(1);
            }
        }
        let pos = buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
        let terminator_len = match (buf[pos], buf.get(pos + 1)) {
            (b'\r', Some(b'\n')) => 2,
            (b'\r', None) => {
                self.skip_lf = true;
                1
            }
            _ => 1,
        };
        let line = buf.split_to(pos);
        buf.advance(terminator_len);
        Some(decode_lossy(&line))
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.next_line(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.next_line(src) {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            debug!("discarding unterminated line at end of stream: bytes={}", src.len());
            src.clear();
        }
        Ok(None)
    }
}

/// Decode UTF-8, silently dropping invalid sequences.
pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Push-style line reassembly buffer.
///
/// Bytes handed to [`Framer::feed`] are appended to an internal buffer; every
/// complete line is yielded and any trailing partial line is kept until more
/// data arrives.
///
/// ```
/// use netoutput::framer::Framer;
///
/// let mut framer = Framer::new();
/// let lines: Vec<_> = framer.feed(b"a\r\nb\nc\rd").collect();
/// assert_eq!(lines, ["a", "b", "c"]);
/// assert_eq!(framer.buffered(), b"d");
/// ```
#[derive(Debug, Default)]
pub struct Framer {
    buffer: BytesMut,
    codec: LineCodec,
}

impl Framer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append `chunk` and lazily yield every line it completes.
    ///
    /// Lines are extracted as the iterator is advanced. Dropping the iterator
    /// early leaves the unconsumed lines buffered; they are yielded by the
    /// next call to `feed`.
    pub fn feed<'a>(&'a mut self, chunk: &[u8]) -> impl Iterator<Item = String> + use<'a> {
        self.buffer.extend_from_slice(chunk);
        std::iter::from_fn(move || self.codec.next_line(&mut self.buffer))
    }

    /// Bytes received but not yet terminated.
    #[must_use]
    pub fn buffered(&self) -> &[u8] { &self.buffer }

    /// Returns `true` when no partial line is pending and no terminator is
    /// half-consumed, meaning the framer holds no state worth keeping.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.buffer.is_empty() && !self.codec.skip_lf }

    /// Discard any pending partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.codec = LineCodec::new();
    }
}
