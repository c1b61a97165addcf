//! Render targets.
//!
//! The renderer writes text through this trait; failures are sticky and
//! queried at the end rather than threaded through every call, since a
//! renderer has nothing useful to do about a full buffer mid-object.

use std::io::Write;

/// Something that accepts rendered text.
pub trait Sink {
    fn put_str(&mut self, s: &str);

    fn put_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.put_str(c.encode_utf8(&mut buf));
    }

    /// Has every write so far succeeded?
    fn ok(&self) -> bool {
        true
    }
}

/// Growable in-memory sink.
#[derive(Default)]
pub struct BufferSink {
    out: String,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }
}

impl Sink for BufferSink {
    fn put_str(&mut self, s: &str) {
        self.out.push_str(s);
    }
}

/// Fixed-size sink that records truncation instead of failing.
pub struct FixedSink<'a> {
    buf: &'a mut [u8],
    len: usize,
    truncated: bool,
}

impl<'a> FixedSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            truncated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_str(&self) -> &str {
        // Only whole UTF-8 sequences are ever written.
        std::str::from_utf8(&self.buf[..self.len]).expect("sink writes are whole chars")
    }
}

impl Sink for FixedSink<'_> {
    fn put_str(&mut self, s: &str) {
        // Write whole characters only, so the content stays valid UTF-8.
        for c in s.chars() {
            let mut buf = [0u8; 4];
            let enc = c.encode_utf8(&mut buf);
            if self.len + enc.len() > self.buf.len() {
                self.truncated = true;
                return;
            }
            self.buf[self.len..self.len + enc.len()].copy_from_slice(enc.as_bytes());
            self.len += enc.len();
        }
    }

    fn ok(&self) -> bool {
        !self.truncated
    }
}

/// Sink writing through to an `io::Write` stream.
pub struct StreamSink<W: Write> {
    writer: W,
    failed: bool,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for StreamSink<W> {
    fn put_str(&mut self, s: &str) {
        if !self.failed && self.writer.write_all(s.as_bytes()).is_err() {
            self.failed = true;
        }
    }

    fn ok(&self) -> bool {
        !self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_accumulates() {
        let mut sink = BufferSink::new();
        sink.put_str("abc");
        sink.put_char('→');
        assert_eq!(sink.as_str(), "abc→");
        assert!(sink.ok());
    }

    #[test]
    fn fixed_sink_truncates() {
        let mut buf = [0u8; 4];
        let mut sink = FixedSink::new(&mut buf);
        sink.put_str("abcdef");
        assert!(sink.truncated());
        assert!(!sink.ok());
        assert_eq!(sink.as_str(), "abcd");
    }

    #[test]
    fn fixed_sink_never_splits_chars() {
        let mut buf = [0u8; 4];
        let mut sink = FixedSink::new(&mut buf);
        sink.put_str("ab→"); // the arrow needs 3 bytes, only 2 remain
        assert_eq!(sink.as_str(), "ab");
        assert!(sink.truncated());
    }

    #[test]
    fn stream_sink_writes_through() {
        let mut sink = StreamSink::new(Vec::new());
        sink.put_str("123");
        assert!(sink.ok());
        assert_eq!(sink.into_inner(), b"123");
    }
}
