//! Byte accumulator that splits an arriving body into newline-terminated lines.

use bytes::{Bytes, BytesMut};

/// Holds the tail of a body that has not yet been terminated by `\n`.
///
/// Lines are split on raw bytes, so a multi-byte UTF-8 sequence cut in half by
/// a chunk boundary is reassembled before anything tries to decode it.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Prefix of `buf` already known to contain no newline.
    scanned: usize,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk received from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Remove and return the next complete line, without its terminator.
    ///
    /// A `\r` immediately before the `\n` is dropped too. Returns `None` when
    /// the buffer holds no newline.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let offset = self.buf[self.scanned..].iter().position(|b| *b == b'\n');
        match offset {
            Some(offset) => {
                let newline = self.scanned + offset;
                let mut line = self.buf.split_to(newline + 1);
                line.truncate(newline);
                if line.last() == Some(&b'\r') {
                    line.truncate(newline - 1);
                }
                self.scanned = 0;
                Some(line.freeze())
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Number of buffered bytes not yet assigned to a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Length the pending tail will have as a line, i.e. without a trailing
    /// `\r` that may turn out to precede the terminator.
    pub fn pending_line_len(&self) -> usize {
        match self.buf.last() {
            Some(b'\r') => self.buf.len() - 1,
            _ => self.buf.len(),
        }
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take whatever remains once the body has ended, leaving the buffer empty.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        let mut rest = self.buf.split();
        if rest.last() == Some(&b'\r') {
            rest.truncate(rest.len() - 1);
        }
        Some(rest.freeze())
    }
}
