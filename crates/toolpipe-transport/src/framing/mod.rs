//! Newline-delimited JSON framing.
//!
//! One JSON object per line, UTF-8, terminated by `\n`, no length prefix.
//! [`LineFramer`] turns messages into lines and an arbitrarily chunked byte
//! stream back into messages.

mod text;

pub use text::DecodePolicy;

use crate::error::{FrameError, Result};
use crate::message::{Frame, Message};
use bytes::{Bytes, BytesMut};

/// Default upper bound on a single received line (10 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Encoder and incremental decoder for newline-delimited JSON.
///
/// The decoder keeps the unterminated tail of the stream between calls, so
/// chunk boundaries never have to line up with message boundaries. A line
/// that fails to parse produces a [`FrameError`] for that line only.
///
/// ```rust
/// use toolpipe_transport::framing::LineFramer;
///
/// let mut framer = LineFramer::default();
/// assert!(framer.decode(br#"{"id":1,"me"#).is_empty());
/// let frames = framer.decode(b"thod\":\"ping\"}\nnot json\n{\"id\"");
/// assert_eq!(frames.len(), 2);
/// assert!(frames[0].is_ok());
/// assert!(frames[1].is_err());
/// ```
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    policy: DecodePolicy,
    max_line_bytes: usize,
    // Set after an oversized fragment was dropped; the rest of that line is
    // skipped up to the next newline.
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DecodePolicy::default(), DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineFramer {
    /// Create a framer with the given decode policy and line size limit.
    pub fn new(policy: DecodePolicy, max_line_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            policy,
            max_line_bytes,
            discarding: false,
        }
    }

    /// Serialize a message into one newline-terminated line.
    ///
    /// `serde_json` escapes control characters inside strings, so the only
    /// raw newline in the output is the terminator.
    pub fn encode(&self, message: &Message) -> Result<Bytes> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }

    /// Feed one chunk of the stream and collect every line it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let observed_bytes = self.buffer.len() + head.len();
            if observed_bytes > self.max_line_bytes {
                self.buffer.clear();
                frames.push(Err(self.oversized(observed_bytes)));
                continue;
            }

            let frame = if self.buffer.is_empty() {
                self.parse_line(head)
            } else {
                self.buffer.extend_from_slice(head);
                let line = self.buffer.split();
                self.parse_line(&line)
            };
            frames.extend(frame);
        }

        if !self.discarding && !rest.is_empty() {
            let observed_bytes = self.buffer.len() + rest.len();
            if observed_bytes > self.max_line_bytes {
                self.buffer.clear();
                self.discarding = true;
                frames.push(Err(self.oversized(observed_bytes)));
            } else {
                self.buffer.extend_from_slice(rest);
            }
        }

        frames
    }

    /// Feed a sequence of chunks, in order, while the stream stays open.
    ///
    /// Equivalent to calling [`decode`](Self::decode) on each chunk and
    /// concatenating the results; the unterminated tail is kept.
    pub fn decode_stream<I, C>(&mut self, chunks: I) -> Vec<Frame>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        chunks
            .into_iter()
            .flat_map(|chunk| self.decode(chunk.as_ref()))
            .collect()
    }

    /// Signal end of stream.
    ///
    /// A leftover unterminated fragment is never treated as a message; if it
    /// holds anything but whitespace it is reported as malformed.
    pub fn finish(&mut self) -> Option<Frame> {
        if std::mem::take(&mut self.discarding) {
            self.buffer.clear();
            return None;
        }
        let tail = self.buffer.split();
        if tail.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(Err(FrameError::Malformed {
            line: String::from_utf8_lossy(&tail).into_owned(),
            reason: "unterminated line at end of stream".to_string(),
        }))
    }

    /// Bytes currently held back waiting for a newline.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn oversized(&self, observed_bytes: usize) -> FrameError {
        FrameError::Oversized {
            max_bytes: self.max_line_bytes,
            observed_bytes,
        }
    }

    fn parse_line(&self, raw: &[u8]) -> Option<Frame> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let text = match self.policy.decode(raw) {
            Ok(text) => text,
            Err(e) => {
                return Some(Err(FrameError::InvalidEncoding {
                    line: String::from_utf8_lossy(raw).into_owned(),
                    reason: e.to_string(),
                }));
            }
        };
        if text.trim().is_empty() {
            return None;
        }
        Some(
            serde_json::from_str::<Message>(&text).map_err(|e| FrameError::Malformed {
                line: text.into_owned(),
                reason: e.to_string(),
            }),
        )
    }
}
