//! Text decoding policy for received lines.

use std::borrow::Cow;
use std::str::Utf8Error;

/// What to do with bytes that are not valid UTF-8.
///
/// Outbound lines are produced by `serde_json` and are always valid UTF-8,
/// so the policy only affects what the child writes to us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Reject the whole line as a [`FrameError::InvalidEncoding`](crate::FrameError::InvalidEncoding).
    #[default]
    Strict,
    /// Substitute U+FFFD for each invalid sequence.
    Replace,
    /// Drop invalid sequences.
    Ignore,
}

impl DecodePolicy {
    pub(crate) fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, Utf8Error> {
        match self {
            Self::Strict => std::str::from_utf8(bytes).map(Cow::Borrowed),
            Self::Replace => Ok(String::from_utf8_lossy(bytes)),
            Self::Ignore => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Cow::Borrowed(text)),
                Err(_) => Ok(Cow::Owned(
                    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect(),
                )),
            },
        }
    }
}
