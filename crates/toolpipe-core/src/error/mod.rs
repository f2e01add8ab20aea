//! Error conversion at crate boundaries.
//!
//! Transport code deals with errors from several layers at once: OS process
//! spawning, pipe I/O, JSON serialization, HTTP clients and URL parsing. Each
//! crate declares once, at its boundary, how a foreign error becomes its own
//! error type, and then uses `?` everywhere else.

/// Declare a conversion from a foreign error type into a crate error type.
///
/// Expands to a `From` impl, so the `?` operator converts automatically.
///
/// ```ignore
/// error_boundary!(SourceError => TargetError, |err| {
///     // expression producing TargetError
/// });
/// ```
///
/// # Example
///
/// ```
/// use toolpipe_core::error_boundary;
/// use std::io;
///
/// #[derive(Debug, thiserror::Error)]
/// enum PipeError {
///     #[error("pipe I/O failed: {0}")]
///     Io(String),
///     #[error("bad payload: {0}")]
///     Payload(String),
/// }
///
/// error_boundary!(io::Error => PipeError, |e| PipeError::Io(e.to_string()));
/// error_boundary!(std::str::Utf8Error => PipeError, |e| {
///     PipeError::Payload(format!("not utf-8: {e}"))
/// });
///
/// fn first_line(bytes: &[u8]) -> Result<String, PipeError> {
///     let text = std::str::from_utf8(bytes)?;
///     Ok(text.lines().next().unwrap_or_default().to_string())
/// }
///
/// assert!(first_line(&[0xff, 0xfe]).is_err());
/// assert_eq!(first_line(b"{}\n{}").unwrap(), "{}");
/// ```
#[macro_export]
macro_rules! error_boundary {
    ($inner:ty => $outer:ty, |$err:ident| $body:expr) => {
        impl ::std::convert::From<$inner> for $outer {
            fn from($err: $inner) -> $outer {
                $body
            }
        }
    };
}
