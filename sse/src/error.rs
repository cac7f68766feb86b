//! Error types for the `sse` crate.
//!
//! Follows the same layout as the other crates in the workspace: a root `Error`
//! struct holding an `error_kind` tree and an optional `source` for chaining.
//! None of these errors reach the UI layer; they are logged where they occur.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the notification core.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Transport(TransportErrorKind),
    Frame(FrameErrorKind),
    Refresh,
    Config(String),
}

/// Errors from opening the push transport.
#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    InvalidUrl,
    Connect,
}

/// Errors from decoding an inbound frame.
#[derive(Debug, PartialEq)]
pub enum FrameErrorKind {
    /// The body is not a JSON object with a string `type`.
    Malformed,
    /// The `type` tag is not one of the known event kinds.
    UnknownKind(String),
    /// The payload does not match the shape required by its kind.
    InvalidPayload(String),
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(
        error_kind: ErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error {
            source: Some(source.into()),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Transport(kind) => write!(f, "Transport error: {kind:?}")?,
            ErrorKind::Frame(kind) => write!(f, "Frame error: {kind:?}")?,
            ErrorKind::Refresh => write!(f, "Counter refresh error")?,
            ErrorKind::Config(message) => write!(f, "Configuration error: {message}")?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Transport(TransportErrorKind::InvalidUrl), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Frame(FrameErrorKind::Malformed), err)
    }
}

/// Helper function to create frame errors.
pub fn frame_error(kind: FrameErrorKind) -> Error {
    Error::new(ErrorKind::Frame(kind))
}

/// Helper function to create counter refresh errors.
pub fn refresh_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Refresh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_source() {
        let err = refresh_error("backend returned 503");
        assert_eq!(
            err.to_string(),
            "Counter refresh error (backend returned 503)"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_url_parse_error_maps_to_invalid_url() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(
            err.error_kind,
            ErrorKind::Transport(TransportErrorKind::InvalidUrl)
        );
    }
}
