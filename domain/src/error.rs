//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
///
/// Errors are modeled as a tree with `domain::error::Error` at the root, holding
/// an `error_kind` that names what went wrong and an optional `source` with the
/// original error. Callers in other layers translate from it rather than
/// depending on `reqwest` directly; see the `From` impl for `sse::error::Error`
/// at the bottom of this module.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Errors raised before any request leaves the process.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    /// No valid session to authenticate the request with.
    Unauthenticated,
    Other(String),
}

/// Errors returned by, or on the way to, the backend API.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    /// The backend answered with a non-success status.
    Status(u16),
    /// The response body did not have the expected shape.
    Decode,
    Other(String),
}

impl Error {
    pub fn internal(kind: InternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(kind),
        }
    }

    pub fn external(kind: ExternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {:?}", self.error_kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        let error_kind = if err.is_builder() {
            DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to build reqwest client".to_string(),
            ))
        } else if err.is_decode() {
            DomainErrorKind::External(ExternalErrorKind::Decode)
        } else if let Some(status) = err.status() {
            DomainErrorKind::External(ExternalErrorKind::Status(status.as_u16()))
        } else {
            DomainErrorKind::External(ExternalErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Decode),
        }
    }
}

// Counter refreshes only care that the fetch failed; the domain error travels
// along as the source.
impl From<Error> for sse::error::Error {
    fn from(err: Error) -> Self {
        sse::error::Error::with_source(sse::error::ErrorKind::Refresh, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_displays_kind() {
        let err = Error::external(ExternalErrorKind::Status(503));
        assert_eq!(err.to_string(), "Domain Error: External(Status(503))");
    }

    #[test]
    fn test_translates_to_refresh_error_with_source() {
        let err: sse::error::Error = Error::internal(InternalErrorKind::Unauthenticated).into();

        assert_eq!(err.error_kind, sse::error::ErrorKind::Refresh);
        assert_eq!(
            err.to_string(),
            "Counter refresh error (Domain Error: Internal(Unauthenticated))"
        );
    }
}
