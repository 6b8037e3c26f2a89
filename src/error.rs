//! Error types shared across the caching tiers.

use std::path::PathBuf;

/// Classified fetch failure, stored on cache entries and shown to the UI.
///
/// Cloneable by design: the same classified error is held by the entry and
/// handed out in every snapshot until the next successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Transport or connection failure, including 5xx responses.
    #[error("network error: {0}")]
    Network(String),
    /// The requested resource does not exist on the server.
    #[error("resource not found")]
    NotFound,
    /// The server rejected a write (HTTP 400/422).
    #[error("write rejected: {0}")]
    Validation(String),
    /// A payload could not be parsed, either off the wire or out of storage.
    #[error("malformed payload: {0}")]
    Serialization(String),
}

impl ErrorKind {
    /// Whether this failure class is eligible for the automatic retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, ErrorKind::Network(_))
    }
}

/// Failure while reading or writing one of the storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failure at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize value for key '{key}'")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_transport() {
        assert!(ErrorKind::Network("connection refused".into()).is_transport());
        assert!(!ErrorKind::NotFound.is_transport());
        assert!(!ErrorKind::Validation("price must be positive".into()).is_transport());
        assert!(!ErrorKind::Serialization("expected a number".into()).is_transport());
    }

    #[test]
    fn display_is_readable() {
        let e = ErrorKind::Network("connection refused".into());
        assert_eq!(e.to_string(), "network error: connection refused");
        assert_eq!(ErrorKind::NotFound.to_string(), "resource not found");
    }
}
