//! Error types for Lansend.
//!
//! This module provides a unified error type for discovery, the session
//! table and the sender, with variants that map one-to-one onto the
//! rejection kinds of the transfer protocol.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Lansend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Lansend.
#[derive(Error, Debug)]
pub enum Error {
    /// Unparseable payload or missing required parameters (E001)
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Unknown session or token mismatch (E002)
    ///
    /// Carries no detail about which part of the credential was wrong.
    #[error("invalid session or token")]
    Unauthorized,

    /// File id is not part of the session's offer (E003)
    #[error("file '{0}' is not part of this session")]
    UnknownFile(String),

    /// Another upload for the same file is still running (E004)
    #[error("file '{0}' is already being uploaded")]
    UploadInProgress(String),

    /// Peer answered with a non-success status (E005)
    #[error("request rejected by peer (status {status}): {body}")]
    Rejected {
        /// HTTP status code returned by the peer
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Prepare-upload response did not contain a token for our file (E006)
    #[error("peer did not issue a token for file '{0}'")]
    MissingToken(String),

    /// Socket, bind or connect failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transfer was cancelled while in flight
    #[error("transfer cancelled")]
    TransferCancelled,

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Invalid path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern EXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::MalformedRequest(_) => Some("E001"),
            Self::Unauthorized => Some("E002"),
            Self::UnknownFile(_) => Some("E003"),
            Self::UploadInProgress(_) => Some("E004"),
            Self::Rejected { .. } => Some("E005"),
            Self::MissingToken(_) => Some("E006"),
            _ => None,
        }
    }

    /// Returns whether this error is a request-scoped rejection that the
    /// receiver reports back to the peer rather than a local failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequest(_)
                | Self::Unauthorized
                | Self::UnknownFile(_)
                | Self::UploadInProgress(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message_is_opaque() {
        let msg = Error::Unauthorized.to_string();
        assert_eq!(msg, "invalid session or token");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::MalformedRequest("x".into()).code(), Some("E001"));
        assert_eq!(Error::Unauthorized.code(), Some("E002"));
        assert_eq!(Error::UnknownFile("f".into()).code(), Some("E003"));
        assert_eq!(Error::TransferCancelled.code(), None);
    }

    #[test]
    fn test_rejection_kinds() {
        assert!(Error::Unauthorized.is_rejection());
        assert!(Error::UnknownFile("f".into()).is_rejection());
        assert!(!Error::Transport("bind".into()).is_rejection());
        assert!(!Error::Timeout(5).is_rejection());
    }

    #[test]
    fn test_rejected_display_carries_status_and_body() {
        let err = Error::Rejected {
            status: 403,
            body: "nope".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("nope"));
    }
}
