//! HTTP error handling for the receiver routes.
//!
//! Core errors are converted into a status code plus a `{"message": ...}`
//! JSON body, with the error code attached when the error has one.
//! Unauthorized rejections always carry the same body so a peer cannot tell
//! an unknown session from a wrong token.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::Error;
use crate::protocol::ErrorBody;

/// A rejected request.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: Option<&'static str>,
    message: String,
}

impl ApiError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Error code sent in the response body, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        self.code
    }

    /// Message sent in the response body.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.message.clone(),
            code: self.code.map(str::to_string),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_rejection() {
            tracing::debug!("Rejected request: {}", err);
        } else {
            tracing::warn!("Request failed: {}", err);
        }

        let status = match &err {
            Error::MalformedRequest(_) | Error::UnknownFile(_) | Error::InvalidPath(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Unauthorized | Error::TransferCancelled => StatusCode::FORBIDDEN,
            Error::UploadInProgress(_) => StatusCode::CONFLICT,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let err = match err {
            Error::TransferCancelled => Error::Unauthorized,
            other => other,
        };

        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::MalformedRequest("x".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized, StatusCode::FORBIDDEN),
            (Error::UnknownFile("f".into()), StatusCode::BAD_REQUEST),
            (Error::UploadInProgress("f".into()), StatusCode::CONFLICT),
            (Error::InvalidPath("..".into()), StatusCode::BAD_REQUEST),
            (Error::Timeout(5), StatusCode::REQUEST_TIMEOUT),
            (
                Error::Io(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_cancelled_upload_looks_unauthorized() {
        let cancelled = ApiError::from(Error::TransferCancelled);
        let unauthorized = ApiError::from(Error::Unauthorized);

        assert_eq!(cancelled.status_code(), unauthorized.status_code());
        assert_eq!(cancelled.code(), Some("E002"));
        assert_eq!(cancelled.code(), unauthorized.code());
        assert_eq!(cancelled.message(), unauthorized.message());
    }

    #[test]
    fn test_body_carries_code() {
        let body = serde_json::to_value(ApiError::from(Error::UploadInProgress("F1".into())).body())
            .expect("serialize");
        assert_eq!(body["code"], "E004");
        assert!(body["message"].as_str().is_some_and(|m| m.contains("F1")));
    }

    #[test]
    fn test_body_without_code() {
        let body = serde_json::to_value(ApiError::bad_request("missing parameters").body())
            .expect("serialize");
        assert_eq!(body, serde_json::json!({"message": "missing parameters"}));

        let io = ApiError::from(Error::Io(std::io::Error::other("disk full")));
        assert!(io.code().is_none());
    }
}
