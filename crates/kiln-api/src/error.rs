//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_parts(self) -> (StatusCode, String) {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %message, "Request failed");
        }
        (status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.into_parts();

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<kiln_core::Error> for ApiError {
    fn from(err: kiln_core::Error) -> Self {
        use kiln_core::Error;

        let message = err.to_string();
        match err {
            Error::SnapshotNotFound(_) | Error::PoolNotFound(_) => ApiError::NotFound(message),
            Error::UnknownJob(_) | Error::UnknownAction(_) | Error::InvalidInput(_) => {
                ApiError::BadRequest(message)
            }
            Error::MissingCredential | Error::InvalidCredential(_) => ApiError::Forbidden(message),
            Error::Conflict(_) => ApiError::Conflict(message),
            Error::Upstream(_) => ApiError::BadGateway(message),
            Error::Internal(_) => ApiError::Internal(message),
        }
    }
}

/// Same status mapping as [`ApiError`], rendered as a plain-text body for
/// clients that are shell scripts rather than browsers.
#[derive(Debug)]
pub struct PlainError(pub ApiError);

impl IntoResponse for PlainError {
    fn into_response(self) -> Response {
        let (status, message) = self.0.into_parts();
        (status, message).into_response()
    }
}

impl From<ApiError> for PlainError {
    fn from(err: ApiError) -> Self {
        PlainError(err)
    }
}

impl From<kiln_core::Error> for PlainError {
    fn from(err: kiln_core::Error) -> Self {
        PlainError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::Error;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::SnapshotNotFound("a".into()), StatusCode::NOT_FOUND),
            (Error::PoolNotFound("build".into()), StatusCode::NOT_FOUND),
            (Error::UnknownJob("j".into()), StatusCode::BAD_REQUEST),
            (Error::UnknownAction("x".into()), StatusCode::BAD_REQUEST),
            (Error::MissingCredential, StatusCode::FORBIDDEN),
            (Error::InvalidCredential("j".into()), StatusCode::FORBIDDEN),
            (Error::Conflict("c".into()), StatusCode::CONFLICT),
            (Error::Upstream("u".into()), StatusCode::BAD_GATEWAY),
            (Error::Internal("i".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
