//! Response envelopes and error mapping.
//!
//! Every body is a JSON object holding exactly one of `Result` or `Error`.

use crate::Error;
use crate::observability::current_request_id;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

/// Message returned for unknown identifiers.
pub const ITEM_NOT_FOUND: &str = "Item not found";

/// Message returned for failures whose cause is not shown to clients.
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Wraps a value in the success envelope.
#[must_use]
pub fn success(value: impl Into<Value>) -> Value {
    json!({ "Result": value.into() })
}

/// Wraps a message in the error envelope.
#[must_use]
pub fn failure(message: impl Into<String>) -> Value {
    json!({ "Error": message.into() })
}

/// A successful response: status plus `{ "Result": ... }` body.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Value,
}

impl ApiResponse {
    /// 200 with `value` as the result.
    #[must_use]
    pub fn ok(value: impl Into<Value>) -> Self {
        Self {
            status: StatusCode::OK,
            body: success(value),
        }
    }

    /// 201 with `value` as the result.
    #[must_use]
    pub fn created(value: impl Into<Value>) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: success(value),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// An error response derived from a repository error or a rejected body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Response for a path that matches no route.
    #[must_use]
    pub fn route_not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Not found".to_string(),
        }
    }

    /// Response for a known path with an unsupported method.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "Method not allowed".to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, message) = match &err {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, ITEM_NOT_FOUND.to_string()),
            Error::DuplicateId(id) => (StatusCode::BAD_REQUEST, format!("Invalid item id {id}")),
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, format!("Invalid item: {msg}")),
            Error::ConnectionError { backend, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Storage backend '{backend}' unavailable"),
            ),
            Error::OperationFailed { .. } | Error::FeatureNotEnabled(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR.to_string())
            },
        };

        if status.is_server_error() {
            tracing::error!(
                request_id = current_request_id().as_deref(),
                error = %err,
                status = status.as_u16(),
                "Request failed"
            );
        }

        Self { status, message }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("Invalid item: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(failure(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Error::NotFound("a".into()) => StatusCode::NOT_FOUND ; "not found")]
    #[test_case(Error::DuplicateId("a".into()) => StatusCode::BAD_REQUEST ; "duplicate id")]
    #[test_case(Error::InvalidInput("bad".into()) => StatusCode::BAD_REQUEST ; "invalid input")]
    #[test_case(
        Error::ConnectionError { backend: "sqlite".into(), cause: "locked".into() }
        => StatusCode::SERVICE_UNAVAILABLE ; "connection error"
    )]
    #[test_case(
        Error::OperationFailed { operation: "x".into(), cause: "y".into() }
        => StatusCode::INTERNAL_SERVER_ERROR ; "operation failed"
    )]
    #[test_case(Error::FeatureNotEnabled("redis".into()) => StatusCode::INTERNAL_SERVER_ERROR ; "feature disabled")]
    fn test_status_mapping(err: Error) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::from(Error::NotFound("a".into())).message(),
            "Item not found"
        );
        assert_eq!(
            ApiError::from(Error::DuplicateId("abc".into())).message(),
            "Invalid item id abc"
        );
    }

    #[test]
    fn test_internal_cause_is_hidden() {
        let err = ApiError::from(Error::OperationFailed {
            operation: "read_item_document".into(),
            cause: "/secret/path: permission denied".into(),
        });
        assert_eq!(err.message(), INTERNAL_ERROR);
    }

    #[test]
    fn test_envelopes() {
        assert_eq!(success(3), json!({ "Result": 3 }));
        assert_eq!(failure("nope"), json!({ "Error": "nope" }));
    }
}
