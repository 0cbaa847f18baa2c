//! HTTP error contract for the control-plane API (§7): a uniform JSON
//! envelope for every non-2xx response, defined locally since the hub has
//! no wire protocol shared with a browser client to justify pulling the
//! type from elsewhere.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type HttpResult<T = ()> = Result<T, Response>;

#[derive(Debug, Serialize, PartialEq)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

pub(crate) fn json_error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Response {
    (status, Json(HttpErrorEnvelope { code: code.into(), message: message.into(), details: None })).into_response()
}

pub fn internal_error(err: impl Display) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

pub fn not_found(message: impl Into<String>) -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn service_unavailable(message: impl Into<String>) -> Response {
    json_error(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message)
}

pub fn gateway_timeout(message: impl Into<String>) -> Response {
    json_error(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn assert_error_response(response: Response, expected_status: StatusCode, expected_code: &str) {
        assert_eq!(response.status(), expected_status);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HttpErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code, expected_code);
    }

    #[tokio::test]
    async fn internal_error_sets_internal_contract() {
        assert_error_response(internal_error("db down"), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR").await;
    }

    #[tokio::test]
    async fn not_found_sets_not_found_contract() {
        assert_error_response(not_found("missing"), StatusCode::NOT_FOUND, "NOT_FOUND").await;
    }

    #[tokio::test]
    async fn service_unavailable_sets_unavailable_contract() {
        assert_error_response(service_unavailable("degraded"), StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE").await;
    }
}
