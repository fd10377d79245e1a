//! HTTP mapping for pipeline errors.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::errors::TranscodeError;

impl IntoResponse for TranscodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            TranscodeError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            TranscodeError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            TranscodeError::ResourceExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            TranscodeError::Upstream { .. } | TranscodeError::Conversion { .. } => {
                StatusCode::BAD_GATEWAY
            }
            TranscodeError::Cache(_) | TranscodeError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // internal details stay in the log, not the response body
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            debug!("Request rejected ({status}): {self}");
            self.to_string()
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
