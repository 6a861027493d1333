//! Request error taxonomy
//!
//! Every failure inside a request handler is a `ServeError`. Handlers convert it
//! into a response at their boundary, so no error ever reaches the connection task.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response, StatusCode};
use thiserror::Error;

use crate::http;

#[derive(Debug, Error)]
pub enum ServeError {
    /// Resource or route absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Method not served on this path (reported as 404)
    #[error("method {method} not allowed on {path}")]
    InvalidMethod { method: Method, path: String },

    /// Declared body exceeds the configured limit
    #[error("request body exceeds {max} bytes")]
    PayloadTooLarge { max: u64 },

    /// Upstream timed out or could not be reached
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// Upstream answered with a non-2xx status; relayed as-is
    #[error("upstream returned HTTP {status}")]
    UpstreamError { status: StatusCode, body: Bytes },

    #[error("invalid signature")]
    SignatureInvalid,

    #[error("{0}")]
    Internal(String),
}

impl ServeError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::InvalidMethod { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamUnavailable(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamError { status, .. } => *status,
            Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
        }
    }

    /// Convert the error into the response the client sees
    pub fn into_response(self) -> Response<Full<Bytes>> {
        match self {
            Self::NotFound(_) | Self::InvalidMethod { .. } => http::build_404_response(),
            Self::PayloadTooLarge { .. } => http::build_413_response(),
            Self::UpstreamUnavailable(message) | Self::Internal(message) => {
                http::response::build_json_error(StatusCode::INTERNAL_SERVER_ERROR, &message)
            }
            Self::UpstreamError { status, body } => http::response::build_upstream_error(status, body),
            Self::SignatureInvalid => {
                http::response::build_json_error(StatusCode::UNAUTHORIZED, "Invalid signature")
            }
        }
    }
}
