//! Rejections produced by the admission gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

const ERROR_STATUS: &str = "error";

/// Why a request was not admitted.
///
/// Every rejection is terminal for its request and carries a fixed status
/// code, machine-readable code and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No API key header, or an empty one
    MissingCredential,
    /// The API key does not belong to any known identity
    InvalidCredential,
    /// The caller has used up its request quota
    RateExceeded,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingCredential | Rejection::InvalidCredential => StatusCode::UNAUTHORIZED,
            Rejection::RateExceeded => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MissingCredential => "API-401001",
            Rejection::InvalidCredential => "API-401002",
            Rejection::RateExceeded => "APP-429001",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::MissingCredential => "Missing API key",
            Rejection::InvalidCredential => "Invalid API key",
            Rejection::RateExceeded => "Too many requests",
        }
    }

    /// The JSON body sent to the caller.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: ERROR_STATUS.to_string(),
            code: self.code().to_string(),
            message: self.message().to_string(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for Rejection {}

/// Wire format of a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
