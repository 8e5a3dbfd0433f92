//! Error types for the Increase client.
//!
//! # Design
//! Errors are split by where they happen: before the request leaves the
//! process (`MissingParameter`, `InvalidRequest`), on the wire
//! (`Transport`, `Canceled`), in the server's answer (`Api`), or while
//! reading a success body (`Decode`). API errors keep the decoded error
//! object and the raw body so callers can log exactly what came back.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::Extras;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure surfaced by a service call.
#[derive(Debug, Error)]
pub enum Error {
    /// A required path parameter was empty; no request was sent.
    #[error("missing required {0} parameter")]
    MissingParameter(&'static str),

    /// The request could not be assembled (bad base URL, non-object body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Api(Box<ApiError>),

    /// A 2xx body did not match the expected shape.
    #[error("failed to decode response at `{path}`: {message}")]
    Decode {
        path: String,
        message: String,
        body: String,
    },

    /// The caller's cancellation token fired.
    #[error("request canceled")]
    Canceled,
}

impl Error {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.api().map(|err| err.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the executor would try this failure again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api(err) => is_transient_status(err.status),
            _ => false,
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Api(Box::new(err))
    }
}

pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// A structured error response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub kind: ApiErrorType,
    pub title: Option<String>,
    pub detail: Option<String>,
    /// Field-level validation failures, when the server lists them.
    pub errors: Vec<FieldError>,
    /// The response body exactly as received.
    pub body: String,
}

impl ApiError {
    /// Decode an error body, falling back to the bare status when the body
    /// is not the expected JSON object.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => ApiError {
                status,
                kind: parsed.kind,
                title: parsed.title,
                detail: parsed.detail,
                errors: parsed.errors,
                body: body.to_string(),
            },
            Err(_) => ApiError {
                status,
                kind: ApiErrorType::Other(String::new()),
                title: None,
                detail: None,
                errors: Vec::new(),
                body: body.to_string(),
            },
        }
    }

    pub fn field_error(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    fn summary(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{title} ({detail})"),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => self.body.clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}: {}", self.status, self.kind, self.summary())
    }
}

impl std::error::Error for ApiError {}

crate::macros::string_enum! {
    /// The `type` field of an error response.
    pub enum ApiErrorType {
        ApiMethodNotFound => "api_method_not_found_error",
        EnvironmentMismatch => "environment_mismatch_error",
        IdempotencyKeyAlreadyUsed => "idempotency_key_already_used_error",
        InsufficientPermissions => "insufficient_permissions_error",
        InternalServer => "internal_server_error",
        InvalidApiKey => "invalid_api_key_error",
        InvalidOperation => "invalid_operation_error",
        InvalidParameters => "invalid_parameters_error",
        MalformedRequest => "malformed_request_error",
        ObjectNotFound => "object_not_found_error",
        PrivateFeature => "private_feature_error",
        RateLimited => "rate_limited_error",
    }
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: ApiErrorType,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}
