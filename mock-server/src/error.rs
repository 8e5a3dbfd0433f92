use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// An Increase-style error response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub title: String,
    pub detail: Option<String>,
    pub errors: Vec<(String, String)>,
    pub retry_after: Option<u64>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, title: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            title: title.into(),
            detail: None,
            errors: Vec::new(),
            retry_after: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "object_not_found_error",
            "Could not find the specified object.",
        )
        .with_detail(format!("No {what} with id {id} exists."))
    }

    pub fn route_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "api_method_not_found_error",
            "No API method exists at this path.",
        )
    }

    pub fn invalid_api_key() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_api_key_error",
            "Invalid API key.",
        )
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "malformed_request_error",
            "The request could not be parsed.",
        )
        .with_detail(detail)
    }

    pub fn invalid_operation(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "invalid_operation_error",
            "The operation is not allowed.",
        )
        .with_detail(detail)
    }

    pub fn idempotency_conflict() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "idempotency_key_already_used_error",
            "The idempotency key was already used for a different request.",
        )
    }

    pub fn invalid_parameters(errors: Vec<(String, String)>) -> Self {
        let count = errors.len();
        let mut error = Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_parameters_error",
            "Invalid parameters.",
        )
        .with_detail(format!("{count} parameter(s) were invalid."));
        error.errors = errors;
        error
    }

    pub fn invalid_field(field: &str, message: &str) -> Self {
        Self::invalid_parameters(vec![(field.to_string(), message.to_string())])
    }

    /// A failure requested through `/_mock/faults`.
    pub fn injected(status: StatusCode, retry_after: Option<u64>) -> Self {
        let mut error = if status == StatusCode::TOO_MANY_REQUESTS {
            Self::new(status, "rate_limited_error", "Too many requests.")
        } else {
            Self::new(status, "internal_server_error", "Injected failure.")
        };
        error.retry_after = retry_after;
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let errors: Vec<_> = self
            .errors
            .iter()
            .map(|(field, message)| json!({ "field": field, "message": message }))
            .collect();
        let body = json!({
            "status": self.status.as_u16(),
            "type": self.kind,
            "title": self.title,
            "detail": self.detail,
            "errors": errors,
        });
        let mut response = (self.status, Json(body)).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}
