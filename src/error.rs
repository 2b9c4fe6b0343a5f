// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failures talking to the model provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not decode upstream payload: {0}")]
    Decode(String),

    #[error("{0}")]
    Provider(String),

    #[error("upstream returned no completion")]
    EmptyCompletion,
}

impl UpstreamError {
    /// Short name reported as `type` in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Request(_) => "RequestError",
            UpstreamError::Status { .. } => "StatusError",
            UpstreamError::Decode(_) => "DecodeError",
            UpstreamError::Provider(_) => "ProviderError",
            UpstreamError::EmptyCompletion => "EmptyCompletion",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("API key not configured")]
    MissingApiKey,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("route not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            kind: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MissingApiKey | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            AppError::BadRequest(msg) => ErrorBody::new(msg.clone()),
            AppError::InvalidBody(details) => {
                ErrorBody::new("Invalid request body").with_details(details.clone())
            }
            AppError::PayloadTooLarge => ErrorBody::new("Payload too large"),
            AppError::MissingApiKey => ErrorBody::new("API key not configured"),
            AppError::Upstream(err) => ErrorBody {
                error: "Server error".to_string(),
                details: Some(err.to_string()),
                kind: Some(err.kind().to_string()),
            },
            AppError::NotFound => ErrorBody::new("Route not found"),
            AppError::Internal(details) => {
                ErrorBody::new("Internal server error").with_details(details.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_body_carries_kind() {
        let err = AppError::from(UpstreamError::Provider("model overloaded".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Server error");
        assert_eq!(body["details"], "model overloaded");
        assert_eq!(body["type"], "ProviderError");
    }

    #[test]
    fn plain_errors_omit_optional_fields() {
        let body = serde_json::to_value(AppError::MissingApiKey.body()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "API key not configured" }));
    }
}
