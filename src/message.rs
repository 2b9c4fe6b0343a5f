// src/message.rs
use axum::{
    Form, Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::{StatusCode, header::CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatRequest {
    /// The trimmed prompt, or `400 Message required`.
    pub fn prompt(&self) -> Result<&str, AppError> {
        match self.message.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => Ok(msg),
            _ => Err(AppError::BadRequest("Message required".to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub mode: String,
    pub api_key_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestResponse {
    pub message: String,
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn rejected(status: StatusCode, text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::InvalidBody(text)
    }
}

// Accepts JSON or urlencoded bodies. A request with no content type at all
// reads as an empty payload so it fails validation, not parsing.
impl<S> FromRequest<S> for ChatRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(payload) = Form::<ChatRequest>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return Ok(payload);
        }

        match Json::<ChatRequest>::from_request(req, state).await {
            Ok(Json(payload)) => Ok(payload),
            Err(JsonRejection::MissingJsonContentType(_)) => Ok(ChatRequest::default()),
            Err(e) => Err(rejected(e.status(), e.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_trimmed() {
        let req = ChatRequest {
            message: Some("  hello  ".to_string()),
        };
        assert_eq!(req.prompt().unwrap(), "hello");
    }

    #[test]
    fn blank_or_missing_message_is_rejected() {
        for message in [None, Some(String::new()), Some(" \n\t".to_string())] {
            let req = ChatRequest { message };
            assert!(matches!(req.prompt(), Err(AppError::BadRequest(m)) if m == "Message required"));
        }
    }
}
