use axum::{
    Json,
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::ResponseMode,
    error::AppError,
    message::{ChatRequest, ChatResponse, HealthResponse, TestResponse},
    services::relay::relay_stream,
    state::SharedState,
};

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: ChatRequest,
) -> Result<Response, AppError> {
    let request_id = Uuid::new_v4().to_string();

    let prompt = payload.prompt()?;
    info!(%request_id, %prompt, mode = %state.config.mode, "Chat message");

    let Some(provider) = state.provider.as_ref() else {
        error!(%request_id, "OPENROUTER_API_KEY not configured");
        return Err(AppError::MissingApiKey);
    };

    match state.config.mode {
        ResponseMode::Buffered => {
            let reply = provider.complete(prompt).await.inspect_err(|err| {
                error!(%request_id, provider = provider.name(), error = %err, kind = err.kind(), "Completion failed");
            })?;
            info!(%request_id, chars = reply.len(), "Completion finished");
            Ok(Json(ChatResponse { reply }).into_response())
        }
        ResponseMode::Stream => {
            let upstream = provider.stream(prompt).await.inspect_err(|err| {
                error!(%request_id, provider = provider.name(), error = %err, kind = err.kind(), "Stream request failed");
            })?;
            Ok(relay_stream(upstream, request_id).await?)
        }
    }
}

pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    info!("Health check");
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "Server is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        mode: state.config.mode.to_string(),
        api_key_configured: state.provider.is_some(),
    })
}

pub async fn test_handler() -> Json<TestResponse> {
    Json(TestResponse {
        message: "Server is working!".to_string(),
    })
}

pub async fn not_found_handler(method: Method, uri: Uri) -> AppError {
    warn!(%method, path = %uri.path(), "Not found");
    AppError::NotFound
}
