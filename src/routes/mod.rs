// src/routes/mod.rs
pub mod chat;

use std::any::Any;
use std::net::SocketAddr;

use crate::{error::AppError, state::SharedState};
use axum::{
    Router,
    extract::{ConnectInfo, DefaultBodyLimit, Request},
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chat::{chat_handler, health_handler, not_found_handler, test_handler};
use chrono::Utc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub fn create_router(state: SharedState) -> Router {
    let body_limit = state.config.body_limit;

    let router = Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/test", get(test_handler))
        .fallback(not_found_handler)
        .with_state(state);
    with_middleware(router, body_limit)
}

// CORS sits outside the panic catcher so panic responses carry CORS headers.
fn with_middleware(router: Router, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
}

async fn log_request(req: Request, next: Next) -> Response {
    // Only present when served with connect info; test harnesses skip it.
    let origin = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        method = %req.method(),
        path = %req.uri().path(),
        %origin,
        at = %Utc::now().to_rfc3339(),
        "Incoming request"
    );
    next.run(req).await
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(%details, "Handler panicked");
    AppError::Internal(details).into_response()
}
