use std::net::SocketAddr;
use std::sync::Arc;

use chat_relay::{config::Config, routes, state::AppState};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    let filter = if config.verbose {
        "chat_relay=debug,tower_http=debug"
    } else {
        "chat_relay=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("chat-relay v{}", env!("CARGO_PKG_VERSION"));
    info!(config = ?config, "Configuration loaded");

    let addr = config.listen_addr()?;
    let state = Arc::new(AppState::new(config)?);
    let app = routes::create_router(state.clone());

    let listener = TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();
    info!(%addr, "🚀 Server started");
    info!("📌 Local: http://localhost:{port}");
    info!("🔧 Health: http://localhost:{port}/health");
    info!(
        mode = %state.config.mode,
        model = %state.config.model,
        "🔑 API key configured: {}",
        if state.provider.is_some() { "YES" } else { "NO" }
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
