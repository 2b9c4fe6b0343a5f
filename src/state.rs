// src/state.rs
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::UpstreamError;
use crate::services::openrouter::OpenRouterClient;
use crate::services::provider::ChatProvider;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    /// `None` when no API key is configured.
    pub provider: Option<Arc<dyn ChatProvider>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, UpstreamError> {
        let provider = match config.api_key() {
            Some(key) => {
                let client = OpenRouterClient::new(key, &config)?;
                Some(Arc::new(client) as Arc<dyn ChatProvider>)
            }
            None => None,
        };
        Ok(Self::with_provider(config, provider))
    }

    pub fn with_provider(config: Config, provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self {
            config,
            provider,
            started_at: Instant::now(),
        }
    }
}
