//! Runtime configuration for the relay.
//!
//! Every knob is a command-line flag with an environment fallback, so a
//! `.env` file (loaded by `main`) or plain env vars work the same way.
//! The parsed [`Config`] is handed to the router state once at startup;
//! handlers never look at the process environment.

use std::fmt;
use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "nvidia/nemotron-nano-12b-v2-vl:free";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Respond naturally in plain text without any JSON formatting, special characters, or metadata. Just provide direct, conversational responses.";
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// How `/chat` hands the model output back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResponseMode {
    /// Chunked `text/plain`, one body chunk per upstream fragment.
    #[default]
    Stream,
    /// Wait for the full completion and answer `{"reply": ...}`.
    Buffered,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Stream => "stream",
            ResponseMode::Buffered => "buffered",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command-line arguments / environment.
#[derive(Parser, Clone)]
#[command(name = "chat-relay", about = "Relays chat messages to an LLM routing API")]
pub struct Config {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP listen port.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Upstream API key. Without it `/chat` answers 500.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible upstream.
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model identifier sent upstream.
    #[arg(long, env = "OPENROUTER_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Response mode for `/chat`.
    #[arg(long, env = "RELAY_MODE", value_enum, default_value_t = ResponseMode::Stream)]
    pub mode: ResponseMode,

    /// System instruction prepended to every prompt.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            mode: ResponseMode::Stream,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            verbose: false,
        }
    }
}

// The key must never end up in logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("body_limit", &self.body_limit)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Config {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }

    /// A blank key counts as missing.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "chat-relay",
            "--port",
            "8081",
            "--mode",
            "buffered",
            "--api-key",
            "sk-test",
            "--model",
            "openai/gpt-4o-mini",
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.mode, ResponseMode::Buffered);
        assert_eq!(config.api_key(), Some("sk-test"));
        assert_eq!(config.model, "openai/gpt-4o-mini");
    }

    #[test]
    fn blank_key_is_missing() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn listen_addr_binds_all_interfaces_by_default() {
        let addr = Config::default().listen_addr().unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn debug_hides_api_key() {
        let config = Config {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
