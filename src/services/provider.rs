// src/services/provider.rs
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::UpstreamError;

/// Text fragments in upstream order. Consumed once; not restartable.
pub type TextStream = BoxStream<'static, Result<String, UpstreamError>>;

/// A text-generation backend the relay forwards prompts to.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Wait for the whole completion.
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError>;

    /// Start a streamed completion. Errors returned here happen before any
    /// fragment exists; later failures arrive as items of the stream.
    async fn stream(&self, prompt: &str) -> Result<TextStream, UpstreamError>;

    fn name(&self) -> &str;
}
