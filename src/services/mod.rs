pub mod openrouter;
pub mod provider;
pub mod relay;
pub mod sse;
