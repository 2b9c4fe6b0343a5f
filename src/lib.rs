//! HTTP relay that forwards chat messages to an LLM routing API and returns
//! the completion buffered or as a chunked text stream.

pub mod config;
pub mod error;
pub mod message;
pub mod routes;
pub mod services;
pub mod state;
