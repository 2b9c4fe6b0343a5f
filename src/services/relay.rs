// src/services/relay.rs
//! Streams upstream text fragments to the HTTP client.
//!
//! The first fragment is awaited before the response is built, so a provider
//! that fails immediately still gets a proper 500. After that the status line
//! is committed and a failure can only be reported in-band.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{
        HeaderName, HeaderValue,
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, error, info};

use crate::error::UpstreamError;
use crate::services::provider::TextStream;

/// Text appended to the body when the upstream fails mid-stream.
pub fn error_marker(err: &UpstreamError) -> String {
    format!("\n\n[ERROR: {err}]")
}

/// Relay `upstream` as a chunked `text/plain` response.
pub async fn relay_stream(
    mut upstream: TextStream,
    request_id: String,
) -> Result<Response, UpstreamError> {
    info!(%request_id, "Starting AI stream");

    let head = match upstream.next().await {
        Some(Ok(fragment)) => Some(fragment),
        Some(Err(err)) => {
            error!(%request_id, error = %err, kind = err.kind(), "Upstream failed before first chunk");
            return Err(err);
        }
        None => None,
    };

    let body = Body::from_stream(relay_body(head, upstream, request_id));
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        body,
    )
        .into_response())
}

struct Relay {
    head: Option<String>,
    upstream: TextStream,
    request_id: String,
    chunks: usize,
    done: bool,
}

fn relay_body(
    head: Option<String>,
    upstream: TextStream,
    request_id: String,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    let relay = Relay {
        done: head.is_none(),
        head,
        upstream,
        request_id,
        chunks: 0,
    };
    if relay.done {
        info!(request_id = %relay.request_id, "Stream completed successfully (0 chunks)");
    }

    stream::unfold(relay, |mut relay| async move {
        if relay.done {
            return None;
        }

        let next = match relay.head.take() {
            Some(fragment) => Some(Ok(fragment)),
            None => relay.upstream.next().await,
        };

        match next {
            Some(Ok(fragment)) => {
                relay.chunks += 1;
                debug!(request_id = %relay.request_id, chunk = relay.chunks, %fragment, "Relaying chunk");
                Some((Ok(fragment), relay))
            }
            Some(Err(err)) => {
                error!(
                    request_id = %relay.request_id,
                    chunks = relay.chunks,
                    error = %err,
                    kind = err.kind(),
                    "Streaming error"
                );
                relay.done = true;
                Some((Ok(error_marker(&err)), relay))
            }
            None => {
                info!(
                    request_id = %relay.request_id,
                    chunks = relay.chunks,
                    "Stream completed successfully"
                );
                None
            }
        }
    })
}
