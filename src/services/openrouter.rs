// src/services/openrouter.rs
use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, header::ACCEPT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Config;
use crate::error::UpstreamError;
use crate::services::provider::{ChatProvider, TextStream};
use crate::services::sse::SseDecoder;

/// Client for OpenRouter's OpenAI-compatible chat completions endpoint.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, config: &Config) -> Result<Self, UpstreamError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str, stream: bool) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &self.system_prompt,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: prompt,
        });

        CompletionRequest {
            model: &self.model,
            messages,
            stream,
        }
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, stream, "Sending upstream request");

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt, stream));
        if stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Upstream rejected request");
            return Err(UpstreamError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        let response = self.send(prompt, false).await?;
        let text = response.text().await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(UpstreamError::Provider(err.message));
        }
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(UpstreamError::EmptyCompletion)?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, UpstreamError> {
        let response = self.send(prompt, true).await?;
        Ok(text_fragments(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

struct Fragments<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, UpstreamError>>,
    finished: bool,
}

impl<S> Fragments<S> {
    fn absorb(&mut self, events: Vec<String>) {
        for data in events {
            if self.finished {
                return;
            }
            if data.trim() == "[DONE]" {
                self.finished = true;
                return;
            }

            let chunk: StreamChunk = match serde_json::from_str(&data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    debug!(error = %e, %data, "Skipping undecodable stream event");
                    continue;
                }
            };
            if let Some(err) = chunk.error {
                self.pending.push_back(Err(UpstreamError::Provider(err.message)));
                self.finished = true;
                return;
            }
            let text = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            if !text.is_empty() {
                self.pending.push_back(Ok(text));
            }
        }
    }
}

/// Turn an SSE chat-completions body into its text deltas.
///
/// The stream ends at `data: [DONE]`, at the end of the body, or right after
/// the first error (transport failure or an `error` event).
pub fn text_fragments<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<UpstreamError> + Send + 'static,
{
    let state = Fragments {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => match st.decoder.push(chunk.as_ref()) {
                    Ok(events) => st.absorb(events),
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                },
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    let events = st.decoder.finish();
                    st.absorb(events);
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sse::DEFAULT_MAX_LINE;

    fn body(chunks: &[&str]) -> impl Stream<Item = Result<Vec<u8>, UpstreamError>> + use<> {
        let owned: Vec<_> = chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": text } }] })
        )
    }

    #[tokio::test]
    async fn yields_deltas_until_done() {
        let raw = format!("{}{}data: [DONE]\n\n{}", delta("Hel"), delta("lo"), delta("late"));

        let fragments: Vec<_> = text_fragments(body(&[raw.as_str()])).collect().await;
        let texts: Vec<String> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn skips_role_only_and_empty_deltas() {
        let raw = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
        );
        let texts: Vec<String> = text_fragments(body(&[raw]))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(texts, vec!["hi"]);
    }

    #[tokio::test]
    async fn error_event_ends_stream() {
        let raw = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"provider went away\",\"code\":502}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
        );
        let items: Vec<_> = text_fragments(body(&[raw])).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "partial");
        assert!(matches!(&items[1], Err(UpstreamError::Provider(m)) if m == "provider went away"));
    }

    #[tokio::test]
    async fn transport_error_is_last_item() {
        let chunks: Vec<Result<&'static [u8], UpstreamError>> = vec![
            Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n"[..]),
            Err(UpstreamError::Decode("connection reset".to_string())),
            Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n"[..]),
        ];
        let items: Vec<_> = text_fragments(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn oversized_event_line_ends_stream_with_error() {
        let mut huge = b"data: ".to_vec();
        huge.resize(DEFAULT_MAX_LINE + 16, b'x');
        let chunks: Vec<Result<Vec<u8>, UpstreamError>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n".to_vec()),
            Ok(huge),
            Ok(b"\n\n".to_vec()),
        ];
        let items: Vec<_> = text_fragments(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "ok");
        assert!(matches!(&items[1], Err(UpstreamError::Decode(_))));
    }

    #[tokio::test]
    async fn body_without_done_still_terminates() {
        let raw = "data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}";
        let texts: Vec<String> = text_fragments(body(&[raw]))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(texts, vec!["end"]);
    }
}
