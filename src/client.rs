//! # Model Backend
//!
//! The `ModelBackend` trait is the seam between the agent loop and the language
//! model. `HttpBackend` implements it for any OpenAI-compatible chat completions
//! endpoint, in both plain and server-sent-events streaming mode.

use crate::config::Config;
use crate::error::AgentError;
use crate::message::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use anyhow::{Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk>>;

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Requests one complete model turn.
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse>;

    /// Requests one model turn as a stream of incremental chunks.
    async fn chat_completion_stream(&self, request: ChatCompletionRequest) -> Result<ChunkStream>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

pub fn initialize_client(config: &Config) -> Result<HttpBackend> {
    let api_key = match config.backend.config().api_key_env_var {
        Some(env_var) => match std::env::var(env_var) {
            Ok(val) => Some(val),
            Err(_) => bail!("environment variable {} not set", env_var),
        },
        None => None,
    };
    HttpBackend::new(
        &config.base_url(),
        api_key,
        Duration::from_secs(config.timeout_seconds),
    )
}

impl HttpBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let mut builder = Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))?;
        let status = response.status();
        debug!(%url, %status, "chat completion response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Backend(format!("{status}: {body}")).into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelBackend for HttpBackend {
    async fn chat_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        request.stream = None;
        let response = self.post(&request).await?;
        response
            .json()
            .await
            .map_err(|e| AgentError::Backend(e.to_string()).into())
    }

    async fn chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChunkStream> {
        request.stream = Some(true);
        let response = self.post(&request).await?;
        let mut body = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            'read: loop {
                let (payloads, body_ended) = match body.next().await {
                    Some(Ok(bytes)) => (decoder.push(&bytes), false),
                    Some(Err(e)) => {
                        yield Err(anyhow::Error::from(AgentError::Backend(e.to_string())));
                        break;
                    }
                    None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
                };
                for data in payloads {
                    if data == "[DONE]" {
                        break 'read;
                    }
                    match serde_json::from_str::<ChatCompletionChunk>(&data) {
                        Ok(chunk) => yield Ok(chunk),
                        Err(e) => {
                            yield Err(anyhow::Error::from(AgentError::Backend(format!(
                                "malformed stream chunk: {e}"
                            ))));
                            break 'read;
                        }
                    }
                }
                if body_ended {
                    break;
                }
            }
        };
        Ok(stream.boxed())
    }
}

/// Splits a server-sent-events byte stream into `data:` payloads. Network chunks
/// may end mid-line, so incomplete lines are buffered until their newline arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            payloads.extend(data_payload(&raw));
        }
        payloads
    }

    /// Takes the last line when the body ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        data_payload(&raw)
    }
}

fn data_payload(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let data = line
        .trim_end_matches(['\n', '\r'])
        .strip_prefix("data:")?
        .trim_start();
    (!data.is_empty()).then(|| data.to_string())
}
