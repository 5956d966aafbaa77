//! Streaming text generation against an OpenAI-compatible chat completions API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, pin::Pin, time::Duration};
use tracing::{debug, instrument};
use url::Url;

use crate::APP_USER_AGENT;

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A prompt plus the sampling parameters to run it with.
#[derive(Clone, Debug)]
pub struct Generation {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Start generating; the returned stream yields text deltas in order.
    async fn stream(&self, generation: &Generation) -> Result<TextStream>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChoiceChunk>,
}

#[derive(Debug, Deserialize)]
struct ChoiceChunk {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
    model: String,
}

impl OpenAiGenerator {
    /// # Errors
    ///
    /// Returns an error if `base_url` cannot be joined with the completions
    /// path or the HTTP client cannot be built.
    pub fn new(base_url: &Url, api_key: SecretString, model: &str) -> Result<Self> {
        let endpoint = completions_endpoint(base_url)?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build generator client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model: model.to_string(),
        })
    }
}

/// Append the completions path to `base_url`, keeping any path prefix it has.
fn completions_endpoint(base_url: &Url) -> Result<Url> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("v1/chat/completions")
        .with_context(|| format!("Invalid generator base URL: {base_url}"))
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn stream(&self, generation: &Generation) -> Result<TextStream> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &generation.system,
                },
                ChatMessage {
                    role: "user",
                    content: &generation.prompt,
                },
            ],
            temperature: generation.temperature,
            max_tokens: generation.max_output_tokens,
            stream: true,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("Failed to call text generator")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Text generator error: {status} - {body}"));
        }
        debug!("generation stream started");

        Ok(Box::pin(decode_sse(response.bytes_stream())))
    }
}

/// Turn a byte stream of server-sent events into text deltas.
pub fn decode_sse<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = (
        Box::pin(bytes),
        SseDecoder::default(),
        VecDeque::<String>::new(),
        false,
    );
    stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(text) = pending.pop_front() {
                return Some((Ok(text), (bytes, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in decoder.push(chunk.as_ref()) {
                        match event {
                            SseEvent::Delta(text) => pending.push_back(text),
                            SseEvent::Done => {
                                done = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    done = true;
                    return Some((
                        Err(anyhow!(err).context("Generator stream error")),
                        (bytes, decoder, pending, done),
                    ));
                }
                None => done = true,
            }
        }
    })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Incremental parser for `data:` lines; events may be split across chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }
            if let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(data) {
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty());
                if let Some(content) = content {
                    events.push(SseEvent::Delta(content));
                }
            }
        }
        events
    }
}
