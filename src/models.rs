use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::session::ChatMessage;

/// Lazily produced text fragments of a streamed completion.
pub type TextStream = BoxStream<'static, anyhow::Result<String>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub tool_choice: String,
}

impl CompletionRequest {
    /// Plain-text output, tools disabled, no sampling overrides.
    pub fn new(model: &str, messages: Vec<ChatMessage>, stream: bool, max_tokens: Option<u32>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            stream,
            response_format: ResponseFormat { kind: "text".into() },
            max_tokens,
            tool_choice: "none".into(),
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String>;
    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<TextStream>;
}

#[derive(Clone)]
pub struct OpenAICompatible {
    pub base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAICompatible {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, req: &CompletionRequest) -> anyhow::Result<reqwest::Response> {
        tracing::debug!(model = %req.model, messages = req.messages.len(), stream = req.stream, "completion request");
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("model call failed: {} {}", status, body);
        }
        Ok(resp)
    }
}

#[derive(Debug, Deserialize)]
struct OaiChatResponse {
    choices: Vec<OaiChoice>,
}

#[derive(Debug, Deserialize)]
struct OaiChoice { message: OaiMessage }

#[derive(Debug, Deserialize)]
struct OaiMessage { content: Option<String> }

#[derive(Debug, Deserialize)]
struct OaiStreamChunk {
    choices: Vec<OaiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OaiStreamChoice { delta: OaiDelta }

#[derive(Debug, Deserialize)]
struct OaiDelta { content: Option<String> }

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Fragment(String),
    Done,
    Ignore,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else { return SseLine::Ignore };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<OaiStreamChunk>(data) {
        // reasoning-only chunks carry no content
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|s| !s.is_empty())
            .map(SseLine::Fragment)
            .unwrap_or(SseLine::Ignore),
        Err(e) => {
            tracing::warn!("failed to parse stream chunk: {e}, data: {data}");
            SseLine::Ignore
        }
    }
}

struct SseReader {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    done: bool,
}

impl SseReader {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            match parse_sse_line(&String::from_utf8_lossy(&line)) {
                SseLine::Fragment(f) => self.pending.push_back(f),
                SseLine::Done => {
                    self.done = true;
                    self.buffer.clear();
                    return;
                }
                SseLine::Ignore => {}
            }
        }
    }

    fn into_stream(self) -> TextStream {
        stream::unfold(self, |mut st| async move {
            loop {
                if let Some(fragment) = st.pending.pop_front() {
                    return Some((Ok(fragment), st));
                }
                if st.done {
                    return None;
                }
                match st.bytes.next().await {
                    Some(Ok(chunk)) => {
                        st.buffer.extend_from_slice(&chunk);
                        st.drain_lines();
                    }
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(e.into()), st));
                    }
                    None => {
                        st.buffer.push(b'\n');
                        st.drain_lines();
                        st.done = true;
                    }
                }
            }
        })
        .boxed()
    }
}

#[async_trait]
impl CompletionService for OpenAICompatible {
    async fn complete(&self, mut req: CompletionRequest) -> anyhow::Result<String> {
        req.stream = false;
        let resp = self.post(&req).await?;
        let v: OaiChatResponse = resp.json().await?;
        let content = v.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default();
        Ok(content)
    }

    async fn stream(&self, mut req: CompletionRequest) -> anyhow::Result<TextStream> {
        req.stream = true;
        let resp = self.post(&req).await?;
        let reader = SseReader {
            bytes: resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        };
        Ok(reader.into_stream())
    }
}
