//! OpenAI-compatible chat completion client.

use repograde_core::{BoxFuture, CompletionClient, CompletionRequest, RepoGradeError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Default chat completion base URL.
pub const DEFAULT_LLM_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

/// [`CompletionClient`] speaking the `/chat/completions` protocol.
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionClient {
    /// Build a client for `base_url`, sending `api_key` as a bearer token.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repograde/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            stream: false,
        };
        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status, &text));
        }
        let payload: ChatResponse = response.json().await.map_err(transport)?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RepoGradeError::Upstream("completion returned no choices".to_string()))
    }
}

impl CompletionClient for ChatCompletionClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, String> {
        Box::pin(self.send(request))
    }
}

fn classify(status: StatusCode, body: &str) -> RepoGradeError {
    let detail = body.trim();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return RepoGradeError::RateLimited(format!("{status}: {detail}"));
    }
    if detail.contains("TRT engine failed") {
        return RepoGradeError::Upstream(format!("inference engine failure: {detail}"));
    }
    RepoGradeError::Upstream(format!("completion returned {status}: {detail}"))
}

fn transport(err: reqwest::Error) -> RepoGradeError {
    RepoGradeError::Upstream(format!("completion request failed: {err}"))
}
