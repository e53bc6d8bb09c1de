use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434/api/generate";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Errors that can occur when asking the scoring backend for a verdict
#[derive(Debug, Error)]
pub enum ScoringBackendError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Scoring backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("Malformed reply: {0}")]
    Malformed(String),

    #[error("Score {0} is outside 0-100")]
    ScoreOutOfRange(i64),

    #[error("Scoring backend not configured: {0}")]
    NotConfigured(String),
}

/// Text-in, text-out completion call
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ScoringBackendError>;

    /// Short label used in logs
    fn name(&self) -> &str {
        "completion-backend"
    }
}

/// Supported completion APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl BackendProvider {
    fn default_endpoint(self) -> &'static str {
        match self {
            BackendProvider::Anthropic => DEFAULT_ANTHROPIC_ENDPOINT,
            BackendProvider::OpenAi => DEFAULT_OPENAI_ENDPOINT,
            BackendProvider::Ollama => DEFAULT_OLLAMA_ENDPOINT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// HTTP client for the configured completion provider
pub struct HttpCompletionClient {
    provider: BackendProvider,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    client: Client,
}

impl HttpCompletionClient {
    /// Create a new client. `endpoint` overrides the provider default.
    pub fn new(
        provider: BackendProvider,
        endpoint: Option<String>,
        api_key: Option<String>,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ScoringBackendError> {
        if provider != BackendProvider::Ollama && api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ScoringBackendError::NotConfigured(format!(
                "{:?} backend requires an api_key",
                provider
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            provider,
            endpoint: endpoint.unwrap_or_else(|| provider.default_endpoint().to_string()),
            api_key,
            model,
            max_tokens,
            timeout,
            client,
        })
    }

    fn payload(&self, prompt: &str) -> Value {
        match self.provider {
            BackendProvider::Anthropic => json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [{ "role": "user", "content": prompt }],
            }),
            BackendProvider::OpenAi => json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [{ "role": "user", "content": prompt }],
            }),
            BackendProvider::Ollama => json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": { "num_predict": self.max_tokens },
            }),
        }
    }

    fn extract_text(&self, body: Value) -> Result<String, ScoringBackendError> {
        let text = match self.provider {
            BackendProvider::Anthropic => {
                let parsed: AnthropicResponse = serde_json::from_value(body)
                    .map_err(|e| ScoringBackendError::Malformed(format!("anthropic envelope: {}", e)))?;
                parsed
                    .content
                    .into_iter()
                    .filter(|c| c.content_type == "text")
                    .filter_map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join("")
            }
            BackendProvider::OpenAi => {
                let parsed: OpenAiResponse = serde_json::from_value(body)
                    .map_err(|e| ScoringBackendError::Malformed(format!("openai envelope: {}", e)))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| ScoringBackendError::Malformed("response had no choices".into()))?
            }
            BackendProvider::Ollama => {
                let parsed: OllamaResponse = serde_json::from_value(body)
                    .map_err(|e| ScoringBackendError::Malformed(format!("ollama envelope: {}", e)))?;
                parsed.response
            }
        };

        if text.trim().is_empty() {
            return Err(ScoringBackendError::Malformed("empty completion".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, ScoringBackendError> {
        let mut request = self.client.post(&self.endpoint).json(&self.payload(prompt));

        request = match (self.provider, self.api_key.as_deref()) {
            (BackendProvider::Anthropic, Some(key)) => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (BackendProvider::OpenAi, Some(key)) => request.bearer_auth(key),
            _ => request,
        };

        tracing::debug!("Requesting compatibility verdict from {:?} at {}", self.provider, self.endpoint);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ScoringBackendError::Timeout(self.timeout)
            } else {
                ScoringBackendError::Transport(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(ScoringBackendError::Api(format!(
                "{}: {}",
                status,
                body.chars().take(320).collect::<String>()
            )));
        }

        let body: Value = response.json().await?;
        self.extract_text(body)
    }

    fn name(&self) -> &str {
        match self.provider {
            BackendProvider::Anthropic => "anthropic",
            BackendProvider::OpenAi => "openai",
            BackendProvider::Ollama => "ollama",
        }
    }
}
