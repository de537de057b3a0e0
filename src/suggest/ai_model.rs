use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompanionError;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_MODEL: &str = "llama3.1";
pub const DEFAULT_NUM_CTX: u32 = 32_768;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// A chat model that turns a system + user prompt into raw text.
///
/// Implementations are blocking; the server calls them from
/// `spawn_blocking` and the engine from scoped threads.
pub trait TextInference: Send + Sync {
    fn infer(&self, system: &str, user: &str) -> Result<String, CompanionError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn chat_messages(system: &str, user: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system".into(),
            content: system.into(),
        });
    }
    messages.push(ChatMessage {
        role: "user".into(),
        content: user.into(),
    });
    messages
}

fn http_client(timeout: Duration, endpoint: &str) -> Result<reqwest::blocking::Client, CompanionError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| CompanionError::ModelRequest {
            endpoint: endpoint.to_string(),
            source,
        })
}

fn check_status(
    endpoint: &str,
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, CompanionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(CompanionError::ModelStatus {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Ollama Backend
// ============================================================================

pub struct OllamaBackend {
    pub endpoint: String,
    pub model: String,
    pub num_ctx: u32,
    pub timeout: Duration,
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            num_ctx: DEFAULT_NUM_CTX,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            ..Self::default()
        }
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = num_ctx;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl TextInference for OllamaBackend {
    fn infer(&self, system: &str, user: &str) -> Result<String, CompanionError> {
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: chat_messages(system, user),
            stream: false,
            options: OllamaOptions {
                num_ctx: self.num_ctx,
            },
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "ollama chat request");

        let transport = |source| CompanionError::ModelRequest {
            endpoint: self.endpoint.clone(),
            source,
        };
        let client = http_client(self.timeout, &self.endpoint)?;
        let response = client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(transport)?;
        let response = check_status(&self.endpoint, response)?;
        let parsed: OllamaChatResponse = response.json().map_err(transport)?;
        Ok(parsed.message.content)
    }
}

// ============================================================================
// OpenAI-compatible Backend
// ============================================================================

/// Remote chat-completions endpoint (`<base>/chat/completions`).
pub struct OpenAiBackend {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the bearer key.
    pub api_key_env: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

impl OpenAiBackend {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_key_env(mut self, var: &str) -> Self {
        self.api_key_env = var.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> Result<String, CompanionError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CompanionError::Config(format!("environment variable {} is not set", self.api_key_env))
            })
    }
}

impl TextInference for OpenAiBackend {
    fn infer(&self, system: &str, user: &str) -> Result<String, CompanionError> {
        let key = self.api_key()?;
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: chat_messages(system, user),
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "chat completion request");

        let transport = |source| CompanionError::ModelRequest {
            endpoint: self.endpoint.clone(),
            source,
        };
        let client = http_client(self.timeout, &self.endpoint)?;
        let response = client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&request)
            .send()
            .map_err(transport)?;
        let response = check_status(&self.endpoint, response)?;
        let parsed: CompletionResponse = response.json().map_err(transport)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

// ============================================================================
// Mock Backend (for testing without a model server)
// ============================================================================

/// Returns a canned response, or the configured error message as a
/// `ModelStatus` failure.
pub struct MockTextInference {
    pub response: String,
    pub fail_with: Option<String>,
}

impl MockTextInference {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: String::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

impl TextInference for MockTextInference {
    fn infer(&self, _system: &str, _user: &str) -> Result<String, CompanionError> {
        match &self.fail_with {
            Some(message) => Err(CompanionError::ModelStatus {
                endpoint: "mock".to_string(),
                status: 500,
                body: message.clone(),
            }),
            None => Ok(self.response.clone()),
        }
    }
}
