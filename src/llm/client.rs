//! LLM transport
//!
//! A small trait seam (`LlmClient`) so the pipeline and tests can swap the
//! transport, plus the production OpenRouter-compatible client with
//! rate-limit retry and exponential backoff.

use super::models::{Model, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenRouter direct API URL (BYOK mode)
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Get the configured API key, if any.
fn api_key() -> Option<String> {
    std::env::var("OPENROUTER_API_KEY").ok()
}

/// Check if a real LLM transport is available.
pub fn is_available() -> bool {
    api_key().is_some()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One completion request against a specific (model, provider) pair.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub provider: Provider,
    pub model: Model,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw completion: content plus an optional provider-reported error.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub error: Option<String>,
}

/// Transport seam. Production uses [`OpenRouterClient`]; tests stub this.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Completion>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    provider: ProviderPreference,
}

#[derive(Serialize)]
struct ProviderPreference {
    order: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// Extract a retry-after hint from a rate-limit response body, if present.
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    if let Some(pos) = text_lower.find("retry") {
        let after_retry = &text_lower[pos..];
        for word in after_retry.split_whitespace().skip(1).take(5) {
            if let Ok(secs) = word
                .trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
            {
                if secs > 0 && secs < 300 {
                    return Some(secs);
                }
            }
        }
    }
    None
}

/// Production client for the OpenRouter-compatible endpoint.
pub struct OpenRouterClient {
    http: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for OpenRouterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Completion> {
        let api_key = api_key().ok_or_else(|| {
            anyhow::anyhow!("No API key configured. Set OPENROUTER_API_KEY to enable fixes.")
        })?;

        let body = ChatRequest {
            model: request.model.id().to_string(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            provider: ProviderPreference {
                order: vec![request.provider.id().to_string()],
            },
        };

        let mut retry_count = 0;
        loop {
            let response = self
                .http
                .post(OPENROUTER_URL)
                .header("Content-Type", "application/json")
                .header("X-Title", "Mend")
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!("Failed to parse provider response: {}\n{}", e, text)
                })?;

                let content = parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default();

                return Ok(Completion {
                    content,
                    error: parsed.error.map(|e| e.message),
                });
            }

            // Rate limits are retried with backoff; everything else is a
            // transport error the sequencer converts into "try next pair".
            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let retry_after = parse_retry_after(&text).unwrap_or_else(|| {
                    (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
                });
                eprintln!(
                    "  Rate limited. Retrying in {}s (attempt {}/{})",
                    retry_after, retry_count, MAX_RETRIES
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(retry_after)).await;
                continue;
            }

            let error_msg = match status.as_u16() {
                401 => "Invalid API key.".to_string(),
                429 => format!("Rate limited after {} retries.", retry_count),
                500..=599 => format!("Provider server error ({}).", status),
                _ => format!("API error {}: {}", status, truncate_str(&text, 200)),
            };
            return Err(anyhow::anyhow!("{}", error_msg));
        }
    }
}

/// Truncate a string for display (Unicode-safe)
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}
