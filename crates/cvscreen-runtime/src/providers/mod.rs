//! LLM provider abstractions for cvscreen-runtime.
//!
//! A provider turns a chat request into a stream of text fragments. The
//! evaluator concatenates the fragments itself, so providers stay unaware
//! of what the answer is supposed to contain.
//!
//! ## Security
//!
//! All providers keep their API key in an [`ApiCredential`], which never
//! shows up in `Debug`/`Display` output or logs.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;
pub mod sse;

#[cfg(feature = "reqwest")]
mod chat_completions;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};
pub use sse::SseDecoder;

#[cfg(feature = "reqwest")]
pub use chat_completions::ChatCompletionsProvider;

#[cfg(feature = "groq")]
pub use chat_completions::{GroqProviderFactory, GROQ_API_KEY_ENV};

#[cfg(feature = "openai")]
pub use chat_completions::{OpenAiProviderFactory, OPENAI_API_KEY_ENV};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamError(String),

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Sampling and transport settings for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model identifier understood by the backend
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    pub temperature: f32,

    pub top_p: f32,

    /// Whole-request timeout, including reading the stream
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-oss-120b".to_string(),
            max_tokens: 8192,
            temperature: 1.0,
            top_p: 1.0,
            timeout: Duration::from_secs(120),
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// `user` for every request cvscreen sends
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Lazy, finite sequence of response fragments in delivery order.
/// Not restartable: a retry issues a new request.
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

/// A backend that streams chat completions.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start a streaming chat completion.
    ///
    /// Errors that happen before the first byte (connection, status codes)
    /// are returned here; errors while reading arrive inside the stream.
    async fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<FragmentStream, ProviderError>;

    /// Cheap local check that a request could be sent at all.
    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;

    /// Rough size of a request, used for logging only.
    fn estimate_tokens(&self, text: &str) -> u32 {
        u32::try_from(text.chars().count().div_ceil(4)).unwrap_or(u32::MAX)
    }
}

/// Drain a fragment stream into one buffer, preserving delivery order.
pub async fn collect_fragments(mut stream: FragmentStream) -> Result<String, ProviderError> {
    let mut buffer = String::new();
    while let Some(fragment) = stream.next().await {
        buffer.push_str(&fragment?);
    }
    Ok(buffer)
}
