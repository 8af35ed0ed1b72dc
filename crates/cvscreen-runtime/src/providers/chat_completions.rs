//! Streaming provider for OpenAI-compatible `/chat/completions` backends.
//!
//! Groq and OpenAI share the wire format: a JSON request with `stream: true`
//! answered by a server-sent event stream. The two only differ in their
//! default endpoint and credential variable.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    sse::SseDecoder,
    ChatMessage, CompletionConfig, FragmentStream, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Static description of one compatible backend.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    name: &'static str,
    base_url: &'static str,
    env_var: &'static str,
    key_name: &'static str,
}

const GROQ: Endpoint = Endpoint {
    name: "groq",
    base_url: "https://api.groq.com/openai/v1",
    env_var: GROQ_API_KEY_ENV,
    key_name: "Groq API key",
};

const OPENAI: Endpoint = Endpoint {
    name: "openai",
    base_url: "https://api.openai.com/v1",
    env_var: OPENAI_API_KEY_ENV,
    key_name: "OpenAI API key",
};

/// Chat-completions client with a redacted credential.
pub struct ChatCompletionsProvider {
    name: &'static str,
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("name", &self.name)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ChatCompletionsProvider {
    /// Create a Groq provider with an explicit key.
    pub fn groq(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::build(
            GROQ,
            ApiCredential::new(api_key, CredentialSource::Programmatic, GROQ.key_name),
            GROQ.base_url.to_string(),
        )
    }

    /// Create an OpenAI provider with an explicit key.
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::build(
            OPENAI,
            ApiCredential::new(api_key, CredentialSource::Programmatic, OPENAI.key_name),
            OPENAI.base_url.to_string(),
        )
    }

    /// Create from `provider_config`, falling back to the endpoint's env var.
    fn from_config(endpoint: Endpoint, config: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(config, "api_key", endpoint.env_var, endpoint.key_name)?;

        let base_url = config
            .get("base_url")
            .and_then(JsonValue::as_str)
            .unwrap_or(endpoint.base_url)
            .trim_end_matches('/')
            .to_string();

        Self::build(endpoint, credential, base_url)
    }

    fn build(
        endpoint: Endpoint,
        credential: ApiCredential,
        base_url: String,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        Ok(Self {
            name: endpoint.name,
            credential,
            base_url,
            client,
        })
    }

    /// Point the provider at a different server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(e.to_string())
    }
}

/// Pull `error.message` out of an error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(JsonValue::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    async fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<FragmentStream, ProviderError> {
        let request = ChatCompletionRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_completion_tokens: config.max_tokens,
            top_p: config.top_p,
            stream: true,
        };

        let timeout = config.timeout;

        // SECURITY: the key is only exposed when building the header
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .header("accept", "text/event-stream")
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        tracing::debug!(provider = self.name, model = %config.model, "Streaming completion");

        // A trailing `None` lets the decoder flush an unterminated last line
        let fragments = response
            .bytes_stream()
            .map(move |chunk| Some(chunk.map_err(|e| transport_error(e, timeout))))
            .chain(stream::once(async { None }))
            .scan(SseDecoder::new(), |decoder, chunk| {
                let items = match chunk {
                    Some(Ok(bytes)) => decoder.feed(&bytes),
                    Some(Err(e)) => vec![Err(e)],
                    None => decoder.finish().into_iter().collect(),
                };
                futures::future::ready(Some(stream::iter(items)))
            })
            .flatten()
            .boxed();

        Ok(fragments)
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        self.name
    }
}

fn validate_endpoint_config(endpoint: Endpoint, config: &JsonValue) -> Result<(), ProviderError> {
    if !ApiCredential::is_available(config, "api_key", endpoint.env_var) {
        return Err(ProviderError::NotConfigured(format!(
            "{} required: set 'api_key' in provider_config or {} env",
            endpoint.key_name, endpoint.env_var
        )));
    }

    if let Some(url) = config.get("base_url").and_then(JsonValue::as_str) {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

/// Factory for the Groq provider.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "gsk_...",                          // Optional, falls back to GROQ_API_KEY env
///   "base_url": "https://api.groq.com/openai/v1"   // Optional
/// }
/// ```
#[cfg(feature = "groq")]
pub struct GroqProviderFactory;

#[cfg(feature = "groq")]
impl ProviderFactory for GroqProviderFactory {
    fn provider_type(&self) -> &'static str {
        GROQ.name
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(ChatCompletionsProvider::from_config(GROQ, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        validate_endpoint_config(GROQ, config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": GROQ.base_url })
    }
}

/// Factory for the OpenAI provider. Same configuration keys as Groq,
/// with `OPENAI_API_KEY` as the fallback variable.
#[cfg(feature = "openai")]
pub struct OpenAiProviderFactory;

#[cfg(feature = "openai")]
impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        OPENAI.name
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(ChatCompletionsProvider::from_config(OPENAI, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        validate_endpoint_config(OPENAI, config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": OPENAI.base_url })
    }
}
