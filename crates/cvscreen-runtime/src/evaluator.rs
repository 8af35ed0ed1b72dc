//! CV evaluation against an LLM with retry.
//!
//! One call to [`CvEvaluator::evaluate`] sends the rendered prompt plus the
//! CV text, gathers the streamed answer, and parses it into an
//! [`EvaluationResult`]. Any failure along the way (transport, stream,
//! malformed or incomplete JSON) fails the attempt. Attempts are retried on
//! an exponential schedule; when they run out the caller gets a sentinel
//! record instead of an error.

use backon::{ExponentialBuilder, Retryable};
use cvscreen_core::{compose_request, parse_evaluation, EvaluationPrompt, EvaluationResult, ResponseError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{collect_fragments, ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Why a single attempt failed.
#[derive(Error, Debug)]
pub enum EvaluationAttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Retry and request settings for the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    /// Attempts per document, including the first
    pub max_retries: u32,

    /// The wait after attempt `n` is `backoff_base * 2^n`
    pub backoff_base: Duration,

    pub completion: CompletionConfig,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            completion: CompletionConfig::default(),
        }
    }
}

/// Outcome of [`CvEvaluator::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: EvaluationResult,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Backoff waits taken between attempts
    pub delays: Vec<Duration>,
}

impl Evaluation {
    pub fn is_success(&self) -> bool {
        !self.result.is_sentinel()
    }
}

/// Evaluates CV text with an injected provider.
pub struct CvEvaluator {
    provider: Arc<dyn LlmProvider>,
    settings: EvaluatorSettings,
}

impl std::fmt::Debug for CvEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CvEvaluator")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl CvEvaluator {
    /// `settings.max_retries` of zero is treated as one attempt.
    pub fn new(provider: Arc<dyn LlmProvider>, mut settings: EvaluatorSettings) -> Self {
        settings.max_retries = settings.max_retries.max(1);
        Self { provider, settings }
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Evaluate one CV. Never fails: exhausted retries yield a sentinel.
    pub async fn evaluate(&self, document_text: &str, prompt: &EvaluationPrompt) -> Evaluation {
        let request = compose_request(prompt, document_text);
        tracing::debug!(
            estimated_tokens = self.provider.estimate_tokens(&request),
            "Sending evaluation request"
        );
        let attempts = AtomicU32::new(0);
        let mut delays = Vec::new();

        let outcome = (|| self.attempt(&request, &attempts))
            .retry(self.backoff())
            .sleep(tokio::time::sleep)
            .notify(|_err: &EvaluationAttemptError, delay: Duration| {
                tracing::debug!(delay = ?delay, "Backing off before next attempt");
                delays.push(delay);
            })
            .await;

        let attempts = attempts.load(Ordering::SeqCst);
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(attempts, error = %e, "Evaluation failed after all attempts");
                EvaluationResult::sentinel(format!(
                    "API Error after {} attempts: {}",
                    self.settings.max_retries, e
                ))
            }
        };

        Evaluation {
            result,
            attempts,
            delays,
        }
    }

    async fn attempt(
        &self,
        request: &str,
        counter: &AtomicU32,
    ) -> Result<EvaluationResult, EvaluationAttemptError> {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;

        let outcome = async {
            let stream = self
                .provider
                .stream_completion(vec![ChatMessage::user(request)], &self.settings.completion)
                .await?;
            let answer = collect_fragments(stream).await?;
            Ok::<_, EvaluationAttemptError>(parse_evaluation(&answer)?)
        }
        .await;

        if let Err(e) = &outcome {
            tracing::error!(
                attempt,
                max_attempts = self.settings.max_retries,
                provider = self.provider.name(),
                error = %e,
                "Evaluation attempt failed"
            );
        }
        outcome
    }

    /// Waits of `2 * base`, `4 * base`, ... with no jitter, one fewer than
    /// the number of attempts.
    fn backoff(&self) -> ExponentialBuilder {
        let retries = self.settings.max_retries.saturating_sub(1);
        let first = self.settings.backoff_base.saturating_mul(2);
        let last = self
            .settings
            .backoff_base
            .saturating_mul(2u32.saturating_pow(self.settings.max_retries.max(1)));

        ExponentialBuilder::default()
            .with_min_delay(first)
            .with_max_delay(last)
            .with_factor(2.0)
            .with_max_times(retries as usize)
    }
}
