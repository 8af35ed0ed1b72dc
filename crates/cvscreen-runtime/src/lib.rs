//! # cvscreen-runtime
//!
//! Everything in a screening run that touches files or the network.
//!
//! The deterministic pieces (prompt, answer parsing, result table) live in
//! `cvscreen-core`. This crate adds:
//! - PDF text extraction with header detection
//! - Streaming chat-completions providers behind [`LlmProvider`]
//! - The retrying [`CvEvaluator`]
//! - The [`ScreeningOrchestrator`] that ties a folder of CVs to a result table
//!
//! ## Example
//!
//! ```rust,ignore
//! use cvscreen_runtime::{ProviderRegistry, RuntimeConfig, ScreeningOrchestrator};
//!
//! let config = RuntimeConfig::load("cvscreen.yaml")?;
//! let provider = ProviderRegistry::with_defaults().create(&config.provider, &config.provider_config)?;
//!
//! let orchestrator = ScreeningOrchestrator::builder()
//!     .provider(provider)
//!     .config(config)
//!     .build()?;
//!
//! orchestrator
//!     .run("junior_fullstack_developer".as_ref(), "results.csv".as_ref())
//!     .await?;
//! ```

pub mod config;
pub mod evaluator;
pub mod extraction;
pub mod orchestrator;
pub mod providers;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, RuntimeConfig};
pub use evaluator::{CvEvaluator, Evaluation, EvaluationAttemptError, EvaluatorSettings};
pub use extraction::{
    DocumentExtractor, ExtractedText, ExtractionError, ExtractionStatus, PdfExtractor,
};
pub use orchestrator::{
    OrchestratorError, RunOutcome, RunSummary, ScreeningOrchestrator,
    ScreeningOrchestratorBuilder,
};
pub use providers::{
    ChatMessage, CompletionConfig, FragmentStream, LlmProvider, ProviderError, ProviderFactory,
    ProviderRegistry,
};

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static message");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 42");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
