//! # rulecheck-runtime
//!
//! LLM-backed half of the rulecheck grader.
//!
//! `rulecheck-core` decides which rules apply and how to read an answer; this
//! crate asks the question. Each evaluation builds a two-turn prompt (rules as
//! the system turn, transcript as the user turn), sends it once at
//! temperature 0.0, and turns the reply into an [`EvaluationVerdict`].
//!
//! ## Providers
//!
//! Providers are compiled in by feature: `openai` (any OpenAI-compatible
//! endpoint) and `anthropic`. [`ProviderRegistry::with_defaults`] registers
//! whichever were enabled. Retries, if wanted, belong in a provider; the
//! evaluator never retries.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rulecheck_runtime::{ProviderRegistry, RuleEvaluator, RuntimeConfig};
//! use rulecheck_core::{extract_transcript, DialogueTurn};
//!
//! let config = RuntimeConfig::default().with_env_overrides()?;
//! let provider = ProviderRegistry::with_defaults()
//!     .create(&config.provider, &config.provider_options)?;
//! let evaluator = RuleEvaluator::new(provider, &config);
//!
//! let transcript = extract_transcript(&[DialogueTurn::user("Cancel order #W123")]);
//! let verdict = evaluator.evaluate("retail", None, &transcript).await?;
//! println!("{} violations", verdict.violation_count);
//! ```

pub mod config;
pub mod evaluator;
pub mod prompts;
pub mod providers;

pub use config::{ConfigError, RuntimeConfig};
pub use evaluator::{EvaluationError, EvaluationJob, EvaluationReport, RuleEvaluator};
pub use providers::{
    ApiCredential, ChatMessage, ChatRole, CompletionConfig, CompletionResponse, CredentialSource,
    LlmProvider, ProviderError, ProviderFactory, ProviderRegistry, TokenUsage,
};

#[cfg(feature = "anthropic")]
pub use providers::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "openai")]
pub use providers::{OpenAiProvider, OpenAiProviderFactory};

pub use rulecheck_core::EvaluationVerdict;
