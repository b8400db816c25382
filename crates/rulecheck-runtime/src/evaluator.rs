//! Evaluation orchestrator.
//!
//! One evaluation is: resolve rules, render the transcript, make exactly one
//! provider call at temperature 0.0, and read the verdict out of the reply.
//! Nothing is shared between evaluations, so a batch is just independent
//! evaluations run side by side.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use rulecheck_core::{
    CorpusError, CorpusTable, EvaluationVerdict, ParseError, PolicyDocument, RuleSourceKind,
    Transcript,
};

use crate::config::RuntimeConfig;
use crate::prompts;
use crate::providers::{CompletionConfig, LlmProvider, ProviderError, TokenUsage};

/// Errors from a single evaluation.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Rule resolution failed: {0}")]
    Corpus(#[from] CorpusError),

    #[error("LLM call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Grading response unusable: {0}")]
    Parse(#[from] ParseError),
}

/// Verdict plus the context it was produced in.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub scenario: String,

    /// Whether the rules came from a fixed corpus or a policy document
    pub rule_source: RuleSourceKind,

    pub provider: String,

    /// Model id reported by the provider
    pub model: String,

    pub usage: TokenUsage,

    /// Rendered transcript lines sent to the model
    pub transcript_lines: usize,

    pub verdict: EvaluationVerdict,

    pub evaluated_at: DateTime<Utc>,
}

/// Input for [`RuleEvaluator::evaluate_batch`].
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub scenario: String,
    pub policy: Option<PolicyDocument>,
    pub transcript: Transcript,
}

impl EvaluationJob {
    pub fn new(scenario: impl Into<String>, transcript: Transcript) -> Self {
        Self {
            scenario: scenario.into(),
            policy: None,
            transcript,
        }
    }

    pub fn with_policy(mut self, policy: impl Into<PolicyDocument>) -> Self {
        self.policy = Some(policy.into());
        self
    }
}

/// Grades transcripts against scenario rules with an LLM.
pub struct RuleEvaluator {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    corpora: CorpusTable,
}

impl RuleEvaluator {
    /// Create an evaluator using the built-in corpora.
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        Self {
            provider,
            completion: config.completion_config(),
            corpora: CorpusTable::builtin(),
        }
    }

    /// Replace the corpus table.
    pub fn with_corpora(mut self, corpora: CorpusTable) -> Self {
        self.corpora = corpora;
        self
    }

    pub fn corpora(&self) -> &CorpusTable {
        &self.corpora
    }

    pub fn completion_config(&self) -> &CompletionConfig {
        &self.completion
    }

    /// Evaluate one transcript and return only the verdict.
    ///
    /// `policy` is consulted only when `scenario` has no fixed corpus.
    pub async fn evaluate(
        &self,
        scenario: &str,
        policy: Option<&PolicyDocument>,
        transcript: &Transcript,
    ) -> Result<EvaluationVerdict, EvaluationError> {
        Ok(self.evaluate_report(scenario, policy, transcript).await?.verdict)
    }

    /// Evaluate one transcript.
    ///
    /// # Errors
    /// - [`EvaluationError::Corpus`] if the scenario is unknown and no policy was given
    /// - [`EvaluationError::Provider`] if the LLM call fails (never retried)
    /// - [`EvaluationError::Parse`] if the reply has a `<json>` block that cannot be read
    pub async fn evaluate_report(
        &self,
        scenario: &str,
        policy: Option<&PolicyDocument>,
        transcript: &Transcript,
    ) -> Result<EvaluationReport, EvaluationError> {
        let rules = self.corpora.resolve(scenario, || policy.cloned())?;
        let messages = prompts::build_messages(scenario, &rules.text(), transcript);

        tracing::debug!(
            scenario,
            rule_source = ?rules.kind(),
            transcript_lines = transcript.len(),
            provider = self.provider.name(),
            "Requesting grading"
        );

        let response = self.provider.complete(messages, &self.completion).await?;
        let verdict = EvaluationVerdict::from_response(&response.content)?;

        if !verdict.is_consistent() {
            tracing::warn!(
                scenario,
                violation_count = verdict.violation_count,
                listed = verdict.violations.len(),
                "Violation count disagrees with listed violations"
            );
        }

        tracing::info!(
            scenario,
            violation_count = verdict.violation_count,
            model = %response.model,
            tokens = response.usage.total(),
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            scenario: scenario.to_string(),
            rule_source: rules.kind(),
            provider: self.provider.name().to_string(),
            model: response.model,
            usage: response.usage,
            transcript_lines: transcript.len(),
            verdict,
            evaluated_at: Utc::now(),
        })
    }

    /// Run independent evaluations, at most `concurrency` at a time.
    ///
    /// Results come back in job order, one per job; a failed job does not
    /// affect the others.
    pub async fn evaluate_batch(
        &self,
        jobs: Vec<EvaluationJob>,
        concurrency: usize,
    ) -> Vec<Result<EvaluationReport, EvaluationError>> {
        stream::iter(jobs)
            .map(|job| async move {
                self.evaluate_report(&job.scenario, job.policy.as_ref(), &job.transcript)
                    .await
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

impl std::fmt::Debug for RuleEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEvaluator")
            .field("provider", &self.provider.name())
            .field("completion", &self.completion)
            .field("scenarios", &self.corpora.scenarios())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, ChatRole, CompletionResponse};
    use async_trait::async_trait;
    use rulecheck_core::{extract_transcript, DialogueTurn};
    use std::sync::Mutex;
    use std::time::Duration;

    const POLICY: &str = "# Airline policy\n## Domain basic\nThere are flights.\n## Booking\n- Confirm before booking.\n";

    /// Replies with fixed text and records every call.
    struct ScriptedProvider {
        reply: String,
        calls: Mutex<Vec<(Vec<ChatMessage>, CompletionConfig)>>,
    }

    impl ScriptedProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Vec<ChatMessage>, CompletionConfig)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((messages, config.clone()));
            Ok(CompletionResponse {
                content: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 10,
                    ..TokenUsage::default()
                },
                model: "mock-model".to_string(),
                stop_reason: Some("stop".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Err(ProviderError::RateLimited { retry_after: None })
        }

        async fn health_check(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Answers slower for longer transcripts, counting their lines.
    struct SlowCountingProvider;

    #[async_trait]
    impl LlmProvider for SlowCountingProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let lines = messages[1].content.matches("Agent message:").count();
            tokio::time::sleep(Duration::from_millis(10 * lines as u64)).await;
            Ok(CompletionResponse {
                content: format!("<json>{{\"violation_count\": {}, \"violations\": []}}</json>", lines),
                usage: TokenUsage::default(),
                model: "mock-model".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn transcript(agent_turns: usize) -> Transcript {
        let turns: Vec<DialogueTurn> = (0..agent_turns)
            .map(|i| DialogueTurn::assistant(format!("turn {}", i)))
            .collect();
        extract_transcript(&turns)
    }

    fn evaluator(provider: Arc<dyn LlmProvider>) -> RuleEvaluator {
        RuleEvaluator::new(provider, &RuntimeConfig::default())
    }

    #[tokio::test]
    async fn test_reads_first_block() {
        let provider = ScriptedProvider::new(
            "Checked.\n<json>{\"violation_count\": 1, \"violations\": [\"Asked for confirmation\"]}</json>\n<json>{\"violation_count\": 9}</json>",
        );
        let verdict = evaluator(provider.clone())
            .evaluate("retail", None, &transcript(1))
            .await
            .unwrap();

        assert_eq!(verdict, EvaluationVerdict::new(1, vec!["Asked for confirmation".to_string()]));
    }

    #[tokio::test]
    async fn test_no_block_is_default_verdict() {
        let provider = ScriptedProvider::new("The agent followed every rule.");
        let verdict = evaluator(provider)
            .evaluate("retail", None, &transcript(1))
            .await
            .unwrap();

        assert_eq!(verdict, EvaluationVerdict::default());
    }

    #[tokio::test]
    async fn test_malformed_block_is_error() {
        let provider = ScriptedProvider::new("<json>{violation_count: 2,}</json>");
        let result = evaluator(provider)
            .evaluate("retail", None, &transcript(1))
            .await;

        assert!(matches!(
            result,
            Err(EvaluationError::Parse(ParseError::MalformedBlock { .. }))
        ));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let result = evaluator(Arc::new(FailingProvider))
            .evaluate("retail", None, &transcript(1))
            .await;

        assert!(matches!(
            result,
            Err(EvaluationError::Provider(ProviderError::RateLimited { .. }))
        ));
    }

    #[tokio::test]
    async fn test_single_call_with_two_turns_at_zero_temperature() {
        let provider = ScriptedProvider::new("<json>{}</json>");
        evaluator(provider.clone())
            .evaluate("retail", None, &transcript(2))
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);

        let (messages, config) = &calls[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains("Agent message: turn 1"));
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_fixed_corpus_ignores_policy() {
        let provider = ScriptedProvider::new("<json>{}</json>");
        let policy = PolicyDocument::new(POLICY);
        let report = evaluator(provider.clone())
            .evaluate_report("retail", Some(&policy), &transcript(1))
            .await
            .unwrap();

        assert_eq!(report.rule_source, RuleSourceKind::Fixed);
        let system = &provider.calls()[0].0[0].content;
        assert!(system.contains("a retail agent"));
        assert!(system.contains("General rules:"));
        assert!(!system.contains("Confirm before booking"));
    }

    #[tokio::test]
    async fn test_derived_rules_drop_domain_basic() {
        let provider = ScriptedProvider::new("<json>{}</json>");
        let policy = PolicyDocument::new(POLICY);
        let report = evaluator(provider.clone())
            .evaluate_report("airline", Some(&policy), &transcript(1))
            .await
            .unwrap();

        assert_eq!(report.rule_source, RuleSourceKind::Derived);
        let system = &provider.calls()[0].0[0].content;
        assert!(system.contains("## Booking\n- Confirm before booking."));
        assert!(!system.contains("There are flights."));
    }

    #[tokio::test]
    async fn test_unknown_scenario_without_policy() {
        let provider = ScriptedProvider::new("<json>{}</json>");
        let result = evaluator(provider.clone())
            .evaluate("airline", None, &transcript(1))
            .await;

        assert!(matches!(
            result,
            Err(EvaluationError::Corpus(CorpusError::MissingPolicy { .. }))
        ));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_report_fields() {
        let provider = ScriptedProvider::new(
            "<json>{'violation_count': 2, 'violations': ['one']}</json>",
        );
        let report = evaluator(provider)
            .evaluate_report("retail", None, &transcript(3))
            .await
            .unwrap();

        assert_eq!(report.scenario, "retail");
        assert_eq!(report.provider, "scripted");
        assert_eq!(report.model, "mock-model");
        assert_eq!(report.usage.total(), 110);
        assert_eq!(report.transcript_lines, 3);
        assert_eq!(report.verdict.violation_count, 2);
        assert!(!report.verdict.is_consistent());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rule_source"], "fixed");
        assert!(json["evaluated_at"].is_string());
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let evaluator = evaluator(Arc::new(SlowCountingProvider));
        let jobs = vec![
            EvaluationJob::new("retail", transcript(3)),
            EvaluationJob::new("airline", transcript(1)),
            EvaluationJob::new("airline", transcript(2)).with_policy(POLICY),
            EvaluationJob::new("retail", transcript(0)),
        ];

        let results = evaluator.evaluate_batch(jobs, 4).await;
        assert_eq!(results.len(), 4);

        assert_eq!(results[0].as_ref().unwrap().verdict.violation_count, 3);
        assert!(matches!(
            results[1],
            Err(EvaluationError::Corpus(CorpusError::MissingPolicy { .. }))
        ));
        let derived = results[2].as_ref().unwrap();
        assert_eq!(derived.verdict.violation_count, 2);
        assert_eq!(derived.rule_source, RuleSourceKind::Derived);
        assert_eq!(results[3].as_ref().unwrap().verdict.violation_count, 0);
    }

    #[tokio::test]
    async fn test_batch_zero_concurrency_still_runs() {
        let evaluator = evaluator(Arc::new(SlowCountingProvider));
        let results = evaluator
            .evaluate_batch(vec![EvaluationJob::new("retail", transcript(1))], 0)
            .await;
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn test_custom_corpora() {
        let provider = ScriptedProvider::new("<json>{}</json>");
        let mut corpora = CorpusTable::empty();
        corpora.insert("airline", rulecheck_core::RuleCorpus::new(["Never rebook without consent."]));

        let report = evaluator(provider.clone())
            .with_corpora(corpora)
            .evaluate_report("airline", None, &transcript(1))
            .await
            .unwrap();

        assert_eq!(report.rule_source, RuleSourceKind::Fixed);
        assert!(provider.calls()[0].0[0]
            .content
            .contains("Never rebook without consent."));
    }
}
