//! # rulecheck CLI
//!
//! `evaluate` calls the configured LLM provider; every other subcommand is
//! offline and runs one stage of the pipeline on its own. Structured output
//! goes to stdout as JSON, logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use rulecheck_core::{
    extract_transcript, CorpusTable, DialogueInput, EvaluationVerdict, PolicyDocument,
    RuleSourceKind, Transcript,
};
use rulecheck_runtime::{
    EvaluationJob, EvaluationReport, ProviderRegistry, RuleEvaluator, RuntimeConfig,
};

/// Grade agent transcripts against scenario rules.
#[derive(Parser, Debug)]
#[command(name = "rulecheck", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grade one or more transcripts with the configured LLM.
    Evaluate {
        /// Scenario name, e.g. "retail"
        #[arg(long)]
        scenario: String,

        /// Transcript file(s): a JSON turn array or an object with `messages`
        #[arg(long = "transcript", required = true, num_args = 1..)]
        transcripts: Vec<PathBuf>,

        /// Policy document, used when the scenario has no fixed corpus
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Extra corpus catalog (YAML or JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Runtime config file (YAML or JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the model id
        #[arg(long)]
        model: Option<String>,

        /// Override the provider type
        #[arg(long)]
        provider: Option<String>,
    },

    /// Show the rule text a scenario resolves to.
    Rules {
        #[arg(long)]
        scenario: String,

        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Remove "Domain basic" sections from a policy document.
    Filter { file: PathBuf },

    /// Render a dialogue file as transcript lines.
    Transcript { file: PathBuf },

    /// Read a verdict out of a saved model response.
    Parse { file: PathBuf },

    /// List scenarios with a fixed rule corpus.
    Scenarios {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ResolvedRules {
    scenario: String,
    source: RuleSourceKind,
    rules: String,
}

#[derive(Serialize)]
struct EvaluationOutcome {
    transcript: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<EvaluationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            scenario,
            transcripts,
            policy,
            catalog,
            config,
            model,
            provider,
        } => {
            evaluate(
                scenario,
                transcripts,
                policy.as_deref(),
                catalog.as_deref(),
                config.as_deref(),
                model,
                provider,
            )
            .await
        }
        Commands::Rules {
            scenario,
            policy,
            catalog,
        } => rules(&scenario, policy.as_deref(), catalog.as_deref()),
        Commands::Filter { file } => {
            let policy = load_policy(&file)?;
            print!("{}", policy.without_domain_basic());
            Ok(())
        }
        Commands::Transcript { file } => {
            let transcript = load_transcript(&file)?;
            print_json(&transcript.lines())
        }
        Commands::Parse { file } => {
            let response = read_file(&file)?;
            let verdict = EvaluationVerdict::from_response(&response)
                .with_context(|| format!("Failed to read a verdict from {}", file.display()))?;
            print_json(&verdict)
        }
        Commands::Scenarios { catalog } => {
            let corpora = load_corpora(catalog.as_deref())?;
            print_json(&corpora.scenarios())
        }
    }
}

async fn evaluate(
    scenario: String,
    transcripts: Vec<PathBuf>,
    policy: Option<&Path>,
    catalog: Option<&Path>,
    config: Option<&Path>,
    model: Option<String>,
    provider: Option<String>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    }
    .with_env_overrides()?;

    if let Some(model) = model {
        config.model = model;
    }
    if let Some(provider) = provider {
        config.provider = provider;
    }
    config.validate()?;

    let registry = ProviderRegistry::with_defaults();
    registry
        .validate(&config.provider, &config.provider_options)
        .context("Provider configuration rejected")?;
    let llm = registry.create(&config.provider, &config.provider_options)?;

    let evaluator = RuleEvaluator::new(llm, &config).with_corpora(load_corpora(catalog)?);
    let policy = policy.map(load_policy).transpose()?;

    let mut jobs = Vec::with_capacity(transcripts.len());
    for path in &transcripts {
        let mut job = EvaluationJob::new(scenario.clone(), load_transcript(path)?);
        job.policy = policy.clone();
        jobs.push(job);
    }

    tracing::info!(
        scenario = %scenario,
        jobs = jobs.len(),
        provider = %config.provider,
        model = %config.model,
        "Starting evaluation"
    );

    let results = evaluator.evaluate_batch(jobs, config.concurrency).await;

    let mut failures = 0;
    let outcomes: Vec<EvaluationOutcome> = transcripts
        .into_iter()
        .zip(results)
        .map(|(transcript, result)| match result {
            Ok(report) => EvaluationOutcome {
                transcript,
                report: Some(report),
                error: None,
            },
            Err(e) => {
                failures += 1;
                tracing::error!(transcript = %transcript.display(), error = %e, "Evaluation failed");
                EvaluationOutcome {
                    transcript,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    print_json(&outcomes)?;

    if failures > 0 {
        bail!("{} of {} evaluations failed", failures, outcomes.len());
    }
    Ok(())
}

fn rules(scenario: &str, policy: Option<&Path>, catalog: Option<&Path>) -> Result<()> {
    let corpora = load_corpora(catalog)?;
    let policy = policy.map(load_policy).transpose()?;
    let source = corpora.resolve(scenario, || policy)?;

    print_json(&ResolvedRules {
        scenario: scenario.to_string(),
        source: source.kind(),
        rules: source.text(),
    })
}

fn load_corpora(catalog: Option<&Path>) -> Result<CorpusTable> {
    let mut corpora = CorpusTable::builtin();
    if let Some(path) = catalog {
        let extra = CorpusTable::from_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?;
        corpora.extend(extra);
    }
    Ok(corpora)
}

fn load_policy(path: &Path) -> Result<PolicyDocument> {
    PolicyDocument::from_file(path)
        .with_context(|| format!("Failed to read policy {}", path.display()))
}

fn load_transcript(path: &Path) -> Result<Transcript> {
    let content = read_file(path)?;
    let input: DialogueInput = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dialogue {}", path.display()))?;
    Ok(extract_transcript(&input.into_turns()))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
