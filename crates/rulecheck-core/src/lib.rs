//! # rulecheck-core
//!
//! Deterministic half of the rulecheck grader.
//!
//! rulecheck decides whether a customer-service agent broke its scenario's
//! rules during a simulated dialogue. The judgment itself is delegated to a
//! language model (see `rulecheck-runtime`); this crate owns everything around
//! that call that must be reproducible:
//!
//! - choosing the rule text for a scenario ([`CorpusTable::resolve`]),
//! - stripping "Domain basic" sections from policy documents ([`filter_domain_basic`]),
//! - rendering dialogue turns into a transcript ([`extract_transcript`]),
//! - recovering a verdict from free-form model output ([`EvaluationVerdict::from_response`]).
//!
//! ## Key Guarantees
//!
//! 1. **No LLM calls**: every function here is pure text processing
//! 2. **No hidden defaults on failure**: a `<json>` block that cannot be parsed
//!    is an error, never an empty verdict
//! 3. **Stateless**: nothing is cached or shared between evaluations
//!
//! ## Example
//!
//! ```rust
//! use rulecheck_core::{CorpusTable, DialogueTurn, EvaluationVerdict, extract_transcript};
//!
//! let rules = CorpusTable::builtin().resolve("retail", || None)?;
//! assert!(rules.text().contains("General rules:"));
//!
//! let transcript = extract_transcript(&[DialogueTurn::assistant("Hi")]);
//! assert_eq!(transcript.lines()[0], "Agent message: Hi");
//!
//! let verdict = EvaluationVerdict::from_response(
//!     "<json>{'violation_count': 1, 'violations': ['rule A']}</json>",
//! )?;
//! assert_eq!(verdict.violation_count, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod corpus;
pub mod extract;
pub mod policy;
pub mod transcript;
pub mod verdict;

// Re-export main types at crate root
pub use corpus::{CorpusError, CorpusTable, RuleCorpus, RuleSource, RuleSourceKind};
pub use extract::{extract_json_blocks, json_blocks, ParseError};
pub use policy::{filter_domain_basic, PolicyDocument};
pub use transcript::{extract_transcript, DialogueInput, DialogueTurn, Transcript, TurnRole};
pub use verdict::EvaluationVerdict;
