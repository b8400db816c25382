//! Rule corpus resolution.
//!
//! A scenario's rules come from one of two places:
//! - a hand-authored corpus registered under the scenario name (`Fixed`), or
//! - the scenario's policy document with its "Domain basic" sections removed
//!   (`Derived`).
//!
//! The hand-authored corpus always wins; the policy document is only requested
//! when no corpus is registered.

pub mod builtin;
mod schema;

pub use schema::validate_catalog_schema;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::policy::PolicyDocument;

/// Errors from loading catalogs or resolving rules.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read corpus catalog: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Corpus catalog failed schema validation: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Corpus catalog validation failed: {0}")]
    ValidationError(String),

    #[error("No rule corpus registered for scenario '{scenario}' and no policy document supplied")]
    MissingPolicy { scenario: String },
}

/// An ordered sequence of natural-language rule blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleCorpus {
    blocks: Vec<String>,
}

impl RuleCorpus {
    /// Create a corpus from blocks, preserving their order.
    pub fn new<I, S>(blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocks: blocks.into_iter().map(Into::into).collect(),
        }
    }

    /// The rule blocks in presentation order.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// All blocks concatenated in order.
    pub fn text(&self) -> String {
        self.blocks.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Where a scenario's rule text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// Hand-authored corpus, used verbatim.
    Fixed(RuleCorpus),

    /// Policy document with "Domain basic" sections removed.
    Derived(PolicyDocument),
}

/// Serializable tag for a [`RuleSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSourceKind {
    Fixed,
    Derived,
}

impl RuleSource {
    /// The rule text handed to the grading model.
    pub fn text(&self) -> String {
        match self {
            RuleSource::Fixed(corpus) => corpus.text(),
            RuleSource::Derived(policy) => policy.as_str().to_string(),
        }
    }

    pub fn kind(&self) -> RuleSourceKind {
        match self {
            RuleSource::Fixed(_) => RuleSourceKind::Fixed,
            RuleSource::Derived(_) => RuleSourceKind::Derived,
        }
    }
}

/// On-disk catalog format.
#[derive(Debug, Deserialize)]
struct CorpusCatalog {
    scenarios: BTreeMap<String, Vec<String>>,
}

/// Hand-authored corpora keyed by scenario name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusTable {
    corpora: BTreeMap<String, RuleCorpus>,
}

impl Default for CorpusTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CorpusTable {
    /// A table with no registered scenarios.
    pub fn empty() -> Self {
        Self {
            corpora: BTreeMap::new(),
        }
    }

    /// A table holding the compiled-in corpora.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (scenario, blocks) in builtin::BUILTIN_CORPORA {
            table.insert(*scenario, RuleCorpus::new(blocks.iter().copied()));
        }
        table
    }

    /// Parse a catalog from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CorpusError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a catalog from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a catalog file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, CorpusError> {
        validate_catalog_schema(&value).map_err(CorpusError::SchemaError)?;

        let catalog: CorpusCatalog = serde_json::from_value(value)?;
        let mut table = Self::empty();

        for (scenario, blocks) in catalog.scenarios {
            if scenario.trim().is_empty() {
                return Err(CorpusError::ValidationError(
                    "Scenario names must not be blank".to_string(),
                ));
            }
            if blocks.iter().all(|block| block.trim().is_empty()) {
                return Err(CorpusError::ValidationError(format!(
                    "Scenario '{}' has no non-blank rule blocks",
                    scenario
                )));
            }
            table.insert(scenario, RuleCorpus::new(blocks));
        }

        Ok(table)
    }

    /// Register a corpus, replacing any existing one for the scenario.
    pub fn insert(&mut self, scenario: impl Into<String>, corpus: RuleCorpus) {
        self.corpora.insert(scenario.into(), corpus);
    }

    /// Merge another table into this one; entries from `other` win.
    pub fn extend(&mut self, other: CorpusTable) {
        self.corpora.extend(other.corpora);
    }

    pub fn get(&self, scenario: &str) -> Option<&RuleCorpus> {
        self.corpora.get(scenario)
    }

    pub fn contains(&self, scenario: &str) -> bool {
        self.corpora.contains_key(scenario)
    }

    /// Registered scenario names, sorted.
    pub fn scenarios(&self) -> Vec<&str> {
        self.corpora.keys().map(String::as_str).collect()
    }

    /// Resolve the rules for a scenario.
    ///
    /// `policy` is only invoked when no corpus is registered for `scenario`;
    /// a registered corpus is returned verbatim whatever the policy says.
    pub fn resolve<F>(&self, scenario: &str, policy: F) -> Result<RuleSource, CorpusError>
    where
        F: FnOnce() -> Option<PolicyDocument>,
    {
        if let Some(corpus) = self.corpora.get(scenario) {
            tracing::debug!(scenario, blocks = corpus.blocks().len(), "Using fixed rule corpus");
            return Ok(RuleSource::Fixed(corpus.clone()));
        }

        let policy = policy().ok_or_else(|| CorpusError::MissingPolicy {
            scenario: scenario.to_string(),
        })?;

        tracing::debug!(scenario, "Deriving rules from policy document");
        Ok(RuleSource::Derived(policy.without_domain_basic()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "# Airline agent policy\n## Domain basic\nThere are flights.\n## Booking\n- Confirm before booking.\n";

    #[test]
    fn test_builtin_contains_retail() {
        let table = CorpusTable::builtin();
        assert_eq!(table.scenarios(), vec!["retail"]);

        let retail = table.get("retail").unwrap();
        assert_eq!(retail.blocks().len(), 6);
        assert!(retail.blocks()[0].contains("General rules:"));
        assert!(retail.blocks()[1].contains("Canceling pending order rules:"));
    }

    #[test]
    fn test_fixed_corpus_ignores_policy() {
        let table = CorpusTable::builtin();
        let source = table
            .resolve("retail", || Some(PolicyDocument::from(POLICY)))
            .unwrap();

        assert_eq!(source.kind(), RuleSourceKind::Fixed);
        assert_eq!(source.text(), builtin::RETAIL_RULES.concat());
        assert!(!source.text().contains("Confirm before booking"));
    }

    #[test]
    fn test_fixed_corpus_does_not_request_policy() {
        let table = CorpusTable::builtin();
        let mut requested = false;
        let source = table.resolve("retail", || {
            requested = true;
            None
        });

        assert!(source.is_ok());
        assert!(!requested);
    }

    #[test]
    fn test_unknown_scenario_uses_filtered_policy() {
        let table = CorpusTable::builtin();
        let source = table
            .resolve("airline", || Some(PolicyDocument::from(POLICY)))
            .unwrap();

        assert_eq!(source.kind(), RuleSourceKind::Derived);
        assert_eq!(
            source.text(),
            "# Airline agent policy\n## Booking\n- Confirm before booking.\n"
        );
    }

    #[test]
    fn test_unknown_scenario_without_policy() {
        let table = CorpusTable::builtin();
        let result = table.resolve("airline", || None);
        assert!(matches!(
            result,
            Err(CorpusError::MissingPolicy { scenario }) if scenario == "airline"
        ));
    }

    #[test]
    fn test_scenario_lookup_is_exact() {
        let table = CorpusTable::builtin();
        let source = table
            .resolve("Retail", || Some(PolicyDocument::from(POLICY)))
            .unwrap();
        assert_eq!(source.kind(), RuleSourceKind::Derived);
    }

    #[test]
    fn test_catalog_from_yaml() {
        let yaml = r#"
scenarios:
  airline:
    - |
      General rules:
      - Confirm the booking before charging.
    - |
      Cancellation rules:
      - Only refundable fares can be refunded.
"#;
        let table = CorpusTable::from_yaml(yaml).unwrap();
        let corpus = table.get("airline").unwrap();
        assert_eq!(corpus.blocks().len(), 2);
        assert_eq!(
            corpus.text(),
            "General rules:\n- Confirm the booking before charging.\nCancellation rules:\n- Only refundable fares can be refunded.\n"
        );
    }

    #[test]
    fn test_catalog_overrides_builtin() {
        let mut table = CorpusTable::builtin();
        let catalog = CorpusTable::from_json(r#"{"scenarios": {"retail": ["Only rule.\n"]}}"#).unwrap();
        table.extend(catalog);

        let source = table.resolve("retail", || None).unwrap();
        assert_eq!(source.text(), "Only rule.\n");
    }

    #[test]
    fn test_catalog_schema_errors() {
        let result = CorpusTable::from_yaml("scenarios:\n  airline: []\n");
        assert!(matches!(result, Err(CorpusError::SchemaError(_))));

        let result = CorpusTable::from_yaml("rules: {}\n");
        assert!(matches!(result, Err(CorpusError::SchemaError(_))));
    }

    #[test]
    fn test_catalog_invalid_yaml() {
        let result = CorpusTable::from_yaml("scenarios: [unclosed");
        assert!(matches!(result, Err(CorpusError::YamlError(_))));
    }
}
