//! Scenario policy documents.
//!
//! A policy document is the generic, `##`-sectioned description of what an
//! agent may do in a scenario. It is only consulted for scenarios that have no
//! hand-authored rule corpus.

mod filter;

pub use filter::{classify_line, filter_domain_basic, has_domain_basic, LineKind};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// A scenario policy document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyDocument(String);

impl PolicyDocument {
    /// Wrap policy text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Read a policy document from a file.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        fs::read_to_string(path).map(Self)
    }

    /// The raw policy text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A copy of this document with every "Domain basic" section removed.
    pub fn without_domain_basic(&self) -> PolicyDocument {
        PolicyDocument(filter_domain_basic(&self.0))
    }

    /// Consume the document, returning its text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for PolicyDocument {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for PolicyDocument {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl AsRef<str> for PolicyDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
