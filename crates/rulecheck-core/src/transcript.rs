//! Linearization of dialogue turns into a readable transcript.
//!
//! Only what the agent and the user *said* is kept. Tool calls, tool results
//! and system turns are dropped, so the grading model never sees which actions
//! the agent actually took.

use serde::{Deserialize, Serialize};

/// Who produced a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The agent under evaluation.
    Assistant,

    /// The simulated customer.
    User,

    /// Tool results, system prompts and anything else.
    #[serde(other)]
    Other,
}

/// One message of a simulated dialogue.
///
/// Unknown fields (tool calls, timestamps, turn indices) are ignored when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: TurnRole,

    #[serde(default)]
    pub content: Option<String>,
}

impl DialogueTurn {
    pub fn new(role: TurnRole, content: Option<String>) -> Self {
        Self { role, content }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, Some(content.into()))
    }

    pub fn other(content: Option<String>) -> Self {
        Self::new(TurnRole::Other, content)
    }

    /// The rendered transcript line for this turn, if it has one.
    pub fn render(&self) -> Option<String> {
        let content = self.content.as_deref().filter(|c| !c.is_empty())?;
        match self.role {
            TurnRole::Assistant => Some(format!("Agent message: {}", content)),
            TurnRole::User => Some(format!("User message: {}", content)),
            TurnRole::Other => None,
        }
    }
}

/// Ordered rendered lines of a dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    /// Render turns in order, skipping those without a transcript line.
    pub fn from_turns<'a, I>(turns: I) -> Self
    where
        I: IntoIterator<Item = &'a DialogueTurn>,
    {
        Self {
            lines: turns.into_iter().filter_map(DialogueTurn::render).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The lines as a JSON string array, one literal entry per line.
    pub fn listing(&self) -> String {
        serde_json::Value::from(self.lines.clone()).to_string()
    }
}

/// Convenience wrapper around [`Transcript::from_turns`].
pub fn extract_transcript(turns: &[DialogueTurn]) -> Transcript {
    Transcript::from_turns(turns)
}

/// Input shapes accepted for a dialogue: a bare turn array or a simulation
/// record carrying a `messages` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DialogueInput {
    Turns(Vec<DialogueTurn>),
    Simulation { messages: Vec<DialogueTurn> },
}

impl DialogueInput {
    pub fn into_turns(self) -> Vec<DialogueTurn> {
        match self {
            DialogueInput::Turns(turns) => turns,
            DialogueInput::Simulation { messages } => messages,
        }
    }
}
