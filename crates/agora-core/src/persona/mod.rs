//! Persona registry: the fixed cast of a debate.
//!
//! A persona file (TOML) names the debaters in speaking order, the
//! summarizer that condenses their arguments, and the judge that emits the
//! structured verdict. The built-in cast is defined in `personas.toml` and
//! embedded in the binary at compile time; a user file with the same shape
//! can replace it.
//!
//! The registry is immutable once built and is handed to the orchestrator
//! explicitly (wrapped in an `Arc`), never looked up through global state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The embedded default persona file.
static PERSONAS_TOML: &str = include_str!("personas.toml");

/// Model used when a persona does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Errors that can occur while loading or validating a persona file.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read persona file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persona file must define at least one debater")]
    NoDebaters,

    #[error("duplicate persona name: {0:?}")]
    DuplicateName(String),

    #[error("persona {persona:?} is missing required field `{field}`")]
    MissingField {
        persona: String,
        field: &'static str,
    },
}

/// A named role configuration driving one agent.
///
/// Identity is the `name`. Debater-only fields (`stance`, `opening`,
/// `rebuttal`, ...) are optional in the type and enforced by
/// [`PersonaRegistry`] validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name, used as the turn speaker (e.g. "Agent Smith").
    pub name: String,
    /// Short name used when other debaters quote this one (e.g. "Smith").
    #[serde(default)]
    pub alias: Option<String>,
    /// Model identifier passed to the agent backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// System instruction (the role descriptor).
    pub instruction: String,
    /// Position label shown to other debaters (e.g. "YES", "NO", "PHIL").
    #[serde(default)]
    pub stance: Option<String>,
    /// Label expected after `FINAL_ANSWER:` in the opening round.
    /// Defaults to the stance.
    #[serde(default)]
    pub answer_label: Option<String>,
    /// Label expected after `FINAL_ANSWER:` in rebuttal rounds.
    #[serde(default)]
    pub rebuttal_label: Option<String>,
    /// What the summarizer should focus on (e.g. "Key Pillars").
    #[serde(default)]
    pub focus: Option<String>,
    /// Task text for the opening round.
    #[serde(default)]
    pub opening: Option<String>,
    /// Task text for rebuttal rounds.
    #[serde(default)]
    pub rebuttal: Option<String>,
    /// Backend tool names enabled for this persona (e.g. `google_search`).
    #[serde(default)]
    pub tools: Vec<String>,
    /// Response MIME type directive (e.g. `application/json`).
    #[serde(default)]
    pub response_mime_type: Option<String>,
    /// Structured-output schema handed to the backend.
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Persona {
    /// Create a persona with only a name and instruction set.
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            model: default_model(),
            instruction: instruction.into(),
            stance: None,
            answer_label: None,
            rebuttal_label: None,
            focus: None,
            opening: None,
            rebuttal: None,
            tools: Vec::new(),
            response_mime_type: None,
            output_schema: None,
        }
    }

    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn stance(&self) -> &str {
        self.stance.as_deref().unwrap_or("")
    }

    pub fn answer_label(&self) -> &str {
        self.answer_label.as_deref().unwrap_or_else(|| self.stance())
    }

    pub fn rebuttal_label(&self) -> &str {
        self.rebuttal_label.as_deref().unwrap_or("REBUTTAL")
    }

    pub fn focus(&self) -> &str {
        self.focus.as_deref().unwrap_or("Key Points")
    }

    pub fn opening(&self) -> &str {
        self.opening.as_deref().unwrap_or("")
    }

    pub fn rebuttal(&self) -> &str {
        self.rebuttal.as_deref().unwrap_or("")
    }

    /// Whether the persona asks the backend for structured output.
    pub fn is_structured(&self) -> bool {
        self.output_schema.is_some() || self.response_mime_type.is_some()
    }
}

/// Informational messages streamed between debate stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageMessages {
    pub startup: String,
    pub first_round: String,
    pub between_rounds: String,
    pub judging: String,
}

impl Default for StageMessages {
    fn default() -> Self {
        Self {
            startup: "Initializing The Matrix... Loading Constructs...".to_string(),
            first_round: "Round 1: Divergent Perspectives".to_string(),
            between_rounds: "Analyzing System Anomalies... (Buffer)".to_string(),
            judging: "Consulting The Oracle...".to_string(),
        }
    }
}

/// On-disk shape of a persona file.
#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(default)]
    stages: StageMessages,
    #[serde(default)]
    debaters: Vec<Persona>,
    summarizer: Persona,
    judge: Persona,
}

/// The immutable cast of a debate.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    debaters: Vec<Arc<Persona>>,
    summarizer: Arc<Persona>,
    judge: Arc<Persona>,
    stages: StageMessages,
}

impl PersonaRegistry {
    /// Build a registry from explicit parts, validating it.
    pub fn new(
        debaters: Vec<Persona>,
        summarizer: Persona,
        judge: Persona,
        stages: StageMessages,
    ) -> Result<Self, PersonaError> {
        validate(&debaters, &summarizer, &judge)?;
        Ok(Self {
            debaters: debaters.into_iter().map(Arc::new).collect(),
            summarizer: Arc::new(summarizer),
            judge: Arc::new(judge),
            stages,
        })
    }

    /// Parse and validate a persona file.
    pub fn from_toml_str(content: &str) -> Result<Self, PersonaError> {
        let file: PersonaFile = toml::from_str(content)?;
        Self::new(file.debaters, file.summarizer, file.judge, file.stages)
    }

    /// Load a persona file from disk.
    pub fn load(path: &Path) -> Result<Self, PersonaError> {
        let content = std::fs::read_to_string(path).map_err(|source| PersonaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The built-in cast (Neo, Morpheus, Agent Smith, judged by The Oracle).
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. The file is compiled into
    /// the binary and covered by tests, so a shipped build always parses.
    pub fn builtin() -> Self {
        Self::from_toml_str(PERSONAS_TOML).expect("embedded personas.toml is invalid")
    }

    /// Debaters in speaking order.
    pub fn debaters(&self) -> &[Arc<Persona>] {
        &self.debaters
    }

    pub fn summarizer(&self) -> &Arc<Persona> {
        &self.summarizer
    }

    pub fn judge(&self) -> &Arc<Persona> {
        &self.judge
    }

    pub fn stages(&self) -> &StageMessages {
        &self.stages
    }

    /// Look up any persona (debater, summarizer, or judge) by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Persona>> {
        self.debaters
            .iter()
            .chain([&self.summarizer, &self.judge])
            .find(|p| p.name == name)
    }

    /// Debater names in speaking order.
    pub fn speaker_order(&self) -> Vec<&str> {
        self.debaters.iter().map(|p| p.name.as_str()).collect()
    }
}

fn validate(debaters: &[Persona], summarizer: &Persona, judge: &Persona) -> Result<(), PersonaError> {
    if debaters.is_empty() {
        return Err(PersonaError::NoDebaters);
    }

    let mut seen = HashSet::new();
    for persona in debaters.iter().chain([summarizer, judge]) {
        if persona.name.trim().is_empty() {
            return Err(PersonaError::MissingField {
                persona: persona.name.clone(),
                field: "name",
            });
        }
        if !seen.insert(persona.name.as_str()) {
            return Err(PersonaError::DuplicateName(persona.name.clone()));
        }
    }

    for debater in debaters {
        let required = [
            ("stance", debater.stance.is_some()),
            ("opening", debater.opening.is_some()),
            ("rebuttal", debater.rebuttal.is_some()),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, present)| !present) {
            return Err(PersonaError::MissingField {
                persona: debater.name.clone(),
                field,
            });
        }
    }

    Ok(())
}
