//! Verdict extraction: fence stripping and validation of the judge output.
//!
//! The judge is asked for strict JSON but models routinely wrap it in
//! Markdown fences or prose. [`extract_json_block`] strips fences only; it
//! never parses. [`Verdict::parse`] is the separate, explicit validation
//! step, and [`VerdictPolicy`] decides what a validation failure means.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Winner reported when the judge output cannot be used.
pub const UNDETERMINED: &str = "Undetermined";

/// Strip Markdown code fences from judge output.
///
/// Fallback chain:
/// 1. the content after the first ```` ```json ```` up to the next fence;
/// 2. otherwise the content between the first two generic fences;
/// 3. otherwise `raw`, unchanged.
///
/// Extracted content is trimmed. An unterminated fence extracts to the end
/// of the text.
pub fn extract_json_block(raw: &str) -> &str {
    if let Some((_, after)) = raw.split_once(JSON_FENCE) {
        return up_to_fence(after).trim();
    }
    if let Some((_, after)) = raw.split_once(FENCE) {
        return up_to_fence(after).trim();
    }
    raw
}

fn up_to_fence(text: &str) -> &str {
    text.split_once(FENCE).map_or(text, |(inner, _)| inner)
}

/// Errors produced when validating a verdict payload.
#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("verdict is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("verdict confidence {0} is outside 0..=100")]
    ConfidenceOutOfRange(i64),

    #[error("verdict has an empty winner")]
    MissingWinner,
}

/// The judge's final structured decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: String,
    pub confidence: i64,
    pub reason: String,
}

impl Verdict {
    /// Parse and validate a (fence-stripped) verdict payload.
    pub fn parse(payload: &str) -> Result<Self, VerdictError> {
        let verdict: Verdict = serde_json::from_str(payload)?;
        if verdict.winner.trim().is_empty() {
            return Err(VerdictError::MissingWinner);
        }
        if !(0..=100).contains(&verdict.confidence) {
            return Err(VerdictError::ConfidenceOutOfRange(verdict.confidence));
        }
        Ok(verdict)
    }

    /// Placeholder used when the judge output failed validation.
    pub fn undetermined(reason: impl Into<String>) -> Self {
        Self {
            winner: UNDETERMINED.to_string(),
            confidence: 0,
            reason: reason.into(),
        }
    }
}

/// What to do when the judge output does not validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// Log a warning and emit the stripped payload as-is.
    #[default]
    PassThrough,
    /// Fail the debate.
    Strict,
}

impl fmt::Display for VerdictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PassThrough => "pass_through",
            Self::Strict => "strict",
        };
        f.write_str(s)
    }
}

impl FromStr for VerdictPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass_through" => Ok(Self::PassThrough),
            "strict" => Ok(Self::Strict),
            other => Err(PolicyParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid policy string.
#[derive(Debug, Clone, Error)]
#[error("invalid policy: {0:?}")]
pub struct PolicyParseError(pub String);

/// The judged outcome of a debate: the payload that gets streamed plus the
/// validation result.
#[derive(Debug)]
pub struct JudgedVerdict {
    /// Fence-stripped judge output.
    pub payload: String,
    /// Result of validating `payload`.
    pub parsed: Result<Verdict, VerdictError>,
}

impl JudgedVerdict {
    pub fn from_raw(raw: &str) -> Self {
        let payload = extract_json_block(raw).to_string();
        let parsed = Verdict::parse(&payload);
        Self { payload, parsed }
    }

    /// The validated verdict, or an undetermined placeholder naming the
    /// validation failure.
    pub fn verdict_or_undetermined(&self) -> Verdict {
        match &self.parsed {
            Ok(verdict) => verdict.clone(),
            Err(e) => Verdict::undetermined(format!("The verdict could not be read: {e}")),
        }
    }
}
