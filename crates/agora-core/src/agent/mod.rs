//! Agent capability: the boundary to the text-generation backend.
//!
//! Every debate call (opinion, condensation, verdict) goes through the
//! [`Agent`] trait. Implementations return a [`Result`] so the round
//! coordinator can decide, per its failure policy, whether a failed call
//! becomes inline stand-in text or aborts the round.
//!
//! # Architecture
//!
//! ```text
//! RoundCoordinator / VerdictExtractor
//!     |
//!     v
//! Arc<dyn Agent> --generate(prompt, &Persona)--> Result<String, AgentError>
//!     |
//!     +-- GeminiAgent  (HTTP, generateContent)
//!     +-- test doubles (agora-test-utils)
//! ```

pub mod gemini;
pub mod trait_def;

pub use gemini::GeminiAgent;
pub use trait_def::Agent;

use thiserror::Error;

/// Failure of a single agent call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no text")]
    EmptyResponse,

    #[error("call did not finish before the phase deadline")]
    Timeout,

    #[error("call aborted: {0}")]
    Aborted(String),
}

impl AgentError {
    /// Inline stand-in text used when a failed call is substituted rather
    /// than propagated.
    pub fn stand_in(&self, persona: &str) -> String {
        format!("Error generating response for {persona}: {self}")
    }
}
