//! Core library for agora: a multi-persona debate engine.
//!
//! A fixed cast of debaters argues a topic over a number of rounds. Each
//! round fans out to every debater, condenses the answers into bullets,
//! and interleaves the bullets into turns. A judge then delivers a verdict.
//! The whole run is exposed as an ordered stream of [`DebateEvent`]s.

pub mod agent;
pub mod event;
pub mod interleave;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
pub mod round;
pub mod speech;
pub mod transcript;
pub mod verdict;

pub use agent::{Agent, AgentError, GeminiAgent};
pub use event::DebateEvent;
pub use orchestrator::{
    DebateConfig, DebateError, DebateOrchestrator, DebateResult, DebateSession, DebateStream,
};
pub use persona::{Persona, PersonaError, PersonaRegistry};
pub use round::{FailurePolicy, RoundConfig};
pub use speech::{GoogleTts, SpeechError, SpeechSynthesizer};
pub use transcript::{Transcript, Turn};
pub use verdict::{Verdict, VerdictPolicy};
