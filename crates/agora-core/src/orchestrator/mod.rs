//! Debate orchestrator: runs rounds in sequence and streams the result.
//!
//! A [`DebateSession`] owns one debate's transcript. Its event stream is
//! strictly ordered:
//!
//! ```text
//! Info(startup)
//! Info(first round label)   Turn* (round 1, interleaved)
//! Info(between rounds)      Turn* (round 2, interleaved)   ... per extra round
//! Info(judging)
//! Verdict
//! ```
//!
//! Each turn is appended to the transcript in the same step that produces
//! its event, so the transcript and the streamed turns never diverge.

use std::pin::{Pin, pin};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::agent::Agent;
use crate::event::DebateEvent;
use crate::interleave::interleave;
use crate::persona::PersonaRegistry;
use crate::prompts;
use crate::round::{Phase, RoundConfig, RoundCoordinator, RoundError};
use crate::transcript::{Transcript, Turn};
use crate::verdict::{JudgedVerdict, VerdictError, VerdictPolicy};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// Number of rounds before the verdict. At least one.
    pub rounds: u32,
    pub round: RoundConfig,
    pub verdict_policy: VerdictPolicy,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            round: RoundConfig::default(),
            verdict_policy: VerdictPolicy::PassThrough,
        }
    }
}

/// Errors that end a debate early. None of these occur under the default
/// failure and verdict policies.
#[derive(Debug, Error)]
pub enum DebateError {
    #[error(transparent)]
    Round(#[from] RoundError),

    #[error("judge output rejected: {0}")]
    Verdict(#[from] VerdictError),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Boxed debate event stream, as served to clients.
pub type DebateStream = Pin<Box<dyn Stream<Item = Result<DebateEvent, DebateError>> + Send>>;

/// Fully materialized debate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateResult {
    pub transcript: Vec<Turn>,
    pub winner: String,
    pub confidence: i64,
    pub reason: String,
}

/// State of one debate invocation.
#[derive(Debug)]
pub struct DebateSession {
    id: Uuid,
    topic: String,
    rounds: u32,
    verdict_policy: VerdictPolicy,
    coordinator: RoundCoordinator,
    transcript: Transcript,
}

impl DebateSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run one round and interleave its output into turns.
    ///
    /// The turns are not yet part of the transcript; pass each one to
    /// [`DebateSession::record`].
    pub async fn run_round(&self, round: u32) -> Result<Vec<Turn>, DebateError> {
        let output = self
            .coordinator
            .run_round(&self.topic, round, &self.transcript)
            .await?;
        Ok(interleave(round, &output.condensed()))
    }

    /// Append a turn to the transcript and return its event.
    pub fn record(&mut self, turn: Turn) -> DebateEvent {
        let event = DebateEvent::from(&turn);
        self.transcript.push(turn);
        event
    }

    /// Ask the judge for a verdict on the transcript so far.
    pub async fn judge(&self) -> Result<JudgedVerdict, DebateError> {
        let judge = self.coordinator.registry().judge();
        let prompt = prompts::verdict_prompt(&self.topic, &self.transcript);
        let raw = self.coordinator.call(Phase::Verdict, judge, prompt).await?;
        Ok(JudgedVerdict::from_raw(&raw))
    }

    /// The ordered event stream for this debate.
    ///
    /// Borrowing the session lets callers inspect the transcript once the
    /// stream has been drained.
    pub fn events(&mut self) -> impl Stream<Item = Result<DebateEvent, DebateError>> + Send + '_ {
        async_stream::try_stream! {
            let stages = self.coordinator.registry().stages().clone();
            tracing::info!(
                debate_id = %self.id,
                topic = %self.topic,
                rounds = self.rounds,
                "debate started"
            );

            yield DebateEvent::info(stages.startup);

            for round in 1..=self.rounds {
                let label = if round == 1 {
                    stages.first_round.clone()
                } else {
                    stages.between_rounds.clone()
                };
                yield DebateEvent::info(label);

                let turns = self.run_round(round).await?;
                tracing::info!(debate_id = %self.id, round, turns = turns.len(), "round complete");
                for turn in turns {
                    yield self.record(turn);
                }
            }

            yield DebateEvent::info(stages.judging);

            let judged = self.judge().await?;
            if let Err(e) = judged.parsed {
                match self.verdict_policy {
                    VerdictPolicy::Strict => Err(DebateError::Verdict(e))?,
                    VerdictPolicy::PassThrough => {
                        tracing::warn!(debate_id = %self.id, error = %e, "verdict failed validation, passing through");
                    }
                }
            }

            tracing::info!(debate_id = %self.id, turns = self.transcript.len(), "debate finished");
            yield DebateEvent::verdict(judged.payload);
        }
    }

    /// Consume the session into its event stream.
    pub fn into_events(mut self) -> impl Stream<Item = Result<DebateEvent, DebateError>> + Send + 'static {
        async_stream::try_stream! {
            let mut events = pin!(self.events());
            while let Some(event) = events.next().await {
                yield event?;
            }
        }
    }
}

/// Entry point: builds sessions against a shared agent and cast.
#[derive(Debug, Clone)]
pub struct DebateOrchestrator {
    coordinator: RoundCoordinator,
    config: DebateConfig,
}

impl DebateOrchestrator {
    pub fn new(agent: Arc<dyn Agent>, registry: Arc<PersonaRegistry>, mut config: DebateConfig) -> Self {
        config.rounds = config.rounds.max(1);
        let coordinator = RoundCoordinator::new(agent, registry, config.round.clone());
        Self {
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PersonaRegistry> {
        self.coordinator.registry()
    }

    /// Start a fresh session. Sessions share nothing but the agent and cast.
    pub fn session(&self, topic: impl Into<String>) -> DebateSession {
        DebateSession {
            id: Uuid::new_v4(),
            topic: topic.into(),
            rounds: self.config.rounds,
            verdict_policy: self.config.verdict_policy,
            coordinator: self.coordinator.clone(),
            transcript: Transcript::new(),
        }
    }

    /// Event stream for a new debate on `topic`.
    pub fn run_stream(&self, topic: impl Into<String>) -> DebateStream {
        Box::pin(self.session(topic).into_events())
    }

    /// Run a debate to completion and return the materialized result.
    pub async fn run(&self, topic: impl Into<String>) -> Result<DebateResult, DebateError> {
        let mut events = self.run_stream(topic);
        let mut transcript = Vec::new();
        let mut payload = String::new();

        while let Some(event) = events.next().await {
            match event? {
                DebateEvent::Turn {
                    speaker,
                    content,
                    round,
                } => transcript.push(Turn {
                    speaker,
                    content,
                    round,
                }),
                DebateEvent::Verdict { content } => payload = content,
                DebateEvent::Info { .. } => {}
            }
        }

        let verdict = JudgedVerdict::from_raw(&payload).verdict_or_undetermined();
        Ok(DebateResult {
            transcript,
            winner: verdict.winner,
            confidence: verdict.confidence,
            reason: verdict.reason,
        })
    }
}
