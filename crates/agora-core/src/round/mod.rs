//! Round coordinator: parallel opinion and condensation phases.
//!
//! A round runs two phases. Each phase spawns one task per call, bounded by
//! a semaphore, and waits until every task has reported back (the barrier).
//! Results are slotted by call index, so the output order is the speaker
//! order no matter which call finishes first.
//!
//! ```text
//! run_round
//!   opinion:       debaters --spawn--> Agent::generate  ... barrier
//!   condensation:  opinions --spawn--> Agent::generate(summarizer) ... barrier
//!   -> RoundOutput { contributions in speaker order }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;

use crate::agent::{Agent, AgentError};
use crate::persona::{Persona, PersonaRegistry};
use crate::prompts;
use crate::transcript::Transcript;
use crate::verdict::PolicyParseError;

/// What to do with a failed agent call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Replace the failure with inline stand-in text and carry on.
    #[default]
    Substitute,
    /// Fail the round.
    Abort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Substitute => "substitute",
            Self::Abort => "abort",
        };
        f.write_str(s)
    }
}

impl FromStr for FailurePolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substitute" => Ok(Self::Substitute),
            "abort" => Ok(Self::Abort),
            other => Err(PolicyParseError(other.to_owned())),
        }
    }
}

/// Which kind of call is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Opinion,
    Condensation,
    Verdict,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opinion => "opinion",
            Self::Condensation => "condensation",
            Self::Verdict => "verdict",
        };
        f.write_str(s)
    }
}

/// Configuration for a round.
#[derive(Debug, Clone)]
pub struct RoundConfig {
    pub failure_policy: FailurePolicy,
    /// Deadline for a whole phase. Calls still pending when it elapses
    /// resolve as [`AgentError::Timeout`]. `None` waits indefinitely.
    pub phase_timeout: Option<Duration>,
    /// Maximum concurrent calls within a phase.
    pub max_concurrency: usize,
    /// Number of bullet points the summarizer is asked for.
    pub condense_points: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Substitute,
            phase_timeout: None,
            max_concurrency: 8,
            condense_points: 3,
        }
    }
}

/// Errors that stop a round. Only produced under [`FailurePolicy::Abort`].
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("{phase} call for {persona} failed: {source}")]
    AgentFailed {
        persona: String,
        phase: Phase,
        #[source]
        source: AgentError,
    },
}

/// One debater's output for a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub speaker: String,
    /// Opinion-phase text (or its stand-in).
    pub raw: String,
    /// Condensation-phase text (or its stand-in).
    pub condensed: String,
}

/// Output of one round, in speaker order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutput {
    pub round: u32,
    pub contributions: Vec<Contribution>,
}

impl RoundOutput {
    /// `(speaker, condensed)` pairs in speaker order, as the interleaver
    /// consumes them.
    pub fn condensed(&self) -> Vec<(&str, &str)> {
        self.contributions
            .iter()
            .map(|c| (c.speaker.as_str(), c.condensed.as_str()))
            .collect()
    }
}

/// Message sent from a spawned call back to the coordinator.
struct CallDone {
    index: usize,
    result: Result<String, AgentError>,
}

/// Drives rounds against a shared agent and persona registry.
#[derive(Clone)]
pub struct RoundCoordinator {
    agent: Arc<dyn Agent>,
    registry: Arc<PersonaRegistry>,
    config: RoundConfig,
}

impl fmt::Debug for RoundCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundCoordinator")
            .field("agent", &self.agent.name())
            .field("speakers", &self.registry.speaker_order())
            .field("config", &self.config)
            .finish()
    }
}

impl RoundCoordinator {
    pub fn new(agent: Arc<dyn Agent>, registry: Arc<PersonaRegistry>, config: RoundConfig) -> Self {
        Self {
            agent,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<PersonaRegistry> {
        &self.registry
    }

    /// Run one full round: opinions, then condensation.
    ///
    /// Rounds after the first read the previous round's points from
    /// `transcript` to build their prompts.
    pub async fn run_round(
        &self,
        topic: &str,
        round: u32,
        transcript: &Transcript,
    ) -> Result<RoundOutput, RoundError> {
        let debaters = self.registry.debaters();

        // 1. Opinion phase.
        let opinion_calls: Vec<(Arc<Persona>, String)> = debaters
            .iter()
            .map(|persona| {
                let prompt = self.opinion_prompt(topic, round, persona, transcript);
                (Arc::clone(persona), prompt)
            })
            .collect();
        let opinions = self.dispatch(Phase::Opinion, round, opinion_calls).await;

        let mut raws = Vec::with_capacity(debaters.len());
        for (persona, result) in debaters.iter().zip(opinions) {
            raws.push(self.resolve(Phase::Opinion, &persona.name, result)?);
        }

        // 2. Condensation phase.
        let summarizer = self.registry.summarizer();
        let condense_calls: Vec<(Arc<Persona>, String)> = debaters
            .iter()
            .zip(&raws)
            .map(|(persona, raw)| {
                let prompt =
                    prompts::condense_prompt(persona, round, self.config.condense_points, raw);
                (Arc::clone(summarizer), prompt)
            })
            .collect();
        let condensed = self
            .dispatch(Phase::Condensation, round, condense_calls)
            .await;

        let mut contributions = Vec::with_capacity(debaters.len());
        for ((persona, raw), result) in debaters.iter().zip(raws).zip(condensed) {
            let condensed = self.resolve(Phase::Condensation, &summarizer.name, result)?;
            contributions.push(Contribution {
                speaker: persona.name.clone(),
                raw,
                condensed,
            });
        }

        Ok(RoundOutput {
            round,
            contributions,
        })
    }

    /// Make a single call outside a round (e.g. the verdict), subject to
    /// the same deadline and failure policy.
    pub async fn call(
        &self,
        phase: Phase,
        persona: &Arc<Persona>,
        prompt: String,
    ) -> Result<String, RoundError> {
        let mut results = self
            .dispatch(phase, 0, vec![(Arc::clone(persona), prompt)])
            .await;
        let result = results
            .pop()
            .unwrap_or_else(|| Err(AgentError::Aborted("no result".to_string())));
        self.resolve(phase, &persona.name, result)
    }

    fn opinion_prompt(
        &self,
        topic: &str,
        round: u32,
        persona: &Persona,
        transcript: &Transcript,
    ) -> String {
        if round <= 1 {
            return prompts::opening_prompt(topic, persona);
        }
        let others: Vec<(&Persona, String)> = self
            .registry
            .debaters()
            .iter()
            .filter(|other| other.name != persona.name)
            .map(|other| {
                let points = transcript.points_of(&other.name, round - 1);
                (other.as_ref(), points)
            })
            .collect();
        prompts::rebuttal_prompt(topic, persona, &others)
    }

    /// Apply the failure policy to one call result.
    fn resolve(
        &self,
        phase: Phase,
        persona: &str,
        result: Result<String, AgentError>,
    ) -> Result<String, RoundError> {
        match result {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(persona, phase = %phase, error = %e, "agent call failed");
                match self.config.failure_policy {
                    FailurePolicy::Substitute => Ok(e.stand_in(persona)),
                    FailurePolicy::Abort => Err(RoundError::AgentFailed {
                        persona: persona.to_string(),
                        phase,
                        source: e,
                    }),
                }
            }
        }
    }

    /// Fan calls out concurrently and wait for all of them.
    ///
    /// The returned vector is index-aligned with `calls`.
    async fn dispatch(
        &self,
        phase: Phase,
        round: u32,
        calls: Vec<(Arc<Persona>, String)>,
    ) -> Vec<Result<String, AgentError>> {
        let total = calls.len();
        tracing::info!(round, phase = %phase, calls = total, "dispatching phase");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let deadline = self.config.phase_timeout.map(|t| Instant::now() + t);
        let (tx, mut rx) = mpsc::channel::<CallDone>(total.max(1));

        for (index, (persona, prompt)) in calls.into_iter().enumerate() {
            let agent = Arc::clone(&self.agent);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let call = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AgentError::Aborted(e.to_string()))?;
                    agent.generate(&prompt, &persona).await
                };
                let result = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, call)
                        .await
                        .unwrap_or(Err(AgentError::Timeout)),
                    None => call.await,
                };
                let _ = tx.send(CallDone { index, result }).await;
            });
        }
        // Only the spawned tasks hold senders now; recv() ends once all
        // of them have reported or died.
        drop(tx);

        let mut slots: Vec<Option<Result<String, AgentError>>> = vec![None; total];
        while let Some(done) = rx.recv().await {
            slots[done.index] = Some(done.result);
        }

        let results: Vec<Result<String, AgentError>> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(AgentError::Aborted("call task panicked".to_string())))
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(round, phase = %phase, calls = total, failed, "phase complete");
        results
    }
}
