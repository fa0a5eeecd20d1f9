//! Shared test utilities for agora integration tests.
//!
//! [`ScriptedAgent`] stands in for the model backend. Every persona gets a
//! deterministic default reply, and tests override behavior per debater:
//!
//! - **opinion**: what a debater says when asked for an argument;
//! - **condensed**: what the summarizer returns for that debater's text;
//! - **verdict**: what the judge returns.
//!
//! The summarizer works out whose text it is condensing by looking for a
//! debater name in the text, so default opinions and failure stand-ins
//! (`"Error generating response for <name>: ..."`) both route correctly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use agora_core::agent::{Agent, AgentError};
use agora_core::orchestrator::{DebateConfig, DebateError, DebateOrchestrator};
use agora_core::persona::{Persona, PersonaRegistry};
use agora_core::{DebateEvent, Turn};

/// How a scripted call behaves.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return this text immediately.
    Reply(String),
    /// Fail with this error.
    Fail(AgentError),
    /// Sleep, then return the text.
    Delay(Duration, String),
    /// Never return (for deadline tests).
    Hang,
}

impl Behavior {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    async fn run(self) -> Result<String, AgentError> {
        match self {
            Self::Reply(text) => Ok(text),
            Self::Fail(e) => Err(e),
            Self::Delay(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Self::Hang => std::future::pending().await,
        }
    }
}

/// One call observed by a [`ScriptedAgent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub persona: String,
    pub prompt: String,
}

/// Deterministic [`Agent`] for tests.
#[derive(Debug)]
pub struct ScriptedAgent {
    debaters: Vec<String>,
    summarizer: String,
    judge: String,
    opinions: HashMap<String, Behavior>,
    condensed: HashMap<String, Behavior>,
    verdict: Option<Behavior>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedAgent {
    /// Agent scripted against `registry`'s cast.
    pub fn new(registry: &PersonaRegistry) -> Self {
        Self {
            debaters: registry.debaters().iter().map(|p| p.name.clone()).collect(),
            summarizer: registry.summarizer().name.clone(),
            judge: registry.judge().name.clone(),
            opinions: HashMap::new(),
            condensed: HashMap::new(),
            verdict: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Agent scripted against the built-in cast.
    pub fn builtin() -> Self {
        Self::new(&PersonaRegistry::builtin())
    }

    pub fn with_opinion(mut self, debater: &str, behavior: Behavior) -> Self {
        self.opinions.insert(debater.to_string(), behavior);
        self
    }

    pub fn with_condensed(mut self, debater: &str, behavior: Behavior) -> Self {
        self.condensed.insert(debater.to_string(), behavior);
        self
    }

    pub fn with_verdict(mut self, behavior: Behavior) -> Self {
        self.verdict = Some(behavior);
        self
    }

    /// Every call so far, in the order they reached the agent.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Prompts sent under `persona`, in arrival order.
    pub fn prompts_for(&self, persona: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.persona == persona)
            .map(|c| c.prompt.clone())
            .collect()
    }

    /// The debater whose text a condensation prompt carries.
    fn condensing_for(&self, prompt: &str) -> Option<&str> {
        let text = prompt.split_once("\n\n").map_or(prompt, |(_, raw)| raw);
        self.debaters
            .iter()
            .find(|name| text.contains(name.as_str()))
            .map(String::as_str)
    }

    fn behavior_for(&self, prompt: &str, persona: &Persona) -> Behavior {
        let name = persona.name.as_str();
        if name == self.summarizer {
            let speaker = self.condensing_for(prompt).unwrap_or("unknown");
            return self
                .condensed
                .get(speaker)
                .cloned()
                .unwrap_or_else(|| Behavior::Reply(bullets(speaker, 2)));
        }
        if name == self.judge {
            return self
                .verdict
                .clone()
                .unwrap_or_else(|| Behavior::Reply(fenced_verdict(&self.debaters[0], 75, "Scripted.")));
        }
        self.opinions
            .get(name)
            .cloned()
            .unwrap_or_else(|| Behavior::Reply(opinion(name)))
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, persona: &Persona) -> Result<String, AgentError> {
        self.calls.lock().unwrap().push(RecordedCall {
            persona: persona.name.clone(),
            prompt: prompt.to_string(),
        });
        self.behavior_for(prompt, persona).run().await
    }
}

/// Default raw opinion for a debater.
pub fn opinion(speaker: &str) -> String {
    format!("THINKING: considering.\nFINAL_ANSWER: {speaker} has spoken.")
}

/// `n` asterisk bullets attributed to `speaker`.
pub fn bullets(speaker: &str, n: usize) -> String {
    (1..=n)
        .map(|i| format!("* {speaker} point {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A verdict wrapped in a ```` ```json ```` fence with surrounding prose.
pub fn fenced_verdict(winner: &str, confidence: i64, reason: &str) -> String {
    format!(
        "Here is the verdict:\n```json\n{{\"winner\": \"{winner}\", \"confidence\": {confidence}, \"reason\": \"{reason}\"}}\n```\n"
    )
}

/// Orchestrator over the built-in cast.
pub fn orchestrator(agent: Arc<ScriptedAgent>, config: DebateConfig) -> DebateOrchestrator {
    DebateOrchestrator::new(agent, Arc::new(PersonaRegistry::builtin()), config)
}

/// Drain an event stream, stopping after the first error.
pub async fn collect_events<S>(stream: S) -> Vec<Result<DebateEvent, DebateError>>
where
    S: Stream<Item = Result<DebateEvent, DebateError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        let failed = event.is_err();
        events.push(event);
        if failed {
            break;
        }
    }
    events
}

/// The turns among `events`, in stream order.
pub fn turns_of(events: &[DebateEvent]) -> Vec<Turn> {
    events
        .iter()
        .filter_map(|event| match event {
            DebateEvent::Turn {
                speaker,
                content,
                round,
            } => Some(Turn::new(speaker.clone(), content.clone(), *round)),
            _ => None,
        })
        .collect()
}
