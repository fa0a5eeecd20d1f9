//! Tests for failure handling: substitution, abort, phase deadlines and
//! verdict validation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agora_core::agent::AgentError;
use agora_core::event::DebateEvent;
use agora_core::orchestrator::{DebateConfig, DebateError};
use agora_core::round::{FailurePolicy, RoundConfig, RoundError};
use agora_core::verdict::{VerdictError, VerdictPolicy};
use agora_test_utils::{Behavior, ScriptedAgent, collect_events, orchestrator, turns_of};

const TOPIC: &str = "Should machines dream?";

fn config(failure_policy: FailurePolicy, phase_timeout: Option<Duration>) -> DebateConfig {
    DebateConfig {
        round: RoundConfig {
            failure_policy,
            phase_timeout,
            ..RoundConfig::default()
        },
        ..DebateConfig::default()
    }
}

// ===========================================================================
// Substitute (default)
// ===========================================================================

#[tokio::test]
async fn failed_opinion_is_condensed_from_stand_in() {
    let agent = Arc::new(ScriptedAgent::builtin().with_opinion(
        "Neo",
        Behavior::Fail(AgentError::Api {
            status: 500,
            body: "backend down".to_string(),
        }),
    ));
    let events: Vec<DebateEvent> = collect_events(
        orchestrator(Arc::clone(&agent), DebateConfig::default()).run_stream(TOPIC),
    )
    .await
    .into_iter()
    .map(|e| e.unwrap())
    .collect();

    // The stream completes with its verdict.
    assert!(events.last().is_some_and(DebateEvent::is_verdict));

    // The summarizer was handed the stand-in text for Neo.
    let condense_prompts = agent.prompts_for("Summarizer");
    assert!(condense_prompts.iter().any(|p| p.contains(
        "Error generating response for Neo: API error (500): backend down"
    )));

    // Neo still has turns in both rounds.
    let turns = turns_of(&events);
    for round in [1, 2] {
        assert!(turns.iter().any(|t| t.speaker == "Neo" && t.round == round));
    }
}

#[tokio::test]
async fn failed_condensation_becomes_a_single_turn() {
    let agent = Arc::new(
        ScriptedAgent::builtin().with_condensed("Morpheus", Behavior::Fail(AgentError::EmptyResponse)),
    );
    let events: Vec<DebateEvent> =
        collect_events(orchestrator(agent, DebateConfig::default()).run_stream(TOPIC))
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

    let morpheus: Vec<String> = turns_of(&events)
        .into_iter()
        .filter(|t| t.speaker == "Morpheus" && t.round == 1)
        .map(|t| t.content)
        .collect();
    assert_eq!(
        morpheus,
        vec!["Error generating response for Summarizer: response contained no text"]
    );
}

#[tokio::test]
async fn failed_judge_streams_stand_in_verdict() {
    let agent = Arc::new(
        ScriptedAgent::builtin().with_verdict(Behavior::Fail(AgentError::Request("refused".into()))),
    );
    let events: Vec<DebateEvent> =
        collect_events(orchestrator(agent, DebateConfig::default()).run_stream(TOPIC))
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

    let Some(DebateEvent::Verdict { content }) = events.last() else {
        panic!("stream should end with a verdict");
    };
    assert_eq!(
        content,
        "Error generating response for The Oracle: request failed: refused"
    );
}

// ===========================================================================
// Abort
// ===========================================================================

#[tokio::test]
async fn abort_policy_ends_stream_with_error() {
    let agent = Arc::new(
        ScriptedAgent::builtin().with_opinion("Agent Smith", Behavior::Fail(AgentError::EmptyResponse)),
    );
    let events = collect_events(
        orchestrator(agent, config(FailurePolicy::Abort, None)).run_stream(TOPIC),
    )
    .await;

    // startup, round label, then the error.
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], Ok(DebateEvent::Info { .. })));
    assert!(matches!(events[1], Ok(DebateEvent::Info { .. })));
    let Err(DebateError::Round(RoundError::AgentFailed { persona, source, .. })) = &events[2] else {
        panic!("expected a round failure, got {:?}", events[2]);
    };
    assert_eq!(persona, "Agent Smith");
    assert_eq!(*source, AgentError::EmptyResponse);
}

#[tokio::test]
async fn abort_policy_surfaces_from_run() {
    let agent = Arc::new(
        ScriptedAgent::builtin().with_opinion("Neo", Behavior::Fail(AgentError::MissingApiKey)),
    );
    let err = orchestrator(agent, config(FailurePolicy::Abort, None))
        .run(TOPIC)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Neo"));
}

// ===========================================================================
// Phase deadline
// ===========================================================================

#[tokio::test]
async fn hung_call_is_cut_off_at_the_deadline() {
    let agent = Arc::new(ScriptedAgent::builtin().with_opinion("Morpheus", Behavior::Hang));
    let started = Instant::now();
    let events: Vec<DebateEvent> = collect_events(
        orchestrator(
            Arc::clone(&agent),
            config(FailurePolicy::Substitute, Some(Duration::from_millis(200))),
        )
        .run_stream(TOPIC),
    )
    .await
    .into_iter()
    .map(|e| e.unwrap())
    .collect();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(events.last().is_some_and(DebateEvent::is_verdict));
    assert!(agent.prompts_for("Summarizer").iter().any(|p| p.contains(
        "Error generating response for Morpheus: call did not finish before the phase deadline"
    )));
}

#[tokio::test]
async fn slow_call_within_deadline_succeeds() {
    let agent = Arc::new(ScriptedAgent::builtin().with_opinion(
        "Neo",
        Behavior::Delay(Duration::from_millis(20), "Neo, eventually.".to_string()),
    ));
    orchestrator(
        Arc::clone(&agent),
        config(FailurePolicy::Abort, Some(Duration::from_secs(5))),
    )
    .run(TOPIC)
    .await
    .unwrap();

    assert!(
        agent
            .prompts_for("Summarizer")
            .iter()
            .any(|p| p.ends_with("Neo, eventually."))
    );
}

#[tokio::test]
async fn deadline_under_abort_fails_the_debate() {
    let agent = Arc::new(ScriptedAgent::builtin().with_opinion("Neo", Behavior::Hang));
    let err = orchestrator(
        agent,
        config(FailurePolicy::Abort, Some(Duration::from_millis(100))),
    )
    .run(TOPIC)
    .await
    .unwrap_err();

    let DebateError::Round(RoundError::AgentFailed { source, .. }) = &err else {
        panic!("expected a round failure, got {err:?}");
    };
    assert_eq!(*source, AgentError::Timeout);
}

// ===========================================================================
// Verdict policy
// ===========================================================================

#[tokio::test]
async fn pass_through_streams_invalid_verdict() {
    let raw = r#"{"winner": "Neo", "confidence": 250, "reason": "Overwhelming."}"#;
    let agent = Arc::new(ScriptedAgent::builtin().with_verdict(Behavior::reply(raw)));
    let events: Vec<DebateEvent> =
        collect_events(orchestrator(agent, DebateConfig::default()).run_stream(TOPIC))
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

    assert_eq!(events.last(), Some(&DebateEvent::verdict(raw)));
}

#[tokio::test]
async fn strict_policy_rejects_invalid_verdict() {
    let raw = r#"{"winner": "Neo", "confidence": 250, "reason": "Overwhelming."}"#;
    let agent = Arc::new(ScriptedAgent::builtin().with_verdict(Behavior::reply(raw)));
    let config = DebateConfig {
        verdict_policy: VerdictPolicy::Strict,
        ..DebateConfig::default()
    };
    let events = collect_events(orchestrator(agent, config).run_stream(TOPIC)).await;

    // Every turn made it out before the judge was rejected.
    let ok: Vec<DebateEvent> = events.iter().filter_map(|e| e.as_ref().ok().cloned()).collect();
    assert_eq!(turns_of(&ok).len(), 12);
    assert!(!ok.iter().any(DebateEvent::is_verdict));
    assert!(matches!(
        events.last(),
        Some(Err(DebateError::Verdict(VerdictError::ConfidenceOutOfRange(250))))
    ));
}

#[tokio::test]
async fn strict_policy_accepts_valid_verdict() {
    let config = DebateConfig {
        verdict_policy: VerdictPolicy::Strict,
        ..DebateConfig::default()
    };
    let result = orchestrator(Arc::new(ScriptedAgent::builtin()), config)
        .run(TOPIC)
        .await
        .unwrap();
    assert_eq!(result.winner, "Neo");
    assert_eq!(result.confidence, 75);
}
