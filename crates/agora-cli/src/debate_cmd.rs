use std::io::Write;
use std::pin::pin;

use anyhow::{Context, Result, bail};
use futures::StreamExt;

use agora_core::event::DebateEvent;
use agora_core::orchestrator::DebateOrchestrator;
use agora_core::verdict::Verdict;

/// Run one debate, writing each event to `out` as it arrives.
pub async fn run_debate<W: Write>(
    orchestrator: &DebateOrchestrator,
    question: &str,
    ndjson: bool,
    out: &mut W,
) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let mut events = pin!(orchestrator.run_stream(question.to_string()));
    while let Some(event) = events.next().await {
        let event = event.context("debate failed")?;
        if ndjson {
            out.write_all(event.to_ndjson()?.as_bytes())?;
        } else {
            write_event(out, &event)?;
        }
        out.flush()?;
    }

    Ok(())
}

fn write_event<W: Write>(out: &mut W, event: &DebateEvent) -> std::io::Result<()> {
    match event {
        DebateEvent::Info { message } => writeln!(out, "\n== {message} =="),
        DebateEvent::Turn {
            speaker,
            content,
            round,
        } => writeln!(out, "[round {round}] {speaker}: {content}"),
        DebateEvent::Verdict { content } => match Verdict::parse(content) {
            Ok(verdict) => writeln!(
                out,
                "\nVerdict: {} ({}% confidence)\n{}",
                verdict.winner, verdict.confidence, verdict.reason
            ),
            Err(_) => writeln!(out, "\nVerdict (unparsed):\n{content}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agora_core::orchestrator::DebateConfig;
    use agora_test_utils::{Behavior, ScriptedAgent, orchestrator};

    use super::*;

    async fn render(agent: ScriptedAgent, ndjson: bool) -> String {
        let orch = orchestrator(Arc::new(agent), DebateConfig::default());
        let mut out = Vec::new();
        run_debate(&orch, "Is tea better than coffee?", ndjson, &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn formatted_output_shows_turns_and_verdict() {
        let text = render(ScriptedAgent::builtin(), false).await;
        assert!(text.contains("== Round 1: Divergent Perspectives =="));
        assert!(text.contains("[round 1] Neo: * Neo point 1"));
        assert!(text.contains("[round 2] Agent Smith: * Agent Smith point 2"));
        assert!(text.contains("Verdict: Neo (75% confidence)\nScripted."));
    }

    #[tokio::test]
    async fn unparsable_verdict_is_printed_raw() {
        let agent = ScriptedAgent::builtin().with_verdict(Behavior::reply("A draw."));
        let text = render(agent, false).await;
        assert!(text.ends_with("Verdict (unparsed):\nA draw.\n"));
    }

    #[tokio::test]
    async fn ndjson_output_is_one_event_per_line() {
        let text = render(ScriptedAgent::builtin(), true).await;
        let events: Vec<DebateEvent> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 17);
        assert!(events.last().is_some_and(DebateEvent::is_verdict));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let orch = orchestrator(Arc::new(ScriptedAgent::builtin()), DebateConfig::default());
        let mut out = Vec::new();
        let err = run_debate(&orch, "   ", false, &mut out).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
        assert!(out.is_empty());
    }
}
