//! Prompt builders for each debate call.
//!
//! Persona-specific wording (tasks, stances, answer labels) lives in the
//! persona file; this module only assembles it around the topic and the
//! context carried over from earlier rounds.

use crate::persona::Persona;
use crate::transcript::Transcript;

/// Opening-round prompt for a debater.
pub fn opening_prompt(topic: &str, persona: &Persona) -> String {
    format!(
        "Topic: {topic}\n\
         {task}\n\
         Format:\n\
         THINKING: (Your thought process)\n\
         FINAL_ANSWER: {label}\n\
         (Your argument)",
        task = persona.opening().trim(),
        label = persona.answer_label(),
    )
}

/// Rebuttal-round prompt for a debater.
///
/// `others` holds the other debaters and their points from the previous
/// round, in speaking order. The speaker's own points are never included.
pub fn rebuttal_prompt(topic: &str, persona: &Persona, others: &[(&Persona, String)]) -> String {
    let review = others
        .iter()
        .map(|(other, points)| format!("{} ({}): {}", other.alias(), other.stance(), points))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Topic: {topic}\n\
         Review the arguments:\n\
         {review}\n\
         \n\
         {task}\n\
         Format:\n\
         THINKING: (Process)\n\
         FINAL_ANSWER: {label}\n\
         (Argument)",
        task = persona.rebuttal().trim(),
        label = persona.rebuttal_label(),
    )
}

/// Prompt asking the summarizer to condense one raw response.
///
/// Opening arguments are condensed around the persona's focus. Later
/// rounds name the text after the persona's rebuttal label
/// (`SYNTHESIS` becomes "synthesis") and carry no focus.
pub fn condense_prompt(persona: &Persona, round: u32, points: usize, raw: &str) -> String {
    if round <= 1 {
        format!(
            "Summarize this argument into {points} concise bullet points ({focus}). Remove thinking.\n\n{raw}",
            focus = persona.focus(),
        )
    } else {
        let kind = persona.rebuttal_label().to_lowercase();
        format!("Summarize this {kind} into {points} concise bullet points. Remove thinking.\n\n{raw}")
    }
}

/// Prompt asking the judge for the final verdict.
pub fn verdict_prompt(topic: &str, transcript: &Transcript) -> String {
    format!(
        "Topic: {topic}\n\
         \n\
         Review the Debate Transcript:\n\
         {transcript}\n\
         \n\
         Determine the final verdict. Who revealed the greater truth?\n\
         Output strict JSON matching the DebateVerdict schema.\n",
        transcript = transcript.render(),
    )
}
