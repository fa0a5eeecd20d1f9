//! Append-only debate transcript.

use serde::{Deserialize, Serialize};

/// One point made by one speaker in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: String,
    pub content: String,
    pub round: u32,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>, round: u32) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            round,
        }
    }
}

/// Ordered log of every turn in a debate.
///
/// Turns are kept in the order they were streamed. There is no way to
/// remove or edit a turn once pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns from a single round, in order.
    pub fn round(&self, round: u32) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(move |t| t.round == round)
    }

    /// One speaker's points from a round, joined by newlines.
    pub fn points_of(&self, speaker: &str, round: u32) -> String {
        self.round(round)
            .filter(|t| t.speaker == speaker)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Flat `speaker: content` rendering, one line per turn.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        let mut t = Transcript::new();
        t.push(Turn::new("Neo", "* code is reality", 1));
        t.push(Turn::new("Morpheus", "* what is real?", 1));
        t.push(Turn::new("Neo", "* progress wins", 1));
        t.push(Turn::new("Neo", "* rebuttal", 2));
        t
    }

    #[test]
    fn starts_empty() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert_eq!(t.render(), "");
    }

    #[test]
    fn preserves_push_order() {
        let t = sample();
        let speakers: Vec<&str> = t.iter().map(|t| t.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["Neo", "Morpheus", "Neo", "Neo"]);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn render_is_one_line_per_turn() {
        let t = sample();
        assert_eq!(
            t.render(),
            "Neo: * code is reality\nMorpheus: * what is real?\nNeo: * progress wins\nNeo: * rebuttal"
        );
    }

    #[test]
    fn points_of_filters_speaker_and_round() {
        let t = sample();
        assert_eq!(t.points_of("Neo", 1), "* code is reality\n* progress wins");
        assert_eq!(t.points_of("Neo", 2), "* rebuttal");
        assert_eq!(t.points_of("Agent Smith", 1), "");
    }

    #[test]
    fn serializes_as_turn_array() {
        let mut t = Transcript::new();
        t.push(Turn::new("Neo", "* a", 1));
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "speaker": "Neo", "content": "* a", "round": 1 }])
        );
    }
}
