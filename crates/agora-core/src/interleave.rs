//! Bullet extraction and round-robin interleaving.
//!
//! The summarizer is asked for bullet points but nothing guarantees it
//! produces them. Parsing follows a fixed fallback chain:
//!
//! 1. strip literal `**` emphasis markers;
//! 2. keep lines whose trimmed form starts with `*` or `-`;
//! 3. if no line qualifies, the whole cleaned text is one point;
//! 4. blank text yields no points.

use crate::transcript::Turn;

/// Remove literal bold markers.
pub fn clean_condensed(text: &str) -> String {
    text.replace("**", "")
}

/// Split condensed text into its points, following the fallback chain.
pub fn split_points(text: &str) -> Vec<String> {
    let cleaned = clean_condensed(text);

    let bullets: Vec<String> = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('*') || line.starts_with('-'))
        .map(str::to_string)
        .collect();

    if !bullets.is_empty() {
        return bullets;
    }

    let whole = cleaned.trim();
    if whole.is_empty() {
        Vec::new()
    } else {
        vec![whole.to_string()]
    }
}

/// Merge per-speaker condensed texts into a single ordered turn sequence.
///
/// `condensed` is in speaker order. Point `i` of every speaker is emitted
/// before point `i + 1` of any speaker; speakers with fewer points simply
/// stop contributing.
pub fn interleave<S, T>(round: u32, condensed: &[(S, T)]) -> Vec<Turn>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let points: Vec<(&str, Vec<String>)> = condensed
        .iter()
        .map(|(speaker, text)| (speaker.as_ref(), split_points(text.as_ref())))
        .collect();

    let depth = points.iter().map(|(_, p)| p.len()).max().unwrap_or(0);
    let mut turns = Vec::with_capacity(points.iter().map(|(_, p)| p.len()).sum());

    for i in 0..depth {
        for (speaker, speaker_points) in &points {
            if let Some(point) = speaker_points.get(i) {
                turns.push(Turn::new(*speaker, point.clone(), round));
            }
        }
    }

    turns
}
