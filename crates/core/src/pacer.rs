//! Pacing of interviewer questions, and the cues that let a participant
//! skip it by addressing the interviewer directly.

use std::time::Duration;
use tokio::time::Instant;

/// Phrases that mean the participant expects an answer right away.
const DIRECT_QUESTION_PHRASES: &[&str] = &[
    "should i move on",
    "should i continue",
    "next slide",
    "can you repeat",
    "could you repeat",
    "what do you think",
    "do you want me",
    "shall i",
    "any questions",
    "does that make sense",
];

/// Keeps interviewer questions at least `min_interval` apart.
#[derive(Debug, Clone)]
pub struct EvaluationPacer {
    min_interval: Duration,
    last_asked: Option<Instant>,
}

impl EvaluationPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_asked: None,
        }
    }

    pub fn may_ask_now(&self, now: Instant) -> bool {
        match self.last_asked {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    pub fn record_asked(&mut self, now: Instant) {
        self.last_asked = Some(now);
    }

    pub fn last_asked(&self) -> Option<Instant> {
        self.last_asked
    }
}

/// Leading words that do not change what a clause is asking.
const FILLER_WORDS: &[&str] = &["so", "okay", "ok", "alright", "well", "and", "now", "um", "uh"];

fn clause_words(clause: &str) -> Vec<&str> {
    clause
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether the participant addressed the interviewer directly.
///
/// A cue phrase must open or close a clause as whole words; the same words
/// in the middle of a statement do not count. Direct questions skip pacing.
pub fn is_direct_question(transcript: &str) -> bool {
    let text = transcript.trim().to_lowercase();
    if text.ends_with('?') {
        return true;
    }
    text.split(['.', ',', ';', ':', '!', '?']).any(|clause| {
        let words = clause_words(clause);
        let fillers = words
            .iter()
            .take_while(|w| FILLER_WORDS.contains(*w))
            .count();
        let words = &words[fillers..];
        DIRECT_QUESTION_PHRASES.iter().any(|phrase| {
            let phrase: Vec<&str> = phrase.split(' ').collect();
            words.starts_with(&phrase) || words.ends_with(&phrase)
        })
    })
}
