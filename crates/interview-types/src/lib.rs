//! Wire and record types shared by the interview server and its clients.

pub mod evaluation;
pub mod events;
pub mod messages;
pub mod record;
pub mod turn;

pub use evaluation::{EvaluationResult, ResponseType};
pub use events::{EvaluationEvent, ServerEvent, VoiceState};
pub use messages::ClientMessage;
pub use record::{InterviewRecord, Summary};
pub use turn::{SubScores, Turn};

/// Truncates `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Like [`truncate_chars`] but marks the cut with a trailing ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
