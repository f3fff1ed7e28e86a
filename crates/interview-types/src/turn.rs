use crate::evaluation::{EvaluationResult, ResponseType};
use crate::truncate_chars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visual context kept on each turn is cut to this many characters.
pub const TURN_CONTEXT_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub technical_depth: f64,
    pub clarity: f64,
    pub visual_quality: f64,
}

/// One resolved question/answer exchange. Turns are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub sequence: u32,
    pub transcript: String,
    pub score: f64,
    pub scores: SubScores,
    pub conflict: bool,
    pub conflict_description: String,
    pub feedback: String,
    pub question: String,
    pub topic: String,
    pub response_type: ResponseType,
    pub screen_context: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn from_evaluation(
        sequence: u32,
        transcript: &str,
        evaluation: &EvaluationResult,
        screen_context: &str,
    ) -> Self {
        Self {
            sequence,
            transcript: transcript.to_string(),
            score: evaluation.score,
            scores: SubScores {
                technical_depth: evaluation.technical_depth.unwrap_or(evaluation.score),
                clarity: evaluation.clarity.unwrap_or(evaluation.score),
                visual_quality: evaluation.visual_quality.unwrap_or(5.0),
            },
            conflict: evaluation.conflict_detected,
            conflict_description: evaluation.conflict_description.clone(),
            feedback: evaluation.feedback.clone(),
            question: evaluation.next_response.clone(),
            topic: evaluation.topic.clone(),
            response_type: evaluation.response_type,
            screen_context: truncate_chars(screen_context, TURN_CONTEXT_CHARS).to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_scores_default_to_overall_score() {
        let eval = EvaluationResult {
            score: 8.0,
            visual_quality: Some(3.0),
            ..EvaluationResult::default()
        };
        let turn = Turn::from_evaluation(1, "hello", &eval, &"x".repeat(500));
        assert_eq!(turn.scores.technical_depth, 8.0);
        assert_eq!(turn.scores.clarity, 8.0);
        assert_eq!(turn.scores.visual_quality, 3.0);
        assert_eq!(turn.screen_context.len(), TURN_CONTEXT_CHARS);
    }
}
