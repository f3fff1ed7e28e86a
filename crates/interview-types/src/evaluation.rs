use serde::{Deserialize, Serialize};

/// How the interviewer intends to follow up on an explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Question,
    Acknowledgment,
    /// The presenter may continue without interruption.
    Proceed,
    Remediation,
    #[serde(other)]
    Other,
}

fn neutral_score() -> f64 {
    5.0
}

/// The language evaluator's verdict on one finalized transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(default = "neutral_score")]
    pub score: f64,
    #[serde(default)]
    pub conflict_detected: bool,
    #[serde(default)]
    pub conflict_description: String,
    #[serde(default)]
    pub feedback: String,
    /// Text the interviewer should say next. Empty means stay quiet.
    #[serde(default, alias = "next_question")]
    pub next_response: String,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub needs_followup: bool,
    #[serde(default)]
    pub technical_depth: Option<f64>,
    #[serde(default)]
    pub clarity: Option<f64>,
    #[serde(default)]
    pub visual_quality: Option<f64>,
    #[serde(default)]
    pub presenter_asked_question: bool,
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self {
            score: neutral_score(),
            conflict_detected: false,
            conflict_description: String::new(),
            feedback: String::new(),
            next_response: String::new(),
            response_type: ResponseType::Question,
            topic: String::new(),
            needs_followup: false,
            technical_depth: None,
            clarity: None,
            visual_quality: None,
            presenter_asked_question: false,
        }
    }
}

impl EvaluationResult {
    /// Neutral result used whenever the evaluator cannot produce one.
    pub fn fallback() -> Self {
        Self {
            feedback: "Evaluation unavailable".to_string(),
            next_response: "Could you elaborate on that point?".to_string(),
            response_type: ResponseType::Remediation,
            topic: "Unknown".to_string(),
            ..Self::default()
        }
    }

    /// Result for an explanation that needs no interruption.
    pub fn proceed(topic: impl Into<String>) -> Self {
        Self {
            score: 7.0,
            feedback: "Good explanation".to_string(),
            response_type: ResponseType::Proceed,
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn has_response(&self) -> bool {
        !self.next_response.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let eval: EvaluationResult =
            serde_json::from_str(r#"{"next_question":"Why Redis?","response_type":"question"}"#)
                .unwrap();
        assert_eq!(eval.score, 5.0);
        assert_eq!(eval.next_response, "Why Redis?");
        assert!(eval.has_response());
    }

    #[test]
    fn unknown_response_type_maps_to_other() {
        let eval: EvaluationResult =
            serde_json::from_str(r#"{"response_type":"celebration"}"#).unwrap();
        assert_eq!(eval.response_type, ResponseType::Other);
    }

    #[test]
    fn fallback_asks_for_clarification() {
        let eval = EvaluationResult::fallback();
        assert_eq!(eval.score, 5.0);
        assert_eq!(eval.response_type, ResponseType::Remediation);
        assert!(eval.has_response());
        assert!(!EvaluationResult::proceed("caching").has_response());
    }
}
