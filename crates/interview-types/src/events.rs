use crate::evaluation::{EvaluationResult, ResponseType};
use crate::record::Summary;
use crate::turn::Turn;
use serde::{Deserialize, Serialize};

/// What the interviewer is doing right now, as shown to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceState {
    #[default]
    Listening,
    Thinking,
    Speaking,
}

/// The participant-facing view of an [`EvaluationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEvent {
    pub score: f64,
    pub conflict_detected: bool,
    pub feedback: String,
    pub next_question: String,
    pub question_type: ResponseType,
    pub topic: String,
}

impl From<&EvaluationResult> for EvaluationEvent {
    fn from(e: &EvaluationResult) -> Self {
        Self {
            score: e.score,
            conflict_detected: e.conflict_detected,
            feedback: e.feedback.clone(),
            next_question: e.next_response.clone(),
            question_type: e.response_type,
            topic: e.topic.clone(),
        }
    }
}

/// Events sent from the server to the browser.
///
/// On the wire every event is wrapped as `{"type", "data", "timestamp"}`,
/// see [`ServerEvent::to_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Status {
        state: VoiceState,
    },
    TranscriptInterim {
        text: String,
    },
    TranscriptFinal {
        text: String,
    },
    ScreenUpdate {
        context: String,
    },
    Evaluation(EvaluationEvent),
    AiMessage {
        text: String,
    },
    AudioChunk {
        audio: String,
    },
    AudioEnd,
    ScreenShareLost {
        message: String,
    },
    ScreenShareRestored {
        message: String,
    },
    InterviewStopped {
        session_id: String,
        total_questions: usize,
        has_content: bool,
    },
    ReportReady {
        url: String,
        session_id: String,
    },
    InterviewComplete {
        summary: Summary,
        history: Vec<Turn>,
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_url: Option<String>,
    },
    StopAudio,
    Keepalive,
    Error {
        message: String,
    },
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a ServerEvent,
    timestamp: f64,
}

impl ServerEvent {
    pub fn status(state: VoiceState) -> Self {
        Self::Status { state }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes the event in its wire envelope, stamped with the current time.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        serde_json::to_string(&Envelope {
            event: self,
            timestamp,
        })
    }

    /// The wire `type` tag of this event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::TranscriptInterim { .. } => "transcript_interim",
            Self::TranscriptFinal { .. } => "transcript_final",
            Self::ScreenUpdate { .. } => "screen_update",
            Self::Evaluation(_) => "evaluation",
            Self::AiMessage { .. } => "ai_message",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::AudioEnd => "audio_end",
            Self::ScreenShareLost { .. } => "screen_share_lost",
            Self::ScreenShareRestored { .. } => "screen_share_restored",
            Self::InterviewStopped { .. } => "interview_stopped",
            Self::ReportReady { .. } => "report_ready",
            Self::InterviewComplete { .. } => "interview_complete",
            Self::StopAudio => "stop_audio",
            Self::Keepalive => "keepalive",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_type_data_and_timestamp() {
        let json = ServerEvent::status(VoiceState::Thinking).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["data"]["state"], "thinking");
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn unit_events_have_no_data() {
        let json = ServerEvent::Keepalive.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "keepalive");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn envelope_parses_back_into_event() {
        let event = ServerEvent::InterviewStopped {
            session_id: "abc".to_string(),
            total_questions: 3,
            has_content: true,
        };
        let json = event.to_json().unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind(), "interview_stopped");
    }

    #[test]
    fn evaluation_event_maps_next_response() {
        let eval = EvaluationResult {
            next_response: "How does the cache expire?".to_string(),
            ..EvaluationResult::default()
        };
        let event = EvaluationEvent::from(&eval);
        assert_eq!(event.next_question, "How does the cache expire?");
        assert_eq!(event.question_type, ResponseType::Question);
    }
}
