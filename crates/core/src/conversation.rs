//! The interviewer's side of the dialogue.
//!
//! [`Conversation`] is the state guarded by the session's
//! [`ResponseGuard`](crate::guard::ResponseGuard): history, pacing and voice.
//! Every method that speaks runs as one exclusive job on the guard worker.

use crate::evaluator::{DEFAULT_OPENING, Evaluator};
use crate::pacer::{EvaluationPacer, is_direct_question};
use crate::speech::SpeechSynthesizer;
use crate::transport::EventSink;
use base64::{Engine as _, engine::general_purpose};
use interview_types::{EvaluationResult, ResponseType, ServerEvent, Turn, VoiceState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

pub const SHARE_LOST_NOTICE: &str = "I noticed you stopped sharing your screen. Please reshare to continue the interview, or click End Interview to finish.";
pub const SHARE_RESTORED_NOTICE: &str =
    "Great, I can see your screen again! Please continue where you left off.";
pub const CLOSING_NOTICE: &str = "Since the screen share wasn't restored, I'll wrap up the interview now. Thank you for your presentation!";
pub const REPORT_NOTICE: &str = "Generating your report...";
const EXHAUSTED_NOTICE: &str = "The interviewer is unavailable right now, so the interview will end here.";

/// Raised from inside a response cycle for the session task to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Too many evaluations in a row fell back to the default result.
    EvaluatorExhausted,
}

/// What one call to [`Conversation::respond`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The conversation was already closed.
    Closed,
    /// Too soon after the last question.
    Paced,
    /// The presenter is answering; nothing was recorded.
    Proceeded,
    /// The evaluator failed too often; the session is asked to end.
    Exhausted,
    Evaluated { sequence: u32, spoke: bool },
}

pub struct Conversation {
    history: Vec<Turn>,
    pacer: EvaluationPacer,
    awaiting_answer: bool,
    consecutive_fallbacks: u32,
    max_consecutive_fallbacks: u32,
    closed: bool,
    evaluator: Arc<dyn Evaluator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    events: EventSink,
    voice: Arc<watch::Sender<VoiceState>>,
    visual_context: watch::Receiver<String>,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

/// Channels a [`Conversation`] shares with its session task.
pub struct ConversationLinks {
    pub events: EventSink,
    pub voice: Arc<watch::Sender<VoiceState>>,
    pub visual_context: watch::Receiver<String>,
    pub signals: mpsc::UnboundedSender<SessionSignal>,
}

impl Conversation {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        min_question_interval: Duration,
        max_consecutive_fallbacks: u32,
        links: ConversationLinks,
    ) -> Self {
        Self {
            history: Vec::new(),
            pacer: EvaluationPacer::new(min_question_interval),
            awaiting_answer: false,
            consecutive_fallbacks: 0,
            max_consecutive_fallbacks,
            closed: false,
            evaluator,
            synthesizer,
            events: links.events,
            voice: links.voice,
            visual_context: links.visual_context,
            signals: links.signals,
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    async fn set_voice(&self, state: VoiceState) {
        self.voice.send_replace(state);
        self.events.send(ServerEvent::status(state)).await;
    }

    /// Greets the participant. Counts as the first question.
    pub async fn open(&mut self) {
        if self.closed {
            return;
        }
        self.set_voice(VoiceState::Thinking).await;
        let opening = match self.evaluator.generate_opening().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("opening generation failed, using default: {}", e);
                DEFAULT_OPENING.to_string()
            }
        };
        self.events
            .send(ServerEvent::AiMessage {
                text: opening.clone(),
            })
            .await;
        self.speak(&opening).await;
        self.pacer.record_asked(Instant::now());
        self.awaiting_answer = true;
    }

    /// Shows and speaks a fixed notice.
    pub async fn announce(&mut self, text: &str) {
        if self.closed {
            return;
        }
        self.events
            .send(ServerEvent::AiMessage {
                text: text.to_string(),
            })
            .await;
        self.speak(text).await;
    }

    /// Synthesizes `text` and streams it to the client. Voice returns to
    /// listening whether or not synthesis worked.
    pub async fn speak(&mut self, text: &str) {
        self.set_voice(VoiceState::Speaking).await;
        match self.synthesizer.synthesize(text).await {
            Ok(audio) if !audio.is_empty() => {
                self.events
                    .send(ServerEvent::AudioChunk {
                        audio: general_purpose::STANDARD.encode(&audio),
                    })
                    .await;
                self.events.send(ServerEvent::AudioEnd).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("speech synthesis failed: {}", e),
        }
        self.set_voice(VoiceState::Listening).await;
    }

    async fn evaluate(&mut self, transcript: &str) -> Option<EvaluationResult> {
        let visual = self.visual_context.borrow().clone();
        match self
            .evaluator
            .evaluate(transcript, &visual, &self.history)
            .await
        {
            Ok(result) => {
                self.consecutive_fallbacks = 0;
                Some(result)
            }
            Err(e) => {
                self.consecutive_fallbacks += 1;
                tracing::warn!(
                    "evaluation failed ({} in a row): {}",
                    self.consecutive_fallbacks,
                    e
                );
                let cap = self.max_consecutive_fallbacks;
                if cap > 0 && self.consecutive_fallbacks >= cap {
                    return None;
                }
                Some(EvaluationResult::fallback())
            }
        }
    }

    /// One evaluation cycle for a finalized transcript.
    pub async fn respond(&mut self, transcript: &str) -> CycleOutcome {
        if self.closed {
            return CycleOutcome::Closed;
        }
        let direct = is_direct_question(transcript);
        if !direct && !self.pacer.may_ask_now(Instant::now()) {
            tracing::debug!("pacing: skipping evaluation, last question too recent");
            return CycleOutcome::Paced;
        }

        self.set_voice(VoiceState::Thinking).await;
        let Some(result) = self.evaluate(transcript).await else {
            tracing::error!("evaluator exhausted, ending session");
            self.events.send(ServerEvent::error(EXHAUSTED_NOTICE)).await;
            self.set_voice(VoiceState::Listening).await;
            if self.signals.send(SessionSignal::EvaluatorExhausted).is_err() {
                tracing::warn!("session task is gone, cannot signal exhaustion");
            }
            return CycleOutcome::Exhausted;
        };

        if result.response_type == ResponseType::Proceed
            && self.awaiting_answer
            && !result.presenter_asked_question
        {
            self.set_voice(VoiceState::Listening).await;
            return CycleOutcome::Proceeded;
        }

        let sequence = self.history.len() as u32 + 1;
        let visual = self.visual_context.borrow().clone();
        self.history
            .push(Turn::from_evaluation(sequence, transcript, &result, &visual));
        self.events
            .send(ServerEvent::Evaluation((&result).into()))
            .await;

        let spoke = result.has_response();
        if spoke {
            self.speak(&result.next_response).await;
            self.pacer.record_asked(Instant::now());
        } else {
            self.set_voice(VoiceState::Listening).await;
        }
        self.awaiting_answer = spoke;
        CycleOutcome::Evaluated { sequence, spoke }
    }

    /// Ends the conversation and returns the final history. Later cycles
    /// are no-ops.
    pub fn close(&mut self) -> Vec<Turn> {
        self.closed = true;
        self.history.clone()
    }
}
