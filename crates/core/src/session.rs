//! One interview, from greeting to report.
//!
//! An [`InterviewSession`] is owned by a single task. Inbound messages, the
//! screen-share recovery deadline, the keepalive timer and signals raised by
//! response cycles all arrive as branches of the `select!` in
//! [`InterviewSession::run`], so session state is never shared.

use crate::change_gate::{ChangeGate, GateOutcome};
use crate::config::SessionConfig;
use crate::conversation::{
    CLOSING_NOTICE, Conversation, ConversationLinks, REPORT_NOTICE, SHARE_LOST_NOTICE,
    SHARE_RESTORED_NOTICE, SessionSignal,
};
use crate::evaluator::{Evaluator, summarize_locally};
use crate::frame::Frame;
use crate::guard::ResponseGuard;
use crate::interruption::InterruptionMachine;
use crate::policy::StopAction;
use crate::report::ReportRenderer;
use crate::speech::SpeechSynthesizer;
use crate::storage::RecordStore;
use crate::transcriber::Transcriber;
use crate::transcription::{AudioFormat, PendingAudio, TranscriptionBuffer};
use crate::transport::EventSink;
use crate::vision::VisionDescriber;
use base64::{Engine as _, engine::general_purpose};
use chrono::{Local, Utc};
use interview_types::{
    ClientMessage, InterviewRecord, ServerEvent, Summary, Turn, VoiceState, preview,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep, sleep_until};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// `YYYYmmdd_HHMMSS_<n>`, unique within the process.
pub fn new_session_id() -> String {
    format!(
        "{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        NEXT_SESSION.fetch_add(1, Ordering::Relaxed)
    )
}

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub vision: Arc<dyn VisionDescriber>,
    pub evaluator: Arc<dyn Evaluator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn RecordStore>,
    pub renderer: Arc<dyn ReportRenderer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Active,
    Stopped { report_delivered: bool },
}

pub struct InterviewSession {
    id: String,
    config: SessionConfig,
    collaborators: Collaborators,
    events: EventSink,
    lifecycle: Lifecycle,
    started_at: Instant,
    auto_ended: bool,
    buffer: TranscriptionBuffer,
    gate: ChangeGate,
    interruption: InterruptionMachine,
    visual_contexts: Vec<String>,
    visual_context: watch::Sender<String>,
    voice: Arc<watch::Sender<VoiceState>>,
    guard: ResponseGuard<Conversation>,
    signals: mpsc::UnboundedReceiver<SessionSignal>,
    history: Vec<Turn>,
}

impl InterviewSession {
    /// Creates the session and spawns its response worker.
    pub fn new(config: SessionConfig, collaborators: Collaborators, events: EventSink) -> Self {
        let now = Instant::now();
        // Only read back through the sender, so the receiver is not kept.
        let (voice, _) = watch::channel(VoiceState::Listening);
        let voice = Arc::new(voice);
        let (visual_tx, visual_rx) = watch::channel(String::new());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let conversation = Conversation::new(
            collaborators.evaluator.clone(),
            collaborators.synthesizer.clone(),
            config.min_question_interval,
            config.max_consecutive_fallbacks,
            ConversationLinks {
                events: events.clone(),
                voice: voice.clone(),
                visual_context: visual_rx,
                signals: signal_tx,
            },
        );
        // The worker exits once the guard is dropped with the session.
        let (guard, _worker) = ResponseGuard::spawn(conversation);

        Self {
            id: new_session_id(),
            buffer: TranscriptionBuffer::new(&config, now),
            gate: ChangeGate::new(config.vision_change_threshold, config.vision_min_interval),
            interruption: InterruptionMachine::new(config.recovery_timeout),
            config,
            collaborators,
            events,
            lifecycle: Lifecycle::Created,
            started_at: now,
            auto_ended: false,
            visual_contexts: Vec::new(),
            visual_context: visual_tx,
            voice,
            guard,
            signals: signal_rx,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_awaiting_recovery(&self) -> bool {
        self.interruption.is_awaiting_recovery()
    }

    /// Activates the session and queues the opening greeting.
    pub async fn start(&mut self) {
        if self.lifecycle != Lifecycle::Created {
            tracing::warn!("start ignored, session already {:?}", self.lifecycle);
            return;
        }
        self.lifecycle = Lifecycle::Active;
        self.started_at = Instant::now();
        tracing::info!("session started");

        if self
            .guard
            .submit(|c: &mut Conversation| Box::pin(c.open()))
            .is_err()
        {
            tracing::error!("response worker is gone, no opening sent");
        }
    }

    /// Waits until every queued response cycle has finished.
    pub async fn settle(&self) {
        let _ = self
            .guard
            .run_exclusive(|_: &mut Conversation| Box::pin(async {}))
            .await;
    }

    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Audio {
                data,
                encoding,
                sample_rate,
            } => {
                self.on_audio(
                    &data,
                    AudioFormat {
                        encoding,
                        sample_rate,
                    },
                )
                .await
            }
            ClientMessage::Video { data } => self.on_video_frame(&data).await,
            ClientMessage::ScreenShareLost => self.on_screen_share_lost().await,
            ClientMessage::ScreenShareRestored => self.on_screen_share_restored().await,
            ClientMessage::GenerateReport => self.request_report().await,
            ClientMessage::Stop => self.stop(false, false).await,
            ClientMessage::UserSpeaking => self.on_user_speaking().await,
        }
    }

    pub async fn on_audio(&mut self, data: &str, format: AudioFormat) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        let chunk = match general_purpose::STANDARD.decode(data.trim()) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("dropping undecodable audio chunk: {}", e);
                return;
            }
        };
        self.buffer.add_audio(&chunk, format);
        if let Some(pending) = self.buffer.maybe_flush(Instant::now()) {
            self.transcribe(pending).await;
        }
    }

    async fn transcribe(&mut self, pending: PendingAudio) {
        tracing::debug!("transcribing {} bytes", pending.bytes.len());
        let result = self
            .collaborators
            .transcriber
            .transcribe(
                &pending.bytes,
                &pending.format.encoding,
                pending.format.sample_rate,
            )
            .await;
        let text = match result {
            Ok(Some(text)) => text,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("transcription failed: {}", e);
                return;
            }
        };

        self.events
            .send(ServerEvent::TranscriptInterim { text: text.clone() })
            .await;
        if let Some(transcript) = self.buffer.push_fragment(&text) {
            self.on_transcript_finalized(transcript).await;
        }
    }

    /// Queues a response cycle for a finalized transcript.
    pub async fn on_transcript_finalized(&mut self, transcript: String) {
        tracing::info!("transcript finalized: {}", preview(&transcript, 80));
        self.events
            .send(ServerEvent::TranscriptFinal {
                text: transcript.clone(),
            })
            .await;

        let queued = self.guard.submit(move |c: &mut Conversation| {
            Box::pin(async move {
                let outcome = c.respond(&transcript).await;
                tracing::debug!("response cycle finished: {:?}", outcome);
            })
        });
        if queued.is_err() {
            tracing::error!("response worker is gone, transcript dropped");
        }
    }

    pub async fn on_video_frame(&mut self, data: &str) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        // Any frame proves the share is back.
        if self.interruption.is_awaiting_recovery() {
            self.on_screen_share_restored().await;
            return;
        }

        let frame = match Frame::from_base64(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("ignoring undecodable frame: {}", e);
                return;
            }
        };

        let outcome = self
            .gate
            .evaluate(
                &frame,
                self.collaborators.vision.as_ref(),
                Instant::now(),
            )
            .await;
        if let GateOutcome::Analyzed(description) = outcome {
            tracing::info!("screen updated: {}", preview(&description, 100));
            self.visual_contexts.push(description.clone());
            let context = preview(&description, self.config.screen_update_chars);
            self.visual_context.send_replace(description);
            self.events.send(ServerEvent::ScreenUpdate { context }).await;
        }
    }

    pub async fn on_screen_share_lost(&mut self) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        let Some(deadline) = self.interruption.share_lost(Instant::now()) else {
            return;
        };
        tracing::info!(
            "screen share lost, waiting {:?} for recovery",
            deadline.saturating_duration_since(Instant::now())
        );
        self.events
            .send(ServerEvent::ScreenShareLost {
                message: SHARE_LOST_NOTICE.to_string(),
            })
            .await;
        self.queue_announcement(SHARE_LOST_NOTICE);
    }

    pub async fn on_screen_share_restored(&mut self) {
        if !self.interruption.share_restored() {
            return;
        }
        tracing::info!("screen share restored");
        self.events
            .send(ServerEvent::ScreenShareRestored {
                message: SHARE_RESTORED_NOTICE.to_string(),
            })
            .await;
        self.queue_announcement(SHARE_RESTORED_NOTICE);
    }

    fn queue_announcement(&self, text: &'static str) {
        if self
            .guard
            .submit(move |c: &mut Conversation| Box::pin(c.announce(text)))
            .is_err()
        {
            tracing::error!("response worker is gone, notice not spoken");
        }
    }

    /// Ends the session if the loss identified by `epoch` was never recovered.
    pub async fn on_recovery_deadline(&mut self, epoch: u64) {
        if !self.interruption.deadline_elapsed(epoch, Instant::now()) {
            return;
        }
        tracing::info!("screen share not restored in time, ending interview");
        let closing = self
            .guard
            .run_exclusive(|c: &mut Conversation| Box::pin(c.announce(CLOSING_NOTICE)))
            .await;
        if closing.is_err() {
            tracing::error!("response worker is gone, closing notice not spoken");
        }
        self.stop(true, false).await;
    }

    pub async fn on_user_speaking(&mut self) {
        let speaking = *self.voice.borrow() == VoiceState::Speaking;
        if speaking {
            tracing::debug!("barge-in, stopping playback");
            self.events.send(ServerEvent::StopAudio).await;
            self.voice.send_replace(VoiceState::Listening);
        }
    }

    async fn on_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::EvaluatorExhausted => self.stop(true, false).await,
        }
    }

    /// Winds the session down. Only the first call has any effect.
    ///
    /// Pending audio and transcript are processed first, then the response
    /// worker is closed, so no cycle starts after this returns.
    pub async fn stop(&mut self, auto_ended: bool, generate_report: bool) {
        if self.lifecycle != Lifecycle::Active {
            tracing::debug!("stop ignored, session is {:?}", self.lifecycle);
            return;
        }
        tracing::info!("stopping interview (auto_ended: {})", auto_ended);
        self.lifecycle = Lifecycle::Stopped {
            report_delivered: false,
        };
        self.auto_ended = auto_ended;
        self.interruption.terminate();

        if let Some(pending) = self.buffer.flush(Instant::now()) {
            self.transcribe(pending).await;
        }
        if let Some(transcript) = self.buffer.finalize() {
            self.on_transcript_finalized(transcript).await;
        }

        self.history = match self
            .guard
            .run_exclusive(|c: &mut Conversation| Box::pin(async move { c.close() }))
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("could not collect history: {}", e);
                Vec::new()
            }
        };

        let record = self.record(None);
        if let Err(e) = self.collaborators.store.persist(&record).await {
            tracing::error!("failed to save interview: {:#}", e);
        }

        let action = self.config.report_policy.decide(
            auto_ended,
            !self.history.is_empty(),
            generate_report,
        );
        match action {
            StopAction::GenerateReport => self.deliver_report().await,
            StopAction::AskParticipant => {
                self.events
                    .send(ServerEvent::InterviewStopped {
                        session_id: self.id.clone(),
                        total_questions: self.history.len(),
                        has_content: !self.history.is_empty(),
                    })
                    .await;
            }
        }
        tracing::info!("interview ended");
    }

    /// The participant asked for a report. Stops an active session first;
    /// a report is delivered at most once.
    pub async fn request_report(&mut self) {
        match self.lifecycle {
            Lifecycle::Created => tracing::warn!("report requested before the interview started"),
            Lifecycle::Active => self.stop(false, true).await,
            Lifecycle::Stopped {
                report_delivered: false,
            } => self.deliver_report().await,
            Lifecycle::Stopped {
                report_delivered: true,
            } => tracing::debug!("report already delivered"),
        }
    }

    async fn deliver_report(&mut self) {
        if let Lifecycle::Stopped { report_delivered } = &mut self.lifecycle {
            *report_delivered = true;
        }

        if self.history.is_empty() {
            self.events
                .send(ServerEvent::InterviewComplete {
                    summary: Summary::empty(),
                    history: Vec::new(),
                    session_id: self.id.clone(),
                    report_url: None,
                })
                .await;
            return;
        }

        self.events.send(ServerEvent::status(VoiceState::Thinking)).await;
        self.events
            .send(ServerEvent::AiMessage {
                text: REPORT_NOTICE.to_string(),
            })
            .await;

        let summary = match self
            .collaborators
            .evaluator
            .generate_summary(&self.history, &self.visual_contexts)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("summary generation failed, summarizing locally: {}", e);
                summarize_locally(&self.history)
            }
        };

        let record = self.record(Some(summary.clone()));
        if let Err(e) = self.collaborators.store.persist(&record).await {
            tracing::error!("failed to save interview: {:#}", e);
        }

        let report_url = match self
            .collaborators
            .renderer
            .render(&summary, &self.id, &self.history)
            .await
        {
            Ok(_) => Some(format!("{}/{}", self.config.report_url_prefix, self.id)),
            Err(e) => {
                tracing::warn!("report rendering failed: {:#}", e);
                None
            }
        };

        if let Some(url) = &report_url {
            self.events
                .send(ServerEvent::ReportReady {
                    url: url.clone(),
                    session_id: self.id.clone(),
                })
                .await;
        }
        self.events
            .send(ServerEvent::InterviewComplete {
                summary,
                history: self.history.clone(),
                session_id: self.id.clone(),
                report_url,
            })
            .await;
        self.events.send(ServerEvent::status(VoiceState::Listening)).await;
    }

    fn record(&self, summary: Option<Summary>) -> InterviewRecord {
        InterviewRecord {
            session_id: self.id.clone(),
            timestamp: Utc::now(),
            auto_ended: self.auto_ended,
            duration_minutes: self.started_at.elapsed().as_secs_f64() / 60.0,
            total_questions: self.history.len(),
            history: self.history.clone(),
            screen_contexts_count: self.visual_contexts.len(),
            summary,
        }
    }

    /// Drives the session until the client goes away.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ClientMessage>) {
        self.start().await;
        loop {
            let recovery = self.interruption.deadline();
            let keepalive = sleep(self.config.keepalive_interval);
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                Some(signal) = self.signals.recv() => self.on_signal(signal).await,
                _ = async {
                    match recovery {
                        Some((deadline, _)) => sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some((_, epoch)) = recovery {
                        self.on_recovery_deadline(epoch).await;
                    }
                },
                _ = keepalive => self.events.send(ServerEvent::Keepalive).await,
            }
        }

        tracing::info!("client disconnected");
        self.stop(false, false).await;
    }
}
