use crate::policy::ReportPolicy;
use std::time::Duration;

/// Tunables for a single interview session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock time between transcription flushes.
    pub flush_interval: Duration,
    /// Buffers smaller than this are dropped instead of transcribed
    /// (0.5 s of 16 kHz PCM16).
    pub min_audio_bytes: usize,
    /// Accumulated transcript is finalized once it reaches this many words.
    pub finalize_word_count: usize,
    /// Mean normalized pixel difference above which a frame counts as changed.
    pub vision_change_threshold: f64,
    /// Minimum time between two successful vision calls.
    pub vision_min_interval: Duration,
    /// Minimum time between two interviewer questions.
    pub min_question_interval: Duration,
    /// How long a lost screen share may stay lost before the session ends.
    pub recovery_timeout: Duration,
    /// Inbound silence after which a keepalive is sent.
    pub keepalive_interval: Duration,
    /// Consecutive evaluator failures tolerated before the session ends itself.
    /// Zero disables the cap.
    pub max_consecutive_fallbacks: u32,
    pub report_policy: ReportPolicy,
    /// URL prefix under which rendered reports are served.
    pub report_url_prefix: String,
    /// Characters of a new screen description forwarded in `screen_update`.
    pub screen_update_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(3),
            min_audio_bytes: 16_000,
            finalize_word_count: 8,
            vision_change_threshold: 0.10,
            vision_min_interval: Duration::from_secs(3),
            min_question_interval: Duration::from_secs(8),
            recovery_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(60),
            max_consecutive_fallbacks: 5,
            report_policy: ReportPolicy::default(),
            report_url_prefix: "/api/reports".to_string(),
            screen_update_chars: 200,
        }
    }
}
