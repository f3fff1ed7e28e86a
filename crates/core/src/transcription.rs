//! Audio accumulation and transcript finalization.
//!
//! The buffer never talks to the transcriber itself. The session drains it
//! with [`TranscriptionBuffer::maybe_flush`], awaits the transcriber and feeds
//! the text back through [`TranscriptionBuffer::push_fragment`]. Because the
//! drain happens on the session task, two flushes can never overlap.

use crate::config::SessionConfig;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            encoding: "linear16".to_string(),
            sample_rate: 16_000,
        }
    }
}

/// A drained chunk of audio ready for transcription.
#[derive(Debug, PartialEq)]
pub struct PendingAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

#[derive(Debug)]
pub struct TranscriptionBuffer {
    flush_interval: Duration,
    min_audio_bytes: usize,
    finalize_word_count: usize,
    audio: Vec<u8>,
    format: AudioFormat,
    transcript: String,
    last_flush: Instant,
}

impl TranscriptionBuffer {
    pub fn new(config: &SessionConfig, now: Instant) -> Self {
        Self {
            flush_interval: config.flush_interval,
            min_audio_bytes: config.min_audio_bytes,
            finalize_word_count: config.finalize_word_count,
            audio: Vec::new(),
            format: AudioFormat::default(),
            transcript: String::new(),
            last_flush: now,
        }
    }

    /// Appends a chunk. The chunk's format replaces the remembered one.
    pub fn add_audio(&mut self, chunk: &[u8], format: AudioFormat) {
        self.audio.extend_from_slice(chunk);
        self.format = format;
    }

    pub fn buffered_bytes(&self) -> usize {
        self.audio.len()
    }

    pub fn flush_due(&self, now: Instant) -> bool {
        !self.audio.is_empty() && now.saturating_duration_since(self.last_flush) >= self.flush_interval
    }

    /// Drains the buffer if the flush interval has elapsed.
    pub fn maybe_flush(&mut self, now: Instant) -> Option<PendingAudio> {
        if !self.flush_due(now) {
            return None;
        }
        self.flush(now)
    }

    /// Drains the buffer unconditionally. Audio below the minimum audible
    /// size is discarded.
    pub fn flush(&mut self, now: Instant) -> Option<PendingAudio> {
        if self.audio.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.audio);
        self.last_flush = now;
        if bytes.len() < self.min_audio_bytes {
            tracing::debug!("discarding {} bytes of audio, too short", bytes.len());
            return None;
        }
        Some(PendingAudio {
            bytes,
            format: self.format.clone(),
        })
    }

    /// Appends a transcribed fragment. Returns the accumulated transcript,
    /// clearing it, once it holds enough words.
    pub fn push_fragment(&mut self, fragment: &str) -> Option<String> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return None;
        }
        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(fragment);

        if self.word_count() >= self.finalize_word_count {
            self.finalize()
        } else {
            None
        }
    }

    /// Takes whatever transcript has accumulated.
    pub fn finalize(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.transcript);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn word_count(&self) -> usize {
        self.transcript.split_whitespace().count()
    }
}
