//! Suppresses redundant vision calls.
//!
//! A frame is described only when it differs enough from the last described
//! frame *and* the previous successful call is older than the cooldown.

use crate::frame::{Frame, mean_abs_difference};
use crate::vision::VisionDescriber;
use image::RgbImage;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The frame was described; carries the new description.
    Analyzed(String),
    /// Too similar to the last described frame.
    Unchanged,
    /// Changed, but the previous call is too recent.
    CoolingDown,
    /// The describer failed; carries the cached description, if any.
    Degraded(Option<String>),
}

impl GateOutcome {
    pub fn should_analyze(&self) -> bool {
        matches!(self, Self::Analyzed(_))
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Analyzed(text) => Some(text),
            Self::Degraded(cached) => cached.as_deref(),
            Self::Unchanged | Self::CoolingDown => None,
        }
    }
}

#[derive(Debug)]
pub struct ChangeGate {
    threshold: f64,
    min_interval: Duration,
    last_frame: Option<RgbImage>,
    last_description: Option<String>,
    last_call: Option<Instant>,
}

impl ChangeGate {
    pub fn new(threshold: f64, min_interval: Duration) -> Self {
        Self {
            threshold,
            min_interval,
            last_frame: None,
            last_description: None,
            last_call: None,
        }
    }

    pub fn has_changed(&self, thumbnail: &RgbImage) -> bool {
        match &self.last_frame {
            None => true,
            Some(last) => mean_abs_difference(thumbnail, last) > self.threshold,
        }
    }

    pub fn cooling_down(&self, now: Instant) -> bool {
        self.last_call
            .is_some_and(|last| now.saturating_duration_since(last) < self.min_interval)
    }

    pub fn current_description(&self) -> Option<&str> {
        self.last_description.as_deref()
    }

    pub async fn evaluate(
        &mut self,
        frame: &Frame,
        describer: &dyn VisionDescriber,
        now: Instant,
    ) -> GateOutcome {
        let thumbnail = frame.thumbnail();
        if !self.has_changed(&thumbnail) {
            return GateOutcome::Unchanged;
        }
        if self.cooling_down(now) {
            tracing::debug!("frame changed but vision is cooling down");
            return GateOutcome::CoolingDown;
        }

        match describer.describe(frame).await {
            Ok(description) => {
                self.last_frame = Some(thumbnail);
                self.last_description = Some(description.clone());
                // Never move the timestamp backwards.
                self.last_call = Some(self.last_call.map_or(now, |last| last.max(now)));
                GateOutcome::Analyzed(description)
            }
            Err(e) if e.is_rate_limited() => {
                tracing::warn!("vision rate limited, keeping cached description");
                GateOutcome::Degraded(self.last_description.clone())
            }
            Err(e) => {
                tracing::error!("vision description failed: {}", e);
                GateOutcome::Degraded(self.last_description.clone())
            }
        }
    }
}
