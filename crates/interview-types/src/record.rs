use crate::turn::Turn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final evaluation report for a whole interview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// 0..=100
    #[serde(default)]
    pub overall_score: u32,
    #[serde(default)]
    pub category_scores: BTreeMap<String, u32>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub visual_feedback: BTreeMap<String, String>,
    #[serde(default)]
    pub content_feedback: BTreeMap<String, String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendation: String,
}

impl Summary {
    /// Placeholder sent when the interview ended before anything was evaluated.
    pub fn empty() -> Self {
        Self {
            summary: "No content to evaluate.".to_string(),
            ..Self::default()
        }
    }
}

/// Persisted record of one interview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub auto_ended: bool,
    pub duration_minutes: f64,
    pub total_questions: usize,
    pub history: Vec<Turn>,
    pub screen_contexts_count: usize,
    pub summary: Option<Summary>,
}
