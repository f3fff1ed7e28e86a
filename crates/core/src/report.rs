//! Human-readable interview reports.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use interview_types::{Summary, Turn, truncate_chars};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::storage::valid_session_id;

const REPORT_PREFIX: &str = "interview_report_";
const REPORT_EXTENSION: &str = "md";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub session_id: String,
    pub filename: String,
    pub path: PathBuf,
    pub created: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Renders the report and returns where it was written.
    async fn render(&self, summary: &Summary, session_id: &str, history: &[Turn])
    -> Result<PathBuf>;

    /// Path of an already rendered report, if any.
    async fn find(&self, session_id: &str) -> Result<Option<PathBuf>>;

    /// Rendered reports, newest first.
    async fn list(&self) -> Result<Vec<ReportEntry>>;
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn score_bar(score: u32) -> String {
    let filled = (score.min(100) / 10) as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(10 - filled))
}

fn write_feedback(out: &mut String, heading: &str, feedback: &BTreeMap<String, String>) {
    if feedback.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {heading}\n");
    for (key, text) in feedback {
        let _ = writeln!(out, "**{}:** {}\n", title_case(key), text);
    }
}

/// Renders a report as Markdown.
pub fn render_markdown(
    summary: &Summary,
    session_id: &str,
    history: &[Turn],
    generated: DateTime<Local>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Technical Assessment Report\n");
    let _ = writeln!(
        out,
        "_Generated on {}_\n",
        generated.format("%B %d, %Y at %I:%M %p")
    );
    let _ = writeln!(out, "---\n");

    let recommendation = if summary.recommendation.is_empty() {
        "NEEDS_REVIEW"
    } else {
        &summary.recommendation
    };
    let _ = writeln!(out, "**Overall score:** {}/100\n", summary.overall_score);
    let _ = writeln!(
        out,
        "**Recommendation:** {}\n",
        recommendation.replace('_', " ")
    );
    let text = if summary.summary.is_empty() {
        "No summary available."
    } else {
        &summary.summary
    };
    let _ = writeln!(out, "{text}\n");

    if !summary.category_scores.is_empty() {
        let _ = writeln!(out, "## Category Breakdown\n");
        let _ = writeln!(out, "| Category | Score | |\n|---|---:|---|");
        for (category, score) in &summary.category_scores {
            let _ = writeln!(
                out,
                "| {} | {} | `{}` |",
                title_case(category),
                score,
                score_bar(*score)
            );
        }
        out.push('\n');
    }

    for (heading, items) in [
        ("Strengths", &summary.strengths),
        ("Areas for Improvement", &summary.weaknesses),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {heading}\n");
        for item in items {
            let _ = writeln!(out, "- {item}");
        }
        out.push('\n');
    }

    write_feedback(&mut out, "Visual & Presentation Feedback", &summary.visual_feedback);
    write_feedback(&mut out, "Content Feedback", &summary.content_feedback);

    if !history.is_empty() {
        let _ = writeln!(out, "## Interview Transcript\n");
        for turn in history {
            let _ = writeln!(
                out,
                "### {}. {} ({}/10)\n",
                turn.sequence,
                if turn.topic.is_empty() { "General" } else { &turn.topic },
                turn.score
            );
            let _ = writeln!(out, "> {}\n", truncate_chars(&turn.transcript, 500));
            if !turn.question.is_empty() {
                let _ = writeln!(out, "**Interviewer:** {}\n", turn.question);
            }
            if turn.conflict {
                let _ = writeln!(out, "**Conflict:** {}\n", turn.conflict_description);
            }
        }
    }

    let _ = writeln!(out, "---\n");
    let _ = writeln!(out, "Session ID: {session_id} | Confidential");
    out
}

/// Writes Markdown reports to `<dir>/interview_report_<session_id>.md`.
#[derive(Debug, Clone)]
pub struct MarkdownReportRenderer {
    dir: PathBuf,
}

impl MarkdownReportRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        if !valid_session_id(session_id) {
            bail!("invalid session id '{session_id}'");
        }
        Ok(self
            .dir
            .join(format!("{REPORT_PREFIX}{session_id}.{REPORT_EXTENSION}")))
    }
}

#[async_trait]
impl ReportRenderer for MarkdownReportRenderer {
    async fn render(
        &self,
        summary: &Summary,
        session_id: &str,
        history: &[Turn],
    ) -> Result<PathBuf> {
        let path = self.path_for(session_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let markdown = render_markdown(summary, session_id, history, Local::now());
        tokio::fs::write(&path, markdown)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("report rendered to {}", path.display());
        Ok(path)
    }

    async fn find(&self, session_id: &str) -> Result<Option<PathBuf>> {
        let path = self.path_for(session_id)?;
        Ok(tokio::fs::try_exists(&path).await?.then_some(path))
    }

    async fn list(&self) -> Result<Vec<ReportEntry>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("listing {}", self.dir.display())),
        };

        let mut reports = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(session_id) = filename
                .strip_prefix(REPORT_PREFIX)
                .and_then(|rest| rest.strip_suffix(&format!(".{REPORT_EXTENSION}")))
            else {
                continue;
            };
            let created = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            reports.push(ReportEntry {
                session_id: session_id.to_string(),
                filename: filename.to_string(),
                path: path.clone(),
                created,
            });
        }
        reports.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(reports)
    }
}
