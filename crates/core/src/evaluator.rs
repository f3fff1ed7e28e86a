use crate::error::{ServiceError, ServiceResult};
use crate::llm::{ChatClient, ChatMessage, ChatRequest, extract_json_object};
use async_trait::async_trait;
use interview_types::{EvaluationResult, ResponseType, Summary, Turn, truncate_chars};
#[cfg(test)]
use mockall::automock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

/// Spoken when the opening prompt cannot be generated.
pub const DEFAULT_OPENING: &str = "Hi there! Welcome to your presentation session. Before we begin, could you tell me a bit about yourself and what project you'll be presenting today?";

/// Conversation messages replayed to the model on every evaluation.
const MEMORY_MESSAGES: usize = 4;
/// Turns quoted back to the model as previous context.
const RECENT_TURNS: usize = 3;
/// A weak topic is revisited at most this many times.
const MAX_FOLLOWUP_ATTEMPTS: u32 = 2;

const EVALUATION_SYSTEM_PROMPT: &str = r#"You are a Senior Staff Engineer evaluating a technical project presentation.
Be critical of scalability, security, and implementation details.

BEHAVIOR:
- Ask ONE focused question per slide about what's shown
- If answer is vague/confusing/wrong, ask ONE follow-up to clarify
- If content is clear and well-explained, let them proceed
- Keep questions SHORT (under 20 words)
- Sound natural and encouraging

WHEN TO ASK A QUESTION:
- New slide/content appears -> Ask about it
- They explain something -> Probe deeper with "How does X work?" or "Why did you choose Y?"
- Unclear answer -> "Can you clarify what you mean by...?"

WHEN TO LET THEM PROCEED (response_type: proceed):
- They answered your question satisfactorily
- Content is self-explanatory and they explained it well
- They ask "Should I move on?" -> Let them proceed and set presenter_asked_question

If the presenter is speaking clearly and content matches the screen, output MINIMAL JSON:
{"response_type":"proceed"}

FULL OUTPUT FORMAT (when a question is needed):
{"score":<0-10>,"conflict_detected":<true/false>,"conflict_description":"<what differs, if anything>","feedback":"<brief>","next_response":"<your SHORT question or acknowledgment>","response_type":"<question|acknowledgment|proceed|remediation>","topic":"<current topic>","needs_followup":<true if their answer was weak>,"technical_depth":<0-10>,"clarity":<0-10>,"visual_quality":<0-10>,"presenter_asked_question":<true/false>}"#;

const OPENING_SYSTEM_PROMPT: &str =
    "You are a friendly, professional technical interviewer starting a presentation session.";

const OPENING_PROMPT: &str = "Generate a brief, warm opening (under 30 words). Ask their name and what project they're presenting. Sound friendly and natural. Output only the greeting.";

const SUMMARY_SYSTEM_PROMPT: &str = r#"You are generating a COMPREHENSIVE interview evaluation report.

Generate a detailed JSON evaluation with these EXACT fields:
{
    "overall_score": <0-100>,
    "category_scores": {
        "technical_depth": <0-100>,
        "clarity_of_explanation": <0-100>,
        "originality": <0-100>,
        "implementation_understanding": <0-100>,
        "presentation_formatting": <0-100>,
        "visual_aids_quality": <0-100>,
        "diagrams_and_charts": <0-100>,
        "code_quality": <0-100>,
        "problem_solving": <0-100>,
        "communication_skills": <0-100>
    },
    "strengths": ["<specific strength with example>", "..."],
    "weaknesses": ["<specific weakness with suggestion>", "..."],
    "visual_feedback": {
        "slide_design": "<feedback on slide design, colors, layout>",
        "diagrams": "<feedback on diagrams, flowcharts if any>",
        "code_presentation": "<feedback on how code was shown>",
        "suggestions": "<specific visual improvement suggestions>"
    },
    "content_feedback": {
        "structure": "<feedback on presentation structure>",
        "depth": "<was content deep enough?>",
        "missing_topics": "<any topics that should have been covered>"
    },
    "summary": "<3-4 sentence personalized overall assessment>",
    "recommendation": "<PASS/NEEDS_IMPROVEMENT/FAIL with brief reason>"
}

Be SPECIFIC - reference actual content from the presentation."#;

/// The language model side of the interview.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Judges one finalized transcript against what is on screen.
    async fn evaluate(
        &self,
        transcript: &str,
        visual_context: &str,
        history: &[Turn],
    ) -> ServiceResult<EvaluationResult>;

    async fn generate_opening(&self) -> ServiceResult<String>;

    async fn generate_summary(
        &self,
        history: &[Turn],
        visual_contexts: &[String],
    ) -> ServiceResult<Summary>;
}

/// Aggregates over a session's turns, on the 0..=10 turn scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryStats {
    pub turns: usize,
    pub average: f64,
    pub technical_depth: f64,
    pub clarity: f64,
    pub visual_quality: f64,
    pub conflicts: usize,
}

impl HistoryStats {
    pub fn from_history(history: &[Turn]) -> Self {
        let mean = |f: fn(&Turn) -> f64, empty: f64| {
            if history.is_empty() {
                empty
            } else {
                history.iter().map(f).sum::<f64>() / history.len() as f64
            }
        };
        Self {
            turns: history.len(),
            average: mean(|t| t.score, 5.0),
            technical_depth: mean(|t| t.scores.technical_depth, 5.0),
            clarity: mean(|t| t.scores.clarity, 5.0),
            visual_quality: mean(|t| t.scores.visual_quality, 5.0),
            conflicts: history.iter().filter(|t| t.conflict).count(),
        }
    }

    fn percent(value: f64) -> u32 {
        (value * 10.0).round().clamp(0.0, 100.0) as u32
    }

    pub fn overall_percent(&self) -> u32 {
        Self::percent(self.average)
    }

    pub fn recommendation(&self) -> &'static str {
        if self.average >= 6.0 {
            "PASS"
        } else if self.average >= 4.0 {
            "NEEDS_IMPROVEMENT"
        } else {
            "FAIL"
        }
    }

    fn category_scores(&self) -> BTreeMap<String, u32> {
        let overall = self.overall_percent();
        let tech = Self::percent(self.technical_depth);
        let clarity = Self::percent(self.clarity);
        let visual = Self::percent(self.visual_quality);
        [
            ("technical_depth", tech),
            ("clarity_of_explanation", clarity),
            ("originality", 50),
            ("implementation_understanding", overall),
            ("presentation_formatting", visual),
            ("visual_aids_quality", visual),
            ("diagrams_and_charts", 50),
            ("code_quality", 50),
            ("problem_solving", overall),
            ("communication_skills", clarity),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn headline(&self) -> String {
        format!(
            "Completed {} topics with average score {:.1}/10.",
            self.turns, self.average
        )
    }
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Report built from the history alone, used when the model is unavailable.
pub fn summarize_locally(history: &[Turn]) -> Summary {
    if history.is_empty() {
        return Summary::empty();
    }
    let stats = HistoryStats::from_history(history);
    Summary {
        overall_score: stats.overall_percent(),
        category_scores: stats.category_scores(),
        strengths: vec![
            "Completed presentation".to_string(),
            "Engaged with questions".to_string(),
        ],
        weaknesses: vec![
            "Review technical accuracy".to_string(),
            "Add more visual aids".to_string(),
        ],
        visual_feedback: string_map(&[
            ("slide_design", "Could not fully evaluate"),
            ("diagrams", "Consider adding diagrams"),
            ("code_presentation", "Standard code display"),
            ("suggestions", "Add visual flowcharts and architecture diagrams"),
        ]),
        content_feedback: string_map(&[
            ("structure", "Standard presentation structure"),
            ("depth", "Adequate technical depth"),
            ("missing_topics", "None identified"),
        ]),
        summary: stats.headline(),
        recommendation: stats.recommendation().to_string(),
    }
}

fn as_percent(value: &Value) -> Option<u32> {
    value
        .as_f64()
        .map(|v| v.round().clamp(0.0, 100.0) as u32)
}

fn as_strings(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    (!items.is_empty()).then_some(items)
}

fn as_text_map(value: &Value) -> Option<BTreeMap<String, String>> {
    let map: BTreeMap<String, String> = value
        .as_object()?
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect();
    (!map.is_empty()).then_some(map)
}

fn as_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Builds a [`Summary`] from model output, taking every missing or
/// mistyped field from `stats`.
pub fn fill_summary(raw: &Map<String, Value>, stats: &HistoryStats) -> Summary {
    let field = |name: &str| raw.get(name).unwrap_or(&Value::Null);

    let category_scores = field("category_scores")
        .as_object()
        .map(|scores| {
            scores
                .iter()
                .filter_map(|(k, v)| as_percent(v).map(|p| (k.clone(), p)))
                .collect::<BTreeMap<_, _>>()
        })
        .filter(|scores| !scores.is_empty())
        .unwrap_or_else(|| stats.category_scores());

    Summary {
        overall_score: as_percent(field("overall_score")).unwrap_or(stats.overall_percent()),
        category_scores,
        strengths: as_strings(field("strengths"))
            .unwrap_or_else(|| vec!["Completed the presentation".to_string()]),
        weaknesses: as_strings(field("weaknesses"))
            .unwrap_or_else(|| vec!["Could provide more technical depth".to_string()]),
        visual_feedback: as_text_map(field("visual_feedback")).unwrap_or_else(|| {
            string_map(&[
                ("slide_design", "Standard presentation format"),
                ("diagrams", "Consider adding more visual diagrams"),
                ("code_presentation", "Code was shown during presentation"),
                ("suggestions", "Add more visual aids to support explanations"),
            ])
        }),
        content_feedback: as_text_map(field("content_feedback")).unwrap_or_else(|| {
            string_map(&[
                ("structure", "Presentation had a logical flow"),
                ("depth", "Technical content was covered"),
                ("missing_topics", "None identified"),
            ])
        }),
        summary: as_text(field("summary")).unwrap_or_else(|| stats.headline()),
        recommendation: as_text(field("recommendation"))
            .unwrap_or_else(|| stats.recommendation().to_string()),
    }
}

/// Keys of an evaluation reply; an object with none of them is not one.
const EVALUATION_FIELDS: &[&str] = &[
    "score",
    "conflict_detected",
    "conflict_description",
    "feedback",
    "next_response",
    "next_question",
    "response_type",
    "topic",
    "needs_followup",
    "technical_depth",
    "clarity",
    "visual_quality",
    "presenter_asked_question",
];

/// A number, or a string holding one. Anything else is treated as absent.
fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parses the model's evaluation reply.
///
/// Fields are read one by one so that a single mistyped value does not
/// discard the rest of the answer. A `"proceed"` reply starts from
/// [`EvaluationResult::proceed`]; any other from the default result.
pub fn parse_evaluation(content: &str) -> ServiceResult<EvaluationResult> {
    let json = extract_json_object(content)
        .ok_or_else(|| ServiceError::Malformed("no JSON object in evaluation".to_string()))?;
    let value: Value = serde_json::from_str(json)?;
    let object = value
        .as_object()
        .ok_or_else(|| ServiceError::Malformed("evaluation is not an object".to_string()))?;
    if !EVALUATION_FIELDS.iter().any(|key| object.contains_key(*key)) {
        return Err(ServiceError::Malformed(
            "evaluation has no recognized fields".to_string(),
        ));
    }
    let field = |name: &str| object.get(name).unwrap_or(&Value::Null);

    let response_type = serde_json::from_value::<ResponseType>(field("response_type").clone()).ok();
    let mut result = match response_type {
        Some(ResponseType::Proceed) => EvaluationResult::proceed("continuing"),
        Some(other) => EvaluationResult {
            response_type: other,
            ..EvaluationResult::default()
        },
        None => EvaluationResult::default(),
    };

    if let Some(score) = as_score(field("score")) {
        result.score = score;
    }
    if let Some(topic) = as_text(field("topic")) {
        result.topic = topic;
    }
    if let Some(feedback) = as_text(field("feedback")) {
        result.feedback = feedback;
    }
    if let Some(text) = as_text(field("next_response")).or_else(|| as_text(field("next_question")))
    {
        result.next_response = text;
    }
    if let Some(description) = as_text(field("conflict_description")) {
        result.conflict_description = description;
    }
    result.conflict_detected = as_flag(field("conflict_detected")).unwrap_or(false);
    result.needs_followup = as_flag(field("needs_followup")).unwrap_or(false);
    result.presenter_asked_question =
        as_flag(field("presenter_asked_question")).unwrap_or(false);
    result.technical_depth = as_score(field("technical_depth"));
    result.clarity = as_score(field("clarity"));
    result.visual_quality = as_score(field("visual_quality"));
    Ok(result)
}

fn ordinal(n: u32) -> &'static str {
    match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

fn format_recent_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "This is the first question.".to_string();
    }
    let start = history.len().saturating_sub(RECENT_TURNS);
    history[start..]
        .iter()
        .map(|turn| {
            format!(
                "- Q{}: {}",
                turn.sequence,
                truncate_chars(&turn.question, 100)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-session conversational memory.
#[derive(Debug, Default)]
struct Memory {
    messages: Vec<ChatMessage>,
    pending_followup: Option<String>,
    followup_attempts: HashMap<String, u32>,
}

impl Memory {
    fn remember(&mut self, message: ChatMessage) {
        self.messages.push(message);
        let excess = self.messages.len().saturating_sub(MEMORY_MESSAGES);
        self.messages.drain(..excess);
    }

    fn followup_context(&self) -> String {
        let Some(topic) = &self.pending_followup else {
            return String::new();
        };
        let attempt = self.followup_attempts.get(topic).copied().unwrap_or(0) + 1;
        format!(
            "\n## FOLLOW-UP CONTEXT:\nThis is the student's {attempt}{} attempt explaining: {topic}\nPreviously they scored low. Be encouraging and see if they've improved.\nIf this is attempt 2+, give a final score.",
            ordinal(attempt)
        )
    }

    fn track_followup(&mut self, result: &EvaluationResult) {
        let topic = result.topic.clone();
        if result.needs_followup {
            let attempts = self.followup_attempts.entry(topic.clone()).or_insert(0);
            *attempts += 1;
            if *attempts < MAX_FOLLOWUP_ATTEMPTS {
                self.pending_followup = Some(topic);
                return;
            }
        }
        if self.pending_followup.as_deref() == Some(topic.as_str()) {
            self.pending_followup = None;
        }
    }
}

/// Models used by [`GroqEvaluator`].
#[derive(Debug, Clone)]
pub struct EvaluatorModels {
    /// Report and opening generation.
    pub main: String,
    /// Per-transcript evaluation, where latency matters.
    pub fast: String,
}

/// Evaluator backed by an OpenAI compatible chat endpoint.
///
/// Holds conversational memory, so each session gets its own instance.
pub struct GroqEvaluator {
    chat: ChatClient,
    models: EvaluatorModels,
    memory: Mutex<Memory>,
}

impl GroqEvaluator {
    pub fn new(chat: ChatClient, models: EvaluatorModels) -> Self {
        Self {
            chat,
            models,
            memory: Mutex::new(Memory::default()),
        }
    }

    fn evaluation_context(
        transcript: &str,
        visual_context: &str,
        history: &[Turn],
        followup: &str,
    ) -> String {
        let screen = if visual_context.trim().is_empty() {
            "No screen content captured yet"
        } else {
            visual_context
        };
        format!(
            "## SCREEN CONTENT:\n{screen}\n\n## STUDENT'S EXPLANATION:\n\"{transcript}\"\n\n## PREVIOUS CONTEXT:\n{}{followup}\n\nRemember: Ask only ONE question. Be encouraging. Evaluate and respond with JSON only.",
            format_recent_history(history)
        )
    }

    fn summary_prompt(history: &[Turn], visual_contexts: &[String], stats: &HistoryStats) -> String {
        let mut prompt = format!(
            "Analyze this complete interview and generate a DETAILED evaluation report.\n\n## INTERVIEW STATISTICS:\n- Total Topics Discussed: {}\n- Average Score: {:.1}/10\n- Average Technical Depth: {:.1}/10\n- Average Clarity: {:.1}/10\n- Average Visual Quality: {:.1}/10\n- Conflicts Detected: {}\n\n## DETAILED INTERACTION HISTORY:\n",
            stats.turns,
            stats.average,
            stats.technical_depth,
            stats.clarity,
            stats.visual_quality,
            stats.conflicts
        );
        for (i, turn) in history.iter().enumerate() {
            let conflict = if turn.conflict {
                format!("Yes - {}", turn.conflict_description)
            } else {
                "No".to_string()
            };
            let _ = writeln!(
                prompt,
                "Topic {}: {}\n  - Score: {}/10\n  - Technical Depth: {}/10\n  - Clarity: {}/10\n  - Visual Quality: {}/10\n  - Conflict: {conflict}\n  - Presenter said: {}...\n  - AI feedback: {}",
                i + 1,
                turn.topic,
                turn.score,
                turn.scores.technical_depth,
                turn.scores.clarity,
                turn.scores.visual_quality,
                truncate_chars(&turn.transcript, 150),
                turn.feedback
            );
        }

        let recent: Vec<_> = visual_contexts[visual_contexts.len().saturating_sub(5)..]
            .iter()
            .filter(|ctx| !ctx.is_empty())
            .map(|ctx| format!("- {}", truncate_chars(ctx, 200)))
            .collect();
        if !recent.is_empty() {
            let _ = write!(
                prompt,
                "\n## VISUAL CONTENT OBSERVED:\nThe presentation included the following visual elements:\n{}\n",
                recent.join("\n")
            );
        }

        prompt.push_str("\nBased on this complete interview data, generate the comprehensive JSON evaluation.\nInclude SPECIFIC examples from the presentation in strengths and weaknesses.\nProvide actionable feedback on visuals, slides, and diagrams.");
        prompt
    }
}

#[async_trait]
impl Evaluator for GroqEvaluator {
    async fn evaluate(
        &self,
        transcript: &str,
        visual_context: &str,
        history: &[Turn],
    ) -> ServiceResult<EvaluationResult> {
        let messages = {
            let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            let context = Self::evaluation_context(
                transcript,
                visual_context,
                history,
                &memory.followup_context(),
            );
            memory.remember(ChatMessage::user(context));
            std::iter::once(ChatMessage::system(EVALUATION_SYSTEM_PROMPT))
                .chain(memory.messages.iter().cloned())
                .collect()
        };

        let request = ChatRequest {
            model: &self.models.fast,
            messages,
            temperature: 0.2,
            max_tokens: 200,
        };
        let content = self.chat.complete(&request).await?;
        let result = parse_evaluation(&content)?;

        if result.response_type == ResponseType::Proceed && !result.has_response() {
            tracing::debug!("evaluator says proceed on '{}'", result.topic);
            return Ok(result);
        }

        let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        memory.track_followup(&result);
        memory.remember(ChatMessage::assistant(result.next_response.clone()));
        Ok(result)
    }

    async fn generate_opening(&self) -> ServiceResult<String> {
        let request = ChatRequest {
            model: &self.models.main,
            messages: vec![
                ChatMessage::system(OPENING_SYSTEM_PROMPT),
                ChatMessage::user(OPENING_PROMPT),
            ],
            temperature: 0.7,
            max_tokens: 80,
        };
        let opening = self.chat.complete(&request).await?;
        if opening.is_empty() {
            return Err(ServiceError::Malformed("empty opening".to_string()));
        }
        Ok(opening)
    }

    async fn generate_summary(
        &self,
        history: &[Turn],
        visual_contexts: &[String],
    ) -> ServiceResult<Summary> {
        let stats = HistoryStats::from_history(history);
        let request = ChatRequest {
            model: &self.models.main,
            messages: vec![
                ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
                ChatMessage::user(Self::summary_prompt(history, visual_contexts, &stats)),
            ],
            temperature: 0.3,
            max_tokens: 1000,
        };
        let content = self.chat.complete(&request).await?;
        let json = extract_json_object(&content)
            .ok_or_else(|| ServiceError::Malformed("no JSON object in summary".to_string()))?;
        let raw: Map<String, Value> = serde_json::from_str(json)?;
        let summary = fill_summary(&raw, &stats);
        tracing::info!("summary generated: {}/100", summary.overall_score);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(sequence: u32, score: f64, conflict: bool) -> Turn {
        let eval = EvaluationResult {
            score,
            conflict_detected: conflict,
            next_response: format!("question {sequence}"),
            topic: format!("topic {sequence}"),
            ..EvaluationResult::default()
        };
        Turn::from_evaluation(sequence, "we shard by user id", &eval, "TYPE: Diagram")
    }

    #[test]
    fn minimal_proceed_expands_to_neutral_result() {
        let result = parse_evaluation("```json\n{\"response_type\":\"proceed\"}\n```").unwrap();
        assert_eq!(result.response_type, ResponseType::Proceed);
        assert_eq!(result.score, 7.0);
        assert_eq!(result.topic, "continuing");
        assert!(!result.has_response());
    }

    #[test]
    fn full_evaluation_is_parsed() {
        let content = r#"Here you go: {"score":8,"conflict_detected":true,"conflict_description":"slide says 10ms","feedback":"solid","next_response":"Why a B-tree?","response_type":"question","topic":"indexing","needs_followup":false,"clarity":9}"#;
        let result = parse_evaluation(content).unwrap();
        assert_eq!(result.score, 8.0);
        assert!(result.conflict_detected);
        assert_eq!(result.next_response, "Why a B-tree?");
        assert_eq!(result.clarity, Some(9.0));
        assert_eq!(result.technical_depth, None);
    }

    #[test]
    fn unparseable_evaluation_is_malformed() {
        assert!(matches!(
            parse_evaluation("I think that was great"),
            Err(ServiceError::Malformed(_))
        ));
        assert!(matches!(
            parse_evaluation("[1, 2, 3]"),
            Err(ServiceError::Malformed(_))
        ));
        assert!(matches!(
            parse_evaluation("{\"verdict\": \"fine\"}"),
            Err(ServiceError::Malformed(_))
        ));
    }

    #[test]
    fn mistyped_score_keeps_the_rest_of_the_answer() {
        let null = parse_evaluation(
            r#"{"score":null,"next_response":"Why a B-tree?","topic":"indexing"}"#,
        )
        .unwrap();
        assert_eq!(null.score, 5.0);
        assert_eq!(null.next_response, "Why a B-tree?");
        assert_eq!(null.topic, "indexing");

        let text = parse_evaluation(r#"{"score":"8","next_response":"Why a B-tree?"}"#).unwrap();
        assert_eq!(text.score, 8.0);
        assert_eq!(text.next_response, "Why a B-tree?");

        let word = parse_evaluation(r#"{"score":"high","next_question":"And writes?"}"#).unwrap();
        assert_eq!(word.score, 5.0);
        assert_eq!(word.next_response, "And writes?");
    }

    #[test]
    fn loose_flags_and_sub_scores_are_read() {
        let result = parse_evaluation(
            r#"{"score":6,"conflict_detected":"true","needs_followup":"no","clarity":"7.5","technical_depth":[1]}"#,
        )
        .unwrap();
        assert!(result.conflict_detected);
        assert!(!result.needs_followup);
        assert_eq!(result.clarity, Some(7.5));
        assert_eq!(result.technical_depth, None);
    }

    #[test]
    fn proceed_reply_keeps_its_other_fields() {
        let result = parse_evaluation(r#"{"response_type":"proceed","score":9}"#).unwrap();
        assert_eq!(result.response_type, ResponseType::Proceed);
        assert_eq!(result.score, 9.0);
        assert_eq!(result.topic, "continuing");
        assert_eq!(result.feedback, "Good explanation");

        let topical = parse_evaluation(
            r#"{"response_type":"proceed","topic":"sharding","feedback":"clear","presenter_asked_question":true}"#,
        )
        .unwrap();
        assert_eq!(topical.topic, "sharding");
        assert_eq!(topical.feedback, "clear");
        assert!(topical.presenter_asked_question);
    }

    #[test]
    fn stats_average_history() {
        let history = vec![turn(1, 8.0, false), turn(2, 4.0, true)];
        let stats = HistoryStats::from_history(&history);
        assert_eq!(stats.turns, 2);
        assert_eq!(stats.average, 6.0);
        assert_eq!(stats.visual_quality, 5.0);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.overall_percent(), 60);
        assert_eq!(stats.recommendation(), "PASS");
    }

    #[test]
    fn missing_summary_fields_come_from_stats() {
        let history = vec![turn(1, 3.0, false)];
        let stats = HistoryStats::from_history(&history);
        let raw: Map<String, Value> = serde_json::from_str(
            r#"{"overall_score": 72.4, "strengths": ["clear diagrams"], "weaknesses": "none"}"#,
        )
        .unwrap();

        let summary = fill_summary(&raw, &stats);
        assert_eq!(summary.overall_score, 72);
        assert_eq!(summary.strengths, vec!["clear diagrams".to_string()]);
        assert_eq!(summary.weaknesses.len(), 1);
        assert_eq!(summary.category_scores["technical_depth"], 30);
        assert_eq!(summary.recommendation, "FAIL");
        assert!(summary.summary.starts_with("Completed 1 topics"));
    }

    #[test]
    fn local_summary_handles_empty_history() {
        assert_eq!(summarize_locally(&[]), Summary::empty());
        let summary = summarize_locally(&[turn(1, 5.0, false)]);
        assert_eq!(summary.overall_score, 50);
        assert_eq!(summary.recommendation, "NEEDS_IMPROVEMENT");
    }

    #[test]
    fn followups_are_capped_per_topic() {
        let mut memory = Memory::default();
        let weak = EvaluationResult {
            topic: "caching".to_string(),
            needs_followup: true,
            ..EvaluationResult::default()
        };
        memory.track_followup(&weak);
        assert_eq!(memory.pending_followup.as_deref(), Some("caching"));
        assert!(memory.followup_context().contains("2nd attempt"));

        memory.track_followup(&weak);
        assert_eq!(memory.pending_followup, None);
        assert_eq!(memory.followup_context(), "");
    }

    #[test]
    fn memory_keeps_the_latest_messages() {
        let mut memory = Memory::default();
        for i in 0..6 {
            memory.remember(ChatMessage::user(format!("m{i}")));
        }
        assert_eq!(memory.messages.len(), MEMORY_MESSAGES);
        assert_eq!(memory.messages[0].content, Value::String("m2".to_string()));
    }

    #[test]
    fn recent_history_quotes_last_three_questions() {
        let history: Vec<_> = (1..=5).map(|i| turn(i, 5.0, false)).collect();
        let text = format_recent_history(&history);
        assert!(!text.contains("Q2"));
        assert!(text.starts_with("- Q3: question 3"));
        assert_eq!(format_recent_history(&[]), "This is the first question.");
    }
}
