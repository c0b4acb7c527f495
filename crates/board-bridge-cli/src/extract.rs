//! # Clarification Extraction Module
//!
//! Finds clarification questions in a generated spec artifact.
//!
//! Two paths produce the same [`ClarificationQuestion`] shape: an LLM
//! completion prompted to return a JSON array, and a regex scan for
//! `[NEEDS CLARIFICATION: ...]` markers used when no completion endpoint is
//! configured.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[NEEDS CLARIFICATION:\s*([^\]]+)\]").expect("valid regex"))
}

fn block_end_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A question block ends at the next section header or horizontal rule.
    PATTERN.get_or_init(|| Regex::new(r"\n\s*#{1,6}\s+|\n\s*---\s*\n").expect("valid regex"))
}

fn answer_options_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\*\*Suggested Answers\*\*:?\s*\n\n(.+?)(?:\n\n\*\*Your choice\*\*|\n\n---|$)")
            .expect("valid regex")
    })
}

// ============================================================================
// Core Types
// ============================================================================

/// One clarification question mined from a spec artifact
///
/// This is the JSON shape written by `extract` and read by `file-issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub topic: String,
    pub question: String,
    pub context: String,

    #[serde(default)]
    pub answer_options: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_option: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_answer: Option<String>,
}

// ============================================================================
// Marker scan
// ============================================================================

/// Extract clarification markers with surrounding context.
///
/// Fallback path when no completion endpoint is configured; finds every
/// `[NEEDS CLARIFICATION: ...]` marker, captures up to 200 characters of
/// preceding context, and picks up a `**Suggested Answers**` block when one
/// follows the marker.
pub fn extract_markers(spec_content: &str) -> Vec<ClarificationQuestion> {
    let mut questions = Vec::new();

    for captures in marker_pattern().captures_iter(spec_content) {
        let question = captures[1].trim().to_string();
        let marker = captures.get(0).expect("capture 0 always present");

        let context = tail_chars(&spec_content[..marker.start()], 200)
            .trim()
            .to_string();

        let after_marker = &spec_content[marker.start()..];
        let block_end = block_end_pattern()
            .find(after_marker)
            .map(|m| m.start())
            .unwrap_or(after_marker.len());
        let block = &after_marker[..block_end];

        let answer_options = answer_options_pattern()
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();

        questions.push(ClarificationQuestion {
            topic: topic_from_question(&question),
            question,
            context,
            answer_options,
            recommended_option: None,
            suggested_answer: None,
        });
    }

    questions
}

/// Derive a short topic from the question text: question markers removed,
/// clipped to 50 characters.
fn topic_from_question(question: &str) -> String {
    let clean = question.replace('?', "");
    let clean = clean.trim();

    let clipped: String = clean.chars().take(50).collect();
    if clipped.chars().count() < clean.chars().count() {
        format!("{clipped}...")
    } else {
        clipped
    }
}

/// Last `count` characters of a string, on a char boundary
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

// ============================================================================
// LLM response parsing
// ============================================================================

/// Parse a completion response into questions.
///
/// Strips markdown code fences the model may wrap around the JSON despite
/// instructions.
pub fn parse_llm_questions(
    response: &str,
) -> Result<Vec<ClarificationQuestion>, serde_json::Error> {
    let mut json = response.trim().to_string();

    if json.starts_with("```json") {
        json = json.replace("```json", "").replace("```", "");
    } else if json.starts_with("```") {
        json = json.replace("```", "");
    }

    serde_json::from_str(json.trim())
}

// ============================================================================
// Markdown rendering
// ============================================================================

/// Render the human-readable clarifications document
pub fn render_clarifications_md(
    questions: &[ClarificationQuestion],
    feature_name: &str,
    spec_link: &str,
) -> String {
    let created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    let mut content = format!(
        "# Clarification Questions: {feature_name}\n\n\
         **Feature**: [{spec_link}]({spec_link})  \n\
         **Created**: {created}  \n\
         **Status**: Open  \n\
         **Total Questions**: {}\n\n\
         ---\n\n",
        questions.len()
    );

    for (index, question) in questions.iter().enumerate() {
        content.push_str(&format!(
            "## Question {}: {}\n\n\
             **Context**: {}\n\n\
             **Question**: {}\n\n",
            index + 1,
            question.topic,
            question.context,
            question.question
        ));

        if !question.answer_options.trim().is_empty() {
            content.push_str(&format!(
                "**Answer Options**:\n\n{}\n\n",
                question.answer_options
            ));
        }

        content.push_str("**Answer**: _Pending_\n\n**Work Item**: _To be created_\n\n---\n\n");
    }

    content.push_str(
        "## Resolution Notes\n\n\
         _This section will be populated when questions are answered._\n",
    );

    content
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
