//! # Issue Filing Module
//!
//! Turns extracted clarification questions into child work items under the
//! originating feature.
//!
//! Each question gets an idempotency key derived from its text, so running
//! the tooling twice against the same spec files each question exactly once.

use crate::extract::ClarificationQuestion;
use board_bridge_core::{NewIssue, WorkItemError, WorkItemId, WorkItemWriter};
use sha2::{Digest, Sha256};
use tracing::warn;

// ============================================================================
// Core Types
// ============================================================================

/// Options controlling a filing run
#[derive(Debug, Clone, Default)]
pub struct FilingOptions {
    /// Branch name recorded in each issue description
    pub branch: Option<String>,

    /// Tags applied to each created issue
    pub tags: String,

    /// Assignee email/UPN for created issues
    pub assign: Option<String>,

    /// Print planned issues without creating anything
    pub dry_run: bool,
}

/// Counts from one filing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilingSummary {
    pub created: u32,
    pub skipped: u32,
}

// ============================================================================
// Idempotency
// ============================================================================

/// Idempotency key for one question under one parent:
/// `{parent}-{first 8 hex chars of sha256(question)}`
pub fn idempotency_key(parent: WorkItemId, question_text: &str) -> String {
    let digest = Sha256::digest(question_text.as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("{}-{}", parent, &hex[..8])
}

// ============================================================================
// Description layout
// ============================================================================

/// Build the issue description for one question
pub fn build_issue_description(
    question_number: usize,
    question: &ClarificationQuestion,
    branch: Option<&str>,
) -> String {
    let mut parts = vec![format!(
        "## Question {}: {}\n\n",
        question_number, question.topic
    )];

    if !question.context.is_empty() {
        parts.push(format!("**Context**: {}\n\n", question.context));
    }

    if let Some(recommended) = &question.recommended_option {
        parts.push(format!("**Recommended:** {recommended}\n\n"));
    } else if let Some(suggested) = &question.suggested_answer {
        parts.push(format!("**Suggested:** {suggested}\n\n"));
    }

    if !question.question.is_empty() {
        parts.push(format!(
            "**What we need to know**: {}\n\n",
            question.question
        ));
    }

    if !question.answer_options.is_empty() {
        parts.push(format!(
            "**Suggested Answers**:\n\n{}\n",
            question.answer_options
        ));
    }

    parts.push("**Your choice**: _[Awaiting response]_\n\n".to_string());
    parts.push("---\n\n".to_string());

    if let Some(branch) = branch {
        parts.push(format!("**Branch**: {branch}\n"));
    }

    parts.concat()
}

// ============================================================================
// Filing
// ============================================================================

/// File every question as a child issue under the parent feature.
///
/// A failure on one question is logged and the run continues with the next
/// one; the summary counts only what actually happened.
pub async fn file_issues(
    writer: &dyn WorkItemWriter,
    parent: WorkItemId,
    questions: &[ClarificationQuestion],
    options: &FilingOptions,
) -> Result<FilingSummary, WorkItemError> {
    let mut summary = FilingSummary::default();

    for (index, question) in questions.iter().enumerate() {
        let question_number = index + 1;
        let title = format!("Q{}: {}", question_number, question.topic);
        let description =
            build_issue_description(question_number, question, options.branch.as_deref());
        let key = idempotency_key(parent, &question.question);

        if options.dry_run {
            println!("[dry-run] would create '{title}' (idempotency key {key})");
            continue;
        }

        let issue = NewIssue {
            title: title.clone(),
            description,
            tags: options.tags.clone(),
            idempotency_key: key,
            assigned_to: options.assign.clone(),
        };

        match writer.create_child_issue(parent, &issue).await {
            Ok(Some(created)) => {
                println!("Created issue #{}: {}", created.id, title);
                summary.created += 1;
            }
            Ok(None) => {
                println!("Skipped '{title}' (already filed)");
                summary.skipped += 1;
            }
            Err(error) => {
                warn!(
                    parent_id = parent.as_u64(),
                    question = question_number,
                    error = %error,
                    "Issue creation failed, continuing with next question"
                );
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[path = "issues_tests.rs"]
mod tests;
