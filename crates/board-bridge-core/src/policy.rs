//! # Dispatch Policy Module
//!
//! Decides whether a normalized work-item event qualifies for workflow
//! dispatch.
//!
//! The policy is an ordered rule chain: the first failing rule wins and no
//! later rule is evaluated. Validation is a pure function over its inputs,
//! so it is trivially safe under any concurrency model and testable with
//! table-driven cases.

use crate::config::PolicyConfig;
use crate::event::WorkItemEvent;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// Outcome of policy validation
///
/// Rejection reasons are diagnostic and stable in wording per rule; callers
/// log them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Accepted,
    Rejected { reason: String },
}

impl ValidationResult {
    /// Check if the event passed all rules
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Get the rejection reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

/// Rule set a work-item event must satisfy to trigger a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Exact event type the Service Hook subscription fires for
    pub trigger_event_type: String,

    /// Exact work-item type that is eligible for dispatch
    pub required_work_item_type: String,

    /// Assignee display name to match, compared case-insensitively
    pub assignee_match: String,

    /// Board column the item must occupy. May carry a " – Doing" or
    /// " – Done" sub-state suffix; the suffix is stripped before comparison
    /// because the board reports a single column name regardless of
    /// sub-state.
    pub required_column: String,
}

impl DispatchPolicy {
    /// Build a policy from the loaded configuration section
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            trigger_event_type: config.trigger_event_type.clone(),
            required_work_item_type: config.work_item_type.clone(),
            assignee_match: config.assignee_match.clone(),
            required_column: config.column_name.clone(),
        }
    }

    /// Apply the ordered rule chain to a normalized event.
    ///
    /// Rules, in order:
    /// 1. event type matches exactly (case-sensitive)
    /// 2. work-item type matches exactly (case-sensitive)
    /// 3. assignee display name matches (case-insensitive)
    /// 4. board column matches the expected column's base name
    /// 5. the column's done sub-state is false (item is in "Doing")
    pub fn validate(&self, event: &WorkItemEvent) -> ValidationResult {
        if event.event_type != self.trigger_event_type {
            return ValidationResult::Rejected {
                reason: format!("Invalid event type: {}", event.event_type),
            };
        }

        if event.work_item_type != self.required_work_item_type {
            return ValidationResult::Rejected {
                reason: format!(
                    "Invalid work item type: {} (expected {})",
                    event.work_item_type, self.required_work_item_type
                ),
            };
        }

        if event.assignee_display_name.to_lowercase() != self.assignee_match.to_lowercase() {
            return ValidationResult::Rejected {
                reason: format!(
                    "Assignee mismatch: '{}' (expected '{}')",
                    event.assignee_display_name, self.assignee_match
                ),
            };
        }

        let expected_column = base_column_name(&self.required_column);
        if event.board_column != expected_column {
            return ValidationResult::Rejected {
                reason: format!(
                    "Column mismatch: '{}' (expected '{}')",
                    event.board_column, expected_column
                ),
            };
        }

        if event.board_column_done {
            return ValidationResult::Rejected {
                reason: "Column state is 'Done' (expected 'Doing')".to_string(),
            };
        }

        ValidationResult::Accepted
    }
}

/// Strip a " – Doing" / " – Done" sub-state suffix from an expected column
/// name. The delimiter is an en-dash; the board never reports the suffix in
/// the actual column field.
pub fn base_column_name(name: &str) -> &str {
    name.strip_suffix(" \u{2013} Doing")
        .or_else(|| name.strip_suffix(" \u{2013} Done"))
        .unwrap_or(name)
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
