//! # Event Normalization Module
//!
//! Extracts a canonical [`WorkItemEvent`] from a loosely-structured Service
//! Hook payload.
//!
//! Service Hook payloads carry complete work-item state in different places
//! depending on the subscription shape: a detailed per-revision field bag
//! (`resource.revision.fields`, scalar values) or a flat field bag
//! (`resource.fields`, whose values may be `{oldValue, newValue}` change
//! records). Normalization resolves these shape variants once so that no
//! downstream code has to sniff payload shapes.

use crate::WorkItemId;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Matches an email-like identifier inside angle brackets, as produced by the
/// `"Display Name <email>"` identity string form.
fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<([^<>\s]+@[^<>\s]+)>").expect("valid regex"))
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for payloads that cannot be normalized at all
///
/// Only the work-item identifier is load-bearing at this stage; every other
/// parsing inconsistency degrades the corresponding field to empty/`None` and
/// is left for validation to reject.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Missing resource.workItemId in payload")]
    MissingWorkItemId,

    #[error("resource.workItemId is not an integer: '{actual}'")]
    NonNumericWorkItemId { actual: String },
}

// ============================================================================
// Normalized Event
// ============================================================================

/// Canonical view of one inbound work-item event
///
/// Created once per inbound event, immutable afterward, and discarded when
/// the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemEvent {
    pub work_item_id: WorkItemId,
    pub event_type: String,
    pub work_item_type: String,
    pub assignee_display_name: String,
    pub board_column: String,
    pub board_column_done: bool,
    pub title: String,
    pub description: String,

    /// Email-like identifier of the user who made the change, when it could
    /// be resolved from the payload. Never a raw GUID; `None` until a
    /// best-effort revision lookup fills it in later.
    pub changed_by: Option<String>,
}

impl WorkItemEvent {
    /// Normalize a raw Service Hook payload.
    ///
    /// Fails only when `resource.workItemId` is absent or non-numeric; any
    /// other inconsistency degrades the affected field.
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let resource = payload.get("resource").unwrap_or(&Value::Null);

        let work_item_id = match resource.get("workItemId") {
            None | Some(Value::Null) => return Err(PayloadError::MissingWorkItemId),
            Some(value) => parse_work_item_id(value)?,
        };

        // Prefer the per-revision field bag when present; it carries the
        // complete scalar state. The flat bag only carries changed fields,
        // usually as change records.
        let fields = resource
            .pointer("/revision/fields")
            .filter(|bag| bag.is_object())
            .or_else(|| resource.get("fields"))
            .unwrap_or(&Value::Null);

        let assignee = Identity::parse(scalar(fields, "System.AssignedTo"));

        let changed_by = resource
            .get("revisedBy")
            .and_then(identifier_from)
            .or_else(|| scalar(fields, "System.ChangedBy").and_then(identifier_from));

        Ok(Self {
            work_item_id,
            event_type: payload
                .get("eventType")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            work_item_type: scalar_str(fields, "System.WorkItemType"),
            assignee_display_name: assignee.display_name,
            board_column: scalar_str(fields, "System.BoardColumn"),
            board_column_done: scalar_bool(fields, "System.BoardColumnDone"),
            title: scalar_str(fields, "System.Title"),
            description: scalar_str(fields, "System.Description"),
            changed_by,
        })
    }
}

fn parse_work_item_id(value: &Value) -> Result<WorkItemId, PayloadError> {
    let non_numeric = || PayloadError::NonNumericWorkItemId {
        actual: value.to_string(),
    };

    match value {
        Value::Number(n) => n.as_u64().map(WorkItemId::new).ok_or_else(non_numeric),
        // Some hook configurations stringify numeric fields.
        Value::String(s) => s.parse::<u64>().map(WorkItemId::new).map_err(|_| non_numeric()),
        _ => Err(non_numeric()),
    }
}

// ============================================================================
// Field bag access
// ============================================================================

/// Look up a field value, unwrapping `{oldValue, newValue}` change records to
/// their `newValue`.
fn scalar<'a>(bag: &'a Value, key: &str) -> Option<&'a Value> {
    let value = bag.get(key)?;
    match value.get("newValue") {
        Some(new_value) => Some(new_value),
        None => Some(value),
    }
}

fn scalar_str(bag: &Value, key: &str) -> String {
    scalar(bag, key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn scalar_bool(bag: &Value, key: &str) -> bool {
    match scalar(bag, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

// ============================================================================
// Identity parsing
// ============================================================================

/// A work-item identity field resolved from either of its two known shapes:
/// a structured `{displayName, uniqueName}` record or a
/// `"Display Name <email>"` string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Identity {
    pub display_name: String,
    pub unique_name: Option<String>,
}

impl Identity {
    pub(crate) fn parse(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(record)) => Self {
                display_name: record
                    .get("displayName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                unique_name: record
                    .get("uniqueName")
                    .and_then(Value::as_str)
                    .filter(|name| name.contains('@'))
                    .map(str::to_string),
            },
            Some(Value::String(encoded)) => {
                let display_name = encoded
                    .split('<')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let unique_name = email_pattern()
                    .captures(encoded)
                    .map(|captures| captures[1].to_string());
                Self {
                    display_name,
                    unique_name,
                }
            }
            _ => Self::default(),
        }
    }
}

/// Extract an email-like identifier from an identity value of any known
/// shape. Candidates without an `@` (raw GUIDs, bare display names) are not
/// identifiers and are skipped.
pub(crate) fn identifier_from(value: &Value) -> Option<String> {
    match value {
        Value::Object(record) => record
            .get("uniqueName")
            .and_then(Value::as_str)
            .filter(|name| name.contains('@'))
            .map(str::to_string)
            .or_else(|| {
                record
                    .get("name")
                    .and_then(Value::as_str)
                    .and_then(|name| {
                        email_pattern()
                            .captures(name)
                            .map(|captures| captures[1].to_string())
                    })
            }),
        Value::String(encoded) => email_pattern()
            .captures(encoded)
            .map(|captures| captures[1].to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
