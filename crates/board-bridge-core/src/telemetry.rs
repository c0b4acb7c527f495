//! # Telemetry Module
//!
//! Correlation and outcome classification for one inbound event.
//!
//! Every inbound event gets exactly one [`crate::CorrelationId`]; all
//! terminal outcomes are recorded as structured tracing events carrying the
//! correlation id, the work-item id once known, the stage reached, the
//! elapsed time, and an error classification. Recording is infallible and
//! never fails the request it describes.

use crate::{CorrelationId, WorkItemId};
use std::time::Instant;
use tracing::{error, info};

// ============================================================================
// Classification
// ============================================================================

/// Pipeline stage reached while handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Parse,
    Validate,
    Enrich,
    Dispatch,
    Complete,
}

impl Stage {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Validate => "validate",
            Self::Enrich => "enrich",
            Self::Dispatch => "dispatch",
            Self::Complete => "complete",
        }
    }
}

/// Classification attached to every failure outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Transport,
    Configuration,
    Unknown,
}

impl ErrorClass {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// Request Telemetry
// ============================================================================

/// Per-event correlation and latency tracker
#[derive(Debug)]
pub struct RequestTelemetry {
    correlation_id: CorrelationId,
    work_item_id: Option<WorkItemId>,
    stage: Stage,
    started: Instant,
}

impl RequestTelemetry {
    /// Start tracking one inbound event
    pub fn start() -> Self {
        let telemetry = Self {
            correlation_id: CorrelationId::new(),
            work_item_id: None,
            stage: Stage::Parse,
            started: Instant::now(),
        };

        info!(
            correlation_id = %telemetry.correlation_id,
            "Work item event received"
        );

        telemetry
    }

    /// Get the correlation id for this event
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Record the work-item id once it is known
    pub fn set_work_item(&mut self, id: WorkItemId) {
        self.work_item_id = Some(id);
    }

    /// Advance to a later stage. Stages only move forward.
    pub fn advance(&mut self, stage: Stage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    /// Stage currently reached
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Milliseconds elapsed since the event arrived
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Record a policy rejection. Rejections are expected filtering
    /// outcomes, logged at info.
    pub fn record_rejection(&self, reason: &str) {
        info!(
            correlation_id = %self.correlation_id,
            work_item_id = self.work_item_id.map(|id| id.as_u64()),
            stage = self.stage.as_str(),
            elapsed_ms = self.elapsed_ms(),
            error_classification = ErrorClass::Validation.as_str(),
            reason,
            "Event rejected by policy"
        );
    }

    /// Record a terminal failure with its classification
    pub fn record_failure(&self, class: ErrorClass, message: &str) {
        error!(
            correlation_id = %self.correlation_id,
            work_item_id = self.work_item_id.map(|id| id.as_u64()),
            stage = self.stage.as_str(),
            elapsed_ms = self.elapsed_ms(),
            error_classification = class.as_str(),
            error = message,
            "Event handling failed"
        );
    }

    /// Record a successful dispatch
    pub fn record_dispatched(&self) {
        info!(
            correlation_id = %self.correlation_id,
            work_item_id = self.work_item_id.map(|id| id.as_u64()),
            stage = self.stage.as_str(),
            elapsed_ms = self.elapsed_ms(),
            "Workflow dispatched"
        );
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
