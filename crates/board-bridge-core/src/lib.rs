//! # Board-Bridge Core
//!
//! Core business logic for the Board-Bridge work-item dispatch service.
//!
//! This crate contains the domain logic for processing Azure DevOps work-item
//! Service Hook events: normalizing loosely-structured payloads, validating
//! them against the dispatch policy, enriching the feature description with
//! previously answered clarification issues, and triggering a GitHub Actions
//! workflow with bounded retry.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - All external dependencies are abstracted behind traits
//!
//! The external seams are [`work_item::WorkItemStore`] (the read-only
//! work-item API) and [`dispatch::WorkflowDispatcher`] (the CI trigger
//! target). [`pipeline::DispatchPipeline`] wires the stages together for the
//! HTTP service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier for a tracked work item (feature or issue) in the upstream
/// tracker.
///
/// Work-item identifiers are positive integers assigned by the tracker; they
/// arrive as JSON numbers in Service Hook payloads and are rendered as plain
/// decimal strings in workflow inputs and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemId(u64);

impl WorkItemId {
    /// Create new work-item ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkItemId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>().map_err(|_| ParseError::InvalidFormat {
            expected: "positive integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

/// Identifier for tracing one inbound event across system boundaries
///
/// Every inbound event is assigned exactly one correlation ID; all log lines
/// emitted while handling that event carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Service configuration types and validation
pub mod config;

/// Workflow dispatch engine with bounded retry
pub mod dispatch;

/// Best-effort context enrichment from closed clarification issues
pub mod enrichment;

/// Inbound Service Hook event normalization
pub mod event;

/// Per-event orchestration of the full dispatch flow
pub mod pipeline;

/// Dispatch policy rule chain
pub mod policy;

/// Correlation and outcome telemetry
pub mod telemetry;

/// Work-item API client and trait seams
pub mod work_item;

// Re-export key types for convenience
pub use config::{AdoConfig, BridgeConfig, ConfigError, GithubConfig, PolicyConfig, ServerConfig};
pub use dispatch::{
    DispatchEngine, DispatchOutcome, DispatchRequest, GithubWorkflowClient, RetrySchedule,
    WorkflowDispatcher,
};
pub use enrichment::{ContextEnricher, EnrichedContext, RelatedItem};
pub use event::{PayloadError, WorkItemEvent};
pub use pipeline::{DispatchPipeline, EventDisposition};
pub use policy::{DispatchPolicy, ValidationResult};
pub use telemetry::{ErrorClass, RequestTelemetry, Stage};
pub use work_item::{
    AdoClient, CreatedIssue, NewIssue, WorkItem, WorkItemError, WorkItemRevision, WorkItemStore,
    WorkItemWriter,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
