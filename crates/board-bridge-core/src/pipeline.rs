//! # Dispatch Pipeline Module
//!
//! Orchestrates the full per-event flow: parse, normalize, validate, enrich,
//! dispatch. The pipeline owns no HTTP concerns; it hands the service a
//! terminal [`EventDisposition`] which maps one-to-one onto a response
//! status.
//!
//! Each invocation is an independent unit of work. The only state shared
//! between invocations is the immutable configuration captured at
//! construction.

use crate::config::BridgeConfig;
use crate::dispatch::{DispatchEngine, DispatchOutcome, DispatchRequest, WorkflowDispatcher};
use crate::enrichment::ContextEnricher;
use crate::event::WorkItemEvent;
use crate::policy::{DispatchPolicy, ValidationResult};
use crate::telemetry::{ErrorClass, RequestTelemetry, Stage};
use crate::work_item::WorkItemStore;
use crate::WorkItemId;
use std::sync::Arc;

// ============================================================================
// Disposition
// ============================================================================

/// Terminal result of handling one inbound event
///
/// Every variant carries the correlation id so a caller can surface it and
/// an operator can join the response to its log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// The event passed policy and the workflow was triggered
    Dispatched {
        correlation_id: String,
        work_item_id: WorkItemId,
        latency_ms: u64,
    },

    /// The event was filtered out by policy; an expected outcome, not an
    /// error
    Rejected {
        correlation_id: String,
        work_item_id: WorkItemId,
        reason: String,
    },

    /// The body was not a usable event
    Malformed {
        correlation_id: String,
        error: String,
    },

    /// Dispatch failed terminally
    Failed {
        correlation_id: String,
        error: String,
        class: ErrorClass,
    },
}

// ============================================================================
// Pipeline
// ============================================================================

/// Per-event orchestrator wiring the stages together
pub struct DispatchPipeline {
    enricher: ContextEnricher,
    engine: DispatchEngine,
    policy: DispatchPolicy,
}

impl DispatchPipeline {
    /// Build a pipeline from its collaborators and the loaded configuration
    pub fn new(
        store: Arc<dyn WorkItemStore>,
        dispatcher: Arc<dyn WorkflowDispatcher>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            enricher: ContextEnricher::new(store),
            engine: DispatchEngine::new(dispatcher, config.github.clone()),
            policy: DispatchPolicy::from_config(&config.policy),
        }
    }

    /// Replace the dispatch engine (hosts tune schedules, tests remove
    /// real sleeps)
    pub fn with_engine(mut self, engine: DispatchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Handle one inbound event body to a terminal disposition.
    ///
    /// Never panics and never returns early without recording the outcome.
    pub async fn handle(&self, body: &[u8]) -> EventDisposition {
        let mut telemetry = RequestTelemetry::start();

        let payload: serde_json::Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(error) => {
                telemetry.record_failure(ErrorClass::Validation, &error.to_string());
                return EventDisposition::Malformed {
                    correlation_id: telemetry.correlation_id().as_str(),
                    error: "Invalid JSON payload".to_string(),
                };
            }
        };

        let event = match WorkItemEvent::from_payload(&payload) {
            Ok(event) => event,
            Err(error) => {
                telemetry.record_failure(ErrorClass::Validation, &error.to_string());
                return EventDisposition::Malformed {
                    correlation_id: telemetry.correlation_id().as_str(),
                    error: error.to_string(),
                };
            }
        };
        telemetry.set_work_item(event.work_item_id);

        telemetry.advance(Stage::Validate);
        if let ValidationResult::Rejected { reason } = self.policy.validate(&event) {
            telemetry.record_rejection(&reason);
            return EventDisposition::Rejected {
                correlation_id: telemetry.correlation_id().as_str(),
                work_item_id: event.work_item_id,
                reason,
            };
        }

        telemetry.advance(Stage::Enrich);
        let base_description = self.enricher.resolve_base_description(&event).await;
        let context = self
            .enricher
            .enrich(&base_description, event.work_item_id)
            .await;
        let triggered_by = match event.changed_by.clone() {
            Some(identifier) => Some(identifier),
            None => self.enricher.resolve_changed_by(event.work_item_id).await,
        };

        telemetry.advance(Stage::Dispatch);
        let request = DispatchRequest::new(event.work_item_id, context.render(), triggered_by);

        match self.engine.run(&request).await {
            DispatchOutcome::Dispatched => {
                telemetry.advance(Stage::Complete);
                telemetry.record_dispatched();
                EventDisposition::Dispatched {
                    correlation_id: telemetry.correlation_id().as_str(),
                    work_item_id: event.work_item_id,
                    latency_ms: telemetry.elapsed_ms(),
                }
            }
            DispatchOutcome::ConfigurationError { missing } => {
                let error = format!("Missing required configuration: {}", missing.join(", "));
                telemetry.record_failure(ErrorClass::Configuration, &error);
                EventDisposition::Failed {
                    correlation_id: telemetry.correlation_id().as_str(),
                    error,
                    class: ErrorClass::Configuration,
                }
            }
            DispatchOutcome::RejectedByTarget { status, message } => {
                let error = format!("Workflow dispatch rejected (HTTP {status}): {message}");
                telemetry.record_failure(ErrorClass::Transport, &error);
                EventDisposition::Failed {
                    correlation_id: telemetry.correlation_id().as_str(),
                    error,
                    class: ErrorClass::Transport,
                }
            }
            DispatchOutcome::ExhaustedRetries { message } => {
                let error = format!("Workflow dispatch failed after retries: {message}");
                telemetry.record_failure(ErrorClass::Transport, &error);
                EventDisposition::Failed {
                    correlation_id: telemetry.correlation_id().as_str(),
                    error,
                    class: ErrorClass::Transport,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
