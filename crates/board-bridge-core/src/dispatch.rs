//! # Workflow Dispatch Module
//!
//! Sends the enriched trigger request to the CI target with a bounded-retry,
//! classified-backoff strategy.
//!
//! The retry loop is an explicit state machine over an attempt counter and a
//! fixed backoff table, so the termination and retry conditions are testable
//! without real network I/O: the outbound call sits behind
//! [`WorkflowDispatcher`] and the delays behind [`Sleeper`].

use crate::config::GithubConfig;
use crate::work_item::snippet;
use crate::WorkItemId;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Timeout applied to each dispatch attempt
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client-error statuses that retrying cannot change
const PERMANENT_CLIENT_ERRORS: [u16; 4] = [401, 403, 404, 422];

fn is_permanent_client_error(status: u16) -> bool {
    PERMANENT_CLIENT_ERRORS.contains(&status)
}

// ============================================================================
// Core Types
// ============================================================================

/// One workflow trigger request derived from an accepted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub work_item_id: WorkItemId,

    /// Enriched feature description forwarded to the workflow
    pub description: String,

    /// Suggested branch name for the triggered workflow
    pub branch_hint: String,

    /// Identifier of the user who moved the item, when resolved
    pub triggered_by: Option<String>,
}

impl DispatchRequest {
    /// Build a request for a work item
    pub fn new(
        work_item_id: WorkItemId,
        description: String,
        triggered_by: Option<String>,
    ) -> Self {
        Self {
            work_item_id,
            description,
            branch_hint: format!("feature/wi-{work_item_id}"),
            triggered_by,
        }
    }

    /// Workflow input parameters.
    ///
    /// The changed-by identifier is included only when resolved; it is
    /// omitted rather than sent as an empty string.
    pub fn inputs(&self) -> HashMap<String, String> {
        let description = if self.description.trim().is_empty() {
            format!("ADO Work Item #{}", self.work_item_id)
        } else {
            self.description.clone()
        };

        let mut inputs = HashMap::from([
            ("feature_description".to_string(), description),
            ("create_branch".to_string(), "true".to_string()),
            (
                "work_item_id".to_string(),
                self.work_item_id.to_string(),
            ),
            ("branch_hint".to_string(), self.branch_hint.clone()),
        ]);

        if let Some(triggered_by) = &self.triggered_by {
            inputs.insert("triggered_by".to_string(), triggered_by.clone());
        }

        inputs
    }
}

/// Terminal state of one dispatch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The target accepted the trigger
    Dispatched,

    /// The target rejected the trigger with a client error; retrying would
    /// not change the outcome
    RejectedByTarget { status: u16, message: String },

    /// Every attempt failed with a retryable error
    ExhaustedRetries { message: String },

    /// Required configuration was missing; no network attempt was made
    ConfigurationError { missing: Vec<String> },
}

impl DispatchOutcome {
    /// Check if the dispatch reached the target successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Dispatched)
    }
}

// ============================================================================
// Trait Seams
// ============================================================================

/// Response observed on one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResponse {
    pub status: u16,
    pub body: String,
}

/// Error type for failures below the HTTP layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Dispatch request timed out")]
    Timeout,

    #[error("Dispatch request failed: {message}")]
    Connection { message: String },
}

/// One outbound trigger call against the CI target
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    async fn send(&self, request: &DispatchRequest) -> Result<AttemptResponse, TransportError>;
}

/// Suspension point between attempts, injectable for tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Retry Schedule
// ============================================================================

/// Fixed retry schedule for dispatch attempts
///
/// Three attempts with backoff delays of 2s and 6s between them. The table
/// carries a third entry so the schedule stays valid if the attempt bound is
/// ever raised.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    pub max_attempts: u32,
    pub delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![
                Duration::from_secs(2),
                Duration::from_secs(6),
                Duration::from_secs(14),
            ],
        }
    }
}

impl RetrySchedule {
    /// Delay to sleep after a failed attempt, or `None` when the attempt was
    /// the last one
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts {
            self.delays.get((attempt - 1) as usize).copied()
        } else {
            None
        }
    }
}

// ============================================================================
// Dispatch Engine
// ============================================================================

/// Bounded-retry dispatch state machine
pub struct DispatchEngine {
    dispatcher: Arc<dyn WorkflowDispatcher>,
    github: GithubConfig,
    schedule: RetrySchedule,
    sleeper: Arc<dyn Sleeper>,
}

impl DispatchEngine {
    /// Create an engine with the default schedule and the tokio sleeper
    pub fn new(dispatcher: Arc<dyn WorkflowDispatcher>, github: GithubConfig) -> Self {
        Self {
            dispatcher,
            github,
            schedule: RetrySchedule::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the retry schedule
    pub fn with_schedule(mut self, schedule: RetrySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Replace the sleeper (tests inject a recording fake)
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run the dispatch state machine to a terminal outcome.
    ///
    /// Transition rules per attempt:
    /// - 204 is terminal success
    /// - a permanent client error (401, 403, 404, 422) is terminal failure
    ///   with no further attempts
    /// - any other status or a transport failure retries after the scheduled
    ///   delay until attempts are exhausted
    pub async fn run(&self, request: &DispatchRequest) -> DispatchOutcome {
        let missing = self.github.missing_fields();
        if !missing.is_empty() {
            error!(
                work_item_id = request.work_item_id.as_u64(),
                missing = ?missing,
                "Dispatch configuration incomplete, refusing to attempt"
            );
            return DispatchOutcome::ConfigurationError { missing };
        }

        let mut last_failure = String::new();

        for attempt in 1..=self.schedule.max_attempts {
            match self.dispatcher.send(request).await {
                Ok(response) if response.status == 204 => {
                    info!(
                        work_item_id = request.work_item_id.as_u64(),
                        attempt, "Workflow dispatched"
                    );
                    return DispatchOutcome::Dispatched;
                }
                Ok(response) if is_permanent_client_error(response.status) => {
                    let message =
                        format!("HTTP {}: {}", response.status, snippet(&response.body, 200));
                    error!(
                        work_item_id = request.work_item_id.as_u64(),
                        status = response.status,
                        attempt,
                        "Dispatch rejected by target, not retrying"
                    );
                    return DispatchOutcome::RejectedByTarget {
                        status: response.status,
                        message,
                    };
                }
                Ok(response) => {
                    last_failure =
                        format!("HTTP {}: {}", response.status, snippet(&response.body, 200));
                    warn!(
                        work_item_id = request.work_item_id.as_u64(),
                        status = response.status,
                        attempt,
                        "Dispatch attempt failed"
                    );
                }
                Err(transport) => {
                    last_failure = transport.to_string();
                    warn!(
                        work_item_id = request.work_item_id.as_u64(),
                        error = %transport,
                        attempt,
                        "Dispatch attempt failed"
                    );
                }
            }

            if let Some(delay) = self.schedule.delay_after(attempt) {
                self.sleeper.sleep(delay).await;
            }
        }

        error!(
            work_item_id = request.work_item_id.as_u64(),
            attempts = self.schedule.max_attempts,
            "Dispatch retries exhausted"
        );
        DispatchOutcome::ExhaustedRetries {
            message: last_failure,
        }
    }
}

// ============================================================================
// GitHub Workflow Client
// ============================================================================

/// Production dispatcher triggering a GitHub Actions workflow
#[derive(Debug, Clone)]
pub struct GithubWorkflowClient {
    http: reqwest::Client,
    api_base: String,
    config: GithubConfig,
}

impl GithubWorkflowClient {
    /// Build a client for a dispatch target
    pub fn new(config: GithubConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .user_agent("board-bridge")
            .build()
            .map_err(|e| TransportError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_base: "https://api.github.com".to_string(),
            config,
        })
    }

    /// Point the client at a different API host (tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn dispatch_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/actions/workflows/{}/dispatches",
            self.api_base, self.config.owner, self.config.repo, self.config.workflow_filename
        )
    }
}

#[async_trait]
impl WorkflowDispatcher for GithubWorkflowClient {
    async fn send(&self, request: &DispatchRequest) -> Result<AttemptResponse, TransportError> {
        let payload = json!({
            "ref": self.config.workflow_ref,
            "inputs": request.inputs(),
        });

        let response = self
            .http
            .post(self.dispatch_url())
            .bearer_auth(&self.config.dispatch_token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connection {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(AttemptResponse { status, body })
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
