//! # Work-Item API Module
//!
//! Client for the work-item read API plus the write operation used by the
//! clarification tooling.
//!
//! Business logic depends on the [`WorkItemStore`] and [`WorkItemWriter`]
//! traits; [`AdoClient`] is the production implementation over the Azure
//! DevOps REST API (PAT basic auth, 15 second request timeout).

use crate::config::AdoConfig;
use crate::event::identifier_from;
use crate::WorkItemId;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Request timeout applied to every work-item API call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Clamp response bodies before embedding them in error messages
pub(crate) fn snippet(text: &str, max_len: usize) -> &str {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Core Types
// ============================================================================

/// A work item as read from the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub description: String,
}

/// The latest revision of a work item, reduced to the fields the bridge
/// cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemRevision {
    /// Email-like identifier of the user who made the latest change, when
    /// one could be extracted
    pub changed_by: Option<String>,
}

/// A child issue to create under a parent feature
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: String,

    /// Semicolon-separated tag list
    pub tags: String,

    /// Key embedded in the description to detect duplicate filings
    pub idempotency_key: String,

    /// Optional assignee email/UPN
    pub assigned_to: Option<String>,
}

/// Reference to a created child issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub id: WorkItemId,
    pub url: String,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for work-item API failures
#[derive(Debug, thiserror::Error)]
pub enum WorkItemError {
    #[error("Work-item API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Work-item API request timed out")]
    Timeout,

    #[error("Work-item API request failed: {message}")]
    Transport { message: String },

    #[error("Work-item API response could not be decoded: {message}")]
    Decode { message: String },
}

impl WorkItemError {
    /// Check if the failure is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Timeout | Self::Transport { .. } => true,
            Self::Decode { .. } => false,
        }
    }
}

impl From<reqwest::Error> for WorkItemError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode {
                message: error.to_string(),
            }
        } else {
            Self::Transport {
                message: error.to_string(),
            }
        }
    }
}

// ============================================================================
// Trait Seams
// ============================================================================

/// Read operations against the work-item tracker
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Fetch a work item by id; `None` when the item does not exist
    async fn get_by_id(&self, id: WorkItemId) -> Result<Option<WorkItem>, WorkItemError>;

    /// Fetch the latest revision of a work item
    async fn get_latest_revision(
        &self,
        id: WorkItemId,
    ) -> Result<Option<WorkItemRevision>, WorkItemError>;

    /// List the closed child issues of a parent work item. Open children are
    /// irrelevant context and excluded by the query.
    async fn get_closed_children(
        &self,
        parent: WorkItemId,
    ) -> Result<Vec<WorkItem>, WorkItemError>;

    /// Fetch the comment thread of a work item in the order the tracker
    /// returns it
    async fn get_comments(&self, id: WorkItemId) -> Result<Vec<String>, WorkItemError>;
}

/// Write operations used by the clarification tooling
#[async_trait]
pub trait WorkItemWriter: Send + Sync {
    /// Create a child issue under a parent feature.
    ///
    /// Returns `None` when an issue carrying the same idempotency key already
    /// exists, so re-running the tooling never files duplicates.
    async fn create_child_issue(
        &self,
        parent: WorkItemId,
        issue: &NewIssue,
    ) -> Result<Option<CreatedIssue>, WorkItemError>;
}

// ============================================================================
// Azure DevOps Client
// ============================================================================

/// Work-item client over the Azure DevOps REST API
#[derive(Debug, Clone)]
pub struct AdoClient {
    http: reqwest::Client,
    base_url: String,
    pat: String,
}

impl AdoClient {
    /// Build a client from the work-item API configuration
    pub fn new(config: &AdoConfig) -> Result<Self, WorkItemError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/{}/_apis/wit",
                config.org_url.trim_end_matches('/'),
                config.project
            ),
            pat: config.pat.clone(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, WorkItemError> {
        let response = self
            .http
            .get(url)
            .basic_auth("", Some(&self.pat))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if status != 200 {
            return Err(WorkItemError::Status {
                status,
                message: snippet(&body, 500).to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|e| WorkItemError::Decode {
            message: e.to_string(),
        })
    }

    /// Fetch the raw work-item document, `None` on 404
    async fn fetch_raw(&self, id: WorkItemId) -> Result<Option<Value>, WorkItemError> {
        let url = format!("{}/workitems/{}?api-version=7.0", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .basic_auth("", Some(&self.pat))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }

        let body = response.text().await?;
        if status != 200 {
            return Err(WorkItemError::Status {
                status,
                message: snippet(&body, 500).to_string(),
            });
        }

        let raw = serde_json::from_str(&body).map_err(|e| WorkItemError::Decode {
            message: e.to_string(),
        })?;
        Ok(Some(raw))
    }
}

fn work_item_from_raw(raw: &Value) -> WorkItem {
    let fields = raw.get("fields").unwrap_or(&Value::Null);
    WorkItem {
        id: WorkItemId::new(raw.get("id").and_then(Value::as_u64).unwrap_or_default()),
        title: fields
            .get("System.Title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: fields
            .get("System.Description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

#[async_trait]
impl WorkItemStore for AdoClient {
    async fn get_by_id(&self, id: WorkItemId) -> Result<Option<WorkItem>, WorkItemError> {
        Ok(self.fetch_raw(id).await?.map(|raw| work_item_from_raw(&raw)))
    }

    async fn get_latest_revision(
        &self,
        id: WorkItemId,
    ) -> Result<Option<WorkItemRevision>, WorkItemError> {
        // The revisions endpoint needs a revision number, so read the item
        // first to learn its current one.
        let Some(raw) = self.fetch_raw(id).await? else {
            return Ok(None);
        };
        let Some(rev) = raw.get("rev").and_then(Value::as_u64) else {
            warn!(work_item_id = id.as_u64(), "Work item has no revision number");
            return Ok(None);
        };

        let url = format!(
            "{}/workitems/{}/revisions/{}?api-version=7.0",
            self.base_url, id, rev
        );
        let revision = self.get_json(&url).await?;

        let changed_by = revision
            .pointer("/fields/System.ChangedBy")
            .and_then(identifier_from);

        Ok(Some(WorkItemRevision { changed_by }))
    }

    async fn get_closed_children(
        &self,
        parent: WorkItemId,
    ) -> Result<Vec<WorkItem>, WorkItemError> {
        let wiql_url = format!("{}/wiql?api-version=7.0", self.base_url);
        let query = json!({
            "query": format!(
                "SELECT [System.Id], [System.Title], [System.Description] \
                 FROM WorkItems \
                 WHERE [System.WorkItemType] = 'Issue' \
                 AND [System.Parent] = {parent} \
                 AND [System.State] = 'Closed'"
            )
        });

        let response = self
            .http
            .post(&wiql_url)
            .basic_auth("", Some(&self.pat))
            .json(&query)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            return Err(WorkItemError::Status {
                status,
                message: snippet(&body, 500).to_string(),
            });
        }

        let result: Value = serde_json::from_str(&body).map_err(|e| WorkItemError::Decode {
            message: e.to_string(),
        })?;

        let ids: Vec<u64> = result
            .get("workItems")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("id").and_then(Value::as_u64))
                    .collect()
            })
            .unwrap_or_default();

        if ids.is_empty() {
            info!(
                parent_id = parent.as_u64(),
                "No closed child issues found"
            );
            return Ok(Vec::new());
        }

        let ids_param = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let batch_url = format!(
            "{}/workitems?ids={}&fields=System.Id,System.Title,System.Description&api-version=7.0",
            self.base_url, ids_param
        );

        let batch = self.get_json(&batch_url).await?;
        let items = batch
            .get("value")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(work_item_from_raw).collect())
            .unwrap_or_default();

        Ok(items)
    }

    async fn get_comments(&self, id: WorkItemId) -> Result<Vec<String>, WorkItemError> {
        let url = format!(
            "{}/workitems/{}/comments?api-version=7.0-preview.3",
            self.base_url, id
        );
        let result = self.get_json(&url).await?;

        // The comments endpoint returns either a "comments" or a "value"
        // array depending on API version, and each entry is either a bare
        // string or an object with a "text" property.
        let entries = result
            .get("comments")
            .or_else(|| result.get("value"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let comments = entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(text) => Some(text.trim().to_string()),
                other => other
                    .get("text")
                    .and_then(Value::as_str)
                    .map(|text| text.trim().to_string()),
            })
            .filter(|text| !text.is_empty())
            .collect();

        Ok(comments)
    }
}

#[async_trait]
impl WorkItemWriter for AdoClient {
    async fn create_child_issue(
        &self,
        parent: WorkItemId,
        issue: &NewIssue,
    ) -> Result<Option<CreatedIssue>, WorkItemError> {
        // Duplicate check first. A failed pre-query is logged and creation
        // proceeds; filing twice is preferable to silently filing nothing.
        match self.find_by_idempotency_key(parent, &issue.idempotency_key).await {
            Ok(true) => {
                info!(
                    parent_id = parent.as_u64(),
                    idempotency_key = %issue.idempotency_key,
                    "Issue already exists, skipping creation"
                );
                return Ok(None);
            }
            Ok(false) => {}
            Err(error) => {
                warn!(
                    parent_id = parent.as_u64(),
                    error = %error,
                    "Idempotency check failed, proceeding with creation"
                );
            }
        }

        let description = format!(
            "{}\n\n<!-- idempotency_key: {} -->",
            issue.description, issue.idempotency_key
        );

        let mut patch = vec![
            json!({"op": "add", "path": "/fields/System.Title", "value": issue.title}),
            json!({"op": "add", "path": "/fields/System.Description", "value": description}),
            json!({"op": "add", "path": "/multilineFieldsFormat/System.Description", "value": "Markdown"}),
            json!({"op": "add", "path": "/fields/System.Tags", "value": issue.tags}),
            json!({
                "op": "add",
                "path": "/relations/-",
                "value": {
                    "rel": "System.LinkTypes.Hierarchy-Reverse",
                    "url": format!("{}/workitems/{}", self.base_url, parent),
                    "attributes": {"comment": "Auto-generated clarification"}
                }
            }),
        ];
        if let Some(assigned_to) = &issue.assigned_to {
            patch.push(json!({
                "op": "add",
                "path": "/fields/System.AssignedTo",
                "value": assigned_to
            }));
        }

        let body = serde_json::to_string(&patch).map_err(|e| WorkItemError::Decode {
            message: e.to_string(),
        })?;

        let url = format!("{}/workitems/$Issue?api-version=7.0", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth("", Some(&self.pat))
            .header(reqwest::header::CONTENT_TYPE, "application/json-patch+json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(WorkItemError::Status {
                status,
                message: snippet(&text, 500).to_string(),
            });
        }

        let created: Value = serde_json::from_str(&text).map_err(|e| WorkItemError::Decode {
            message: e.to_string(),
        })?;

        let id = created
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| WorkItemError::Decode {
                message: "created issue response carried no id".to_string(),
            })?;

        Ok(Some(CreatedIssue {
            id: WorkItemId::new(id),
            url: created
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }))
    }
}

impl AdoClient {
    async fn find_by_idempotency_key(
        &self,
        parent: WorkItemId,
        key: &str,
    ) -> Result<bool, WorkItemError> {
        let wiql_url = format!("{}/wiql?api-version=7.0", self.base_url);
        let query = json!({
            "query": format!(
                "SELECT [System.Id] \
                 FROM WorkItems \
                 WHERE [System.WorkItemType] = 'Issue' \
                 AND [System.Parent] = {parent} \
                 AND [System.Description] CONTAINS '{key}'"
            )
        });

        let response = self
            .http
            .post(&wiql_url)
            .basic_auth("", Some(&self.pat))
            .json(&query)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            return Err(WorkItemError::Status {
                status,
                message: snippet(&body, 500).to_string(),
            });
        }

        let result: Value = serde_json::from_str(&body).map_err(|e| WorkItemError::Decode {
            message: e.to_string(),
        })?;

        Ok(result
            .get("workItems")
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty()))
    }
}

#[cfg(test)]
#[path = "work_item_tests.rs"]
mod tests;
