//! # Context Enrichment Module
//!
//! Gathers the closed clarification issues of a feature and their discussion
//! threads into one consolidated text blob appended to the feature
//! description before dispatch.
//!
//! Enrichment is best-effort by construction: the public operations have no
//! error channel at all. Every store failure is logged and treated as "no
//! additional data", so an unreachable tracker can shrink the context but
//! never fail the request.

use crate::event::WorkItemEvent;
use crate::work_item::WorkItemStore;
use crate::WorkItemId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Section marker separating the original description from appended history
pub const CLARIFICATIONS_SECTION_MARKER: &str = "=== Previously Answered Clarifications ===";

// ============================================================================
// Core Types
// ============================================================================

/// One closed related issue with its discussion thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedItem {
    pub id: WorkItemId,
    pub title: String,
    pub description: String,

    /// Comment texts in the order the tracker returned them
    pub comments: Vec<String>,
}

/// A base description plus whatever history could be gathered
///
/// Enrichment is additive only: rendering never replaces the base
/// description, it only extends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedContext {
    pub base_description: String,
    pub related: Vec<RelatedItem>,
}

impl EnrichedContext {
    /// A context with no gathered history
    pub fn unchanged(base_description: impl Into<String>) -> Self {
        Self {
            base_description: base_description.into(),
            related: Vec::new(),
        }
    }

    /// Render the consolidated description text.
    ///
    /// Each related item becomes one block; blocks are joined with blank
    /// lines under the section marker.
    pub fn render(&self) -> String {
        if self.related.is_empty() {
            return self.base_description.clone();
        }

        let blocks: Vec<String> = self.related.iter().map(render_block).collect();

        format!(
            "{}\n\n{}\n\n{}",
            self.base_description,
            CLARIFICATIONS_SECTION_MARKER,
            blocks.join("\n\n")
        )
    }
}

fn render_block(item: &RelatedItem) -> String {
    let mut block = format!("--- Closed Issue #{}: {} ---", item.id, item.title);

    if !item.description.is_empty() {
        block.push_str(&format!("\nDescription: {}", item.description));
    }

    if !item.comments.is_empty() {
        block.push_str("\nComments:");
        for comment in &item.comments {
            block.push_str(&format!("\n- {comment}"));
        }
    }

    block
}

// ============================================================================
// Enricher
// ============================================================================

/// Best-effort context gatherer over a work-item store
pub struct ContextEnricher {
    store: Arc<dyn WorkItemStore>,
}

impl ContextEnricher {
    /// Create a new enricher
    pub fn new(store: Arc<dyn WorkItemStore>) -> Self {
        Self { store }
    }

    /// Gather closed child issues and their comments for a work item.
    ///
    /// Never fails: a failed children lookup yields the unchanged base
    /// description, a failed comment fetch yields that child without
    /// comments.
    pub async fn enrich(&self, base_description: &str, id: WorkItemId) -> EnrichedContext {
        let children = match self.store.get_closed_children(id).await {
            Ok(children) => children,
            Err(error) => {
                warn!(
                    work_item_id = id.as_u64(),
                    error = %error,
                    "Closed-children lookup failed, continuing without history"
                );
                return EnrichedContext::unchanged(base_description);
            }
        };

        let mut related = Vec::with_capacity(children.len());
        for child in children {
            let comments = match self.store.get_comments(child.id).await {
                Ok(comments) => comments,
                Err(error) => {
                    warn!(
                        work_item_id = child.id.as_u64(),
                        error = %error,
                        "Comment fetch failed, including issue without comments"
                    );
                    Vec::new()
                }
            };

            related.push(RelatedItem {
                id: child.id,
                title: child.title,
                description: child.description,
                comments,
            });
        }

        debug!(
            work_item_id = id.as_u64(),
            related_count = related.len(),
            "Context enrichment complete"
        );

        EnrichedContext {
            base_description: base_description.to_string(),
            related,
        }
    }

    /// Resolve the changed-by identifier from the latest revision when the
    /// inbound payload did not carry one. Failures are logged and ignored.
    pub async fn resolve_changed_by(&self, id: WorkItemId) -> Option<String> {
        match self.store.get_latest_revision(id).await {
            Ok(Some(revision)) => revision.changed_by,
            Ok(None) => None,
            Err(error) => {
                warn!(
                    work_item_id = id.as_u64(),
                    error = %error,
                    "Latest-revision lookup failed, dispatching without changed-by"
                );
                None
            }
        }
    }

    /// Pick the base description to enrich.
    ///
    /// The event's own description wins; when the field bag carried none the
    /// stored work item is consulted (description, then title), and as a
    /// last resort the event title or a placeholder naming the item.
    pub async fn resolve_base_description(&self, event: &WorkItemEvent) -> String {
        if !event.description.trim().is_empty() {
            return event.description.clone();
        }

        match self.store.get_by_id(event.work_item_id).await {
            Ok(Some(item)) if !item.description.trim().is_empty() => item.description,
            Ok(Some(item)) if !item.title.trim().is_empty() => item.title,
            Ok(_) => fallback_description(event),
            Err(error) => {
                warn!(
                    work_item_id = event.work_item_id.as_u64(),
                    error = %error,
                    "Work-item fetch failed, using event title as description"
                );
                fallback_description(event)
            }
        }
    }
}

fn fallback_description(event: &WorkItemEvent) -> String {
    if event.title.trim().is_empty() {
        format!("Work Item #{}", event.work_item_id)
    } else {
        event.title.clone()
    }
}

#[cfg(test)]
#[path = "enrichment_tests.rs"]
mod tests;
