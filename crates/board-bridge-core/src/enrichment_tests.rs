//! Tests for best-effort context enrichment

use super::*;
use crate::work_item::{WorkItem, WorkItemError, WorkItemRevision};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

// ============================================================================
// Mock Work-Item Store
// ============================================================================

#[derive(Default)]
struct MockStore {
    items: Mutex<HashMap<u64, WorkItem>>,
    children: Mutex<Vec<WorkItem>>,
    comments: Mutex<HashMap<u64, Vec<String>>>,
    revision_changed_by: Mutex<Option<String>>,
    fail_children: bool,
    fail_comments_for: Option<u64>,
    fail_revision: bool,
    fail_items: bool,
}

impl MockStore {
    fn new() -> Self {
        Self::default()
    }

    fn with_children(self, children: Vec<WorkItem>) -> Self {
        *self.children.lock().unwrap() = children;
        self
    }

    fn with_comments(self, id: u64, comments: Vec<&str>) -> Self {
        self.comments
            .lock()
            .unwrap()
            .insert(id, comments.into_iter().map(str::to_string).collect());
        self
    }

    fn with_item(self, item: WorkItem) -> Self {
        self.items.lock().unwrap().insert(item.id.as_u64(), item);
        self
    }

    fn with_revision_changed_by(self, identifier: &str) -> Self {
        *self.revision_changed_by.lock().unwrap() = Some(identifier.to_string());
        self
    }
}

fn transient_error() -> WorkItemError {
    WorkItemError::Transport {
        message: "connection refused".to_string(),
    }
}

#[async_trait]
impl WorkItemStore for MockStore {
    async fn get_by_id(&self, id: WorkItemId) -> Result<Option<WorkItem>, WorkItemError> {
        if self.fail_items {
            return Err(transient_error());
        }
        Ok(self.items.lock().unwrap().get(&id.as_u64()).cloned())
    }

    async fn get_latest_revision(
        &self,
        _id: WorkItemId,
    ) -> Result<Option<WorkItemRevision>, WorkItemError> {
        if self.fail_revision {
            return Err(transient_error());
        }
        Ok(Some(WorkItemRevision {
            changed_by: self.revision_changed_by.lock().unwrap().clone(),
        }))
    }

    async fn get_closed_children(
        &self,
        _parent: WorkItemId,
    ) -> Result<Vec<WorkItem>, WorkItemError> {
        if self.fail_children {
            return Err(transient_error());
        }
        Ok(self.children.lock().unwrap().clone())
    }

    async fn get_comments(&self, id: WorkItemId) -> Result<Vec<String>, WorkItemError> {
        if self.fail_comments_for == Some(id.as_u64()) {
            return Err(transient_error());
        }
        Ok(self
            .comments
            .lock()
            .unwrap()
            .get(&id.as_u64())
            .cloned()
            .unwrap_or_default())
    }
}

fn work_item(id: u64, title: &str, description: &str) -> WorkItem {
    WorkItem {
        id: WorkItemId::new(id),
        title: title.to_string(),
        description: description.to_string(),
    }
}

fn enricher(store: MockStore) -> ContextEnricher {
    ContextEnricher::new(Arc::new(store))
}

// ============================================================================
// enrich
// ============================================================================

#[tokio::test]
async fn test_enrich_builds_blocks_for_closed_children() {
    let store = MockStore::new()
        .with_children(vec![
            work_item(101, "Q1: Touch or keyboard?", "How should users interact?"),
            work_item(102, "Q2: Platform?", "What platform to target?"),
        ])
        .with_comments(
            101,
            vec![
                "Use touch gestures primarily.",
                "Keyboard for accessibility.",
            ],
        )
        .with_comments(102, vec!["Target iOS and Android."]);

    let context = enricher(store)
        .enrich("Build a hockey simulator game", WorkItemId::new(615))
        .await;
    let rendered = context.render();

    assert!(rendered.starts_with("Build a hockey simulator game"));
    assert!(rendered.contains(CLARIFICATIONS_SECTION_MARKER));
    assert!(rendered.contains("--- Closed Issue #101: Q1: Touch or keyboard? ---"));
    assert!(rendered.contains("Description: How should users interact?"));
    assert!(rendered.contains("- Use touch gestures primarily."));
    assert!(rendered.contains("- Keyboard for accessibility."));
    assert!(rendered.contains("--- Closed Issue #102: Q2: Platform? ---"));
    assert!(rendered.contains("- Target iOS and Android."));
}

#[tokio::test]
async fn test_enrich_preserves_comment_order() {
    let store = MockStore::new()
        .with_children(vec![work_item(101, "Q1", "")])
        .with_comments(101, vec!["first", "second", "third"]);

    let context = enricher(store).enrich("base", WorkItemId::new(615)).await;

    assert_eq!(context.related[0].comments, vec!["first", "second", "third"]);
    let rendered = context.render();
    let first = rendered.find("- first").unwrap();
    let second = rendered.find("- second").unwrap();
    let third = rendered.find("- third").unwrap();
    assert!(first < second && second < third);
}

#[tokio::test]
async fn test_enrich_without_children_returns_base_unchanged() {
    let context = enricher(MockStore::new())
        .enrich("Build a hockey simulator game", WorkItemId::new(615))
        .await;

    assert_eq!(context.render(), "Build a hockey simulator game");
}

#[tokio::test]
async fn test_enrich_degrades_on_children_lookup_failure() {
    let store = MockStore {
        fail_children: true,
        ..MockStore::new()
    };

    let context = enricher(store)
        .enrich("Build a hockey simulator game", WorkItemId::new(615))
        .await;

    assert_eq!(context, EnrichedContext::unchanged("Build a hockey simulator game"));
}

#[tokio::test]
async fn test_enrich_degrades_single_child_on_comment_failure() {
    let store = MockStore {
        fail_comments_for: Some(101),
        ..MockStore::new()
    }
    .with_children(vec![
        work_item(101, "Q1", "first question"),
        work_item(102, "Q2", "second question"),
    ])
    .with_comments(102, vec!["answered"]);

    let context = enricher(store).enrich("base", WorkItemId::new(615)).await;

    assert_eq!(context.related.len(), 2);
    assert!(context.related[0].comments.is_empty());
    assert_eq!(context.related[1].comments, vec!["answered"]);
}

#[tokio::test]
async fn test_render_skips_empty_description_and_comment_sections() {
    let store = MockStore::new().with_children(vec![work_item(101, "Q1", "")]);

    let rendered = enricher(store).enrich("base", WorkItemId::new(615)).await.render();

    assert!(rendered.contains("--- Closed Issue #101: Q1 ---"));
    assert!(!rendered.contains("Description:"));
    assert!(!rendered.contains("Comments:"));
}

// ============================================================================
// resolve_changed_by
// ============================================================================

#[tokio::test]
async fn test_resolve_changed_by_from_revision() {
    let store = MockStore::new().with_revision_changed_by("sam_operator@example.com");

    let resolved = enricher(store).resolve_changed_by(WorkItemId::new(615)).await;

    assert_eq!(resolved.as_deref(), Some("sam_operator@example.com"));
}

#[tokio::test]
async fn test_resolve_changed_by_swallows_failures() {
    let store = MockStore {
        fail_revision: true,
        ..MockStore::new()
    };

    let resolved = enricher(store).resolve_changed_by(WorkItemId::new(615)).await;

    assert_eq!(resolved, None);
}

// ============================================================================
// resolve_base_description
// ============================================================================

fn event_with_description(description: &str, title: &str) -> WorkItemEvent {
    WorkItemEvent {
        work_item_id: WorkItemId::new(615),
        event_type: "workitem.updated".to_string(),
        work_item_type: "Feature".to_string(),
        assignee_display_name: "AI Teammate".to_string(),
        board_column: "Specification".to_string(),
        board_column_done: false,
        title: title.to_string(),
        description: description.to_string(),
        changed_by: None,
    }
}

#[tokio::test]
async fn test_event_description_wins() {
    let event = event_with_description("from the event", "title");

    let base = enricher(MockStore::new()).resolve_base_description(&event).await;

    assert_eq!(base, "from the event");
}

#[tokio::test]
async fn test_stored_description_used_when_event_is_empty() {
    let store =
        MockStore::new().with_item(work_item(615, "stored title", "stored description"));
    let event = event_with_description("", "event title");

    let base = enricher(store).resolve_base_description(&event).await;

    assert_eq!(base, "stored description");
}

#[tokio::test]
async fn test_stored_title_used_when_description_missing_everywhere() {
    let store = MockStore::new().with_item(work_item(615, "stored title", ""));
    let event = event_with_description("", "event title");

    let base = enricher(store).resolve_base_description(&event).await;

    assert_eq!(base, "stored title");
}

#[tokio::test]
async fn test_fetch_failure_falls_back_to_event_title() {
    let store = MockStore {
        fail_items: true,
        ..MockStore::new()
    };
    let event = event_with_description("", "event title");

    let base = enricher(store).resolve_base_description(&event).await;

    assert_eq!(base, "event title");
}

#[tokio::test]
async fn test_placeholder_when_nothing_is_available() {
    let store = MockStore {
        fail_items: true,
        ..MockStore::new()
    };
    let event = event_with_description("", "");

    let base = enricher(store).resolve_base_description(&event).await;

    assert_eq!(base, "Work Item #615");
}
