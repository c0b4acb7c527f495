//! Handler-level tests for the HTTP service
//!
//! The pipeline runs against fake collaborators; no network access.

use super::*;
use async_trait::async_trait;
use axum_test::TestServer;
use board_bridge_core::dispatch::{
    AttemptResponse, DispatchEngine, DispatchRequest, Sleeper, TransportError, WorkflowDispatcher,
};
use board_bridge_core::work_item::{
    WorkItem, WorkItemError, WorkItemRevision, WorkItemStore,
};
use board_bridge_core::{AdoConfig, GithubConfig, WorkItemId};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

struct EmptyStore;

#[async_trait]
impl WorkItemStore for EmptyStore {
    async fn get_by_id(&self, _id: WorkItemId) -> Result<Option<WorkItem>, WorkItemError> {
        Ok(None)
    }

    async fn get_latest_revision(
        &self,
        _id: WorkItemId,
    ) -> Result<Option<WorkItemRevision>, WorkItemError> {
        Ok(None)
    }

    async fn get_closed_children(
        &self,
        _parent: WorkItemId,
    ) -> Result<Vec<WorkItem>, WorkItemError> {
        Ok(Vec::new())
    }

    async fn get_comments(&self, _id: WorkItemId) -> Result<Vec<String>, WorkItemError> {
        Ok(Vec::new())
    }
}

struct ScriptedDispatcher {
    script: Mutex<Vec<u16>>,
}

impl ScriptedDispatcher {
    fn new(script: &[u16]) -> Self {
        Self {
            script: Mutex::new(script.to_vec()),
        }
    }
}

#[async_trait]
impl WorkflowDispatcher for ScriptedDispatcher {
    async fn send(&self, _request: &DispatchRequest) -> Result<AttemptResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            panic!("dispatcher called more often than scripted");
        }
        let status = script.remove(0);
        Ok(AttemptResponse {
            status,
            body: format!("status {status}"),
        })
    }
}

struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn config() -> BridgeConfig {
    BridgeConfig {
        github: GithubConfig {
            owner: "my-org".to_string(),
            repo: "my-repo".to_string(),
            dispatch_token: "ghp_token".to_string(),
            ..GithubConfig::default()
        },
        ado: AdoConfig {
            org_url: "https://dev.azure.com/my-org".to_string(),
            project: "MyProject".to_string(),
            pat: "ado-pat".to_string(),
        },
        ..BridgeConfig::default()
    }
}

fn server_with(config: BridgeConfig, statuses: &[u16]) -> TestServer {
    let dispatcher = Arc::new(ScriptedDispatcher::new(statuses));
    let engine = DispatchEngine::new(dispatcher.clone(), config.github.clone())
        .with_sleeper(Arc::new(NoSleep));
    let pipeline =
        DispatchPipeline::new(Arc::new(EmptyStore), dispatcher, &config).with_engine(engine);
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: Arc::new(config),
    };
    TestServer::new(build_router(state)).unwrap()
}

fn accepted_payload() -> Value {
    json!({
        "eventType": "workitem.updated",
        "resource": {
            "workItemId": 615,
            "revision": {
                "fields": {
                    "System.WorkItemType": "Feature",
                    "System.AssignedTo": "AI Teammate <bot@example.com>",
                    "System.BoardColumn": "Specification",
                    "System.BoardColumnDone": false,
                    "System.Title": "hockey simulator game",
                    "System.Description": "Build a hockey simulator game"
                }
            }
        }
    })
}

// ============================================================================
// Webhook endpoint
// ============================================================================

#[tokio::test]
async fn test_dispatched_event_returns_204() {
    let server = server_with(config(), &[204]);

    let response = server.post("/hooks/work-item").json(&accepted_payload()).await;

    response.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_policy_rejection_returns_204() {
    let server = server_with(config(), &[]);
    let mut payload = accepted_payload();
    payload["resource"]["revision"]["fields"]["System.AssignedTo"] =
        json!("Jane Doe <jane@example.com>");

    let response = server.post("/hooks/work-item").json(&payload).await;

    response.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_invalid_json_returns_400() {
    let server = server_with(config(), &[]);

    let response = server
        .post("/hooks/work-item")
        .bytes(Bytes::from_static(b"not json"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid JSON payload");
}

#[tokio::test]
async fn test_missing_work_item_id_returns_400() {
    let server = server_with(config(), &[]);

    let response = server
        .post("/hooks/work-item")
        .json(&json!({"eventType": "workitem.updated", "resource": {}}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("workItemId"));
}

#[tokio::test]
async fn test_dispatch_exhaustion_returns_500_with_correlation_id() {
    let server = server_with(config(), &[500, 500, 500]);

    let response = server.post("/hooks/work-item").json(&accepted_payload()).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("after retries"));
    assert!(!body["correlation_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_dispatch_configuration_returns_500() {
    let mut cfg = config();
    cfg.github.owner = String::new();
    let server = server_with(cfg, &[]);

    let response = server.post("/hooks/work-item").json(&accepted_payload()).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Missing required configuration"));
}

// ============================================================================
// Health endpoints
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = server_with(config(), &[]);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_with_complete_configuration() {
    let server = server_with(config(), &[]);

    let response = server.get("/ready").await;

    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_incomplete_configuration() {
    let mut cfg = config();
    cfg.ado.pat = String::new();
    let server = server_with(cfg, &[]);

    let response = server.get("/ready").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "not_ready");
    assert!(body["error"].as_str().unwrap().contains("ado.pat"));
}

#[tokio::test]
async fn test_custom_endpoint_path() {
    let mut cfg = config();
    cfg.server.endpoint_path = "/hooks/ado".to_string();
    let server = server_with(cfg, &[204]);

    let response = server.post("/hooks/ado").json(&accepted_payload()).await;

    response.assert_status(StatusCode::NO_CONTENT);
}
