//! HTTP API tests against a live listener

use async_trait::async_trait;
use devforge_core::{
    Dispatcher, ExecutionError, ExecutionResult, PlatformExecutor, PlatformTarget, ResolvedAction, ResponseEnvelope,
    SessionStore, Status,
};
use devforge_server::{AppState, ServerLog};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct StubExecutor;

#[async_trait]
impl PlatformExecutor for StubExecutor {
    fn platform(&self) -> PlatformTarget {
        PlatformTarget::LinuxDebian
    }

    async fn execute(&self, action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError> {
        match &action.package {
            Some(package) => Ok(ExecutionResult::success(format!("Installed {}", package.platform_identifier))),
            None => Ok(ExecutionResult::success(format!("Ran {}", action.request.summary()))),
        }
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    _shutdown: oneshot::Sender<()>,
}

async fn start() -> TestServer {
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(300), 64));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(StubExecutor), sessions));
    let state = AppState::new(dispatcher, Arc::new(ServerLog::new(100)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(devforge_server::serve(listener, state, Duration::from_secs(60), async {
        let _ = rx.await;
    }));

    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        _shutdown: tx,
    }
}

impl TestServer {
    async fn post(&self, path: &str, caller: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .header("x-devforge-caller", caller)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(format!("{}{}", self.base, path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let server = start().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], devforge_server::version::VERSION);
}

#[tokio::test]
async fn test_install_single_candidate() {
    let server = start().await;
    let (status, body) = server
        .post("/api/v1/actions", "alice", json!({"task": "install", "tool_name": "java", "version": "17"}))
        .await;
    assert_eq!(status, 200);
    let envelope: ResponseEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(envelope.status, Status::Success);
    assert!(envelope.message.contains("openjdk-17-jdk"));
}

#[tokio::test]
async fn test_ambiguous_then_select() {
    let server = start().await;
    let (_, body) = server
        .post("/api/v1/actions", "alice", json!({"task": "install", "tool_name": "java"}))
        .await;
    let envelope: ResponseEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(envelope.status, Status::Ambiguous);
    assert_eq!(envelope.candidates().len(), 4);
    let session_id = envelope.session_id().unwrap().to_string();

    let (status, view) = server.get(&format!("/api/v1/sessions/{}", session_id)).await;
    assert_eq!(status, 200);
    assert_eq!(view["data"]["state"], "open");
    assert_eq!(view["data"]["tool_name"], "java");

    let (status, body) = server
        .post(&format!("/api/v1/sessions/{}/select", session_id), "alice", json!({"index": 2}))
        .await;
    assert_eq!(status, 200);
    let selected: ResponseEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(selected.status, Status::Success);
    assert!(selected.message.contains("openjdk-17-jdk"));

    let (_, again) = server
        .post(&format!("/api/v1/sessions/{}/select", session_id), "alice", json!({"index": 1}))
        .await;
    assert_eq!(again["status"], "error");
}

#[tokio::test]
async fn test_cancel_session() {
    let server = start().await;
    let (_, body) = server
        .post("/api/v1/actions", "bob", json!({"task": "install", "tool_name": "java"}))
        .await;
    let session_id = body["data"]["session_id"].as_str().unwrap().to_string();

    let response = server
        .client
        .delete(format!("{}/api/v1/sessions/{}", server.base, session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let cancelled: ResponseEnvelope = response.json().await.unwrap();
    assert_eq!(cancelled.status, Status::Success);

    let (_, body) = server
        .post(&format!("/api/v1/sessions/{}/select", session_id), "bob", json!({"index": 1}))
        .await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["data"]["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let server = start().await;
    let (status, body) = server.get("/api/v1/sessions/does-not-exist").await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], "error");
    assert_eq!(body["data"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_not_found_tool() {
    let server = start().await;
    let (status, body) = server
        .post("/api/v1/actions", "alice", json!({"task": "install", "tool_name": "notarealtool123"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "not_found");
}

#[tokio::test]
async fn test_validation_error_envelope() {
    let server = start().await;
    let (status, body) = server.post("/api/v1/actions", "alice", json!({"task": "fly"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_malformed_body_still_envelope() {
    let server = start().await;
    let response = server
        .client
        .post(format!("{}/api/v1/actions", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let envelope: ResponseEnvelope = response.json().await.unwrap();
    assert_eq!(envelope.status, Status::Error);
    assert_eq!(envelope.data.unwrap()["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_logs_record_requests() {
    let server = start().await;
    server
        .post("/api/v1/actions", "carol", json!({"task": "install", "tool_name": "notarealtool123"}))
        .await;

    let (status, body) = server.get("/api/v1/logs?lines=10").await;
    assert_eq!(status, 200);
    let entries = body["data"]["entries"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries
        .iter()
        .any(|e| e["message"].as_str().unwrap_or_default().contains("notarealtool123")));
    assert!(entries.iter().any(|e| e["level"] == "warn"));
}

#[tokio::test]
async fn test_system_info() {
    let server = start().await;
    let (status, body) = server.get("/api/v1/system/info").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["platform"], "linux-debian");
    assert_eq!(body["data"]["os"], std::env::consts::OS);
}

#[tokio::test]
async fn test_rpc_tool_action_wrapper() {
    let server = start().await;
    let (status, body) = server
        .post(
            "/mcp/",
            "dave",
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tool_action_wrapper",
                "params": {"task": "install", "tool_name": "java"}
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], 7);
    assert_eq!(body["result"]["status"], "ambiguous");
    let session_id = body["result"]["data"]["session_id"].as_str().unwrap().to_string();

    let (_, body) = server
        .post(
            "/mcp/",
            "dave",
            json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "select_candidate",
                "params": {"session_id": session_id, "index": 1}
            }),
        )
        .await;
    assert_eq!(body["result"]["status"], "success");
}

#[tokio::test]
async fn test_rpc_errors() {
    let server = start().await;
    let (_, body) = server
        .post("/mcp", "dave", json!({"jsonrpc": "2.0", "id": 1, "method": "launch_rockets"}))
        .await;
    assert_eq!(body["error"]["code"], -32601);

    let (_, body) = server
        .post(
            "/mcp",
            "dave",
            json!({"jsonrpc": "2.0", "id": 2, "method": "select_candidate", "params": {"index": 1}}),
        )
        .await;
    assert_eq!(body["error"]["code"], -32602);

    let response = server
        .client
        .post(format!("{}/mcp/", server.base))
        .header("content-type", "application/json")
        .body("{")
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_rpc_server_info() {
    let server = start().await;
    let (_, body) = server
        .post("/mcp/", "erin", json!({"jsonrpc": "2.0", "id": "x", "method": "info://server"}))
        .await;
    assert_eq!(body["id"], "x");
    assert_eq!(body["result"]["platform"], "linux-debian");
}
