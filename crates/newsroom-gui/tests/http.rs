use std::path::PathBuf;
use std::sync::Arc;

use axum_test::TestServer;
use newsroom_core::ScriptedProvider;
use newsroom_gui::config::AppConfig;
use newsroom_gui::routes::build_router;
use newsroom_gui::state::AppState;
use serde_json::json;
use tempfile::TempDir;
use tokio::time::{Duration, sleep, timeout};

fn base_config(article_dir: &TempDir) -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        max_concurrency: 2,
        assets_dir: PathBuf::from("crates/newsroom-gui/web/dist"),
        gui_enabled: false,
        auth_token: None,
        article_path: Some(article_dir.path().join("new-blog-post.md")),
    }
}

fn scripted_state(config: &AppConfig) -> AppState {
    AppState::with_provider(config, Arc::new(ScriptedProvider::new(["R-OUT", "W-OUT"])))
}

#[tokio::test]
async fn readiness_requires_gui_flag() {
    let dir = TempDir::new().unwrap();

    let disabled_config = base_config(&dir);
    let disabled_server = TestServer::new(build_router(scripted_state(&disabled_config))).unwrap();

    let response = disabled_server.get("/health/ready").await;
    assert_eq!(response.status_code(), 503);

    let mut enabled_config = base_config(&dir);
    enabled_config.gui_enabled = true;
    let enabled_server = TestServer::new(build_router(scripted_state(&enabled_config))).unwrap();

    let response = enabled_server.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.gui_enabled = true;
    config.auth_token = Some("secret".into());

    let server = TestServer::new(build_router(scripted_state(&config))).unwrap();

    // Missing token -> unauthorized
    let response = server.get("/api/chats").await;
    assert_eq!(response.status_code(), 401);

    // Correct token -> ok (empty directory)
    let response = server
        .get("/api/chats")
        .add_header("authorization", "Bearer secret")
        .await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<serde_json::Value>();
    assert!(body["chats"].is_array());
}

#[tokio::test]
async fn empty_topic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.gui_enabled = true;

    let server = TestServer::new(build_router(scripted_state(&config))).unwrap();

    let response = server
        .post("/api/chats")
        .json(&json!({ "topic": "   " }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn chat_stream_reports_completion() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.gui_enabled = true;

    let state = scripted_state(&config);
    let shared_state = state.clone();
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server
        .post("/api/chats")
        .json(&json!({ "topic": "quantum sensors" }))
        .await;
    assert_eq!(response.status_code(), 202);
    let body = response.json::<serde_json::Value>();
    let chat_id = body["chat_id"]
        .as_str()
        .expect("chat id missing")
        .to_string();

    let status_path = format!("/api/chats/{chat_id}");
    let status = timeout(Duration::from_secs(5), async {
        loop {
            let response = server.get(&status_path).await;
            assert_eq!(response.status_code(), 200);
            let payload = response.json::<serde_json::Value>();
            if payload["state"] == "completed" {
                return payload;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("chat did not complete in time");

    assert_eq!(status["result"], "W-OUT");

    // Transcript holds the full conversation in insertion order.
    let transcript = server
        .get(&format!("/api/chats/{chat_id}/transcript"))
        .await;
    assert_eq!(transcript.status_code(), 200);
    let payload = transcript.json::<serde_json::Value>();
    let entries = payload["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[1]["content"], "quantum sensors");
    assert!(
        entries[6]["content"]
            .as_str()
            .unwrap()
            .ends_with("W-OUT")
    );

    // A finished chat replays its terminal event on the stream.
    let stream_response = server.get(&format!("/api/chats/{chat_id}/stream")).await;
    assert_eq!(stream_response.status_code(), 200);
    let body = stream_response.text();
    assert!(
        body.contains("event: completed"),
        "stream did not include completed event: {body}"
    );
    assert!(
        body.contains("\"result\":\"W-OUT\""),
        "stream payload missing result: {body}"
    );

    // The article landed at the configured path.
    let article = std::fs::read_to_string(dir.path().join("new-blog-post.md")).unwrap();
    assert_eq!(article, "W-OUT");

    let outcome = shared_state
        .chat_service()
        .status(&chat_id)
        .expect("chat status missing");
    assert_eq!(outcome.entries, 7);
}

#[tokio::test]
async fn failed_chat_surfaces_error_in_transcript() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.gui_enabled = true;

    let state = AppState::with_provider(&config, Arc::new(ScriptedProvider::failing()));
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server
        .post("/api/chats")
        .json(&json!({ "topic": "quantum sensors" }))
        .await;
    assert_eq!(response.status_code(), 202);
    let chat_id = response.json::<serde_json::Value>()["chat_id"]
        .as_str()
        .unwrap()
        .to_string();

    let status_path = format!("/api/chats/{chat_id}");
    timeout(Duration::from_secs(5), async {
        loop {
            let payload = server.get(&status_path).await.json::<serde_json::Value>();
            if payload["state"] == "failed" {
                return;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("chat did not fail in time");

    let payload = server
        .get(&format!("/api/chats/{chat_id}/transcript"))
        .await
        .json::<serde_json::Value>();
    let entries = payload["entries"].as_array().expect("entries array");
    assert!(
        entries
            .iter()
            .any(|entry| entry["tone"] == "error"),
        "transcript should carry an error-tagged entry: {entries:?}"
    );
}
