//! End-to-end pipeline tests over the in-process HTTP router.
//!
//! All remote capabilities are substituted with deterministic doubles: a
//! word-hash embedder, a scripted chat model, and an in-memory SQLite
//! article store. No network, no real models.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Local;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use newsdesk::chatlog::ChatLog;
use newsdesk::embedding::Embedder;
use newsdesk::index::{ArticleInput, SqliteIndex, VectorIndex};
use newsdesk::llm::ChatModel;
use newsdesk::models::ChatMessage;
use newsdesk::server::{build_router, AppState};

const API_KEY: &str = "test-secret";

/// Deterministic embedder: hashes words into a small fixed-size vector so
/// titles sharing words score higher than unrelated ones.
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 16];
                for word in t.to_lowercase().split_whitespace() {
                    let mut h: u32 = 2166136261;
                    for b in word.bytes() {
                        h ^= b as u32;
                        h = h.wrapping_mul(16777619);
                    }
                    v[(h % 16) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Scripted chat model: JSON-mode calls (intent extraction) get one canned
/// response, free-text calls (answer generation) get another.
struct ScriptedModel {
    extraction: String,
    answer: String,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        if json_mode {
            Ok(self.extraction.clone())
        } else {
            Ok(self.answer.clone())
        }
    }
}

async fn seeded_index() -> (SqlitePool, Arc<dyn VectorIndex>) {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    newsdesk::migrate::run_migrations(&pool).await.unwrap();
    let index = SqliteIndex::new(pool.clone(), Arc::new(HashEmbedder));

    let articles = vec![
        article("AI breakthrough in reasoning", "https://news.example/1", Some("2024-03-10")),
        article("AI startup raises funding", "https://news.example/2", Some("2024-02-01")),
        article("AI regulation debate heats up", "https://news.example/3", Some("2023-11-15")),
        article("AI chips enter mass production", "https://news.example/4", Some("2023-06-02")),
        article("Olive harvest sets record", "https://news.example/5", Some("2024-01-20")),
        article("AI assistant ships undated", "https://news.example/6", None),
        article("AI ethics panel convenes", "https://news.example/7", Some("2024-04-01")),
    ];
    index.store(&articles).await.unwrap();

    (pool, Arc::new(index) as Arc<dyn VectorIndex>)
}

fn article(title: &str, url: &str, date: Option<&str>) -> ArticleInput {
    ArticleInput {
        title: title.to_string(),
        url: url.to_string(),
        date: date.map(str::to_string),
    }
}

fn make_state(
    index: Arc<dyn VectorIndex>,
    extraction: &str,
    answer: &str,
    logs_dir: &Path,
) -> AppState {
    AppState::new(
        index,
        Arc::new(ScriptedModel {
            extraction: extraction.to_string(),
            answer: answer.to_string(),
        }),
        ChatLog::new(logs_dir.to_path_buf()),
        API_KEY.to_string(),
        5,
    )
}

async fn post_json(
    state: AppState,
    path: &str,
    body: serde_json::Value,
    api_key: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let app = build_router(state);
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        request = request.header("x-api-key", key);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn todays_chat_log(dir: &Path) -> Option<String> {
    let date = Local::now().format("%Y-%m-%d");
    std::fs::read_to_string(dir.join(format!("{date}_chat_log.jsonl"))).ok()
}

// ============ Scenario 1: plain question, cited answer ============

#[tokio::test]
async fn completion_returns_cited_answer() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let answer = "AI is moving fast [Source 1].\n\nSources:\n1. https://news.example/1";
    let state = make_state(
        index,
        r#"{"queries": ["news about AI"], "date_filter": {}}"#,
        answer,
        tmp.path(),
    );

    let (status, json) = post_json(
        state,
        "/api/completion",
        serde_json::json!({ "messages": [{ "role": "user", "content": "news about AI" }] }),
        Some(API_KEY),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response = json["response"].as_str().unwrap();
    assert!(response.contains("Sources"));
    assert!(response.contains("[Source 1]"));

    // The successful exchange was appended to the daily chat log.
    let log = todays_chat_log(tmp.path()).unwrap();
    assert!(log.contains("news about AI"));
    assert!(!log.contains("ERROR:"));
}

#[tokio::test]
async fn retrieval_returns_at_most_top_k_articles() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(
        index,
        r#"{"queries": ["AI"], "date_filter": {}}"#,
        "unused",
        tmp.path(),
    );

    let (status, json) = post_json(
        state,
        "/api/retrieval",
        serde_json::json!({ "query": "AI" }),
        Some(API_KEY),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let articles = json["articles"].as_array().unwrap();
    assert!(articles.len() <= 5);
    assert!(!articles.is_empty());
    for a in articles {
        assert!(a.get("title").is_some());
        assert!(a.get("url").is_some());
        assert!(a.get("date").is_some());
    }
}

// ============ Scenario 2: date-bounded question ============

#[tokio::test]
async fn date_filter_excludes_articles_dated_earlier() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(
        index,
        r#"{"queries": ["AI news"], "date_filter": {"gte": "2024-01-01"}}"#,
        "unused",
        tmp.path(),
    );

    let (status, json) = post_json(
        state,
        "/api/retrieval",
        serde_json::json!({ "query": "AI news after 2024-01-01" }),
        Some(API_KEY),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let articles = json["articles"].as_array().unwrap();
    assert!(!articles.is_empty());
    for a in articles {
        let date = a["date"].as_str().unwrap();
        // Undated articles are excluded by a dated query; the rest must be
        // on-or-after the bound.
        assert!(date >= "2024-01-01", "article dated {date} leaked past the filter");
    }
}

// ============ Scenario 3: malformed extraction output ============

#[tokio::test]
async fn malformed_extraction_falls_back_to_raw_question() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(
        index,
        "I'm afraid I can't do JSON today.",
        "A grounded answer.\n\nSources:\n1. https://news.example/1",
        tmp.path(),
    );

    let (status, json) = post_json(
        state,
        "/api/completion",
        serde_json::json!({ "messages": [{ "role": "user", "content": "AI breakthrough reasoning" }] }),
        Some(API_KEY),
    )
    .await;

    // The parse fault is absorbed; the request still completes.
    assert_eq!(status, StatusCode::OK);
    assert!(json["response"].as_str().unwrap().contains("Sources"));
}

// ============ Scenario 4: index down ============

#[tokio::test]
async fn unavailable_index_returns_500_and_logs_error() {
    let (pool, index) = seeded_index().await;
    pool.close().await;

    let tmp = TempDir::new().unwrap();
    let state = make_state(
        index,
        r#"{"queries": ["AI news"], "date_filter": {}}"#,
        "unused",
        tmp.path(),
    );

    let (status, json) = post_json(
        state,
        "/api/retrieval",
        serde_json::json!({ "query": "AI news" }),
        Some(API_KEY),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "index_unavailable");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("unavailable"));

    let log = todays_chat_log(tmp.path()).unwrap();
    assert!(log.contains("ERROR:"));
    assert!(log.contains("AI news"));
}

// ============ Auth and boundary ============

#[tokio::test]
async fn missing_api_key_is_rejected_without_logging() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(index, "{}", "unused", tmp.path());

    let (status, json) = post_json(
        state,
        "/api/retrieval",
        serde_json::json!({ "query": "AI" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");
    // A 401 never writes to the chat log.
    assert!(todays_chat_log(tmp.path()).is_none());
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(index, "{}", "unused", tmp.path());

    let (status, _) = post_json(
        state,
        "/api/completion",
        serde_json::json!({ "messages": [{ "role": "user", "content": "AI" }] }),
        Some("not-the-secret"),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_in_transcript_is_a_client_error() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(index, "{}", "unused", tmp.path());

    let (status, _) = post_json(
        state,
        "/api/completion",
        serde_json::json!({ "messages": [{ "role": "narrator", "content": "AI" }] }),
        Some(API_KEY),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_needs_no_key() {
    let (_pool, index) = seeded_index().await;
    let tmp = TempDir::new().unwrap();
    let state = make_state(index, "{}", "unused", tmp.path());

    let app = build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
}
