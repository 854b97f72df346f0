mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ragline::config::Settings;
use ragline::event_bus::ConversationHub;
use ragline::ingestion::JobQueue;
use ragline::orchestrator::Orchestrator;
use ragline::server::{build_router, AppState};
use ragline::store::{DocStatus, SqliteStore};

use common::{hit, FakeEmbedder, FakeModel, RecordingIndex};

struct TestApp {
    router: Router,
    store: Arc<SqliteStore>,
    queue: JobQueue,
}

async fn test_app(upload_dir: &std::path::Path) -> TestApp {
    let mut settings = Settings::default();
    settings.upload_dir = upload_dir.to_path_buf();
    let settings = Arc::new(settings);

    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let hub = ConversationHub::new(settings.event_capacity);
    let queue = JobQueue::new();
    let index = Arc::new(RecordingIndex::with_hits(vec![hit("doc", "text", 0.9)]));
    let embedder = Arc::new(FakeEmbedder::new(4));
    let model = Arc::new(FakeModel::with_fragments(&["answer"]));

    let orchestrator = Arc::new(Orchestrator::new(
        hub.clone(),
        store.clone(),
        index.clone(),
        embedder.clone(),
        model.clone(),
        settings.retrieval.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        hub,
        queue: queue.clone(),
        index,
        embedder,
        model,
        orchestrator,
        settings,
    };

    TestApp {
        router: build_router(state),
        store,
        queue,
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn chat_rejects_blank_messages_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .router
        .oneshot(post_json("/chat", json!({ "message": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("empty"));
    assert!(app.store.list_conversations().await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_creates_conversation_and_persists_user_message() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .router
        .oneshot(post_json("/chat", json!({ "message": "hello there" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();
    assert!(body["message_id"].as_str().is_some());

    let history = app.store.history(&conversation_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].content, "hello there");
}

#[tokio::test]
async fn stream_delivers_the_turn_and_ends_after_done() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json("/chat", json!({ "message": "what is alpha?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/chat/{conversation_id}/stream"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Collecting the body returns only once the handler breaks after `done`,
    // so a finished collect is itself the termination assertion.
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8_lossy(&bytes);

    assert!(body.contains("event: typing"));
    assert!(body.contains("event: citation_map"));
    assert!(body.contains("event: text_delta"));
    assert!(body.contains("\"delta\":\"answer\""));
    let done_at = body.find("event: done").expect("stream must contain done");
    assert!(!body[done_at..].contains("event: text_delta"));
}

#[tokio::test]
async fn chat_with_unknown_conversation_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .router
        .oneshot(post_json(
            "/chat",
            json!({ "conversation_id": "missing", "message": "hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingest_url_is_idempotent_by_locator() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let first = app
        .router
        .clone()
        .oneshot(post_json(
            "/ingest-url",
            json!({ "url": "https://example.com/a" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    let first = json_body(first).await;
    let doc_id = first["doc_id"].as_str().unwrap().to_string();
    assert!(first["job_id"].as_str().is_some());
    assert_eq!(app.queue.depth(), 1);

    // Same locator again: no new job, same document returned.
    let second = app
        .router
        .oneshot(post_json(
            "/ingest-url",
            json!({ "url": "https://example.com/a" }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::ACCEPTED);
    let second = json_body(second).await;
    assert_eq!(second["doc_id"].as_str().unwrap(), doc_id);
    assert!(second["detail"].as_str().unwrap().contains("already"));
    assert_eq!(app.queue.depth(), 1);
}

#[tokio::test]
async fn failed_document_is_retried_under_its_existing_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    app.store
        .insert_document(
            "doc-9",
            "https://example.com/retry",
            "web",
            DocStatus::Failed,
            None,
        )
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(post_json(
            "/ingest-url",
            json!({ "url": "https://example.com/retry" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["doc_id"], "doc-9");
    assert!(body["job_id"].as_str().is_some());
    assert_eq!(app.queue.depth(), 1);

    let document = app.store.get_document("doc-9").await.unwrap().unwrap();
    assert_eq!(document.status, DocStatus::Queued);
}

#[tokio::test]
async fn ingest_url_rejects_non_http_schemes() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .router
        .oneshot(post_json("/ingest-url", json!({ "url": "ftp://example.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_rejects_non_pdf_extension() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let boundary = "ragline-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("PDF"));
    assert_eq!(app.queue.depth(), 0);
}

#[tokio::test]
async fn upload_accepts_pdf_and_queues_job() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let boundary = "ragline-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"report.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.4 fake\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    let doc_id = body["doc_id"].as_str().unwrap();
    assert!(dir.path().join(format!("{doc_id}.pdf")).is_file());
    assert_eq!(app.queue.depth(), 1);

    let document = app.store.get_document(doc_id).await.unwrap().unwrap();
    assert_eq!(document.source, "upload");
    assert_eq!(document.file_name.as_deref(), Some("report.pdf"));
}

#[tokio::test]
async fn health_reports_ok_when_backbone_and_index_are_up() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["vector_index"], json!(true));
}

#[tokio::test]
async fn history_of_unknown_conversation_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let request = Request::builder()
        .method("GET")
        .uri("/conversations/nope/history")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
