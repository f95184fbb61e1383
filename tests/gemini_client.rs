use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use syria_qa::model::{GeminiModel, GenerationParams, GenerativeModel, ModelError};

#[derive(Default)]
struct Seen {
    path: Option<String>,
    api_key: Option<String>,
    body: Option<Value>,
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Seen>>,
}

async fn handle(
    State(stub): State<Stub>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut seen = stub.seen.lock().unwrap();
    seen.path = Some(uri.path().to_string());
    seen.api_key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.body = Some(body);
    (stub.status, Json(stub.reply.clone()))
}

/// Serve `reply` with `status` on an ephemeral port; returns the endpoint.
async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let stub = Stub {
        status,
        reply,
        seen: seen.clone(),
    };
    let app = Router::new().fallback(handle).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1beta", addr), seen)
}

#[tokio::test]
async fn test_generate_extracts_candidate_text() {
    let reply = json!({
        "candidates": [{
            "content": { "parts": [{ "text": "Damascus is " }, { "text": "the capital." }] }
        }]
    });
    let (endpoint, seen) = spawn_stub(StatusCode::OK, reply).await;
    let model = GeminiModel::new(&endpoint, "gemini-test", "secret-key", 5).unwrap();

    let text = model
        .generate("User: hi\nAssistant:", &GenerationParams::default())
        .await
        .unwrap();

    assert_eq!(text, "Damascus is the capital.");
    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.path.as_deref(),
        Some("/v1beta/models/gemini-test:generateContent")
    );
    assert_eq!(seen.api_key.as_deref(), Some("secret-key"));
    let body = seen.body.as_ref().unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "User: hi\nAssistant:");
    assert_eq!(body["generationConfig"]["topK"], 40);
}

#[tokio::test]
async fn test_unauthorized_status_maps_to_auth_error() {
    let reply = json!({ "error": { "code": 403, "message": "Permission denied" } });
    let (endpoint, _) = spawn_stub(StatusCode::FORBIDDEN, reply).await;
    let model = GeminiModel::new(&endpoint, "gemini-test", "bad", 5).unwrap();

    let err = model
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(err.is_auth());
    assert!(err.reached_provider());
}

#[tokio::test]
async fn test_invalid_key_reported_as_400_maps_to_auth_error() {
    let reply = json!({
        "error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT"
        }
    });
    let (endpoint, _) = spawn_stub(StatusCode::BAD_REQUEST, reply).await;
    let model = GeminiModel::new(&endpoint, "gemini-test", "bad", 5).unwrap();

    let err = model
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::Unauthorized(_)));
}

#[tokio::test]
async fn test_server_error_carries_api_message() {
    let reply = json!({ "error": { "code": 503, "message": "The model is overloaded." } });
    let (endpoint, _) = spawn_stub(StatusCode::SERVICE_UNAVAILABLE, reply).await;
    let model = GeminiModel::new(&endpoint, "gemini-test", "key", 5).unwrap();

    let err = model
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();

    match err {
        ModelError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "The model is overloaded.");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let model = GeminiModel::new(&format!("http://{}", addr), "gemini-test", "key", 2).unwrap();

    let err = model
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::Transport(_)));
    assert!(!err.reached_provider());
}
