//! Shared helpers: a fake Gemini endpoint and a running stylist server.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use stylist_genai::GeminiClient;
use stylist_orchestrator::{create_router, AppState, Config, Studio, StudioSnapshot};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Credential the fake service accepts.
pub const API_KEY: &str = "test-key";

/// JPEG magic bytes, enough for the encoder to accept an upload.
pub const JPEG_BYTES: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// Base64 of [`JPEG_BYTES`].
pub const JPEG_BASE64: &str = "/9j/4A==";

/// Images the fake service returns: base64 of "CASUAL", "BUSINESS", "NIGHT".
pub const CASUAL_IMAGE: &str = "data:image/png;base64,Q0FTVUFM";
pub const BUSINESS_IMAGE: &str = "data:image/png;base64,QlVTSU5FU1M=";
pub const NIGHT_OUT_IMAGE: &str = "data:image/png;base64,TklHSFQ=";

/// Base64 of "EDITED", returned for every successful edit.
pub const EDITED_DATA: &str = "RURJVEVE";

/// Edits whose instruction contains this marker come back without an image.
pub const REFUSE_MARKER: &str = "REFUSE";

struct FakeState {
    failing_labels: Vec<String>,
    requests: Mutex<Vec<Value>>,
}

/// A local stand-in for the Gemini `generateContent` endpoint.
pub struct FakeGemini {
    /// API root to put in `Config::api_base_url`.
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeGemini {
    /// Request bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().expect("poisoned").clone()
    }

    /// Configuration pointing at this fake.
    pub fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url.clone(),
            ..Config::default()
        }
    }

    /// A studio driven by the real client talking to this fake.
    pub fn studio(&self, api_key: &str) -> Studio {
        let config = self.config();
        let client = GeminiClient::new(config.gemini_options(api_key)).expect("client");
        Studio::new(Arc::new(client), &config)
    }
}

/// Starts a fake service. Generation for styles whose label is listed in
/// `failing_labels` answers HTTP 500.
pub async fn spawn_fake_gemini(failing_labels: &[&str]) -> FakeGemini {
    let state = Arc::new(FakeState {
        failing_labels: failing_labels.iter().map(ToString::to_string).collect(),
        requests: Mutex::new(Vec::new()),
    });

    let router = Router::new()
        .route("/v1beta/models/:call", post(generate_content))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake server failed");
    });

    FakeGemini {
        base_url: format!("http://{addr}/v1beta"),
        state,
    }
}

async fn generate_content(
    State(state): State<Arc<FakeState>>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "API key not valid"}})),
        );
    }
    if !call.ends_with(":generateContent") {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"message": "unknown method"}})),
        );
    }

    state.requests.lock().expect("poisoned").push(body.clone());

    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    if prompt.starts_with("Edit this image") {
        if prompt.contains(REFUSE_MARKER) {
            return (
                StatusCode::OK,
                Json(json!({
                    "candidates": [{
                        "content": {"parts": [{"text": "I can't make that change."}]},
                        "finishReason": "SAFETY"
                    }]
                })),
            );
        }
        return image_response(EDITED_DATA);
    }

    for (label, data) in [
        ("Casual", "Q0FTVUFM"),
        ("Business", "QlVTSU5FU1M="),
        ("Night Out", "TklHSFQ="),
    ] {
        if prompt.contains(&format!("complete {label} outfit")) {
            if state.failing_labels.iter().any(|l| l == label) {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": {"message": "backend unavailable"}})),
                );
            }
            return image_response(data);
        }
    }

    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": {"message": "unrecognised prompt"}})),
    )
}

fn image_response(data: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is the outfit."},
                    {"inlineData": {"mimeType": "image/png", "data": data}}
                ]},
                "finishReason": "STOP"
            }]
        })),
    )
}

/// Serves the stylist API for `studio` and returns its `http://` root.
pub async fn spawn_stylist(config: Config, studio: Studio) -> String {
    let router = create_router(AppState::new(config, studio));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    format!("http://{addr}")
}

/// Waits for the studio to settle, failing the test after five seconds.
pub async fn settled(studio: &Studio) -> StudioSnapshot {
    timeout(Duration::from_secs(5), studio.wait_until_settled())
        .await
        .expect("studio never settled")
}
