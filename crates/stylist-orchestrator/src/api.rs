//! HTTP API endpoints for the Virtual Stylist orchestrator.
//!
//! This module is the presentation boundary: it reads committed snapshots,
//! forwards user intents to the [`Studio`], and never touches slot state
//! directly.
//!
//! # Endpoints
//!
//! - `POST /api/upload` - Upload a clothing photo (raw image body)
//! - `POST /api/generate` - Generate all three outfits
//! - `POST /api/outfits/:style/edit` - Edit one generated outfit
//! - `GET /api/state` - Get the current snapshot
//! - `GET /ws` - Stream studio events over WebSocket
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stylist_genai::{GeminiClient, GeminiOptions};
//! use stylist_orchestrator::{create_router, AppState, Config, Studio};
//!
//! # async fn example() {
//! let config = Config::default();
//! let client = GeminiClient::new(config.gemini_options("api-key")).unwrap();
//! let studio = Studio::new(Arc::new(client), &config);
//!
//! let router = create_router(AppState::new(config, studio));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use stylist_genai::OutfitStyle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::websocket::{ws_handler, StudioEvent};
use crate::{Config, EditDecision, Studio, StudioSnapshot, StylistError};

/// Header carrying the original file name of an upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for the generate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Whether generation was started.
    pub accepted: bool,
}

/// Request body for the edit endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    /// Free-text description of the change.
    pub instruction: String,
}

/// Response body for the edit endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    /// What the studio did with the instruction.
    pub decision: EditDecision,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration for the orchestrator.
    pub config: Config,
    /// The styling session driven by this server.
    pub studio: Studio,
}

impl AppState {
    /// Creates a new `AppState` around an existing session.
    #[must_use]
    pub const fn new(config: Config, studio: Studio) -> Self {
        Self { config, studio }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The uploaded file was rejected.
    Upload(StylistError),
    /// The request conflicts with the current session state.
    Conflict(String),
    /// The path named something that does not exist.
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Upload(err @ StylistError::ImageTooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            Self::Upload(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Returns
///
/// An axum `Router` configured with:
/// - All API routes under `/api`
/// - The WebSocket endpoint at `/ws`
/// - A request body limit matching `maxUploadBytes`
/// - CORS middleware for development
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/upload", post(handle_upload))
        .route("/generate", post(handle_generate))
        .route("/outfits/:style/edit", post(handle_edit))
        .route("/state", get(handle_state));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/upload`.
///
/// Encodes the raw body as the new source image. Rejected uploads leave the
/// session untouched, including bodies cut off by the request size limit.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<StudioSnapshot>, ApiError> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let result = match body {
        Ok(body) => {
            info!(
                file_name = file_name.as_deref().unwrap_or("<none>"),
                size_bytes = body.len(),
                "Received upload"
            );
            state.studio.upload_bytes(&body, file_name)
        }
        Err(rejection) => Err(rejected_body(
            &rejection,
            &headers,
            file_name,
            state.config.max_upload_bytes,
        )),
    };

    match result {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            warn!(error = %e, "Upload rejected");
            state
                .studio
                .broadcaster()
                .send(StudioEvent::error(e.to_string(), None));
            Err(ApiError::Upload(e))
        }
    }
}

/// Converts a body that could not be read into an upload error.
///
/// The size limit aborts the read early, so the reported size comes from
/// `Content-Length` when the client sent one.
fn rejected_body(
    rejection: &BytesRejection,
    headers: &HeaderMap,
    file_name: Option<String>,
    max_bytes: u64,
) -> StylistError {
    if rejection.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return StylistError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rejection.body_text(),
        ));
    }

    let size_bytes = declared_length(headers).unwrap_or_else(|| max_bytes.saturating_add(1));
    let label = file_name.unwrap_or_else(|| "<upload>".to_string());
    StylistError::image_too_large(label, size_bytes, max_bytes)
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Handler for `POST /api/generate`.
///
/// Refuses to start while any outfit is still generating.
async fn handle_generate(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let snapshot = state.studio.snapshot();
    if snapshot.outfits.any_busy() {
        warn!(version = snapshot.version, "Generation already in progress");
        return Err(ApiError::Conflict(
            "Generation already in progress; wait for every outfit to finish".to_string(),
        ));
    }

    state.studio.generate_all().map_err(|e| match e {
        StylistError::NoImageUploaded => ApiError::Conflict(e.to_string()),
        other => ApiError::Upload(other),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse { accepted: true }),
    ))
}

/// Handler for `POST /api/outfits/:style/edit`.
async fn handle_edit(
    State(state): State<Arc<AppState>>,
    Path(style): Path<String>,
    Json(request): Json<EditRequest>,
) -> Result<(StatusCode, Json<EditResponse>), ApiError> {
    let style: OutfitStyle = style
        .parse()
        .map_err(|e: stylist_genai::UnknownStyle| ApiError::NotFound(e.to_string()))?;

    let decision = state.studio.edit_outfit(style, &request.instruction);
    info!(%style, %decision, "Edit requested");

    Ok((StatusCode::ACCEPTED, Json(EditResponse { decision })))
}

/// Handler for `GET /api/state`.
async fn handle_state(State(state): State<Arc<AppState>>) -> Json<StudioSnapshot> {
    Json(state.studio.snapshot())
}

// ============================================================================
// Tests
// ============================================================================
