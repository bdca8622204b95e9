//! WebSocket event types and broadcasting for live outfit updates.
//!
//! Every state change committed by the [`Studio`](crate::Studio) is broadcast
//! to all connected clients, so a page can render each outfit the moment its
//! request resolves.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the current snapshot
//! - `image_uploaded` - A new clothing photo replaced the previous one
//! - `generation_started` - All three styles entered `generating`
//! - `edit_started` - One style entered `generating` for an edit
//! - `outfit_updated` - One slot resolved (success or error)
//! - `error` - A request failed or an upload was rejected
//!
//! # Example
//!
//! ```no_run
//! use stylist_orchestrator::websocket::{EventBroadcaster, StudioEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(StudioEvent::error("Image is empty", None));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use stylist_genai::OutfitStyle;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::outfit::OutfitSlot;
use crate::studio::StudioSnapshot;
use crate::upload::UploadedImage;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The current committed snapshot.
    pub snapshot: StudioSnapshot,
}

/// Payload for the `image_uploaded` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUploadedPayload {
    /// Upload generation the image belongs to.
    pub version: u64,
    /// The new image (without its encoded payload).
    pub upload: UploadedImage,
}

/// Payload for the `generation_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStartedPayload {
    /// Upload generation the requests were issued for.
    pub version: u64,
    /// Styles that were dispatched.
    pub styles: Vec<OutfitStyle>,
    /// When the requests were issued.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `edit_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditStartedPayload {
    /// Upload generation the edit was issued for.
    pub version: u64,
    /// Style being edited.
    pub style: OutfitStyle,
    /// The trimmed instruction sent to the image service.
    pub instruction: String,
}

/// Payload for the `outfit_updated` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutfitUpdatedPayload {
    /// Upload generation the slot belongs to.
    pub version: u64,
    /// The slot after the update.
    pub slot: OutfitSlot,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message.
    pub message: String,
    /// The style the error belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<OutfitStyle>,
}

// ============================================================================
// Event Enum
// ============================================================================

/// WebSocket event types for outfit observation.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StudioEvent {
    /// Sent when a client connects.
    Connected(Box<ConnectedPayload>),
    /// Sent when a new image replaces the previous one.
    ImageUploaded(Box<ImageUploadedPayload>),
    /// Sent when all styles begin generating.
    GenerationStarted(GenerationStartedPayload),
    /// Sent when one style begins an edit.
    EditStarted(EditStartedPayload),
    /// Sent when one slot resolves.
    OutfitUpdated(Box<OutfitUpdatedPayload>),
    /// Sent when an error occurs.
    Error(ErrorPayload),
}

impl StudioEvent {
    /// Creates a `Connected` event with the current snapshot.
    #[must_use]
    pub fn connected(snapshot: StudioSnapshot) -> Self {
        Self::Connected(Box::new(ConnectedPayload { snapshot }))
    }

    /// Creates an `ImageUploaded` event.
    #[must_use]
    pub fn image_uploaded(version: u64, upload: UploadedImage) -> Self {
        Self::ImageUploaded(Box::new(ImageUploadedPayload { version, upload }))
    }

    /// Creates a `GenerationStarted` event stamped with the current time.
    #[must_use]
    pub fn generation_started(version: u64, styles: Vec<OutfitStyle>) -> Self {
        Self::GenerationStarted(GenerationStartedPayload {
            version,
            styles,
            timestamp: Utc::now(),
        })
    }

    /// Creates an `EditStarted` event.
    #[must_use]
    pub fn edit_started(version: u64, style: OutfitStyle, instruction: impl Into<String>) -> Self {
        Self::EditStarted(EditStartedPayload {
            version,
            style,
            instruction: instruction.into(),
        })
    }

    /// Creates an `OutfitUpdated` event.
    #[must_use]
    pub fn outfit_updated(version: u64, slot: OutfitSlot) -> Self {
        Self::OutfitUpdated(Box::new(OutfitUpdatedPayload { version, slot }))
    }

    /// Creates an `Error` event.
    #[must_use]
    pub fn error(message: impl Into<String>, style: Option<OutfitStyle>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
            style,
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::ImageUploaded(_) => "image_uploaded",
            Self::GenerationStarted(_) => "generation_started",
            Self::EditStarted(_) => "edit_started",
            Self::OutfitUpdated(_) => "outfit_updated",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts studio events to all connected WebSocket clients.
///
/// Uses a tokio broadcast channel for pub-sub event distribution.
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBroadcaster {
    /// Creates a new `EventBroadcaster` with the specified buffer capacity.
    ///
    /// The buffer determines how many events can be queued per subscriber
    /// before old events are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber for receiving events.
    ///
    /// Each subscriber maintains its own buffer. If a subscriber falls behind,
    /// it will receive a `Lagged` error and miss some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event to all connected subscribers.
    ///
    /// Returns the number of active receivers that will receive the event.
    pub fn send(&self, event: StudioEvent) -> usize {
        // send() returns Err only if there are no receivers
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler.
///
/// Called when a client connects to `/ws`. Upgrades the HTTP connection
/// to a WebSocket and spawns a handler task.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// - Subscribes to the broadcaster, then sends `connected` with the snapshot
/// - Forwards all events to the client
/// - Sends heartbeat pings every 30 seconds
/// - Closes connection after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no commit falls in between
    let mut event_receiver = state.studio.broadcaster().subscribe();

    let connected_event = StudioEvent::connected(state.studio.snapshot());
    let connected_json = match serde_json::to_string(&connected_event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent current snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately
    heartbeat_interval.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        // Intents arrive over HTTP; ignore
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(studio_event) => {
                        let json = match serde_json::to_string(&studio_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
