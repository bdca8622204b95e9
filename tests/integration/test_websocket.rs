//! Integration tests for WebSocket real-time event streaming.
//!
//! These tests validate the WebSocket server functionality including
//! connection handling, event broadcasting, and concurrent client support.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{spawn_fake_gemini, spawn_stylist, FakeGemini, API_KEY, CASUAL_IMAGE, JPEG_BYTES};
use futures::SinkExt;
use futures::StreamExt;
use stylist_genai::OutfitStyle;
use stylist_orchestrator::{SlotStatus, Studio, StudioEvent, FILE_NAME_HEADER};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running stylist server plus the handles tests poke at.
struct TestServer {
    http_url: String,
    ws_url: String,
    studio: Studio,
    _fake: FakeGemini,
}

/// Spawns the fake image service and a stylist server in front of it.
async fn spawn_test_server() -> TestServer {
    let fake = spawn_fake_gemini(&[]).await;
    let studio = fake.studio(API_KEY);
    let http_url = spawn_stylist(fake.config(), studio.clone()).await;
    let ws_url = format!("{}/ws", http_url.replacen("http", "ws", 1));

    TestServer {
        http_url,
        ws_url,
        studio,
        _fake: fake,
    }
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Connects and consumes the initial `connected` event.
async fn connect_ready(url: &str) -> WsClient {
    let mut client = connect_client(url).await;
    let event = receive_event(&mut client).await;
    assert!(matches!(event, StudioEvent::Connected(_)));
    client
}

/// Receives the next text message from the WebSocket and parses it as StudioEvent.
/// Automatically handles ping frames by responding with pong.
async fn receive_event(client: &mut WsClient) -> StudioEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                // Respond to ping and continue waiting for text message
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {
                // Ignore pong messages, continue waiting
            }
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// Collects `outfit_updated` events until every style has settled.
async fn receive_settled_slots(client: &mut WsClient) -> HashMap<OutfitStyle, SlotStatus> {
    let mut settled = HashMap::new();
    while settled.len() < OutfitStyle::ALL.len() {
        if let StudioEvent::OutfitUpdated(payload) = receive_event(client).await {
            if payload.slot.status.is_settled() {
                settled.insert(payload.slot.style, payload.slot.status);
            }
        }
    }
    settled
}

async fn upload_via_http(server: &TestServer) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/upload", server.http_url))
        .header(FILE_NAME_HEADER, "jacket.jpg")
        .body(JPEG_BYTES.to_vec())
        .send()
        .await
        .expect("upload request");
    assert!(response.status().is_success());
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a WebSocket client receives a connected event on connection.
#[tokio::test]
async fn test_client_receives_connected_event_on_connect() {
    let server = spawn_test_server().await;

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    assert!(
        matches!(event, StudioEvent::Connected(_)),
        "Expected Connected event, got: {event:?}"
    );

    if let StudioEvent::Connected(payload) = event {
        assert_eq!(payload.snapshot.version, 0);
        assert!(payload.snapshot.upload.is_none());
        assert!(payload
            .snapshot
            .outfits
            .iter()
            .all(|slot| slot.status == SlotStatus::Idle));
    }
}

/// Tests that the connected event reflects outfits generated before connecting.
#[tokio::test]
async fn test_connected_event_contains_current_snapshot() {
    let server = spawn_test_server().await;
    server
        .studio
        .upload_bytes(&JPEG_BYTES, Some("jacket.jpg".to_string()))
        .expect("upload");
    server.studio.generate_all().expect("generate");
    timeout(Duration::from_secs(5), server.studio.wait_until_settled())
        .await
        .expect("settled");

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    assert!(matches!(event, StudioEvent::Connected(_)));
    if let StudioEvent::Connected(payload) = event {
        assert_eq!(payload.snapshot.version, 1);
        assert!(payload.snapshot.outfits.all_succeeded());
        assert_eq!(
            payload
                .snapshot
                .outfits
                .get(OutfitStyle::Casual)
                .image_uri
                .as_deref(),
            Some(CASUAL_IMAGE)
        );
    }
}

/// Tests that multiple clients can connect simultaneously.
#[tokio::test]
async fn test_multiple_clients_can_connect() {
    let server = spawn_test_server().await;

    let mut client1 = connect_client(&server.ws_url).await;
    let mut client2 = connect_client(&server.ws_url).await;
    let mut client3 = connect_client(&server.ws_url).await;

    let event1 = receive_event(&mut client1).await;
    let event2 = receive_event(&mut client2).await;
    let event3 = receive_event(&mut client3).await;

    assert!(matches!(event1, StudioEvent::Connected(_)));
    assert!(matches!(event2, StudioEvent::Connected(_)));
    assert!(matches!(event3, StudioEvent::Connected(_)));
}

// ============================================================================
// Event Broadcasting Tests
// ============================================================================

/// Tests that an HTTP upload is announced to every client.
#[tokio::test]
async fn test_upload_broadcast_to_all_clients() {
    let server = spawn_test_server().await;
    let mut client1 = connect_ready(&server.ws_url).await;
    let mut client2 = connect_ready(&server.ws_url).await;

    upload_via_http(&server).await;

    for client in [&mut client1, &mut client2] {
        let event = receive_event(client).await;
        assert!(
            matches!(event, StudioEvent::ImageUploaded(_)),
            "Expected ImageUploaded, got: {event:?}"
        );
        if let StudioEvent::ImageUploaded(payload) = event {
            assert_eq!(payload.version, 1);
            assert_eq!(payload.upload.source.as_deref(), Some("jacket.jpg"));
            assert!(payload.upload.encoded_payload.is_none());
        }
    }
}

/// Tests the event sequence of a full generation round.
#[tokio::test]
async fn test_generation_events_stream_to_client() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    upload_via_http(&server).await;
    assert!(matches!(
        receive_event(&mut client).await,
        StudioEvent::ImageUploaded(_)
    ));

    let response = reqwest::Client::new()
        .post(format!("{}/api/generate", server.http_url))
        .send()
        .await
        .expect("generate request");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let event = receive_event(&mut client).await;
    assert!(
        matches!(event, StudioEvent::GenerationStarted(_)),
        "Expected GenerationStarted, got: {event:?}"
    );
    if let StudioEvent::GenerationStarted(payload) = event {
        assert_eq!(payload.version, 1);
        assert_eq!(payload.styles, OutfitStyle::ALL.to_vec());
    }

    let settled = receive_settled_slots(&mut client).await;
    assert!(settled.values().all(|status| *status == SlotStatus::Success));
}

/// Tests that edits announce themselves before their result.
#[tokio::test]
async fn test_edit_events_stream_to_client() {
    let server = spawn_test_server().await;
    server.studio.upload_bytes(&JPEG_BYTES, None).expect("upload");
    server.studio.generate_all().expect("generate");
    timeout(Duration::from_secs(5), server.studio.wait_until_settled())
        .await
        .expect("settled");

    let mut client = connect_ready(&server.ws_url).await;
    assert!(server
        .studio
        .edit_outfit(OutfitStyle::Business, " swap to a navy blazer ")
        .is_dispatched());

    let event = receive_event(&mut client).await;
    assert!(matches!(event, StudioEvent::EditStarted(_)));
    if let StudioEvent::EditStarted(payload) = event {
        assert_eq!(payload.style, OutfitStyle::Business);
        assert_eq!(payload.instruction, "swap to a navy blazer");
    }

    loop {
        if let StudioEvent::OutfitUpdated(payload) = receive_event(&mut client).await {
            assert_eq!(payload.slot.style, OutfitStyle::Business);
            if payload.slot.status.is_settled() {
                assert_eq!(payload.slot.status, SlotStatus::Success);
                break;
            }
        }
    }
}

/// Tests that a rejected upload produces an error event.
#[tokio::test]
async fn test_error_event_broadcast() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/upload", server.http_url))
        .body(Vec::new())
        .send()
        .await
        .expect("upload request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let event = receive_event(&mut client).await;
    assert!(matches!(event, StudioEvent::Error(_)));
    if let StudioEvent::Error(payload) = event {
        assert!(!payload.message.is_empty());
        assert!(payload.style.is_none());
    }
}

// ============================================================================
// Disconnection Tests
// ============================================================================

/// Tests that a client can disconnect cleanly.
#[tokio::test]
async fn test_client_can_disconnect() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    client.close(None).await.expect("Failed to close");
}

/// Tests that the server keeps serving after a client disconnects.
#[tokio::test]
async fn test_server_continues_after_client_disconnect() {
    let server = spawn_test_server().await;

    let mut client1 = connect_ready(&server.ws_url).await;
    client1.close(None).await.expect("Failed to close");
    drop(client1);

    let mut client2 = connect_ready(&server.ws_url).await;

    upload_via_http(&server).await;
    let event = receive_event(&mut client2).await;
    assert!(matches!(event, StudioEvent::ImageUploaded(_)));
}
