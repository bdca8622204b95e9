//! End-to-end generation through the real Gemini client.
//!
//! These tests drive a `Studio` backed by `GeminiClient`, pointed at a local
//! fake of the `generateContent` endpoint, and verify the committed slots,
//! the requests sent on the wire, and the exported gallery.

mod common;

use std::io::Write;

use common::{
    settled, spawn_fake_gemini, API_KEY, BUSINESS_IMAGE, CASUAL_IMAGE, EDITED_DATA, JPEG_BASE64,
    JPEG_BYTES, NIGHT_OUT_IMAGE, REFUSE_MARKER,
};
use stylist_genai::OutfitStyle;
use stylist_orchestrator::{
    gallery, EditDecision, SlotStatus, EDIT_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE,
};

/// Writes a tiny JPEG to a temp file and returns it with its directory.
fn jpeg_file() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("jacket.jpg");
    let mut file = std::fs::File::create(&path).expect("create");
    file.write_all(&JPEG_BYTES).expect("write");
    (dir, path)
}

#[tokio::test]
async fn test_generate_all_styles() {
    let fake = spawn_fake_gemini(&[]).await;
    let studio = fake.studio(API_KEY);
    let (_dir, path) = jpeg_file();

    studio.upload_file(&path).expect("upload");
    studio.generate_all().expect("generate");
    let snapshot = settled(&studio).await;

    assert!(snapshot.outfits.all_succeeded());
    let expected = [
        (OutfitStyle::Casual, CASUAL_IMAGE),
        (OutfitStyle::Business, BUSINESS_IMAGE),
        (OutfitStyle::NightOut, NIGHT_OUT_IMAGE),
    ];
    for (style, image) in expected {
        let slot = snapshot.outfits.get(style);
        assert_eq!(slot.status, SlotStatus::Success, "{style}");
        assert_eq!(slot.image_uri.as_deref(), Some(image), "{style}");
        assert!(slot.error_message.is_none());
    }
}

#[tokio::test]
async fn test_requests_carry_uploaded_image() {
    let fake = spawn_fake_gemini(&[]).await;
    let studio = fake.studio(API_KEY);
    let (_dir, path) = jpeg_file();

    studio.upload_file(&path).expect("upload");
    studio.generate_all().expect("generate");
    settled(&studio).await;

    let requests = fake.requests();
    assert_eq!(requests.len(), 3, "one request per style");

    for request in &requests {
        let parts = &request["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().is_some());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], JPEG_BASE64);
    }

    for label in ["Casual", "Business", "Night Out"] {
        let needle = format!("complete {label} outfit");
        assert_eq!(
            requests
                .iter()
                .filter(|r| r["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .is_some_and(|text| text.contains(&needle)))
                .count(),
            1,
            "exactly one prompt for {label}"
        );
    }
}

#[tokio::test]
async fn test_one_style_fails_independently() {
    let fake = spawn_fake_gemini(&["Business"]).await;
    let studio = fake.studio(API_KEY);

    studio
        .upload_bytes(&JPEG_BYTES, Some("jacket.jpg".to_string()))
        .expect("upload");
    studio.generate_all().expect("generate");
    let snapshot = settled(&studio).await;

    let business = snapshot.outfits.get(OutfitStyle::Business);
    assert_eq!(business.status, SlotStatus::Error);
    assert_eq!(
        business.error_message.as_deref(),
        Some(GENERATION_FAILED_MESSAGE)
    );
    assert!(business.image_uri.is_none());

    assert_eq!(
        snapshot.outfits.get(OutfitStyle::Casual).status,
        SlotStatus::Success
    );
    assert_eq!(
        snapshot.outfits.get(OutfitStyle::NightOut).status,
        SlotStatus::Success
    );
    assert!(!snapshot.outfits.all_succeeded());
}

#[tokio::test]
async fn test_rejected_credentials_fail_every_style() {
    let fake = spawn_fake_gemini(&[]).await;
    let studio = fake.studio("wrong-key");

    studio.upload_bytes(&JPEG_BYTES, None).expect("upload");
    studio.generate_all().expect("generate");
    let snapshot = settled(&studio).await;

    for slot in snapshot.outfits.iter() {
        assert_eq!(slot.status, SlotStatus::Error);
        assert_eq!(slot.error_message.as_deref(), Some(GENERATION_FAILED_MESSAGE));
    }
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn test_edit_sends_current_outfit_image() {
    let fake = spawn_fake_gemini(&[]).await;
    let studio = fake.studio(API_KEY);

    studio.upload_bytes(&JPEG_BYTES, None).expect("upload");
    studio.generate_all().expect("generate");
    settled(&studio).await;

    let decision = studio.edit_outfit(OutfitStyle::Casual, "  add a straw hat  ");
    assert_eq!(decision, EditDecision::Dispatched);
    let snapshot = settled(&studio).await;

    let casual = snapshot.outfits.get(OutfitStyle::Casual);
    assert_eq!(casual.status, SlotStatus::Success);
    assert_eq!(
        casual.image_uri.as_deref(),
        Some(format!("data:image/png;base64,{EDITED_DATA}").as_str())
    );

    // Other slots are untouched by an edit
    assert_eq!(
        snapshot.outfits.get(OutfitStyle::Business).image_uri.as_deref(),
        Some(BUSINESS_IMAGE)
    );

    let requests = fake.requests();
    let edit = requests.last().expect("edit request");
    let parts = &edit["contents"][0]["parts"];
    assert_eq!(
        parts[0]["text"],
        "Edit this image of the fashion model: add a straw hat. Maintain the photorealistic 3D model style."
    );
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[1]["inlineData"]["data"], "Q0FTVUFM");
}

#[tokio::test]
async fn test_refused_edit_keeps_previous_image() {
    let fake = spawn_fake_gemini(&[]).await;
    let studio = fake.studio(API_KEY);

    studio.upload_bytes(&JPEG_BYTES, None).expect("upload");
    studio.generate_all().expect("generate");
    settled(&studio).await;

    let instruction = format!("{REFUSE_MARKER} make it sparkle");
    assert!(studio
        .edit_outfit(OutfitStyle::NightOut, &instruction)
        .is_dispatched());
    let snapshot = settled(&studio).await;

    let night_out = snapshot.outfits.get(OutfitStyle::NightOut);
    assert_eq!(night_out.status, SlotStatus::Error);
    assert_eq!(night_out.error_message.as_deref(), Some(EDIT_FAILED_MESSAGE));
    assert_eq!(night_out.image_uri.as_deref(), Some(NIGHT_OUT_IMAGE));
}

#[tokio::test]
async fn test_export_gallery_after_generation() {
    let fake = spawn_fake_gemini(&["Night Out"]).await;
    let studio = fake.studio(API_KEY);
    let (dir, path) = jpeg_file();

    studio.upload_file(&path).expect("upload");
    studio.generate_all().expect("generate");
    let snapshot = settled(&studio).await;

    let out = dir.path().join("gallery");
    let manifest = gallery::export(&snapshot, &out).expect("export");

    assert_eq!(manifest.written(), 2);
    assert!(manifest
        .source
        .as_deref()
        .is_some_and(|source| source.ends_with("jacket.jpg")));
    assert_eq!(std::fs::read(out.join("casual.png")).expect("casual"), b"CASUAL");
    assert_eq!(
        std::fs::read(out.join("business.png")).expect("business"),
        b"BUSINESS"
    );
    assert!(!out.join("night_out.png").exists());

    let json = std::fs::read_to_string(out.join(gallery::MANIFEST_FILE_NAME)).expect("manifest");
    let value: serde_json::Value = serde_json::from_str(&json).expect("json");
    assert_eq!(value["outfits"][2]["style"], "night_out");
    assert_eq!(value["outfits"][2]["status"], "error");
    assert_eq!(value["outfits"][2]["error"], GENERATION_FAILED_MESSAGE);
}
