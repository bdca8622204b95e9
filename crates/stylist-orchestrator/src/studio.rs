//! The styling session orchestrator.
//!
//! A [`Studio`] owns the uploaded image and the three outfit slots. It fans
//! out one generation request per style, routes single-style edits, and
//! merges every result into the shared state as soon as it arrives.
//!
//! # State Flow
//!
//! ```text
//! upload ──► all slots Idle (version + 1)
//!    │
//! generate_all ──► all slots Generating ──► each slot Success | Error
//!                                              │
//!                           edit_outfit ──► one slot Generating ──► Success | Error
//! ```
//!
//! Readers only ever see committed [`StudioSnapshot`]s, published on a
//! `tokio::sync::watch` channel. Results are tagged with the upload version
//! they were issued for; results for a replaced image are dropped.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stylist_genai::{GenaiError, ImageGenerator, OutfitStyle, RequestKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StylistError};
use crate::outfit::{Outfits, SlotStatus};
use crate::upload::UploadedImage;
use crate::websocket::{EventBroadcaster, StudioEvent};

/// Message shown on a slot whose generation failed.
pub const GENERATION_FAILED_MESSAGE: &str = "Could not generate outfit";

/// Message shown on a slot whose edit failed.
pub const EDIT_FAILED_MESSAGE: &str = "Failed to edit image";

// ============================================================================
// StudioSnapshot
// ============================================================================

/// A committed, immutable view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioSnapshot {
    /// Upload generation: 0 before any upload, incremented on every upload.
    pub version: u64,

    /// The current source image, if any.
    pub upload: Option<UploadedImage>,

    /// One slot per style.
    pub outfits: Outfits,

    /// When this snapshot was committed.
    pub updated_at: DateTime<Utc>,
}

impl Default for StudioSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            upload: None,
            outfits: Outfits::new(),
            updated_at: Utc::now(),
        }
    }
}

impl StudioSnapshot {
    /// Returns `true` if an encoded image is ready for generation.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.upload
            .as_ref()
            .is_some_and(|upload| upload.encoded_payload.is_some())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// EditDecision
// ============================================================================

/// What [`Studio::edit_outfit`] did with an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditDecision {
    /// The slot entered `Generating` and the edit was sent.
    Dispatched,
    /// The instruction was blank; nothing happened.
    EmptyInstruction,
    /// The slot has no image to edit yet; nothing happened.
    NoImage,
    /// The slot already has a request in flight; nothing happened.
    Busy,
}

impl EditDecision {
    /// Returns `true` if an edit request was issued.
    #[must_use]
    pub const fn is_dispatched(self) -> bool {
        matches!(self, Self::Dispatched)
    }
}

impl std::fmt::Display for EditDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatched => write!(f, "dispatched"),
            Self::EmptyInstruction => write!(f, "empty_instruction"),
            Self::NoImage => write!(f, "no_image"),
            Self::Busy => write!(f, "busy"),
        }
    }
}

// ============================================================================
// Studio
// ============================================================================

/// A finished request, tagged with what it was issued for.
struct Resolution {
    style: OutfitStyle,
    version: u64,
    request: u64,
    kind: RequestKind,
    outcome: std::result::Result<String, GenaiError>,
}

/// State shared between studio handles and the merge task.
struct Shared {
    state: watch::Sender<StudioSnapshot>,
    broadcaster: EventBroadcaster,
}

/// Handle to a styling session.
///
/// Cloning is cheap; all clones drive the same session. Creating a studio
/// spawns its merge task, so [`Studio::new`] must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct Studio {
    generator: Arc<dyn ImageGenerator>,
    shared: Arc<Shared>,
    resolutions: mpsc::UnboundedSender<Resolution>,
    max_upload_bytes: u64,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("version", &self.shared.state.borrow().version)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Creates a session with no image and every slot idle.
    #[must_use]
    pub fn new(generator: Arc<dyn ImageGenerator>, config: &Config) -> Self {
        let (state, _) = watch::channel(StudioSnapshot::default());
        let shared = Arc::new(Shared {
            state,
            broadcaster: EventBroadcaster::new(config.event_buffer_size),
        });

        let (resolutions, receiver) = mpsc::unbounded_channel();
        tokio::spawn(merge_resolutions(Arc::clone(&shared), receiver));

        Self {
            generator,
            shared,
            resolutions,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Returns the latest committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StudioSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver that observes every committed snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StudioSnapshot> {
        self.shared.state.subscribe()
    }

    /// Returns the broadcaster carrying this session's events.
    #[must_use]
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.shared.broadcaster
    }

    // ------------------------------------------------------------------------
    // Intents
    // ------------------------------------------------------------------------

    /// Replaces the source image and resets every slot to `Idle`.
    ///
    /// Requests still in flight for the previous image are ignored when
    /// they resolve.
    pub fn upload(&self, image: UploadedImage) -> StudioSnapshot {
        let mut committed = None;
        self.shared.state.send_modify(|snapshot| {
            snapshot.version += 1;
            snapshot.upload = Some(image);
            snapshot.outfits = Outfits::new();
            snapshot.touch();
            committed = Some(snapshot.clone());
        });

        let snapshot = committed.unwrap_or_else(|| self.snapshot());
        if let Some(upload) = &snapshot.upload {
            info!(
                version = snapshot.version,
                source = upload.source.as_deref().unwrap_or("<upload>"),
                format = %upload.format,
                size_bytes = upload.size_bytes,
                "Image uploaded"
            );
            self.shared
                .broadcaster
                .send(StudioEvent::image_uploaded(snapshot.version, upload.clone()));
        }
        snapshot
    }

    /// Encodes an image file and uploads it.
    ///
    /// # Errors
    ///
    /// Returns the upload error from [`UploadedImage::load`]; the session is
    /// left untouched.
    pub fn upload_file(&self, path: impl AsRef<Path>) -> Result<StudioSnapshot> {
        let image = UploadedImage::load(path, self.max_upload_bytes)?;
        Ok(self.upload(image))
    }

    /// Encodes in-memory image bytes and uploads them.
    ///
    /// # Errors
    ///
    /// Returns the upload error from [`UploadedImage::from_bytes`]; the
    /// session is left untouched.
    pub fn upload_bytes(&self, bytes: &[u8], source: Option<String>) -> Result<StudioSnapshot> {
        let image = UploadedImage::from_bytes(bytes, source, self.max_upload_bytes)?;
        Ok(self.upload(image))
    }

    /// Starts generation for every style.
    ///
    /// All slots enter `Generating` in one commit, then one request per
    /// style is issued without waiting. Each result updates only its own
    /// slot. Returns as soon as the requests are issued.
    ///
    /// Concurrent calls are not rejected here; callers that need a guard
    /// should check [`Outfits::any_busy`] first. A slot that is already
    /// generating gets a new request and the older result is dropped.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::NoImageUploaded` if no image is present.
    pub fn generate_all(&self) -> Result<()> {
        let mut dispatch = None;
        self.shared.state.send_if_modified(|snapshot| {
            let Some(payload) = snapshot.upload.as_ref().and_then(UploadedImage::payload_uri)
            else {
                return false;
            };

            let mut outfits = snapshot.outfits.clone();
            let mut requests = [0; 3];
            for style in OutfitStyle::ALL {
                let slot = outfits.get(style).clone().regenerate();
                requests[style.index()] = slot.request;
                outfits = outfits.with_slot(slot);
            }
            snapshot.outfits = outfits;
            snapshot.touch();
            dispatch = Some((snapshot.version, requests, payload));
            true
        });

        let (version, requests, payload) = dispatch.ok_or(StylistError::NoImageUploaded)?;

        info!(version, "Generating all outfits");
        self.shared.broadcaster.send(StudioEvent::generation_started(
            version,
            OutfitStyle::ALL.to_vec(),
        ));

        for style in OutfitStyle::ALL {
            let generator = Arc::clone(&self.generator);
            let image = payload.clone();
            let request = requests[style.index()];
            self.dispatch(style, version, request, RequestKind::Generate, async move {
                generator.generate(&image, style).await
            });
        }

        Ok(())
    }

    /// Applies a free-text edit to one style's current image.
    ///
    /// Blank instructions and slots without an image are no-ops. Otherwise
    /// only the target slot enters `Generating`, and only it is updated
    /// when the edit resolves.
    pub fn edit_outfit(&self, style: OutfitStyle, instruction: &str) -> EditDecision {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            debug!(%style, "Ignoring edit with empty instruction");
            return EditDecision::EmptyInstruction;
        }

        let mut decision = EditDecision::NoImage;
        let mut dispatch = None;
        self.shared.state.send_if_modified(|snapshot| {
            let slot = snapshot.outfits.get(style).clone();
            let Some(image) = slot.image_uri.clone() else {
                return false;
            };

            match slot.begin_generation() {
                Ok(next) => {
                    let request = next.request;
                    snapshot.outfits = snapshot.outfits.with_slot(next);
                    snapshot.touch();
                    decision = EditDecision::Dispatched;
                    dispatch = Some((snapshot.version, request, image));
                    true
                }
                Err(_) => {
                    decision = EditDecision::Busy;
                    false
                }
            }
        });

        let Some((version, request, image)) = dispatch else {
            debug!(%style, %decision, "Edit not dispatched");
            return decision;
        };

        info!(%style, version, instruction, "Editing outfit");
        self.shared
            .broadcaster
            .send(StudioEvent::edit_started(version, style, instruction));

        let generator = Arc::clone(&self.generator);
        let instruction = instruction.to_string();
        self.dispatch(style, version, request, RequestKind::Edit, async move {
            generator.edit(&image, &instruction).await
        });

        decision
    }

    /// Waits until no slot is `Generating` and returns that snapshot.
    pub async fn wait_until_settled(&self) -> StudioSnapshot {
        let mut receiver = self.subscribe();
        let settled = receiver
            .wait_for(|snapshot| !snapshot.outfits.any_busy())
            .await
            .map(|snapshot| snapshot.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Runs `request` on its own task and forwards the result to the merge task.
    fn dispatch<F>(&self, style: OutfitStyle, version: u64, request: u64, kind: RequestKind, call: F)
    where
        F: Future<Output = std::result::Result<String, GenaiError>> + Send + 'static,
    {
        let resolutions = self.resolutions.clone();
        tokio::spawn(async move {
            let outcome = call.await;
            let resolution = Resolution {
                style,
                version,
                request,
                kind,
                outcome,
            };
            if resolutions.send(resolution).is_err() {
                debug!(%style, %kind, "Session closed before request resolved");
            }
        });
    }
}

const fn failure_message(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Generate => GENERATION_FAILED_MESSAGE,
        RequestKind::Edit => EDIT_FAILED_MESSAGE,
    }
}

// ============================================================================
// Merge Task
// ============================================================================

/// Commits each resolution as it arrives until every sender is gone.
async fn merge_resolutions(shared: Arc<Shared>, mut receiver: mpsc::UnboundedReceiver<Resolution>) {
    while let Some(resolution) = receiver.recv().await {
        shared.apply(resolution);
    }
    debug!("Studio merge task finished");
}

impl Shared {
    fn apply(&self, resolution: Resolution) {
        let Resolution {
            style,
            version,
            request,
            kind,
            outcome,
        } = resolution;

        if let Err(e) = &outcome {
            warn!(%style, %kind, version, error = %e, "Image request failed");
        }

        let mut committed = None;
        self.state.send_if_modified(|snapshot| {
            if snapshot.version != version {
                debug!(
                    %style,
                    %kind,
                    stale_version = version,
                    current_version = snapshot.version,
                    "Dropping result for a replaced image"
                );
                return false;
            }

            let slot = snapshot.outfits.get(style).clone();
            if slot.request != request {
                debug!(
                    %style,
                    %kind,
                    stale_request = request,
                    current_request = slot.request,
                    "Dropping result for a superseded request"
                );
                return false;
            }

            let next = match outcome {
                Ok(uri) => slot.succeed(uri),
                Err(_) => slot.fail(failure_message(kind)),
            };

            match next {
                Ok(slot) => {
                    snapshot.outfits = snapshot.outfits.with_slot(slot.clone());
                    snapshot.touch();
                    committed = Some(slot);
                    true
                }
                Err(e) => {
                    debug!(%style, %kind, error = %e, "Dropping result for an idle slot");
                    false
                }
            }
        });

        let Some(slot) = committed else {
            return;
        };

        if slot.status == SlotStatus::Success {
            info!(%style, %kind, version, "Outfit ready");
        } else if let Some(message) = &slot.error_message {
            self.broadcaster
                .send(StudioEvent::error(message.clone(), Some(style)));
        }
        self.broadcaster
            .send(StudioEvent::outfit_updated(version, slot));
    }
}

// ============================================================================
// Tests
// ============================================================================
