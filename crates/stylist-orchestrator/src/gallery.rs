//! Gallery export for generated outfits.
//!
//! Writes each successful outfit as an image file named after its style and
//! an `outfits.json` manifest describing every slot.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stylist_orchestrator::{gallery, StudioSnapshot};
//!
//! let snapshot = StudioSnapshot::default();
//! let manifest = gallery::export(&snapshot, Path::new("stylist-output")).unwrap();
//! println!("{} outfits written", manifest.written());
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stylist_genai::{DataUri, OutfitStyle};
use tracing::{debug, info};

use crate::error::{Result, StylistError};
use crate::outfit::{OutfitSlot, SlotStatus};
use crate::studio::StudioSnapshot;

/// File name of the manifest written next to the images.
pub const MANIFEST_FILE_NAME: &str = "outfits.json";

/// One slot as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The style of this outfit.
    pub style: OutfitStyle,
    /// Status of the slot at export time.
    pub status: SlotStatus,
    /// Image file name, relative to the gallery directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Failure message for slots in `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Contents of `outfits.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryManifest {
    /// Original file name of the uploaded item, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When the gallery was written.
    pub exported_at: DateTime<Utc>,
    /// One entry per style, in display order.
    pub outfits: Vec<ManifestEntry>,
}

impl GalleryManifest {
    /// Number of image files written.
    #[must_use]
    pub fn written(&self) -> usize {
        self.outfits.iter().filter(|entry| entry.file.is_some()).count()
    }
}

/// Writes the successful outfits of `snapshot` and a manifest into `dir`.
///
/// The directory is created if needed. Slots that are not `success` appear
/// in the manifest without a file.
///
/// # Errors
///
/// Returns `StylistError::GalleryWriteError` if the directory or a file
/// cannot be written, or if a stored image cannot be decoded.
pub fn export(snapshot: &StudioSnapshot, dir: &Path) -> Result<GalleryManifest> {
    std::fs::create_dir_all(dir).map_err(|e| StylistError::gallery_write(dir, e.to_string()))?;

    let mut outfits = Vec::with_capacity(OutfitStyle::ALL.len());
    for slot in snapshot.outfits.iter() {
        let file = match (&slot.status, &slot.image_uri) {
            (SlotStatus::Success, Some(uri)) => Some(write_image(slot, uri, dir)?),
            _ => None,
        };
        outfits.push(ManifestEntry {
            style: slot.style,
            status: slot.status,
            file,
            error: slot.error_message.clone(),
        });
    }

    let manifest = GalleryManifest {
        source: snapshot
            .upload
            .as_ref()
            .and_then(|upload| upload.source.clone()),
        exported_at: Utc::now(),
        outfits,
    };

    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let json = serde_json::to_string_pretty(&manifest)?;
    write_file(&manifest_path, json.as_bytes())?;

    info!(
        dir = %dir.display(),
        written = manifest.written(),
        "Gallery exported"
    );

    Ok(manifest)
}

/// Decodes one slot's image and writes it as `<style slug>.<ext>`.
fn write_image(slot: &OutfitSlot, uri: &str, dir: &Path) -> Result<String> {
    let data_uri = DataUri::parse(uri)
        .map_err(|e| StylistError::gallery_write(dir, format!("{}: {e}", slot.style.slug())))?;
    let bytes = data_uri
        .decode()
        .map_err(|e| StylistError::gallery_write(dir, format!("{}: {e}", slot.style.slug())))?;

    let file_name = format!("{}.{}", slot.style.slug(), data_uri.extension());
    write_file(&dir.join(&file_name), &bytes)?;
    debug!(style = %slot.style, file = %file_name, size_bytes = bytes.len(), "Wrote outfit image");

    Ok(file_name)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| StylistError::gallery_write(path, e.to_string()))?;
    file.write_all(contents)
        .map_err(|e| StylistError::gallery_write(path, e.to_string()))
}
