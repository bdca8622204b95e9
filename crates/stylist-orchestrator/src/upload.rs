//! Uploaded clothing images for the Virtual Stylist orchestrator.
//!
//! This module turns a user-selected image into the encoded payload sent to
//! the image service and a preview reference the presentation layer can
//! display inline.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stylist_genai::DataUri;

use crate::error::{Result, StylistError};

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image format.
    Png,
    /// JPEG image format.
    Jpeg,
    /// WEBP image format.
    Webp,
    /// GIF image format.
    Gif,
}

impl ImageFormat {
    /// Attempts to detect the image format from its leading bytes.
    ///
    /// Returns `None` if the signature is not recognized.
    #[must_use]
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    /// Attempts to detect image format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Attempts to detect image format from a file name or path.
    ///
    /// Returns `None` if the name has no extension or the extension is not recognized.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// MIME type label for this format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Webp => write!(f, "webp"),
            Self::Gif => write!(f, "gif"),
        }
    }
}

/// The current source image of a styling session.
///
/// Replaced wholesale on every upload. Only `encoded_payload` is ever sent to
/// the image service; it is skipped when the snapshot is serialized since the
/// preview already carries the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// File name or path the image came from, when known.
    pub source: Option<String>,

    /// Detected image format.
    pub format: ImageFormat,

    /// Size of the original file in bytes.
    pub size_bytes: u64,

    /// Inline `data:` URI for displaying the upload.
    pub preview_uri: Option<String>,

    /// Base64 payload used for generation requests.
    #[serde(skip)]
    pub encoded_payload: Option<String>,
}

impl UploadedImage {
    /// Reads and encodes an image file.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::ImageNotFound` if the file doesn't exist,
    /// `StylistError::Io` if it cannot be read, and the same errors as
    /// [`UploadedImage::from_bytes`] for its content.
    pub fn load(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StylistError::image_not_found(path)
            } else {
                StylistError::Io(e)
            }
        })?;

        let name = path.display().to_string();

        // Check the size before reading the whole file
        if metadata.len() > max_bytes {
            return Err(StylistError::image_too_large(name, metadata.len(), max_bytes));
        }

        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, Some(name), max_bytes)
    }

    /// Encodes an in-memory image.
    ///
    /// The format is detected from the leading bytes, falling back to the
    /// extension of `source`.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::ImageEmpty` for empty input,
    /// `StylistError::ImageTooLarge` above `max_bytes`, and
    /// `StylistError::UnsupportedImageFormat` if no format can be detected.
    pub fn from_bytes(bytes: &[u8], source: Option<String>, max_bytes: u64) -> Result<Self> {
        let label = source.clone().unwrap_or_else(|| "<upload>".to_string());

        if bytes.is_empty() {
            return Err(StylistError::image_empty(label));
        }

        let size_bytes = bytes.len() as u64;
        if size_bytes > max_bytes {
            return Err(StylistError::image_too_large(label, size_bytes, max_bytes));
        }

        let format = ImageFormat::from_magic(bytes)
            .or_else(|| source.as_deref().and_then(ImageFormat::from_name))
            .ok_or_else(|| StylistError::unsupported_format(label))?;

        let uri = DataUri::encode(format.mime_type(), bytes);
        let preview_uri = uri.to_string();

        Ok(Self {
            source,
            format,
            size_bytes,
            preview_uri: Some(preview_uri),
            encoded_payload: Some(uri.data),
        })
    }

    /// Returns the payload as a `data:` URI ready for the image service.
    #[must_use]
    pub fn payload_uri(&self) -> Option<String> {
        self.encoded_payload
            .as_ref()
            .map(|data| DataUri::new(self.format.mime_type(), data.clone()).to_string())
    }
}
