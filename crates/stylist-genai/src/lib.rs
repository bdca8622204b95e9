//! Virtual Stylist Generation Client
//!
//! Image generation and editing against the Gemini `generateContent` API.
//!
//! This crate owns everything that touches the external image service: the
//! [`ImageGenerator`] trait the orchestrator depends on, the production
//! [`GeminiClient`], the fixed set of [`OutfitStyle`]s, and `data:` URI
//! handling for image payloads.

pub mod client;
pub mod data_uri;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{GeminiClient, GeminiOptions, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use data_uri::{DataUri, DEFAULT_MIME_TYPE};

/// Errors that can occur while talking to the image service.
#[derive(Debug, Error)]
pub enum GenaiError {
    /// The request could not be completed (connection, TLS, body read).
    #[error("image service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success HTTP status.
    #[error("image service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The service answered but the body was not a valid response document.
    #[error("failed to decode image service response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered but no part carried an inline image.
    #[error("no image generated by {kind} request: {detail}")]
    NoImage {
        /// Which call produced no image.
        kind: RequestKind,
        /// What the service sent instead (finish reason, text, block reason).
        detail: String,
    },

    /// A `data:` URI could not be parsed or its payload decoded.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
}

impl GenaiError {
    /// Creates a new `NoImage` error.
    #[must_use]
    pub fn no_image(kind: RequestKind, detail: impl Into<String>) -> Self {
        Self::NoImage {
            kind,
            detail: detail.into(),
        }
    }

    /// Creates a new `InvalidDataUri` error.
    #[must_use]
    pub fn invalid_data_uri(message: impl Into<String>) -> Self {
        Self::InvalidDataUri(message.into())
    }

    /// Returns `true` if the call itself could not complete.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }

    /// Returns `true` if the service responded without a usable image.
    #[must_use]
    pub const fn is_generation(&self) -> bool {
        matches!(
            self,
            Self::NoImage { .. } | Self::Decode(_) | Self::InvalidDataUri(_)
        )
    }
}

/// The kind of request sent to the image service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Initial generation from the uploaded item.
    Generate,
    /// Text-driven edit of a generated image.
    Edit,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Edit => write!(f, "edit"),
        }
    }
}

/// The three outfit styles every upload is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutfitStyle {
    /// Everyday casual look.
    Casual,
    /// Office and business wear.
    Business,
    /// Evening and going-out look.
    NightOut,
}

impl OutfitStyle {
    /// Every style, in display order.
    pub const ALL: [Self; 3] = [Self::Casual, Self::Business, Self::NightOut];

    /// Human-readable label, also used inside the generation prompt.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Casual => "Casual",
            Self::Business => "Business",
            Self::NightOut => "Night Out",
        }
    }

    /// Wire and file name form (`casual`, `business`, `night_out`).
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Business => "business",
            Self::NightOut => "night_out",
        }
    }

    /// Position of this style in [`OutfitStyle::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Casual => 0,
            Self::Business => 1,
            Self::NightOut => 2,
        }
    }

    /// Parses a style name, case-insensitively.
    ///
    /// Spaces and dashes are treated as underscores, so `"Night Out"`,
    /// `"night-out"` and `"NIGHT_OUT"` all parse to [`OutfitStyle::NightOut`].
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "casual" => Some(Self::Casual),
            "business" => Some(Self::Business),
            "night_out" | "nightout" => Some(Self::NightOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutfitStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown style name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown outfit style '{0}': expected one of 'casual', 'business', 'night_out'")]
pub struct UnknownStyle(pub String);

impl std::str::FromStr for OutfitStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_case_insensitive(s).ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for OutfitStyle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s)
            .ok_or_else(|| serde::de::Error::custom(UnknownStyle(s)))
    }
}

impl Serialize for OutfitStyle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.slug())
    }
}

/// Request/response contract of the external image service.
///
/// Both calls take an image as a `data:` URI (a bare base64 payload is also
/// accepted) and resolve to a single generated image as a `data:` URI. Calls
/// are never retried and carry no timeout.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Renders a model wearing the item in `image`, styled as `style`.
    async fn generate(&self, image: &str, style: OutfitStyle) -> Result<String, GenaiError>;

    /// Applies a free-text `instruction` to an already generated image.
    async fn edit(&self, image: &str, instruction: &str) -> Result<String, GenaiError>;
}
