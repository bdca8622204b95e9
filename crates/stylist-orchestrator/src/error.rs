//! Error types for the Virtual Stylist orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, image uploads, slot state transitions,
//! and gallery export.

use std::path::PathBuf;

/// A specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, StylistError>;

/// Errors that can occur while running a styling session.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum StylistError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your stylist.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// No API credential was supplied at startup.
    #[error("No API key found\n\nSuggestion: Export GEMINI_API_KEY (or API_KEY) before starting")]
    MissingApiKey,

    // ========================================================================
    // Upload Errors (IOError class)
    // ========================================================================
    /// The selected image file does not exist.
    #[error("Image not found: '{path}'\n\nSuggestion: Check the path to the clothing photo")]
    ImageNotFound {
        /// Path where the image was expected.
        path: PathBuf,
    },

    /// The selected image contains no bytes.
    #[error("Image is empty: '{source_name}'\n\nSuggestion: Pick a different photo")]
    ImageEmpty {
        /// File name or other label of the upload.
        source_name: String,
    },

    /// The selected image exceeds the configured upload limit.
    #[error("Image exceeds size limit ({limit_kb}KB): '{source_name}' is {size_kb}KB\n\nSuggestion: Resize or compress the photo before uploading")]
    ImageTooLarge {
        /// File name or other label of the upload.
        source_name: String,
        /// Actual size in kilobytes.
        size_kb: u64,
        /// Limit in kilobytes.
        limit_kb: u64,
    },

    /// The selected file is not a supported image format.
    #[error("Unsupported image format: '{source_name}'\n\nSuggestion: Upload a JPG, PNG, WEBP or GIF image")]
    UnsupportedImageFormat {
        /// File name or other label of the upload.
        source_name: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Generation was requested before any image was uploaded.
    #[error("No image uploaded\n\nSuggestion: Upload a clothing photo before generating looks")]
    NoImageUploaded,

    /// Invalid slot state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // Gallery Errors
    // ========================================================================
    /// Failed to write generated images to disk.
    #[error("Failed to write gallery to '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    GalleryWriteError {
        /// Path being written.
        path: PathBuf,
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StylistError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ImageNotFound` error.
    #[must_use]
    pub fn image_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ImageNotFound { path: path.into() }
    }

    /// Creates a new `ImageEmpty` error.
    #[must_use]
    pub fn image_empty(source_name: impl Into<String>) -> Self {
        Self::ImageEmpty {
            source_name: source_name.into(),
        }
    }

    /// Creates a new `ImageTooLarge` error from byte counts.
    #[must_use]
    pub fn image_too_large(source_name: impl Into<String>, size_bytes: u64, limit_bytes: u64) -> Self {
        Self::ImageTooLarge {
            source_name: source_name.into(),
            size_kb: size_bytes / 1024,
            limit_kb: limit_bytes / 1024,
        }
    }

    /// Creates a new `UnsupportedImageFormat` error.
    #[must_use]
    pub fn unsupported_format(source_name: impl Into<String>) -> Self {
        Self::UnsupportedImageFormat {
            source_name: source_name.into(),
        }
    }

    /// Creates a new `GalleryWriteError`.
    #[must_use]
    pub fn gallery_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::GalleryWriteError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error came from reading or encoding an upload.
    ///
    /// These errors are shown to the user directly and never touch slot state.
    #[must_use]
    pub const fn is_io_class(&self) -> bool {
        matches!(
            self,
            Self::ImageNotFound { .. }
                | Self::ImageEmpty { .. }
                | Self::ImageTooLarge { .. }
                | Self::UnsupportedImageFormat { .. }
                | Self::Io(_)
        )
    }

    /// Returns `true` if this error is fatal and requires immediate termination.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. } | Self::MissingApiKey
        )
    }
}
