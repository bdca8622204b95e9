//! `data:` URI handling for image payloads.
//!
//! Images travel between the presentation layer and the image service as
//! `data:image/jpeg;base64,<payload>` strings. The service itself only wants
//! the bare payload plus a MIME type label.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::GenaiError;

/// MIME type assumed when a payload carries no label.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// A base64 image payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// MIME type label (e.g., `image/png`).
    pub mime_type: String,
    /// Base64 payload, without any prefix.
    pub data: String,
}

impl DataUri {
    /// Creates a new `DataUri` from a MIME type and base64 payload.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encodes raw bytes under the given MIME type.
    #[must_use]
    pub fn encode(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, BASE64.encode(bytes))
    }

    /// Splits an outgoing payload into MIME type and bare base64.
    ///
    /// Everything up to the first comma is treated as the prefix; a string
    /// without a comma is taken as a bare payload. Missing or malformed
    /// prefixes fall back to [`DEFAULT_MIME_TYPE`]. Never fails.
    #[must_use]
    pub fn from_payload(input: &str) -> Self {
        match input.split_once(',') {
            Some((prefix, data)) => {
                let mime_type = prefix
                    .strip_prefix("data:")
                    .and_then(|rest| rest.split(';').next())
                    .filter(|mime| !mime.is_empty())
                    .unwrap_or(DEFAULT_MIME_TYPE);
                Self::new(mime_type, data)
            }
            None => Self::new(DEFAULT_MIME_TYPE, input),
        }
    }

    /// Parses a complete `data:<mime>;base64,<payload>` URI.
    ///
    /// # Errors
    ///
    /// Returns [`GenaiError::InvalidDataUri`] when the scheme, the base64
    /// marker, or the payload is missing.
    pub fn parse(uri: &str) -> Result<Self, GenaiError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| GenaiError::invalid_data_uri("missing 'data:' scheme"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| GenaiError::invalid_data_uri("missing ',' separator"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| GenaiError::invalid_data_uri("only base64 payloads are supported"))?;
        if data.is_empty() {
            return Err(GenaiError::invalid_data_uri("empty payload"));
        }
        let mime_type = if mime_type.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime_type
        };
        Ok(Self::new(mime_type, data))
    }

    /// Decodes the base64 payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GenaiError::InvalidDataUri`] if the payload is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, GenaiError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|e| GenaiError::invalid_data_uri(format!("bad base64 payload: {e}")))
    }

    /// File extension matching the MIME type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

impl std::fmt::Display for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}
