//! Virtual Stylist Orchestrator
//!
//! Manages the upload, the three outfit slots, the HTTP API, and WebSocket events.

pub mod api;
pub mod config;
pub mod error;
pub mod gallery;
pub mod outfit;
pub mod studio;
pub mod upload;
pub mod websocket;


pub use api::{
    create_router, AppState, EditRequest, EditResponse, ErrorResponse, GenerateResponse,
    FILE_NAME_HEADER,
};
pub use config::{api_key_from_env, Config, API_KEY_ENV_VARS};
pub use error::{Result, StylistError};
pub use gallery::{GalleryManifest, ManifestEntry};
pub use outfit::{OutfitSlot, Outfits, SlotStatus};
pub use studio::{
    EditDecision, Studio, StudioSnapshot, EDIT_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE,
};
pub use upload::{ImageFormat, UploadedImage};
pub use websocket::{EventBroadcaster, StudioEvent};
