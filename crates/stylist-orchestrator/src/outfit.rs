//! Outfit slot types for the Virtual Stylist orchestrator.
//!
//! This module defines the per-style state machine and the fixed, three-entry
//! mapping of slots keyed by [`OutfitStyle`].

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use stylist_genai::OutfitStyle;

use crate::error::{Result, StylistError};

// ============================================================================
// SlotStatus
// ============================================================================

/// Progress of one style's generation or edit.
///
/// The status transitions through these states:
/// - `Idle` -> `Generating`
/// - `Generating` -> `Success` | `Error`
/// - `Success` | `Error` -> `Generating` (new generation or edit)
///
/// Any state may be reset to `Idle` when a new image is uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Nothing requested for the current image.
    #[default]
    Idle,
    /// A generation or edit request is in flight.
    Generating,
    /// The last request produced an image.
    Success,
    /// The last request failed.
    Error,
}

impl SlotStatus {
    /// Returns `true` while a request is in flight.
    ///
    /// # Examples
    ///
    /// ```
    /// use stylist_orchestrator::SlotStatus;
    ///
    /// assert!(SlotStatus::Generating.is_busy());
    /// assert!(!SlotStatus::Success.is_busy());
    /// ```
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Generating)
    }

    /// Returns `true` once a request has resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// use stylist_orchestrator::SlotStatus;
    ///
    /// assert!(SlotStatus::Success.is_settled());
    /// assert!(SlotStatus::Error.is_settled());
    /// assert!(!SlotStatus::Idle.is_settled());
    /// ```
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Generating => write!(f, "generating"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// OutfitSlot
// ============================================================================

/// Generation state and result for one style.
///
/// Transition methods consume the slot and return the next one, so a slot in
/// a published snapshot is never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitSlot {
    /// The style this slot renders.
    pub style: OutfitStyle,

    /// Latest generated image as a `data:` URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,

    /// Current status.
    pub status: SlotStatus,

    /// User-facing failure message (only set in `Error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Sequence number of the latest request issued for this slot.
    #[serde(skip)]
    pub request: u64,
}

impl OutfitSlot {
    /// Creates an idle slot with no image.
    #[must_use]
    pub const fn new(style: OutfitStyle) -> Self {
        Self {
            style,
            image_uri: None,
            status: SlotStatus::Idle,
            error_message: None,
            request: 0,
        }
    }

    /// Returns `true` if the slot holds an image that can be edited.
    #[must_use]
    pub const fn has_image(&self) -> bool {
        self.image_uri.is_some()
    }

    /// Enters `Generating`, clearing any previous error.
    ///
    /// The current image is kept so an edit can still refer to it.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::InvalidStateTransition` if a request is
    /// already in flight.
    pub fn begin_generation(self) -> Result<Self> {
        if self.status.is_busy() {
            return Err(StylistError::invalid_transition(
                self.status,
                SlotStatus::Generating,
            ));
        }
        Ok(self.regenerate())
    }

    /// Enters `Generating` from any state with a new request number.
    ///
    /// A request already in flight is superseded: its result no longer
    /// matches [`OutfitSlot::request`] and must be dropped.
    #[must_use]
    pub fn regenerate(self) -> Self {
        Self {
            status: SlotStatus::Generating,
            error_message: None,
            request: self.request + 1,
            ..self
        }
    }

    /// Resolves a request with a new image.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::InvalidStateTransition` unless the slot is
    /// `Generating`.
    pub fn succeed(self, image_uri: impl Into<String>) -> Result<Self> {
        if !self.status.is_busy() {
            return Err(StylistError::invalid_transition(
                self.status,
                SlotStatus::Success,
            ));
        }
        Ok(Self {
            image_uri: Some(image_uri.into()),
            status: SlotStatus::Success,
            error_message: None,
            ..self
        })
    }

    /// Resolves a request with a failure, keeping the previous image.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::InvalidStateTransition` unless the slot is
    /// `Generating`.
    pub fn fail(self, message: impl Into<String>) -> Result<Self> {
        if !self.status.is_busy() {
            return Err(StylistError::invalid_transition(
                self.status,
                SlotStatus::Error,
            ));
        }
        Ok(Self {
            status: SlotStatus::Error,
            error_message: Some(message.into()),
            ..self
        })
    }
}

// ============================================================================
// Outfits
// ============================================================================

/// Exactly one [`OutfitSlot`] per [`OutfitStyle`].
///
/// Entries are never added or removed. Updates go through
/// [`Outfits::with_slot`], which returns a new mapping and leaves the
/// original untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outfits {
    slots: [OutfitSlot; 3],
}

impl Default for Outfits {
    fn default() -> Self {
        Self::new()
    }
}

impl Outfits {
    /// Creates a mapping with every style idle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [
                OutfitSlot::new(OutfitStyle::Casual),
                OutfitSlot::new(OutfitStyle::Business),
                OutfitSlot::new(OutfitStyle::NightOut),
            ],
        }
    }

    /// Returns the slot for `style`.
    #[must_use]
    pub const fn get(&self, style: OutfitStyle) -> &OutfitSlot {
        &self.slots[style.index()]
    }

    /// Returns a copy of this mapping with `slot` replacing its style's entry.
    #[must_use]
    pub fn with_slot(&self, slot: OutfitSlot) -> Self {
        let mut next = self.clone();
        let index = slot.style.index();
        next.slots[index] = slot;
        next
    }

    /// Iterates slots in [`OutfitStyle::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &OutfitSlot> {
        self.slots.iter()
    }

    /// Returns `true` if any slot has a request in flight.
    #[must_use]
    pub fn any_busy(&self) -> bool {
        self.iter().any(|slot| slot.status.is_busy())
    }

    /// Returns `true` if every slot reached `Success`.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.iter().all(|slot| slot.status == SlotStatus::Success)
    }
}

impl Serialize for Outfits {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for slot in &self.slots {
            map.serialize_entry(&slot.style, slot)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Outfits {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries =
            std::collections::BTreeMap::<OutfitStyle, OutfitSlot>::deserialize(deserializer)?;

        let mut outfits = Self::new();
        for style in OutfitStyle::ALL {
            let slot = entries.get(&style).cloned().ok_or_else(|| {
                serde::de::Error::custom(format!("missing outfit slot '{}'", style.slug()))
            })?;
            if slot.style != style {
                return Err(serde::de::Error::custom(format!(
                    "slot under '{}' is for style '{}'",
                    style.slug(),
                    slot.style.slug()
                )));
            }
            outfits.slots[style.index()] = slot;
        }
        Ok(outfits)
    }
}

// ============================================================================
// Tests
// ============================================================================
