//! Raw upstream event payloads
//!
//! Typed versions of the payloads the live platform pushes for a connected
//! channel. Field names mirror the platform wire format (camelCase), so
//! these deserialize straight out of the upstream connector without a
//! translation layer.

use serde::Deserialize;

/// Streakable gift type marker used by the platform
///
/// Gifts of this type are reported repeatedly while the sender holds the
/// combo gesture; only the report carrying `repeatEnd` is final.
pub const GIFT_TYPE_STREAKABLE: u8 = 1;

/// An event pushed by the upstream platform for one channel
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RawEvent {
    /// A gift was sent to the broadcaster
    Gift(RawGift),
    /// A chat message
    Chat(RawChat),
    /// A like tap (batched by the platform)
    Like(RawLike),
    /// A social interaction (follow and/or share, flagged in `displayType`)
    Social(RawSocial),
    /// The broadcast ended
    StreamEnd,
}

/// Raw gift payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGift {
    /// Sender's platform username
    pub unique_id: String,
    /// Platform gift identifier; absent on some malformed reports
    #[serde(default)]
    pub gift_id: Option<u64>,
    #[serde(default)]
    pub gift_name: String,
    /// Per-unit coin value
    #[serde(default)]
    pub diamond_count: u64,
    /// Number of repeats in the current streak
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    /// Gift type; `GIFT_TYPE_STREAKABLE` means combo-capable
    #[serde(default)]
    pub gift_type: u8,
    /// True on the final report of a streak
    #[serde(default)]
    pub repeat_end: bool,
    #[serde(default)]
    pub gift_picture_url: Option<String>,
    #[serde(default)]
    pub timestamp_ms: u64,
}

fn default_repeat_count() -> u32 {
    1
}

impl RawGift {
    /// Whether this report is an interim streak repeat that should be held
    /// back until the final report arrives
    pub fn is_interim_repeat(&self) -> bool {
        self.gift_type == GIFT_TYPE_STREAKABLE && !self.repeat_end
    }
}

/// Raw chat payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChat {
    pub unique_id: String,
    pub comment: String,
    #[serde(default)]
    pub timestamp_ms: u64,
}

/// Raw like payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLike {
    pub unique_id: String,
    /// Likes in this batch
    #[serde(default)]
    pub like_count: u32,
    /// Running total for the broadcast
    #[serde(default)]
    pub total_like_count: u64,
    #[serde(default)]
    pub timestamp_ms: u64,
}

/// Raw social payload
///
/// The platform folds follows and shares into one event kind and signals
/// which occurred through substrings of `display_type`; a single payload
/// may indicate both.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSocial {
    pub unique_id: String,
    pub display_type: String,
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl RawSocial {
    pub fn is_follow(&self) -> bool {
        self.display_type.contains("follow")
    }

    pub fn is_share(&self) -> bool {
        self.display_type.contains("share")
    }
}
