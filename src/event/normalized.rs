//! Unified event schema
//!
//! Every raw upstream payload that survives normalization becomes a
//! `NormalizedEvent`. Downstream consumers only ever see this shape, so
//! platform quirks stay behind the normalizer.

use serde::Serialize;

/// A gift tier assigned by the normalizer
///
/// Tiers are configuration (see `TierConfig`), so they travel as plain
/// strings rather than a closed enum.
pub type Tier = String;

/// One normalized event on a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    /// Channel-scoped timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Originating platform user
    pub user: String,
    /// Event payload
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Variant-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Gift {
        /// Display name of the gift
        gift_name: String,
        /// Platform gift identifier
        gift_id: u64,
        /// Total coin value: per-unit value times repeat count
        coins: u64,
        /// Repeat count of the completed streak (1 for single gifts)
        amount: u32,
        /// Classified tier
        tier: Tier,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon_url: Option<String>,
    },
    Chat {
        message: String,
    },
    Like {
        /// Likes in this batch
        count: u32,
        /// Running total for the broadcast
        total: u64,
    },
    Follow,
    Share,
    StreamEnd,
}

impl NormalizedEvent {
    pub fn new(timestamp_ms: u64, user: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp_ms,
            user: user.into(),
            kind,
        }
    }

    /// Short name of the event kind, used for logging and dedup fingerprints
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::Gift { .. } => "gift",
            EventKind::Chat { .. } => "chat",
            EventKind::Like { .. } => "like",
            EventKind::Follow => "follow",
            EventKind::Share => "share",
            EventKind::StreamEnd => "stream_end",
        }
    }
}
