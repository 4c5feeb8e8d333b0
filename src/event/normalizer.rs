//! Event normalization
//!
//! Converts raw platform payloads into the unified schema. Normalization is
//! pure: no I/O, no shared state, one raw event in, zero to two normalized
//! events out. Malformed payloads are dropped here so they can never reach
//! the fan-out path.

use std::collections::HashMap;

use crate::event::normalized::{EventKind, NormalizedEvent, Tier};
use crate::event::raw::{RawEvent, RawGift};

/// Gift tier configuration
///
/// Classification consults the static gift-id mapping first, then falls back
/// to coin-value thresholds. Thresholds are ascending `(min_coins, tier)`
/// pairs; a gift gets the tier of the highest threshold at or below its coin
/// value. The first threshold must start at zero so every non-negative coin
/// value maps to exactly one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierConfig {
    gift_map: HashMap<u64, Tier>,
    thresholds: Vec<(u64, Tier)>,
}

/// Error building an invalid tier configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierConfigError {
    /// No thresholds supplied
    Empty,
    /// First threshold does not start at zero, leaving low values unmapped
    NotExhaustive(u64),
    /// Thresholds not strictly increasing
    NotMonotonic(u64),
}

impl std::fmt::Display for TierConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierConfigError::Empty => write!(f, "tier thresholds must not be empty"),
            TierConfigError::NotExhaustive(min) => {
                write!(f, "first tier threshold must be 0, got {}", min)
            }
            TierConfigError::NotMonotonic(min) => {
                write!(f, "tier thresholds must be strictly increasing at {}", min)
            }
        }
    }
}

impl std::error::Error for TierConfigError {}

impl TierConfig {
    /// Build a tier configuration, validating the threshold ladder
    pub fn new(
        gift_map: HashMap<u64, Tier>,
        thresholds: Vec<(u64, Tier)>,
    ) -> Result<Self, TierConfigError> {
        match thresholds.first() {
            None => return Err(TierConfigError::Empty),
            Some(&(min, _)) if min != 0 => return Err(TierConfigError::NotExhaustive(min)),
            _ => {}
        }
        for pair in thresholds.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(TierConfigError::NotMonotonic(pair[1].0));
            }
        }

        Ok(Self {
            gift_map,
            thresholds,
        })
    }

    /// Classify a gift by id, falling back to its coin value
    pub fn classify(&self, gift_id: u64, coins: u64) -> &Tier {
        if let Some(tier) = self.gift_map.get(&gift_id) {
            return tier;
        }

        // First threshold is 0, so the search always matches
        let idx = self
            .thresholds
            .partition_point(|&(min, _)| min <= coins)
            .saturating_sub(1);
        &self.thresholds[idx].1
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        let gift_map = HashMap::from([
            (5670, "soldier".to_string()),
            (5671, "tank".to_string()),
            (5678, "boss".to_string()),
        ]);
        let thresholds = vec![
            (0, "soldier".to_string()),
            (10, "tank".to_string()),
            (100, "boss".to_string()),
        ];
        Self::new(gift_map, thresholds).expect("default tier config is valid")
    }
}

/// Converts raw upstream events into normalized events
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    tiers: TierConfig,
}

impl Normalizer {
    pub fn new(tiers: TierConfig) -> Self {
        Self { tiers }
    }

    /// Normalize one raw event
    ///
    /// Returns zero events when the payload is dropped (interim streak
    /// repeats, malformed gifts, social payloads matching nothing) and two
    /// when a social payload signals both follow and share.
    pub fn normalize(&self, raw: &RawEvent) -> Vec<NormalizedEvent> {
        match raw {
            RawEvent::Gift(gift) => self.normalize_gift(gift).into_iter().collect(),
            RawEvent::Chat(chat) => vec![NormalizedEvent::new(
                chat.timestamp_ms,
                chat.unique_id.clone(),
                EventKind::Chat {
                    message: chat.comment.clone(),
                },
            )],
            RawEvent::Like(like) => vec![NormalizedEvent::new(
                like.timestamp_ms,
                like.unique_id.clone(),
                EventKind::Like {
                    count: like.like_count,
                    total: like.total_like_count,
                },
            )],
            RawEvent::Social(social) => {
                let mut events = Vec::with_capacity(2);
                // Follow before share when a payload signals both
                if social.is_follow() {
                    events.push(NormalizedEvent::new(
                        social.timestamp_ms,
                        social.unique_id.clone(),
                        EventKind::Follow,
                    ));
                }
                if social.is_share() {
                    events.push(NormalizedEvent::new(
                        social.timestamp_ms,
                        social.unique_id.clone(),
                        EventKind::Share,
                    ));
                }
                events
            }
            RawEvent::StreamEnd => {
                vec![NormalizedEvent::new(0, String::new(), EventKind::StreamEnd)]
            }
        }
    }

    fn normalize_gift(&self, gift: &RawGift) -> Option<NormalizedEvent> {
        // Interim combo repeats are re-reported with a growing count; only
        // the final report counts
        if gift.is_interim_repeat() {
            return None;
        }

        let gift_id = match gift.gift_id {
            Some(id) => id,
            None => {
                tracing::debug!(user = %gift.unique_id, "Dropping gift without id");
                return None;
            }
        };

        // Saturate rather than trust upstream arithmetic bounds
        let coins = gift.diamond_count.saturating_mul(u64::from(gift.repeat_count));
        let tier = self.tiers.classify(gift_id, coins).clone();

        Some(NormalizedEvent::new(
            gift.timestamp_ms,
            gift.unique_id.clone(),
            EventKind::Gift {
                gift_name: gift.gift_name.clone(),
                gift_id,
                coins,
                amount: gift.repeat_count,
                tier,
                icon_url: gift.gift_picture_url.clone(),
            },
        ))
    }
}
