//! Event types and processing
//!
//! Raw upstream payloads come in heterogeneous platform shapes; everything
//! past the normalizer is the unified `NormalizedEvent` schema. The
//! deduplicator suppresses operationally identical repeats within a short
//! window.

pub mod dedup;
pub mod normalized;
pub mod normalizer;
pub mod raw;

pub use dedup::Deduplicator;
pub use normalized::{EventKind, NormalizedEvent, Tier};
pub use normalizer::{Normalizer, TierConfig, TierConfigError};
pub use raw::{RawChat, RawEvent, RawGift, RawLike, RawSocial, GIFT_TYPE_STREAKABLE};
