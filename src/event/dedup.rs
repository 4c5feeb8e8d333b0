//! Duplicate event suppression
//!
//! The platform occasionally re-reports an operationally identical event
//! within a few hundred milliseconds. The deduplicator keeps a bounded
//! window of recently seen fingerprints and suppresses repeats inside it.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::event::normalized::{EventKind, NormalizedEvent};

/// Default suppression window
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// Default history cap
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Identity of an event for duplicate detection
///
/// Two events with the same fingerprint within the window are one event as
/// far as application handlers are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    kind: &'static str,
    user: String,
    /// Kind-specific discriminant: gift name, chat text, empty otherwise
    discriminant: String,
    /// Quantity field: gift coins, like count, zero otherwise
    quantity: u64,
}

impl Fingerprint {
    fn of(event: &NormalizedEvent) -> Self {
        let (discriminant, quantity) = match &event.kind {
            EventKind::Gift {
                gift_name, coins, ..
            } => (gift_name.clone(), *coins),
            EventKind::Chat { message } => (message.clone(), 0),
            EventKind::Like { count, .. } => (String::new(), u64::from(*count)),
            EventKind::Follow | EventKind::Share | EventKind::StreamEnd => (String::new(), 0),
        };

        Self {
            kind: event.kind_name(),
            user: event.user.clone(),
            discriminant,
            quantity,
        }
    }
}

/// Stateful duplicate suppressor over a bounded recent-event window
#[derive(Debug)]
pub struct Deduplicator {
    window: Duration,
    max_entries: usize,
    seen: HashMap<Fingerprint, Instant>,
    /// Insertion log; entries are invalidated when `seen` holds a newer time
    order: VecDeque<(Fingerprint, Instant)>,
}

impl Deduplicator {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            window,
            max_entries: max_entries.max(1),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Check whether `event` repeats one seen within the window
    ///
    /// A non-duplicate is recorded as seen; a duplicate refreshes nothing,
    /// so a steady stream of repeats stops being suppressed once the first
    /// occurrence ages out.
    pub fn is_duplicate(&mut self, event: &NormalizedEvent) -> bool {
        self.is_duplicate_at(event, Instant::now())
    }

    fn is_duplicate_at(&mut self, event: &NormalizedEvent, now: Instant) -> bool {
        let fingerprint = Fingerprint::of(event);

        if let Some(&last) = self.seen.get(&fingerprint) {
            if now.duration_since(last) < self.window {
                return true;
            }
        }

        self.seen.insert(fingerprint.clone(), now);
        self.order.push_back((fingerprint, now));
        self.evict(now);
        false
    }

    fn evict(&mut self, now: Instant) {
        while self.order.len() > self.max_entries {
            if let Some((fingerprint, at)) = self.order.pop_front() {
                // Only drop the live record if this log entry is the latest
                if self.seen.get(&fingerprint) == Some(&at) {
                    self.seen.remove(&fingerprint);
                }
            }
        }

        // Opportunistically expire aged-out records from the front
        while let Some((fingerprint, at)) = self.order.front() {
            if now.duration_since(*at) < self.window {
                break;
            }
            if self.seen.get(fingerprint) == Some(at) {
                self.seen.remove(fingerprint);
            }
            self.order.pop_front();
        }
    }

    /// Number of fingerprints currently tracked
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_ENTRIES)
    }
}
