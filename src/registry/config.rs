//! Registry configuration

use std::time::Duration;

use crate::event::dedup::{DEFAULT_MAX_ENTRIES, DEFAULT_WINDOW};
use crate::event::TierConfig;
use crate::upstream::ConnectOptions;

/// Configuration options for the channel registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each channel's broadcast pipe; a subscriber lagging past
    /// this many undelivered updates starts losing events (delivery is
    /// best-effort)
    pub broadcast_capacity: usize,

    /// Options passed to every upstream connect attempt
    pub connect_options: ConnectOptions,

    /// Gift tier classification
    pub tiers: TierConfig,

    /// Suppress duplicate events server-side before fan-out
    pub dedup_enabled: bool,

    /// Duplicate suppression window
    pub dedup_window: Duration,

    /// Duplicate history cap per channel
    pub dedup_max_entries: usize,

    /// Interval of the lazy sweep that removes stale empty entries
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256,
            connect_options: ConnectOptions::default(),
            tiers: TierConfig::default(),
            dedup_enabled: true,
            dedup_window: DEFAULT_WINDOW,
            dedup_max_entries: DEFAULT_MAX_ENTRIES,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the broadcast pipe capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Set the upstream connect options
    pub fn connect_options(mut self, options: ConnectOptions) -> Self {
        self.connect_options = options;
        self
    }

    /// Set the gift tier configuration
    pub fn tiers(mut self, tiers: TierConfig) -> Self {
        self.tiers = tiers;
        self
    }

    /// Disable server-side duplicate suppression
    pub fn disable_dedup(mut self) -> Self {
        self.dedup_enabled = false;
        self
    }

    /// Set the duplicate suppression window
    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
