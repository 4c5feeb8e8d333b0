//! Channel registry implementation
//!
//! The central map from channel id to channel entry. All join/leave/dispatch
//! coordination runs through here; this is the component that defends the
//! at-most-one-upstream-connection invariant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{ChannelEntry, ChannelState, ChannelStats};
use super::lifecycle;
use super::update::{ChannelUpdate, JoinResult, SubscriberRef};
use crate::auth::{AdmissionGate, AuthorizationResult};
use crate::channel::ChannelId;
use crate::event::{Normalizer, RawEvent};
use crate::upstream::LiveSource;

/// Central registry for all active channels
///
/// The outer map lock is held only for lookups and insert/remove, never
/// across an upstream connect; per-channel work serializes on the entry's
/// own lock so unrelated channels proceed in parallel.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<ChannelId, Arc<RwLock<ChannelEntry>>>>,
    config: RegistryConfig,
    gate: AdmissionGate,
    source: Arc<dyn LiveSource>,
    normalizer: Normalizer,
}

impl ChannelRegistry {
    /// Create a registry over an upstream source and admission gate
    pub fn new(source: Arc<dyn LiveSource>, gate: AdmissionGate) -> Self {
        Self::with_config(source, gate, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(
        source: Arc<dyn LiveSource>,
        gate: AdmissionGate,
        config: RegistryConfig,
    ) -> Self {
        let normalizer = Normalizer::new(config.tiers.clone());
        Self {
            channels: RwLock::new(HashMap::new()),
            config,
            gate,
            source,
            normalizer,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub(super) fn source(&self) -> &Arc<dyn LiveSource> {
        &self.source
    }

    /// Request channel membership for a subscriber session
    ///
    /// The admission check runs before any state is touched; a denied
    /// subscriber leaves no trace. On success the entry is get-or-created
    /// atomically and only the creator starts the upstream connection, so
    /// any number of racing joins for one channel yield exactly one connect
    /// attempt.
    pub async fn request_join(
        self: &Arc<Self>,
        session_id: u64,
        channel: &ChannelId,
        credential: Option<&str>,
    ) -> JoinResult {
        let principal = match self.gate.authorize(credential).await {
            AuthorizationResult::Admitted { principal, .. } => principal,
            AuthorizationResult::Denied(reason) => {
                return JoinResult::Denied(reason);
            }
        };

        loop {
            let (entry_arc, created) = self.get_or_create(channel).await;

            {
                let mut entry = entry_arc.write().await;

                // A Closing entry is mid-teardown; once it leaves the map
                // the next iteration creates a fresh one
                if entry.state() == ChannelState::Closing {
                    drop(entry);
                    tokio::task::yield_now().await;
                    continue;
                }

                let inserted = entry.insert_subscriber(SubscriberRef {
                    session_id,
                    principal: principal.clone(),
                });
                if !inserted {
                    return JoinResult::AlreadyMember;
                }

                let updates = entry.subscribe();

                if created {
                    let handle = lifecycle::spawn_channel(Arc::clone(self), channel.clone());
                    entry.attach_connection(handle);
                    tracing::info!(channel = %channel, session_id, "Channel created, connecting upstream");
                } else {
                    tracing::info!(
                        channel = %channel,
                        session_id,
                        subscribers = entry.subscriber_count(),
                        "Joined existing channel"
                    );
                }

                return JoinResult::Admitted { updates, principal };
            }
        }
    }

    /// Drop a session's membership for a channel
    ///
    /// Idempotent. When the last subscriber leaves, the upstream connection
    /// is stopped and the entry removed.
    pub async fn leave(&self, session_id: u64, channel: &ChannelId) {
        let entry_arc = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(entry) => Arc::clone(entry),
                None => return,
            }
        };

        let now_empty = {
            let mut entry = entry_arc.write().await;
            if !entry.remove_subscriber(session_id) {
                return;
            }
            tracing::debug!(
                channel = %channel,
                session_id,
                subscribers = entry.subscriber_count(),
                "Subscriber left"
            );
            entry.subscriber_count() == 0
        };

        if now_empty {
            tracing::info!(channel = %channel, "Last subscriber left, tearing down");
            self.teardown(channel).await;
        }
    }

    /// Normalize a raw upstream event and fan it out to current members
    ///
    /// Called by the channel's connection task, so per-channel calls are
    /// naturally serialized and delivery order equals upstream order. A
    /// no-op when the entry has been torn down.
    pub async fn dispatch(&self, channel: &ChannelId, raw: &RawEvent) {
        let entry_arc = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(entry) => Arc::clone(entry),
                None => {
                    tracing::trace!(channel = %channel, "Dropping event for absent channel");
                    return;
                }
            }
        };

        let events = self.normalizer.normalize(raw);
        if events.is_empty() {
            return;
        }

        let mut entry = entry_arc.write().await;
        if entry.state() == ChannelState::Closing {
            return;
        }

        for event in events {
            if let Some(dedup) = entry.dedup.as_mut() {
                if dedup.is_duplicate(&event) {
                    tracing::debug!(
                        channel = %channel,
                        kind = event.kind_name(),
                        user = %event.user,
                        "Suppressed duplicate event"
                    );
                    continue;
                }
            }

            let delivered = entry.send(ChannelUpdate::Event(event));
            tracing::trace!(channel = %channel, delivered, "Event dispatched");
        }
    }

    /// Number of active channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Point-in-time stats for a channel
    pub async fn channel_stats(&self, channel: &ChannelId) -> Option<ChannelStats> {
        let channels = self.channels.read().await;
        let entry_arc = channels.get(channel)?;
        let entry = entry_arc.read().await;
        Some(ChannelStats {
            state: entry.state(),
            subscriber_count: entry.subscriber_count(),
        })
    }

    /// Whether a channel currently has a live upstream connection
    pub async fn is_live(&self, channel: &ChannelId) -> bool {
        matches!(
            self.channel_stats(channel).await,
            Some(ChannelStats {
                state: ChannelState::Live,
                ..
            })
        )
    }

    /// Atomic get-or-create of a channel entry
    async fn get_or_create(&self, channel: &ChannelId) -> (Arc<RwLock<ChannelEntry>>, bool) {
        let mut channels = self.channels.write().await;
        match channels.get(channel) {
            Some(entry) => (Arc::clone(entry), false),
            None => {
                let entry = Arc::new(RwLock::new(ChannelEntry::new(&self.config)));
                channels.insert(channel.clone(), Arc::clone(&entry));
                (entry, true)
            }
        }
    }

    /// Stop the upstream connection and remove the entry
    ///
    /// Lock order is entry first, map second, matching the join path's
    /// retry-on-Closing so the two never hold both locks at once.
    pub(super) async fn teardown(&self, channel: &ChannelId) {
        let entry_arc = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(entry) => Arc::clone(entry),
                None => return,
            }
        };

        let connection = {
            let mut entry = entry_arc.write().await;
            if entry.state() == ChannelState::Closing {
                return;
            }
            entry.state = ChannelState::Closing;
            entry.take_connection()
        };

        {
            let mut channels = self.channels.write().await;
            channels.remove(channel);
        }

        if let Some(handle) = connection {
            handle.stop();
        }

        tracing::info!(channel = %channel, "Channel entry removed");
    }

    /// Mark a channel live after a successful upstream connect
    ///
    /// Returns false when the entry is gone or closing, telling the caller
    /// to drop the fresh connection.
    pub(super) async fn mark_live(&self, channel: &ChannelId) -> bool {
        let entry_arc = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(entry) => Arc::clone(entry),
                None => return false,
            }
        };

        let mut entry = entry_arc.write().await;
        if entry.state() != ChannelState::Connecting {
            return false;
        }
        entry.state = ChannelState::Live;
        tracing::info!(channel = %channel, "Upstream connected");
        true
    }

    /// Report a failed connect attempt to current members and remove the
    /// entry so a later join can retry
    pub(super) async fn fail_connect(&self, channel: &ChannelId, reason: String) {
        {
            let channels = self.channels.read().await;
            if let Some(entry_arc) = channels.get(channel) {
                let entry = entry_arc.read().await;
                entry.send(ChannelUpdate::ConnectFailed(reason.clone()));
            }
        }

        tracing::warn!(channel = %channel, reason = %reason, "Upstream connect failed");
        self.teardown(channel).await;
    }

    /// Run one lazy sweep over the map
    ///
    /// The inline paths tear entries down eagerly; the sweep is a backstop
    /// that removes any empty non-connecting entry that slipped through.
    pub async fn sweep(&self) {
        let stale: Vec<ChannelId> = {
            let channels = self.channels.read().await;
            let mut stale = Vec::new();
            for (channel, entry_arc) in channels.iter() {
                if let Ok(entry) = entry_arc.try_read() {
                    if entry.subscriber_count() == 0
                        && entry.state() != ChannelState::Connecting
                        && entry.created_at.elapsed() > Duration::from_secs(1)
                    {
                        stale.push(channel.clone());
                    }
                }
            }
            stale
        };

        for channel in stale {
            tracing::info!(channel = %channel, "Sweep removing stale entry");
            self.teardown(&channel).await;
        }
    }

    /// Spawn the background sweep task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.sweep().await;
            }
        })
    }
}
