//! Channel entry and state types
//!
//! Per-channel state stored in the registry: lifecycle phase, subscriber
//! membership, the fan-out pipe, and the handle of the upstream connection
//! task.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::config::RegistryConfig;
use super::update::{ChannelUpdate, SubscriberRef};
use crate::event::Deduplicator;

/// Lifecycle state of a channel entry
///
/// "Absent" has no variant; an absent channel is simply not in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Upstream connect attempt in flight
    Connecting,
    /// Upstream connected, events flowing
    Live,
    /// Teardown started; the entry is on its way out of the map
    Closing,
}

/// Handle to a channel's upstream connection task
///
/// Owning the handle is owning the connection: aborting the task drops the
/// `LiveConnection`, which disconnects the source.
#[derive(Debug)]
pub struct ConnectionHandle {
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub(super) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop the connection task
    pub(super) fn stop(self) {
        self.task.abort();
    }
}

/// Entry for a single channel in the registry
pub struct ChannelEntry {
    /// Current lifecycle state
    pub(super) state: ChannelState,

    /// Upstream connection task; present iff state is Connecting or Live
    pub(super) connection: Option<ConnectionHandle>,

    /// Current members, keyed by transport session id
    pub(super) subscribers: HashMap<u64, SubscriberRef>,

    /// Fan-out pipe to subscribers
    tx: broadcast::Sender<ChannelUpdate>,

    /// Server-side duplicate suppression, when enabled
    pub(super) dedup: Option<Deduplicator>,

    pub(super) created_at: Instant,
}

impl ChannelEntry {
    /// Create a new entry in the Connecting state
    pub(super) fn new(config: &RegistryConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity);
        let dedup = config
            .dedup_enabled
            .then(|| Deduplicator::new(config.dedup_window, config.dedup_max_entries));

        Self {
            state: ChannelState::Connecting,
            connection: None,
            subscribers: HashMap::new(),
            tx,
            dedup,
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Register membership; returns false if the session was already a member
    pub(super) fn insert_subscriber(&mut self, subscriber: SubscriberRef) -> bool {
        let session_id = subscriber.session_id;
        if self.subscribers.contains_key(&session_id) {
            return false;
        }
        self.subscribers.insert(session_id, subscriber);
        true
    }

    /// Drop membership; returns true if the session was a member
    pub(super) fn remove_subscriber(&mut self, session_id: u64) -> bool {
        self.subscribers.remove(&session_id).is_some()
    }

    /// Subscribe to this channel's fan-out pipe
    pub(super) fn subscribe(&self) -> broadcast::Receiver<ChannelUpdate> {
        self.tx.subscribe()
    }

    /// Send an update to all subscribers
    ///
    /// Returns the number of receivers, 0 when nobody is listening.
    pub(super) fn send(&self, update: ChannelUpdate) -> usize {
        self.tx.send(update).unwrap_or(0)
    }

    pub(super) fn attach_connection(&mut self, handle: ConnectionHandle) {
        self.connection = Some(handle);
    }

    pub(super) fn take_connection(&mut self) -> Option<ConnectionHandle> {
        self.connection.take()
    }
}

/// Point-in-time statistics for one channel
#[derive(Debug, Clone)]
pub struct ChannelStats {
    pub state: ChannelState,
    pub subscriber_count: usize,
}
