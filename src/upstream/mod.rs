//! Upstream live-event source boundary
//!
//! The platform protocol itself lives behind the `LiveSource` trait; the
//! relay only depends on being able to connect to a channel and read a typed
//! stream of raw events from it. Tests plug in in-process sources, a real
//! deployment plugs in the platform connector.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::channel::ChannelId;
use crate::event::RawEvent;

/// Options for an upstream connect attempt
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Replay events the platform buffered before the connection completed.
    /// The relay keeps this off: only events after establishment are live.
    pub process_initial_events: bool,

    /// Polling/keepalive interval the connector should use
    pub polling_interval: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            process_initial_events: false,
            polling_interval: Duration::from_secs(2),
        }
    }
}

/// A live upstream connection to one channel
///
/// Raw events arrive on `events` in platform emission order. Dropping the
/// connection (receiver included) tells the source to disconnect; a source
/// signals stream end by emitting `RawEvent::StreamEnd` and closing the
/// channel.
#[derive(Debug)]
pub struct LiveConnection {
    pub events: mpsc::Receiver<RawEvent>,
}

impl LiveConnection {
    pub fn new(events: mpsc::Receiver<RawEvent>) -> Self {
        Self { events }
    }
}

/// Error connecting to an upstream channel
#[derive(Debug, Clone)]
pub enum UpstreamError {
    /// The channel is not currently broadcasting
    ChannelOffline(String),
    /// The platform rejected the attempt due to rate limiting
    RateLimited,
    /// Network-level failure during connect
    Network(String),
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::ChannelOffline(channel) => {
                write!(f, "channel is not live: {}", channel)
            }
            UpstreamError::RateLimited => write!(f, "upstream rate limited"),
            UpstreamError::Network(msg) => write!(f, "upstream network error: {}", msg),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Source of live events for broadcast channels
///
/// Implementations must establish one independent connection per call; the
/// registry guarantees at most one call is in flight per channel.
#[async_trait]
pub trait LiveSource: Send + Sync + 'static {
    /// Connect to a channel's live broadcast
    async fn connect(
        &self,
        channel: &ChannelId,
        options: &ConnectOptions,
    ) -> Result<LiveConnection, UpstreamError>;
}
