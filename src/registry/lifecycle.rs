//! Per-channel upstream connection task
//!
//! One task owns one channel's upstream connection for its whole life:
//! connect, forward every raw event into `ChannelRegistry::dispatch`, and
//! tear the entry down when the stream ends or the connect fails. The
//! registry spawns exactly one of these per channel entry, which is what
//! keeps the at-most-one-connection invariant local and enforceable.

use std::sync::Arc;

use super::entry::ConnectionHandle;
use super::store::ChannelRegistry;
use crate::channel::ChannelId;
use crate::event::RawEvent;

/// Spawn the connection task for a freshly created channel entry
pub(super) fn spawn_channel(registry: Arc<ChannelRegistry>, channel: ChannelId) -> ConnectionHandle {
    let task = tokio::spawn(async move {
        run_channel(registry, channel).await;
    });
    ConnectionHandle::new(task)
}

async fn run_channel(registry: Arc<ChannelRegistry>, channel: ChannelId) {
    let options = registry.config().connect_options.clone();

    let connection = match registry.source().connect(&channel, &options).await {
        Ok(connection) => connection,
        Err(err) => {
            // No automatic retry: the entry is removed and the next join
            // attempt starts a fresh connect
            registry.fail_connect(&channel, err.to_string()).await;
            return;
        }
    };

    if !registry.mark_live(&channel).await {
        // Torn down while connecting (all joiners left); dropping the
        // connection disconnects the source
        tracing::debug!(channel = %channel, "Connected to already-closed channel, dropping");
        return;
    }

    let mut events = connection.events;
    let mut saw_end = false;

    while let Some(raw) = events.recv().await {
        let is_end = matches!(raw, RawEvent::StreamEnd);
        registry.dispatch(&channel, &raw).await;
        if is_end {
            saw_end = true;
            break;
        }
    }

    // A source that closes its pipe without an explicit end marker is
    // treated as a stream end so members still get the terminal event
    if !saw_end {
        tracing::debug!(channel = %channel, "Upstream closed without end marker");
        registry.dispatch(&channel, &RawEvent::StreamEnd).await;
    }

    tracing::info!(channel = %channel, "Stream ended");
    registry.teardown(&channel).await;
}
