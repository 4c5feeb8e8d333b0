//! Broadcast items and join outcomes
//!
//! Defines what flows through a channel's fan-out pipe and what a join
//! request can come back with.

use tokio::sync::broadcast;

use crate::auth::DenyReason;
use crate::event::NormalizedEvent;

/// An update broadcast to every subscriber of a channel
///
/// Cheap to clone; one copy is delivered per subscriber by the broadcast
/// channel. Stream end travels as a normal `Event` carrying
/// `EventKind::StreamEnd`, after which the channel entry is removed.
#[derive(Debug, Clone)]
pub enum ChannelUpdate {
    /// A normalized live event
    Event(NormalizedEvent),
    /// The upstream connect attempt failed; the channel entry is gone
    ConnectFailed(String),
}

/// Membership record for one subscriber of one channel
///
/// The transport layer owns the socket; the registry owns only this
/// relation and drops it when told the subscriber is gone.
#[derive(Debug, Clone)]
pub struct SubscriberRef {
    /// Transport-level session id
    pub session_id: u64,
    /// Principal resolved by the admission gate; `None` in bypass mode
    pub principal: Option<String>,
}

/// Outcome of a join request
#[derive(Debug)]
pub enum JoinResult {
    /// Admitted; `updates` yields every fan-out item from this point on
    Admitted {
        updates: broadcast::Receiver<ChannelUpdate>,
        principal: Option<String>,
    },
    /// The session already holds membership for this channel
    AlreadyMember,
    /// The admission gate refused the credential
    Denied(DenyReason),
}

impl JoinResult {
    pub fn is_admitted(&self) -> bool {
        matches!(self, JoinResult::Admitted { .. })
    }
}
