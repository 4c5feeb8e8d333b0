//! Channel registry for live-event fan-out
//!
//! The registry maps each broadcast channel to at most one upstream
//! connection and fans normalized events out to every admitted subscriber.
//! It uses `tokio::sync::broadcast` per channel for the fan-out.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<ChannelRegistry>
//!                 ┌────────────────────────────┐
//!                 │ channels: HashMap<Id,      │
//!                 │   ChannelEntry {           │
//!                 │     state, subscribers,    │
//!                 │     tx: broadcast::Tx,     │
//!                 │     connection task,       │
//!                 │   }                        │
//!                 │ >                          │
//!                 └─────────────┬──────────────┘
//!                               │
//!          ┌────────────────────┼────────────────────┐
//!          │                    │                    │
//!          ▼                    ▼                    ▼
//!     [channel task]      [subscriber]         [subscriber]
//!     source events       updates.recv()       updates.recv()
//!          │                    │                    │
//!          └──► dispatch() ──► normalize ──► broadcast
//! ```
//!
//! Joins get-or-create the entry atomically; only the creator spawns the
//! connection task, so racing joins never produce a second upstream
//! connection. The outer map lock is never held across a connect attempt.

pub mod config;
pub mod entry;
mod lifecycle;
pub mod store;
pub mod update;

pub use config::RegistryConfig;
pub use entry::{ChannelState, ChannelStats};
pub use store::ChannelRegistry;
pub use update::{ChannelUpdate, JoinResult, SubscriberRef};
