//! # live-relay
//!
//! A live-event channel relay: one upstream connection per broadcast
//! channel, fanned out to any number of WebSocket subscribers, with
//! subscription-gated admission and a unified event schema over
//! heterogeneous platform payloads.
//!
//! ## Architecture
//!
//! - [`registry`] — the core: maps channel ids to at most one upstream
//!   connection, tracks subscriber membership, and broadcasts normalized
//!   events in upstream order.
//! - [`upstream`] — the `LiveSource` boundary; the platform connector
//!   plugs in here.
//! - [`auth`] — the admission gate and the `KeyStore` backend boundary.
//! - [`event`] — raw payloads, the normalizer, tier classification, and
//!   duplicate suppression.
//! - [`server`] — the WebSocket subscriber transport.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use live_relay::auth::AdmissionGate;
//! use live_relay::registry::ChannelRegistry;
//! use live_relay::server::{RelayServer, ServerConfig};
//! use live_relay::upstream::LiveSource;
//!
//! async fn serve(source: Arc<dyn LiveSource>) -> live_relay::Result<()> {
//!     let registry = Arc::new(ChannelRegistry::new(source, AdmissionGate::bypass()));
//!     let server = RelayServer::new(ServerConfig::default(), registry);
//!     server.run().await
//! }
//! ```

pub mod auth;
pub mod channel;
pub mod error;
pub mod event;
pub mod registry;
pub mod server;
pub mod upstream;

pub use channel::ChannelId;
pub use error::{RelayError, Result};
pub use event::{Deduplicator, EventKind, NormalizedEvent, Normalizer, RawEvent, TierConfig};
pub use registry::{ChannelRegistry, ChannelUpdate, JoinResult, RegistryConfig};
pub use server::{RelayServer, ServerConfig};
