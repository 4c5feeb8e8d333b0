//! WebSocket subscriber transport
//!
//! The outward-facing side of the relay: accepts subscriber sockets, reads
//! `set_channel` joins, and pumps each channel's fan-out updates onto the
//! wire as JSON frames.

pub mod config;
pub mod listener;
pub mod protocol;
mod session;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use protocol::{ClientMessage, ServerMessage};
