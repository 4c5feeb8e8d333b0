//! Crate-level error types

use crate::auth::BackendError;
use crate::event::TierConfigError;
use crate::upstream::UpstreamError;

/// Convenience result alias
pub type Result<T> = std::result::Result<T, RelayError>;

/// Top-level relay error
#[derive(Debug)]
pub enum RelayError {
    /// I/O failure on the listener or a subscriber socket
    Io(std::io::Error),
    /// WebSocket protocol failure on a subscriber socket
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// Subscriber handshake did not complete in time
    HandshakeTimeout,
    /// Upstream connect failure
    Upstream(UpstreamError),
    /// Authorization backend failure
    Backend(BackendError),
    /// Invalid tier configuration
    TierConfig(TierConfigError),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
            RelayError::WebSocket(e) => write!(f, "websocket error: {}", e),
            RelayError::HandshakeTimeout => write!(f, "websocket handshake timed out"),
            RelayError::Upstream(e) => write!(f, "{}", e),
            RelayError::Backend(e) => write!(f, "{}", e),
            RelayError::TierConfig(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Io(e) => Some(e),
            RelayError::WebSocket(e) => Some(e),
            RelayError::HandshakeTimeout => None,
            RelayError::Upstream(e) => Some(e),
            RelayError::Backend(e) => Some(e),
            RelayError::TierConfig(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::WebSocket(e)
    }
}

impl From<UpstreamError> for RelayError {
    fn from(e: UpstreamError) -> Self {
        RelayError::Upstream(e)
    }
}

impl From<BackendError> for RelayError {
    fn from(e: BackendError) -> Self {
        RelayError::Backend(e)
    }
}

impl From<TierConfigError> for RelayError {
    fn from(e: TierConfigError) -> Self {
        RelayError::TierConfig(e)
    }
}
