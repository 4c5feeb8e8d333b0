//! Channel identifiers
//!
//! A channel is an external broadcast identified by a platform username.
//! The identifier is normalized once at the edge and used as the registry
//! map key everywhere after that.

/// Unique identifier for a broadcast channel
///
/// Normalization strips a leading `@` (users paste handles both ways) but
/// preserves case, matching how the upstream platform resolves usernames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel id from a raw user-supplied handle
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        let name = raw.strip_prefix('@').unwrap_or(raw);
        Self(name.to_string())
    }

    /// Get the normalized channel name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the id is usable (non-empty after normalization)
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
