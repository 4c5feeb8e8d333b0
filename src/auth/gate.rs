//! Admission gate
//!
//! Every join request passes through the gate before it may touch registry
//! state. The check is two-step: resolve the API key to a principal, then
//! verify the principal's subscription has not expired. Both run fresh per
//! attempt; results are never cached.
//!
//! When no backend is configured the gate runs in bypass mode and admits
//! everyone. That is a deliberate dev/degraded posture and is reported
//! distinctly from a backend outage, which always denies.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A principal's subscription record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    /// When the subscription lapses
    pub expires_at: DateTime<Utc>,
}

/// Error reaching the authorization backend
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "authorization backend error: {}", self.0)
    }
}

impl std::error::Error for BackendError {}

/// Key and subscription lookups against the authorization backend
#[async_trait]
pub trait KeyStore: Send + Sync + 'static {
    /// Resolve an API key to its principal id, if the key exists
    async fn principal_for_key(&self, api_key: &str) -> Result<Option<String>, BackendError>;

    /// Fetch a principal's subscription record, if one exists
    async fn subscription(
        &self,
        principal: &str,
    ) -> Result<Option<SubscriptionRecord>, BackendError>;
}

/// How the gate is currently operating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Backend configured; every request is checked
    Enforcing,
    /// No backend configured at startup; all requests admitted
    Bypass,
}

/// Why a join request was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No credential supplied
    MissingKey,
    /// Key not found in the backend
    InvalidKey,
    /// No subscription record for the principal
    SubscriptionMissing,
    /// Subscription lapsed at the given time
    SubscriptionExpired(DateTime<Utc>),
    /// Backend unreachable; the gate fails closed
    BackendUnavailable,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::MissingKey => write!(f, "API key required"),
            DenyReason::InvalidKey => write!(f, "invalid API key"),
            DenyReason::SubscriptionMissing => write!(f, "subscription required"),
            DenyReason::SubscriptionExpired(at) => {
                write!(f, "subscription expired ({})", at.format("%Y-%m-%d"))
            }
            DenyReason::BackendUnavailable => write!(f, "authorization temporarily unavailable"),
        }
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    Admitted {
        /// Resolved principal; `None` in bypass mode
        principal: Option<String>,
        /// Subscription expiry, when known
        expires_at: Option<DateTime<Utc>>,
    },
    Denied(DenyReason),
}

impl AuthorizationResult {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AuthorizationResult::Admitted { .. })
    }
}

/// Gates subscriber admission on key validity and subscription expiry
pub struct AdmissionGate {
    store: Option<Arc<dyn KeyStore>>,
}

impl AdmissionGate {
    /// Create an enforcing gate backed by `store`
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Create a bypass gate that admits every request
    ///
    /// Meant for deployments without a configured backend. Logged loudly so
    /// an operator cannot mistake it for an enforcing gate.
    pub fn bypass() -> Self {
        tracing::warn!("Admission gate running in bypass mode; all subscribers admitted");
        Self { store: None }
    }

    pub fn mode(&self) -> GateMode {
        match self.store {
            Some(_) => GateMode::Enforcing,
            None => GateMode::Bypass,
        }
    }

    /// Run the admission check for one credential
    ///
    /// The raw credential value is never logged, only the outcome.
    pub async fn authorize(&self, credential: Option<&str>) -> AuthorizationResult {
        let store = match &self.store {
            Some(store) => store,
            None => {
                tracing::debug!("Bypass mode: admitting without check");
                return AuthorizationResult::Admitted {
                    principal: None,
                    expires_at: None,
                };
            }
        };

        let api_key = match credential {
            Some(key) if !key.is_empty() => key,
            _ => return AuthorizationResult::Denied(DenyReason::MissingKey),
        };

        let principal = match store.principal_for_key(api_key).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                tracing::info!("Join denied: unknown API key");
                return AuthorizationResult::Denied(DenyReason::InvalidKey);
            }
            Err(err) => {
                tracing::error!(error = %err, "Key lookup failed; denying");
                return AuthorizationResult::Denied(DenyReason::BackendUnavailable);
            }
        };

        match store.subscription(&principal).await {
            Ok(Some(record)) => {
                let now = Utc::now();
                if record.expires_at > now {
                    tracing::debug!(
                        principal = %principal,
                        expires_at = %record.expires_at,
                        "Subscription valid"
                    );
                    AuthorizationResult::Admitted {
                        principal: Some(principal),
                        expires_at: Some(record.expires_at),
                    }
                } else {
                    tracing::info!(
                        principal = %principal,
                        expired_at = %record.expires_at,
                        "Join denied: subscription expired"
                    );
                    AuthorizationResult::Denied(DenyReason::SubscriptionExpired(record.expires_at))
                }
            }
            Ok(None) => {
                tracing::info!(principal = %principal, "Join denied: no subscription");
                AuthorizationResult::Denied(DenyReason::SubscriptionMissing)
            }
            Err(err) => {
                tracing::error!(error = %err, "Subscription lookup failed; denying");
                AuthorizationResult::Denied(DenyReason::BackendUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    struct MapStore {
        keys: HashMap<String, String>,
        subscriptions: HashMap<String, SubscriptionRecord>,
        unavailable: bool,
    }

    #[async_trait]
    impl KeyStore for MapStore {
        async fn principal_for_key(&self, api_key: &str) -> Result<Option<String>, BackendError> {
            if self.unavailable {
                return Err(BackendError("connection refused".into()));
            }
            Ok(self.keys.get(api_key).cloned())
        }

        async fn subscription(
            &self,
            principal: &str,
        ) -> Result<Option<SubscriptionRecord>, BackendError> {
            if self.unavailable {
                return Err(BackendError("connection refused".into()));
            }
            Ok(self.subscriptions.get(principal).cloned())
        }
    }

    fn store_with(expires_at: DateTime<Utc>) -> Arc<MapStore> {
        Arc::new(MapStore {
            keys: HashMap::from([("lvt_key_1".to_string(), "user1".to_string())]),
            subscriptions: HashMap::from([("user1".to_string(), SubscriptionRecord { expires_at })]),
            unavailable: false,
        })
    }

    #[tokio::test]
    async fn test_valid_key_and_subscription_admitted() {
        let gate = AdmissionGate::new(store_with(Utc::now() + Duration::days(30)));
        let result = gate.authorize(Some("lvt_key_1")).await;

        match result {
            AuthorizationResult::Admitted {
                principal,
                expires_at,
            } => {
                assert_eq!(principal.as_deref(), Some("user1"));
                assert!(expires_at.is_some());
            }
            other => panic!("expected admitted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_key_denied() {
        let gate = AdmissionGate::new(store_with(Utc::now() + Duration::days(30)));
        let result = gate.authorize(Some("wrong")).await;
        assert_eq!(result, AuthorizationResult::Denied(DenyReason::InvalidKey));
    }

    #[tokio::test]
    async fn test_missing_key_denied() {
        let gate = AdmissionGate::new(store_with(Utc::now() + Duration::days(30)));
        assert_eq!(
            gate.authorize(None).await,
            AuthorizationResult::Denied(DenyReason::MissingKey)
        );
        assert_eq!(
            gate.authorize(Some("")).await,
            AuthorizationResult::Denied(DenyReason::MissingKey)
        );
    }

    #[tokio::test]
    async fn test_expired_subscription_denied_with_expiry() {
        let expired_at = Utc::now() - Duration::days(1);
        let gate = AdmissionGate::new(store_with(expired_at));

        assert_eq!(
            gate.authorize(Some("lvt_key_1")).await,
            AuthorizationResult::Denied(DenyReason::SubscriptionExpired(expired_at))
        );
    }

    #[tokio::test]
    async fn test_missing_subscription_denied() {
        let store = Arc::new(MapStore {
            keys: HashMap::from([("lvt_key_1".to_string(), "user1".to_string())]),
            subscriptions: HashMap::new(),
            unavailable: false,
        });
        let gate = AdmissionGate::new(store);

        assert_eq!(
            gate.authorize(Some("lvt_key_1")).await,
            AuthorizationResult::Denied(DenyReason::SubscriptionMissing)
        );
    }

    #[tokio::test]
    async fn test_backend_outage_fails_closed() {
        let store = Arc::new(MapStore {
            keys: HashMap::new(),
            subscriptions: HashMap::new(),
            unavailable: true,
        });
        let gate = AdmissionGate::new(store);
        assert_eq!(gate.mode(), GateMode::Enforcing);

        assert_eq!(
            gate.authorize(Some("lvt_key_1")).await,
            AuthorizationResult::Denied(DenyReason::BackendUnavailable)
        );
    }

    #[tokio::test]
    async fn test_bypass_mode_admits_without_credential() {
        let gate = AdmissionGate::bypass();
        assert_eq!(gate.mode(), GateMode::Bypass);

        let result = gate.authorize(None).await;
        assert_eq!(
            result,
            AuthorizationResult::Admitted {
                principal: None,
                expires_at: None
            }
        );
    }
}
