//! Subscriber admission
//!
//! The admission gate checks a subscriber's credential against the
//! authorization backend before the registry will touch any channel state.
//! The backend itself sits behind the `KeyStore` trait; `KvStoreClient` is
//! the HTTP implementation.

pub mod gate;
pub mod kv;

pub use gate::{
    AdmissionGate, AuthorizationResult, BackendError, DenyReason, GateMode, KeyStore,
    SubscriptionRecord,
};
pub use kv::{KvStoreClient, KvStoreConfig};
