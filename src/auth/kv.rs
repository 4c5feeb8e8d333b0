//! Key/value-table authorization backend
//!
//! The backend is a single KV table exposed over a PostgREST-style API:
//! `api_key:<principal>` rows hold issued API keys, and
//! `subscription:<principal>` rows hold a JSON record with an RFC 3339
//! `endDate`. Lookups are filtered server-side; the relay never pulls the
//! whole key table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::gate::{BackendError, KeyStore, SubscriptionRecord};

const API_KEY_PREFIX: &str = "api_key:";
const SUBSCRIPTION_PREFIX: &str = "subscription:";

/// Configuration for the KV backend client
#[derive(Debug, Clone)]
pub struct KvStoreConfig {
    /// Base URL of the REST API (no trailing slash)
    pub base_url: String,
    /// Service-role key sent as both `apikey` and bearer token
    pub service_key: String,
    /// Name of the KV table
    pub table: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl KvStoreConfig {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            service_key: service_key.into(),
            table: table.into(),
            request_timeout: Duration::from_secs(5),
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// One row of the KV table
#[derive(Debug, Deserialize)]
struct KvRow {
    key: String,
    value: serde_json::Value,
}

/// Subscription record payload stored under `subscription:<principal>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionPayload {
    end_date: DateTime<Utc>,
}

/// `KeyStore` implementation over the HTTP KV table
pub struct KvStoreClient {
    config: KvStoreConfig,
    http: reqwest::Client,
}

impl KvStoreClient {
    pub fn new(config: KvStoreConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError(e.to_string()))?;

        Ok(Self { config, http })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, self.config.table)
    }

    async fn fetch_rows(&self, query: &[(&str, String)]) -> Result<Vec<KvRow>, BackendError> {
        let response = self
            .http
            .get(self.table_url())
            .query(query)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .send()
            .await
            .map_err(|e| BackendError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError(format!("backend returned {}", status)));
        }

        response
            .json::<Vec<KvRow>>()
            .await
            .map_err(|e| BackendError(e.to_string()))
    }
}

#[async_trait]
impl KeyStore for KvStoreClient {
    async fn principal_for_key(&self, api_key: &str) -> Result<Option<String>, BackendError> {
        // One filtered query: match the key value, constrain to api_key rows
        let rows = self
            .fetch_rows(&[
                ("select", "key,value".to_string()),
                ("key", format!("like.{}*", API_KEY_PREFIX)),
                ("value", format!("eq.{}", api_key)),
            ])
            .await?;

        let principal = rows
            .iter()
            .filter_map(|row| row.key.strip_prefix(API_KEY_PREFIX))
            .next()
            .map(str::to_string);

        Ok(principal)
    }

    async fn subscription(
        &self,
        principal: &str,
    ) -> Result<Option<SubscriptionRecord>, BackendError> {
        let rows = self
            .fetch_rows(&[
                ("select", "key,value".to_string()),
                ("key", format!("eq.{}{}", SUBSCRIPTION_PREFIX, principal)),
            ])
            .await?;

        let row = match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        };

        // A record that cannot be parsed is treated as absent, not an
        // outage; the subscriber is denied with "subscription required"
        match serde_json::from_value::<SubscriptionPayload>(row.value) {
            Ok(payload) => Ok(Some(SubscriptionRecord {
                expires_at: payload.end_date,
            })),
            Err(err) => {
                tracing::warn!(
                    principal = %principal,
                    error = %err,
                    "Unparseable subscription record"
                );
                Ok(None)
            }
        }
    }
}
