//! Edge Config REST client.
//!
//! Reads single items and submits batched upsert/delete patches:
//!
//! ```text
//! GET   {base}/{edge_config_id}/item/{key}
//! PATCH {base}/{edge_config_id}/items   {"items": [{"operation": "upsert", ...}]}
//! ```

use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{http_client, StoreError};
use crate::config::EdgeConfigSettings;

const SERVICE: &str = "edge config";

/// A single entry of a patch batch. Serialized in the shape the REST API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum PatchOp {
    Upsert {
        key: String,
        value: serde_json::Value,
    },
    Delete {
        key: String,
    },
}

impl PatchOp {
    pub fn upsert<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, StoreError> {
        Ok(PatchOp::Upsert {
            key: key.into(),
            value: serde_json::to_value(value).map_err(StoreError::decode(SERVICE))?,
        })
    }

    pub fn delete(key: impl Into<String>) -> Self {
        PatchOp::Delete { key: key.into() }
    }
}

#[derive(Serialize)]
struct PatchBody<'a> {
    items: &'a [PatchOp],
}

#[derive(Deserialize)]
struct ItemEnvelope<T> {
    value: T,
}

#[derive(Clone)]
pub struct EdgeConfigClient {
    http: Client,
    base: Url,
    config_id: String,
    token: String,
}

impl EdgeConfigClient {
    pub fn new(settings: &EdgeConfigSettings) -> anyhow::Result<Self> {
        let base = Url::parse(&settings.base_url)
            .with_context(|| format!("invalid Edge Config base URL: {}", settings.base_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Edge Config base URL cannot be a base: {}", settings.base_url);
        }

        Ok(Self {
            http: http_client(concat!("edge-tokens/", env!("CARGO_PKG_VERSION"))),
            base,
            config_id: settings.config_id.clone(),
            token: settings.rw_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base always accepts path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.config_id).extend(segments);
        }
        url
    }

    /// Fetches the value stored under `key`. A remote 404 is `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let url = self.url(&["item", key]);
        tracing::debug!(key, "edge config get");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("cache-control", "no-store")
            .send()
            .await
            .map_err(StoreError::transport(SERVICE))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = StoreError::check(SERVICE, resp).await?;
        let envelope: ItemEnvelope<T> = resp.json().await.map_err(StoreError::decode(SERVICE))?;
        Ok(Some(envelope.value))
    }

    /// Submits `items` in order as one request. The batch either succeeds or
    /// the whole call reports the remote failure.
    pub async fn patch(&self, items: &[PatchOp]) -> Result<(), StoreError> {
        let url = self.url(&["items"]);
        tracing::debug!(count = items.len(), "edge config patch");

        let resp = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .json(&PatchBody { items })
            .send()
            .await
            .map_err(StoreError::transport(SERVICE))?;

        StoreError::check(SERVICE, resp).await?;
        Ok(())
    }
}
