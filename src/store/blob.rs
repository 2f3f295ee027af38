//! Vercel Blob REST client: upload, delete and prefix listing.
//!
//! Uploads are always public. Every request carries the read-write token as a
//! bearer credential.

use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{http_client, StoreError};
use crate::config::BlobSettings;

const SERVICE: &str = "blob store";
const API_VERSION: &str = "7";

/// Upload payload. Byte vectors, borrowed byte views, text and `Bytes` all
/// normalize into one contiguous buffer before the request is built.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobBody(Bytes);

impl BlobBody {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for BlobBody {
    fn from(b: Bytes) -> Self {
        BlobBody(b)
    }
}

impl From<Vec<u8>> for BlobBody {
    fn from(v: Vec<u8>) -> Self {
        BlobBody(Bytes::from(v))
    }
}

impl From<&[u8]> for BlobBody {
    fn from(v: &[u8]) -> Self {
        BlobBody(Bytes::copy_from_slice(v))
    }
}

impl From<String> for BlobBody {
    fn from(s: String) -> Self {
        BlobBody(Bytes::from(s))
    }
}

impl From<&str> for BlobBody {
    fn from(s: &str) -> Self {
        BlobBody(Bytes::copy_from_slice(s.as_bytes()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutBlobResult {
    pub url: String,
    pub download_url: String,
    pub pathname: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBlobItem {
    pub url: String,
    pub download_url: String,
    pub pathname: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBlobResult {
    pub blobs: Vec<ListBlobItem>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    urls: &'a [&'a str],
}

#[derive(Clone)]
pub struct BlobClient {
    http: Client,
    base: Url,
    token: String,
}

impl BlobClient {
    pub fn new(settings: &BlobSettings) -> anyhow::Result<Self> {
        let base = Url::parse(&settings.api_url)
            .with_context(|| format!("invalid blob API URL: {}", settings.api_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("blob API URL cannot be a base: {}", settings.api_url);
        }

        Ok(Self {
            http: http_client(concat!("edge-tokens/", env!("CARGO_PKG_VERSION"))),
            base,
            token: settings.rw_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Uploads `data` to `pathname` with public read access.
    pub async fn upload(
        &self,
        pathname: &str,
        data: impl Into<BlobBody>,
    ) -> Result<PutBlobResult, StoreError> {
        let body = data.into();
        let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
        let url = self.url(&segments);

        tracing::debug!(pathname, bytes = body.len(), "blob upload");

        let resp = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .header("x-vercel-blob-access", "public")
            .body(body.into_bytes())
            .send()
            .await
            .map_err(StoreError::transport(SERVICE))?;

        let resp = StoreError::check(SERVICE, resp).await?;
        resp.json().await.map_err(StoreError::decode(SERVICE))
    }

    /// Deletes a blob by pathname or full URL.
    pub async fn delete(&self, pathname_or_url: &str) -> Result<(), StoreError> {
        tracing::debug!(target_blob = pathname_or_url, "blob delete");

        let resp = self
            .http
            .post(self.url(&["delete"]))
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .json(&DeleteBody {
                urls: &[pathname_or_url],
            })
            .send()
            .await
            .map_err(StoreError::transport(SERVICE))?;

        StoreError::check(SERVICE, resp).await?;
        Ok(())
    }

    pub async fn list(&self, opts: &ListOptions) -> Result<ListBlobResult, StoreError> {
        let mut url = self.url(&[]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(prefix) = &opts.prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(cursor) = &opts.cursor {
                query.append_pair("cursor", cursor);
            }
            if let Some(limit) = opts.limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .send()
            .await
            .map_err(StoreError::transport(SERVICE))?;

        let resp = StoreError::check(SERVICE, resp).await?;
        resp.json().await.map_err(StoreError::decode(SERVICE))
    }
}
