//! Thin clients for the managed services this crate delegates persistence to.
//!
//! None of them cache or retry: every call maps onto exactly one remote request
//! (the libSQL pipeline bundles a statement with its `close`).

pub mod blob;
pub mod edge_config;
pub mod sql;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote service answered with a non-success status.
    #[error("{service} request failed: {status} {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} transport error: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned an unexpected payload: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl StoreError {
    pub(crate) fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| StoreError::Transport { service, source }
    }

    pub(crate) fn decode<E: std::fmt::Display>(service: &'static str) -> impl FnOnce(E) -> Self {
        move |e| StoreError::Decode {
            service,
            message: e.to_string(),
        }
    }

    /// Turns a non-success response into `StoreError::Upstream`, passing successes through.
    pub(crate) async fn check(
        service: &'static str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Upstream {
            service,
            status: status.as_u16(),
            body,
        })
    }
}

/// Builds the HTTP client a store uses. Transport timeouts stay at reqwest's defaults.
pub(crate) fn http_client(user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("failed to build tuned HTTP client, using defaults: {}", e);
            reqwest::Client::new()
        })
}
