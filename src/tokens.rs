//! Token lifecycle on top of Edge Config: issue, show, status changes, delete.
//!
//! Every mutation is a single patch request; the service keeps no state of its
//! own between calls.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::token::{self, StoredToken, TokenStatus};
use crate::store::edge_config::{EdgeConfigClient, PatchOp};

/// What the caller sees exactly once, at issuance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub id: String,
    pub token: String,
    #[serde(
        with = "token::iso_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: TokenStatus,
}

#[derive(Clone)]
pub struct TokenService {
    store: EdgeConfigClient,
}

impl TokenService {
    pub fn new(store: EdgeConfigClient) -> Self {
        Self { store }
    }

    /// Persists a new active token and returns its plaintext.
    ///
    /// `secret` is used verbatim when non-empty; otherwise 32 random bytes are
    /// generated. `ttl_seconds` must already be validated by `parse_ttl`.
    pub async fn issue(
        &self,
        secret: Option<String>,
        ttl_seconds: Option<f64>,
    ) -> Result<IssuedToken, AppError> {
        let now = Utc::now().trunc_subsecs(3);
        let expires_at = ttl_seconds.map(|ttl| expiry_from(now, ttl)).transpose()?;

        let plain = secret
            .filter(|s| !s.is_empty())
            .unwrap_or_else(token::generate_secret);
        let stored = StoredToken::new(&plain, now, expires_at);

        self.store
            .patch(&[PatchOp::upsert(stored.key(), &stored)?])
            .await?;

        tracing::info!(id = %stored.id, expires_at = ?stored.expires_at, "token issued");

        Ok(IssuedToken {
            id: stored.id,
            token: plain,
            expires_at: stored.expires_at,
            status: stored.status,
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredToken>, AppError> {
        Ok(self.store.get(&token::store_key(id)).await?)
    }

    /// Removes the record. Succeeds whether or not it existed.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.store
            .patch(&[PatchOp::delete(token::store_key(id))])
            .await?;
        tracing::info!(id, "token deleted");
        Ok(())
    }

    /// Overwrites the status of an existing record.
    ///
    /// The record is handled as a raw JSON object so every other field,
    /// including ones this crate does not model, is written back untouched.
    pub async fn set_status(&self, id: &str, status: TokenStatus) -> Result<TokenStatus, AppError> {
        let key = token::store_key(id);
        let mut record: Map<String, Value> = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("token {}", id)))?;

        record.insert("status".into(), Value::from(status.as_str()));
        self.store.patch(&[PatchOp::upsert(key, &record)?]).await?;

        tracing::info!(id, status = %status, "token status updated");
        Ok(status)
    }
}

/// Validates an optional `ttlSeconds` value.
///
/// Absent means no expiry. Numbers and numeric strings are accepted when they
/// are finite and strictly positive; everything else is rejected.
pub fn parse_ttl(raw: Option<&Value>) -> Result<Option<f64>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match n {
        Some(n) if n.is_finite() && n > 0.0 => Ok(Some(n)),
        _ => Err(AppError::InvalidArgument(
            "ttlSeconds must be a positive number".into(),
        )),
    }
}

/// `now + ttl_seconds`, at millisecond precision.
pub fn expiry_from(now: DateTime<Utc>, ttl_seconds: f64) -> Result<DateTime<Utc>, AppError> {
    let out_of_range = || AppError::InvalidArgument("ttlSeconds is out of range".into());

    let millis = (ttl_seconds * 1000.0).round();
    if millis >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let delta = chrono::Duration::try_milliseconds(millis as i64).ok_or_else(out_of_range)?;
    now.checked_add_signed(delta).ok_or_else(out_of_range)
}
