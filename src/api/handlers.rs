use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::AppError;
use crate::models::token::{StoredToken, TokenStatus};
use crate::tokens::{self, IssuedToken};
use crate::AppState;

// ── Request parsing ──────────────────────────────────────────

/// Bodies are parsed leniently: anything that is not a JSON object is treated
/// as `{}`, so the request then fails on whichever field it is missing.
fn parse_body(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn required_id(body: &Map<String, Value>) -> Result<String, AppError> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::InvalidArgument("id is required".into()))
}

#[derive(Deserialize)]
pub struct ShowTokenQuery {
    pub id: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /token: issue a token; the plaintext is only ever returned here
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<IssuedToken>), AppError> {
    let body = parse_body(&body);
    let ttl_seconds = tokens::parse_ttl(body.get("ttlSeconds"))?;
    let secret = body.get("token").and_then(Value::as_str).map(String::from);

    let issued = state.tokens()?.issue(secret, ttl_seconds).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// DELETE /token: idempotent removal
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let id = required_id(&parse_body(&body))?;
    state.tokens()?.delete(&id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// PATCH /token: switch a token between active and disabled
pub async fn set_token_status(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_body(&body);
    let id = required_id(&body)?;

    let raw_status = body.get("status").and_then(Value::as_str);
    if let Some(raw) = raw_status {
        if raw != "active" && raw != "disabled" {
            tracing::warn!(id = %id, status = raw, "unrecognized status, treating as active");
        }
    }
    let status = TokenStatus::coerce(raw_status);

    let status = state.tokens()?.set_status(&id, status).await?;
    Ok(Json(json!({ "id": id, "status": status })))
}

/// GET /token?id=: stored record (digest only, never the plaintext)
pub async fn show_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShowTokenQuery>,
) -> Result<Json<StoredToken>, AppError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidArgument("id is required".into()))?;

    let stored = state
        .tokens()?
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("token {}", id)))?;
    Ok(Json(stored))
}
