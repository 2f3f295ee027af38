//! Remote libSQL (Turso) client over the HTTP pipeline protocol.
//!
//! A `SqlClient` is built once at process start from the database settings
//! and shared by reference afterwards; it never reconnects or re-reads
//! configuration. Each `execute` is one stateless pipeline request:
//!
//! ```text
//! POST {url}/v2/pipeline
//! {"requests": [{"type": "execute", "stmt": {...}}, {"type": "close"}]}
//! ```

use anyhow::Context;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{http_client, StoreError};
use crate::config::DatabaseSettings;

const SERVICE: &str = "sql";

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Blob(v) => write!(f, "x'{}'", hex::encode(v)),
        }
    }
}

// ── Wire format ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireValue {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl From<&SqlValue> for WireValue {
    fn from(v: &SqlValue) -> Self {
        match v {
            SqlValue::Null => WireValue::Null,
            SqlValue::Integer(i) => WireValue::Integer {
                value: i.to_string(),
            },
            SqlValue::Float(f) => WireValue::Float { value: *f },
            SqlValue::Text(s) => WireValue::Text { value: s.clone() },
            SqlValue::Blob(b) => WireValue::Blob {
                base64: STANDARD_NO_PAD.encode(b),
            },
        }
    }
}

impl TryFrom<WireValue> for SqlValue {
    type Error = StoreError;

    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        Ok(match v {
            WireValue::Null => SqlValue::Null,
            WireValue::Integer { value } => {
                SqlValue::Integer(value.parse().map_err(StoreError::decode(SERVICE))?)
            }
            WireValue::Float { value } => SqlValue::Float(value),
            WireValue::Text { value } => SqlValue::Text(value),
            WireValue::Blob { base64 } => SqlValue::Blob(
                STANDARD_NO_PAD
                    .decode(base64.trim_end_matches('='))
                    .or_else(|_| STANDARD.decode(&base64))
                    .map_err(StoreError::decode(SERVICE))?,
            ),
        })
    }
}

#[derive(Serialize)]
struct Stmt<'a> {
    sql: &'a str,
    args: Vec<WireValue>,
    want_rows: bool,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineRequest<'a> {
    Execute { stmt: Stmt<'a> },
    Close,
}

#[derive(Serialize)]
struct PipelineBody<'a> {
    requests: Vec<PipelineRequest<'a>>,
}

#[derive(Deserialize)]
struct PipelineResponse {
    results: Vec<PipelineResult>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineResult {
    Ok { response: StreamResponse },
    Error { error: WireError },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResponse {
    Execute { result: WireResultSet },
    Close,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct WireColumn {
    name: Option<String>,
}

#[derive(Deserialize)]
struct WireResultSet {
    cols: Vec<WireColumn>,
    rows: Vec<Vec<WireValue>>,
    affected_row_count: u64,
    #[serde(default)]
    last_insert_rowid: Option<String>,
}

// ── Client ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub rows_affected: u64,
    pub last_insert_rowid: Option<i64>,
}

#[derive(Clone)]
pub struct SqlClient {
    http: Client,
    pipeline_url: Url,
    auth_token: String,
}

impl SqlClient {
    /// Builds the handle. No request is made until the first statement runs.
    pub fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let base = Url::parse(&http_url(&settings.url))
            .with_context(|| format!("invalid TURSO_DATABASE_URL: {}", settings.url))?;
        let pipeline_url = base
            .join("v2/pipeline")
            .context("failed to derive pipeline endpoint")?;

        tracing::info!(host = base.host_str().unwrap_or_default(), "SQL client ready");

        Ok(Self {
            http: http_client(concat!("edge-tokens/", env!("CARGO_PKG_VERSION"))),
            pipeline_url,
            auth_token: settings.auth_token.clone(),
        })
    }

    pub async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, StoreError> {
        let body = PipelineBody {
            requests: vec![
                PipelineRequest::Execute {
                    stmt: Stmt {
                        sql,
                        args: args.iter().map(WireValue::from).collect(),
                        want_rows: true,
                    },
                },
                PipelineRequest::Close,
            ],
        };

        let resp = self
            .http
            .post(self.pipeline_url.clone())
            .bearer_auth(&self.auth_token)
            .json(&body)
            .send()
            .await
            .map_err(StoreError::transport(SERVICE))?;

        let resp = StoreError::check(SERVICE, resp).await?;
        let pipeline: PipelineResponse = resp.json().await.map_err(StoreError::decode(SERVICE))?;

        let first = pipeline.results.into_iter().next().ok_or(StoreError::Decode {
            service: SERVICE,
            message: "empty pipeline response".into(),
        })?;

        match first {
            PipelineResult::Ok {
                response: StreamResponse::Execute { result },
            } => result.try_into(),
            PipelineResult::Ok { .. } => Err(StoreError::Decode {
                service: SERVICE,
                message: "unexpected response type for execute".into(),
            }),
            PipelineResult::Error { error } => Err(StoreError::Upstream {
                service: SERVICE,
                status: 200,
                body: match error.code {
                    Some(code) => format!("{}: {}", code, error.message),
                    None => error.message,
                },
            }),
        }
    }
}

impl TryFrom<WireResultSet> for ResultSet {
    type Error = StoreError;

    fn try_from(rs: WireResultSet) -> Result<Self, Self::Error> {
        let rows = rs
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(SqlValue::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let last_insert_rowid = rs
            .last_insert_rowid
            .map(|id| id.parse::<i64>())
            .transpose()
            .map_err(StoreError::decode(SERVICE))?;

        Ok(ResultSet {
            columns: rs
                .cols
                .into_iter()
                .map(|c| c.name.unwrap_or_default())
                .collect(),
            rows,
            rows_affected: rs.affected_row_count,
            last_insert_rowid,
        })
    }
}

/// Maps libsql/ws URLs onto their HTTP equivalents and guarantees a trailing
/// slash so the pipeline path joins underneath any base path.
fn http_url(raw: &str) -> String {
    let mut url = if let Some(rest) = raw.strip_prefix("libsql://") {
        format!("https://{}", rest)
    } else if let Some(rest) = raw.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = raw.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        raw.to_string()
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
