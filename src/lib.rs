//! edge-tokens: admin token API backed by Edge Config, plus thin Blob and
//! libSQL clients.
//!
//! The binary in `main.rs` wires these modules together; integration tests in
//! `tests/` drive them through the same public surface.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod tokens;

use config::Config;
use errors::AppError;
use store::blob::BlobClient;
use store::edge_config::EdgeConfigClient;
use store::sql::SqlClient;
use tokens::TokenService;

/// Shared application state passed to handlers and middleware.
///
/// Built exactly once per process by `AppState::from_config`. Every client in
/// here is constructed at that point (or left out when its settings are
/// missing) and is never rebuilt afterwards.
pub struct AppState {
    pub config: Config,
    tokens: Option<TokenService>,
    blob: Option<BlobClient>,
    sql: Option<SqlClient>,
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let tokens = match &config.edge_config {
            Some(settings) => Some(TokenService::new(EdgeConfigClient::new(settings)?)),
            None => {
                tracing::warn!("Edge Config is not configured; token API calls will fail");
                None
            }
        };

        let blob = config.blob.as_ref().map(BlobClient::new).transpose()?;
        let sql = config.database.as_ref().map(SqlClient::connect).transpose()?;

        Ok(Self {
            config,
            tokens,
            blob,
            sql,
        })
    }

    pub fn tokens(&self) -> Result<&TokenService, AppError> {
        self.config.edge_config()?;
        self.tokens
            .as_ref()
            .ok_or(AppError::ConfigurationMissing("EDGE_CONFIG_ID or EDGE_CONFIG_RW_TOKEN"))
    }

    pub fn blob(&self) -> Result<&BlobClient, AppError> {
        self.config.blob()?;
        self.blob
            .as_ref()
            .ok_or(AppError::ConfigurationMissing("BLOB_READ_WRITE_TOKEN"))
    }

    pub fn sql(&self) -> Result<&SqlClient, AppError> {
        self.config.database()?;
        self.sql
            .as_ref()
            .ok_or(AppError::ConfigurationMissing("TURSO_DATABASE_URL or TURSO_AUTH_TOKEN"))
    }
}
