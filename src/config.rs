use crate::errors::AppError;

pub const DEFAULT_EDGE_CONFIG_BASE: &str = "https://api.vercel.com/v1/edge-config";
pub const DEFAULT_BLOB_API_URL: &str = "https://blob.vercel-storage.com";

/// Process-wide configuration, loaded once at startup.
///
/// Each remote store gets its own optional section. A section is `None` when
/// any of its required variables is missing; callers surface that as
/// `AppError::ConfigurationMissing` at the point of use.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub port: u16,
    pub admin_token: Option<String>,
    pub edge_config: Option<EdgeConfigSettings>,
    pub blob: Option<BlobSettings>,
    pub database: Option<DatabaseSettings>,
}

#[derive(Debug, Clone)]
pub struct EdgeConfigSettings {
    pub config_id: String,
    pub rw_token: String,
    /// Set via VERCEL_EDGE_CONFIG_BASE. Default: api.vercel.com.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct BlobSettings {
    pub rw_token: String,
    /// Set via VERCEL_BLOB_API_URL. Default: blob.vercel-storage.com.
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub auth_token: String,
}

impl Config {
    /// Returns the configured admin secret or the error every admin call reports.
    pub fn admin_token(&self) -> Result<&str, AppError> {
        self.admin_token
            .as_deref()
            .ok_or(AppError::ConfigurationMissing("ADMIN_TOKEN"))
    }

    pub fn edge_config(&self) -> Result<&EdgeConfigSettings, AppError> {
        self.edge_config
            .as_ref()
            .ok_or(AppError::ConfigurationMissing("EDGE_CONFIG_ID or EDGE_CONFIG_RW_TOKEN"))
    }

    pub fn blob(&self) -> Result<&BlobSettings, AppError> {
        self.blob
            .as_ref()
            .ok_or(AppError::ConfigurationMissing("BLOB_READ_WRITE_TOKEN"))
    }

    pub fn database(&self) -> Result<&DatabaseSettings, AppError> {
        self.database
            .as_ref()
            .ok_or(AppError::ConfigurationMissing("TURSO_DATABASE_URL or TURSO_AUTH_TOKEN"))
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    Ok(from_lookup(|key| std::env::var(key).ok()))
}

/// Builds a `Config` from an arbitrary variable lookup. Empty values count as unset.
pub fn from_lookup<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let edge_config = match (var("EDGE_CONFIG_ID"), var("EDGE_CONFIG_RW_TOKEN")) {
        (Some(config_id), Some(rw_token)) => Some(EdgeConfigSettings {
            config_id,
            rw_token,
            base_url: var("VERCEL_EDGE_CONFIG_BASE")
                .unwrap_or_else(|| DEFAULT_EDGE_CONFIG_BASE.into()),
        }),
        _ => None,
    };

    let blob = var("BLOB_READ_WRITE_TOKEN").map(|rw_token| BlobSettings {
        rw_token,
        api_url: var("VERCEL_BLOB_API_URL").unwrap_or_else(|| DEFAULT_BLOB_API_URL.into()),
    });

    let database = match (var("TURSO_DATABASE_URL"), var("TURSO_AUTH_TOKEN")) {
        (Some(url), Some(auth_token)) => Some(DatabaseSettings { url, auth_token }),
        _ => None,
    };

    Config {
        port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
        admin_token: var("ADMIN_TOKEN"),
        edge_config,
        blob,
        database,
    }
}
