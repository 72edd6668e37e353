use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::anyhow;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub reconcile_on_start: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Missing keys fall back to
    /// defaults; present but unparseable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("AGORA_JWT_SECRET").unwrap_or_else(|| {
            warn!("AGORA_JWT_SECRET not set, using an insecure development secret");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            host: try_load(&lookup, "AGORA_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "AGORA_PORT", "8000")?,
            db_path: try_load(&lookup, "AGORA_DB_PATH", "agora.db")?,
            jwt_secret,
            access_token_minutes: try_load(&lookup, "AGORA_ACCESS_TOKEN_MINUTES", "60")?,
            refresh_token_days: try_load(&lookup, "AGORA_REFRESH_TOKEN_DAYS", "7")?,
            reconcile_on_start: try_load(&lookup, "AGORA_RECONCILE_ON_START", "false")?,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}"))
}
