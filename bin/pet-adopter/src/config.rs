//! Runtime settings.
//!
//! Sources, lowest precedence first: built-in defaults, the optional
//! `config/pet-adopter.{toml,json,...}` file, then `PET_ADOPTER__SECTION__KEY`
//! environment variables (a `.env` file is loaded into the environment first).

use std::path::PathBuf;

use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use pa_core::{ColorThresholds, SearchLimits};
use serde::Deserialize;

const DEFAULT_CONFIG_BASENAME: &str = "config/pet-adopter";
const ENV_PREFIX: &str = "PET_ADOPTER";
const WEEK_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub photos: PhotoSettings,
    pub search: SearchLimits,
    pub auth: AuthSettings,
    /// Closeness thresholds for `GET /ads/{id}/same`
    pub colors: ColorThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Worker count; actix picks one per core when unset
    pub workers: Option<usize>,
    /// Seconds to wait for pending history writes on shutdown
    pub drain_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            drain_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:pet_adopter.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhotoSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/photos"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Empty means a random per-process secret: tokens die with the process.
    pub token_secret: String,
    /// Argon2 hash of the admin token, see `pet-adopter hash-admin`
    pub admin_token_hash: Option<String>,
    /// Bearer token lifetime
    pub token_ttl_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            admin_token_hash: None,
            token_ttl_secs: WEEK_SECS,
        }
    }
}

pub fn load() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();

    let builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
    finish(builder)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if settings.search.default_limit > settings.search.max_limit {
        log::warn!(
            "search.default_limit {} exceeds search.max_limit {}, clamping",
            settings.search.default_limit,
            settings.search.max_limit
        );
        settings.search.default_limit = settings.search.max_limit;
    }
    if settings.auth.token_ttl_secs <= 0 {
        log::warn!("auth.token_ttl_secs must be positive, using {WEEK_SECS}");
        settings.auth.token_ttl_secs = WEEK_SECS;
    }
    if settings.auth.admin_token_hash.as_deref().is_some_and(str::is_empty) {
        settings.auth.admin_token_hash = None;
    }
    Ok(settings)
}
