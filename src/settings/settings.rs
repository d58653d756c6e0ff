use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    #[serde(default)]
    pub cookie: Cookie,
    pub http: Http,
    pub log: Log,
    pub store: Store,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    /// Caps how long rotations may keep a session alive. Unset means sliding.
    pub max_session_secs: Option<u64>,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
    pub access_token_secret: Option<Secret>,
    pub refresh_token_secret: Option<Secret>,
}

#[derive(Debug, Deserialize)]
pub struct Cookie {
    pub secure: bool,
    pub path: String,
}

impl Default for Cookie {
    fn default() -> Self {
        Cookie {
            secure: false,
            path: "/".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    /// Browser origin allowed to call the API with credentials (cookies).
    pub cors_origin: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<Secret>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// A configuration string that never shows up in logs.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_min_password_len() -> usize {
    6
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the settings file, then `KEYTURN__SECTION__KEY` environment
/// variables, then the bare `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET`.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    load_settings(
        path,
        std::env::var("ACCESS_TOKEN_SECRET").ok(),
        std::env::var("REFRESH_TOKEN_SECRET").ok(),
    )
}

pub fn load_settings(
    path: Option<&str>,
    access_token_secret: Option<String>,
    refresh_token_secret: Option<String>,
) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("KEYTURN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("auth.access_token_secret", access_token_secret)
        .map_err(|e| anyhow!(e))?
        .set_override_option("auth.refresh_token_secret", refresh_token_secret)
        .map_err(|e| anyhow!(e))?
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
