//! Configuration loading for the social linking service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `LINKER_`, producing a typed [`AppConfig`].

use std::{
    collections::{BTreeMap, BTreeSet},
    env,
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::providers::{Platform, UnknownPlatform};

const ENV_PREFIX: &str = "LINKER_";
const REDACTED: &str = "[REDACTED]";
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Application configuration derived from `LINKER_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_key: Option<Vec<u8>>,
    /// HS256 secret shared with the session service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_secret: Option<String>,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Externally reachable origin used to build callback URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Settings page the callback redirects back to
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default = "default_state_ttl_seconds")]
    pub state_ttl_seconds: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Platforms enabled for linking
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub platform_settings: BTreeMap<Platform, PlatformSettings>,
}

/// Per-platform credentials and endpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PlatformSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            crypto_key: None,
            session_secret: None,
            session_cookie: default_session_cookie(),
            public_base_url: default_public_base_url(),
            settings_path: default_settings_path(),
            state_ttl_seconds: default_state_ttl_seconds(),
            http_timeout_ms: default_http_timeout_ms(),
            platforms: Vec::new(),
            platform_settings: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Settings for a platform, empty when none were configured.
    pub fn platform_settings(&self, platform: Platform) -> PlatformSettings {
        self.platform_settings
            .get(&platform)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Callback URL registered with the provider for a platform.
    pub fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}/callback/{}",
            self.public_base_url.trim_end_matches('/'),
            platform
        )
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.crypto_key.is_some() {
            config.crypto_key = Some(REDACTED.as_bytes().to_vec());
        }
        if config.session_secret.is_some() {
            config.session_secret = Some(REDACTED.to_string());
        }
        for settings in config.platform_settings.values_mut() {
            if settings.client_secret.is_some() {
                settings.client_secret = Some(REDACTED.to_string());
            }
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.crypto_key {
            Some(ref key) if key.len() != 32 => {
                return Err(ConfigError::InvalidCryptoKeyLength { length: key.len() });
            }
            Some(_) => {}
            None => return Err(ConfigError::MissingCryptoKey),
        }

        match self.session_secret.as_deref() {
            None | Some("") => return Err(ConfigError::MissingSessionSecret),
            Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
                return Err(ConfigError::SessionSecretTooShort {
                    length: secret.len(),
                });
            }
            Some(_) => {}
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        let base = Url::parse(&self.public_base_url).map_err(|e| ConfigError::InvalidUrl {
            key: "PUBLIC_BASE_URL".to_string(),
            value: self.public_base_url.clone(),
            error: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                key: "PUBLIC_BASE_URL".to_string(),
                value: self.public_base_url.clone(),
                error: "scheme must be http or https".to_string(),
            });
        }

        if !self.settings_path.starts_with('/') || self.settings_path.contains(['?', '#']) {
            return Err(ConfigError::InvalidSettingsPath {
                value: self.settings_path.clone(),
            });
        }

        if !(60..=3600).contains(&self.state_ttl_seconds) {
            return Err(ConfigError::InvalidStateTtl {
                value: self.state_ttl_seconds,
            });
        }

        if !(100..=10_000).contains(&self.http_timeout_ms) {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_ms,
            });
        }

        for platform in &self.platforms {
            let settings = self.platform_settings(*platform);
            if settings.client_id.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingClientId {
                    platform: *platform,
                });
            }
            if settings.client_secret.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingClientSecret {
                    platform: *platform,
                });
            }
            for (key, value) in [
                ("AUTHORIZE_URL", &settings.authorize_url),
                ("TOKEN_URL", &settings.token_url),
                ("API_BASE", &settings.api_base),
            ] {
                if let Some(value) = value {
                    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
                        key: format!("{}_{}", platform.config_prefix(), key),
                        value: value.clone(),
                        error: e.to_string(),
                    })?;
                }
            }
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://social-linker.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_session_cookie() -> String {
    "session".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_settings_path() -> String {
    "/settings".to_string()
}

fn default_state_ttl_seconds() -> u64 {
    600
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("crypto key is missing; set LINKER_CRYPTO_KEY environment variable")]
    MissingCryptoKey,
    #[error("crypto key is invalid base64: {error}")]
    InvalidCryptoKeyBase64 { error: String },
    #[error("crypto key must decode to exactly 32 bytes, got {length} bytes")]
    InvalidCryptoKeyLength { length: usize },
    #[error("session secret is missing; set LINKER_SESSION_SECRET environment variable")]
    MissingSessionSecret,
    #[error("session secret must be at least 32 bytes, got {length}")]
    SessionSecretTooShort { length: usize },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("invalid URL for {key} '{value}': {error}")]
    InvalidUrl {
        key: String,
        value: String,
        error: String,
    },
    #[error("settings path must start with '/' and carry no query or fragment, got '{value}'")]
    InvalidSettingsPath { value: String },
    #[error("state TTL must be between 60 and 3600 seconds, got {value}")]
    InvalidStateTtl { value: u64 },
    #[error("HTTP timeout must be between 100 and 10000 milliseconds, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("invalid value for {key}: '{value}'")]
    InvalidNumber { key: String, value: String },
    #[error("LINKER_PLATFORMS lists an {0}")]
    UnknownPlatform(#[from] UnknownPlatform),
    #[error(
        "{} is enabled but has no client id; set LINKER_{}_CLIENT_ID",
        .platform,
        .platform.config_prefix()
    )]
    MissingClientId { platform: Platform },
    #[error(
        "{} is enabled but has no client secret; set LINKER_{}_CLIENT_SECRET",
        .platform,
        .platform.config_prefix()
    )]
    MissingClientSecret { platform: Platform },
}

/// Loads configuration using layered `.env` files and `LINKER_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads, validates and returns the configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_non_empty(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_non_empty(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_non_empty(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_non_empty(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_non_empty(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_number(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_number(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let crypto_key = match take_non_empty(&mut layered, "CRYPTO_KEY") {
            Some(key_str) => {
                use base64::{Engine as _, engine::general_purpose};
                Some(
                    general_purpose::STANDARD
                        .decode(key_str.trim())
                        .map_err(|e| ConfigError::InvalidCryptoKeyBase64 {
                            error: e.to_string(),
                        })?,
                )
            }
            None => None,
        };

        let session_secret = take_non_empty(&mut layered, "SESSION_SECRET");
        let session_cookie =
            take_non_empty(&mut layered, "SESSION_COOKIE").unwrap_or_else(default_session_cookie);
        let public_base_url = take_non_empty(&mut layered, "PUBLIC_BASE_URL")
            .unwrap_or_else(default_public_base_url);
        let settings_path =
            take_non_empty(&mut layered, "SETTINGS_PATH").unwrap_or_else(default_settings_path);
        let state_ttl_seconds = take_number(&mut layered, "STATE_TTL_SECONDS")?
            .unwrap_or_else(default_state_ttl_seconds);
        let http_timeout_ms =
            take_number(&mut layered, "HTTP_TIMEOUT_MS")?.unwrap_or_else(default_http_timeout_ms);

        let platforms = match take_non_empty(&mut layered, "PLATFORMS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::parse::<Platform>)
                .collect::<Result<BTreeSet<_>, _>>()?
                .into_iter()
                .collect(),
            None => Vec::new(),
        };

        let mut platform_settings = BTreeMap::new();
        for platform in Platform::ALL {
            let prefix = platform.config_prefix();
            let mut take = |suffix: &str| take_non_empty(&mut layered, &format!("{prefix}_{suffix}"));
            let settings = PlatformSettings {
                client_id: take("CLIENT_ID").map(|v| v.trim().to_string()),
                client_secret: take("CLIENT_SECRET").map(|v| v.trim().to_string()),
                scopes: take("SCOPES").map(|v| parse_scope_list(&v)),
                authorize_url: take("AUTHORIZE_URL"),
                token_url: take("TOKEN_URL"),
                api_base: take("API_BASE"),
            };
            if settings != PlatformSettings::default() {
                platform_settings.insert(platform, settings);
            }
        }

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            crypto_key,
            session_secret,
            session_cookie,
            public_base_url,
            settings_path,
            state_ttl_seconds,
            http_timeout_ms,
            platforms,
            platform_settings,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_non_empty(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values.remove(key).filter(|v| !v.trim().is_empty())
}

fn take_number<T: std::str::FromStr>(
    values: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_non_empty(values, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: format!("{ENV_PREFIX}{key}"),
                value: raw,
            }),
        None => Ok(None),
    }
}

/// Scopes may be separated by commas or whitespace
fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}
