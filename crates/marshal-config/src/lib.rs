//! Configuration for the FHIR Marshal validation gateway.
//!
//! Settings come from an optional TOML file plus `MARSHAL`-prefixed
//! environment overrides (e.g. `MARSHAL__SERVER__PORT=9090`). Remote
//! structure and terminology servers are configured as named maps so log
//! output and error messages can refer to a server by its logical name.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config load error: {0}")]
    Load(String),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fhir: FhirSettings,
    #[serde(default)]
    pub http: HttpClientSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be > 0".into()));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        if self.fhir.retrieval.default_page_size == 0 {
            return Err(ConfigError::Validation(
                "fhir.retrieval.default_page_size must be >= 1".into(),
            ));
        }
        if self.http.connect_timeout_ms == 0 || self.http.read_timeout_ms == 0 {
            return Err(ConfigError::Validation("http timeouts must be > 0".into()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation("cache.ttl_secs must be > 0".into()));
        }
        for (name, settings) in self
            .fhir
            .remote_structure_servers
            .iter()
            .chain(self.fhir.remote_terminology_servers.iter())
        {
            settings
                .validate()
                .map_err(|e| ConfigError::Validation(format!("server '{name}': {e}")))?;
        }
        Ok(())
    }

    pub fn addr(&self) -> std::net::SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        std::net::SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    4 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Remote FHIR server maps plus retrieval behavior.
///
/// `BTreeMap` keeps iteration in name order so preflight and retrieval
/// touch servers deterministically.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FhirSettings {
    #[serde(default)]
    pub remote_structure_servers: BTreeMap<String, ServerSettings>,
    #[serde(default)]
    pub remote_terminology_servers: BTreeMap<String, ServerSettings>,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
}

/// One configured remote FHIR server. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub url: Url,
    #[serde(default)]
    pub auth_user: Option<String>,
    #[serde(default)]
    pub auth_password: Option<String>,
    #[serde(default)]
    pub override_page_size: Option<u32>,
    #[serde(default)]
    pub override_active_only: Option<bool>,
}

impl ServerSettings {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            auth_user: None,
            auth_password: None,
            override_page_size: None,
            override_active_only: None,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.url.as_str().is_empty() || !self.url.has_host() {
            return Err(format!("url '{}' has no host", self.url));
        }
        Ok(())
    }

    /// Basic auth activates only when both credentials are present; a
    /// one-sided credential leaves requests unauthenticated.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.auth_user.as_deref(), self.auth_password.as_deref()) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }

    /// Base URL without a trailing slash, for joining request paths.
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }

    pub fn effective_page_size(&self, retrieval: &RetrievalSettings) -> u32 {
        self.override_page_size.unwrap_or(retrieval.default_page_size)
    }

    pub fn effective_active_only(&self, retrieval: &RetrievalSettings) -> bool {
        self.override_active_only
            .unwrap_or(retrieval.retrieve_only_active_profiles)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_active_only")]
    pub retrieve_only_active_profiles: bool,
}

fn default_page_size() -> u32 {
    3
}
fn default_active_only() -> bool {
    true
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            retrieve_only_active_profiles: default_active_only(),
        }
    }
}

/// Outbound HTTP client behavior shared by all remote-server calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientSettings {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_read_timeout_ms() -> u64 {
    30_000
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl HttpClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// TTL for the validation-support lookup cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    600
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load configuration from an optional TOML file plus environment
    /// overrides, e.g. `MARSHAL__SERVER__PORT=9090`.
    pub fn load_config(path: Option<&str>) -> super::Result<AppConfig> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("marshal.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("MARSHAL")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
