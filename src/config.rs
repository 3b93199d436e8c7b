//! Configuration management for the gateway.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables (`PORT`, `APP_ENV`, `API_KEYS`, `RATE_LIMIT_RPS`).
//! A `.env` file in the working directory is loaded first if present.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::identity::StaticKeyDirectory;
use crate::ratelimit::Quota;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RATE_LIMIT_RPS: u32 = 5;

/// Runtime environment of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Production,
    /// Credential checks are bypassed
    Development,
}

impl AppEnv {
    pub fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Production => "production",
            AppEnv::Development => "development",
        }
    }

    /// Parse an environment name, treating anything unrecognised as production.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(app_env = %value, "Unknown app environment, using production");
            AppEnv::Production
        })
    }
}

impl FromStr for AppEnv {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "production" => Ok(AppEnv::Production),
            "development" => Ok(AppEnv::Development),
            other => Err(GatewayError::Config(format!(
                "unknown app environment '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AppEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Runtime environment
    #[serde(default)]
    pub app_env: AppEnv,

    /// Identity -> API key
    #[serde(default)]
    pub api_keys: HashMap<String, String>,

    /// Requests per second per identity; also the burst size
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            app_env: AppEnv::default(),
            api_keys: HashMap::new(),
            rate_limit_rps: default_rate_limit_rps(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_rate_limit_rps() -> u32 {
    DEFAULT_RATE_LIMIT_RPS
}

impl GatewayConfig {
    /// Load configuration from `.env`, an optional YAML file and the environment.
    ///
    /// The file is parsed with serde so identity names keep their case;
    /// environment variables are applied on top of it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!(error = %e, "No .env file loaded, using defaults and process environment");
        }

        let base = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        let settings = config::Config::builder()
            .add_source(config::Environment::default().ignore_empty(true))
            .build()?;

        base.with_overrides(&settings)
    }

    /// Resolve configuration from defaults plus the given settings.
    pub fn from_settings(settings: &config::Config) -> Result<Self> {
        Self::default().with_overrides(settings)
    }

    /// Apply flat overrides (`port`, `app_env`, `api_keys`, `rate_limit_rps`).
    ///
    /// Keys absent from `settings` keep their current value.
    pub fn with_overrides(mut self, settings: &config::Config) -> Result<Self> {
        if let Ok(port) = settings.get_string("port") {
            self.server.port = port
                .parse()
                .map_err(|e| GatewayError::Config(format!("invalid port '{}': {}", port, e)))?;
        }

        if let Ok(app_env) = settings.get_string("app_env") {
            self.app_env = AppEnv::parse_lenient(&app_env);
        }

        if let Ok(rps) = settings.get_string("rate_limit_rps") {
            self.rate_limit_rps = rps.trim().parse().unwrap_or_else(|_| {
                warn!(value = %rps, fallback = DEFAULT_RATE_LIMIT_RPS, "Invalid rate limit, using default");
                DEFAULT_RATE_LIMIT_RPS
            });
        }

        if let Some(keys) = parse_api_keys(settings) {
            self.api_keys = keys;
        }
        if self.api_keys.is_empty() {
            warn!("No API keys loaded");
        }

        self.validate()?;
        self.log_summary();
        Ok(self)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatewayConfig =
            serde_yaml::from_str(yaml).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialization alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_rps == 0 {
            return Err(GatewayError::Config(
                "rate_limit_rps must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The per-identity quota: `rate_limit_rps` tokens per second, same burst.
    pub fn quota(&self) -> Quota {
        Quota::per_second(self.rate_limit_rps)
    }

    /// Build the identity directory from the configured keys.
    pub fn directory(&self) -> Result<StaticKeyDirectory> {
        StaticKeyDirectory::new(self.api_keys.clone())
    }

    fn log_summary(&self) {
        info!(
            port = self.server.port,
            app_env = %self.app_env,
            api_key_count = self.api_keys.len(),
            rate_limit_rps = self.rate_limit_rps,
            "Configuration loaded"
        );
    }
}

/// `API_KEYS` is a JSON object of identity -> key.
fn parse_api_keys(settings: &config::Config) -> Option<HashMap<String, String>> {
    let raw = settings.get_string("api_keys").ok()?;

    Some(serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Error retrieving API keys");
        HashMap::new()
    }))
}
