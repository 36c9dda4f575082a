//! Server Configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).

use std::fmt;

use pos_store::RestStoreConfig;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingInProduction(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the server needs to boot
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub mode: Mode,

    /// Front-end origin, used for checkout redirects and CORS
    pub public_url: String,

    /// Hosted record store; `None` means the in-memory store
    pub store: Option<RestStoreConfig>,

    /// Key for customer access tokens; `None` means a per-process random key
    pub identity_secret: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mode = match var("APP_MODE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("development" | "dev") => Mode::Development,
            Some("production" | "prod") => Mode::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_MODE",
                    value: other.to_string(),
                });
            }
        };

        let store = match (var("STORE_URL"), var("STORE_API_KEY")) {
            (Some(url), Some(key)) => {
                let mut config = RestStoreConfig::new(url, key);
                if let Some(secs) = var("STORE_TIMEOUT_SECS") {
                    config.timeout_secs = secs.parse().map_err(|_| ConfigError::Invalid {
                        name: "STORE_TIMEOUT_SECS",
                        value: secs,
                    })?;
                }
                Some(config)
            }
            _ if mode.is_production() => {
                return Err(ConfigError::MissingInProduction("STORE_URL and STORE_API_KEY"));
            }
            _ => None,
        };

        let identity_secret = var("IDENTITY_SECRET");
        if identity_secret.is_none() && mode.is_production() {
            return Err(ConfigError::MissingInProduction("IDENTITY_SECRET"));
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            mode,
            public_url: var("PUBLIC_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.into())
                .trim_end_matches('/')
                .to_string(),
            store,
            identity_secret,
        })
    }
}
