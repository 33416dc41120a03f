use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "wss://clearnet.yellow.com/ws";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const WS_URL_VAR: &str = "CLEARNODE_WS_URL";
const PRIVATE_KEY_VAR: &str = "YELLOW_PRIV_KEY";
const REQUEST_TIMEOUT_VAR: &str = "CLEARNODE_REQUEST_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct ClearNodeConfig {
    pub ws_url: String,
    pub private_key: Secret<String>,
    pub request_timeout: Duration,
}

// Custom Serialize implementation - never expose the signing key
impl Serialize for ClearNodeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClearNodeConfig", 3)?;
        state.serialize_field("ws_url", &self.ws_url)?;
        state.serialize_field("private_key", "[REDACTED]")?;
        state.serialize_field("request_timeout_ms", &(self.request_timeout.as_millis() as u64))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClearNodeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClearNodeConfigHelper {
            ws_url: Option<String>,
            private_key: String,
            request_timeout_ms: Option<u64>,
        }

        let helper = ClearNodeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            ws_url: helper.ws_url.unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            private_key: Secret::new(helper.private_key),
            request_timeout: helper
                .request_timeout_ms
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis),
        })
    }
}

impl ClearNodeConfig {
    /// Create a configuration for the default ClearNode endpoint
    #[must_use]
    pub fn new(private_key: String) -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            private_key: Secret::new(private_key),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `YELLOW_PRIV_KEY` (required, 32-byte hex key)
    /// - `CLEARNODE_WS_URL` (optional, defaults to the public ClearNode)
    /// - `CLEARNODE_REQUEST_TIMEOUT_MS` (optional, defaults to 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let private_key = env::var(PRIVATE_KEY_VAR)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(PRIVATE_KEY_VAR.to_string()))?;

        Self::new(private_key).apply_env()
    }

    /// Apply the optional endpoint and timeout variables, keeping the current key
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(ws_url) = env::var(WS_URL_VAR)
            .ok()
            .filter(|url| !url.trim().is_empty())
        {
            self.ws_url = ws_url;
        }

        if let Ok(raw) = env::var(REQUEST_TIMEOUT_VAR) {
            let millis = raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidConfiguration(format!(
                    "{} must be an integer number of milliseconds: {}",
                    REQUEST_TIMEOUT_VAR, e
                ))
            })?;
            self.request_timeout = Duration::from_millis(millis);
        }

        Ok(self)
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file() -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(".env")
    }

    /// Create configuration from a specific .env file path
    ///
    /// A missing file is not an error; system environment variables are used instead.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env()
    }

    /// Set a custom endpoint URL
    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = ws_url;
        self
    }

    /// Set the per-request response timeout
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the raw private key (use carefully - exposes secret)
    pub fn private_key(&self) -> &str {
        self.private_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
