//! Runtime configuration.
//!
//! Configuration is loaded from `LUNARA_*` environment variables, optionally
//! seeded from a `.env` file:
//!
//! ```rust,no_run
//! use lunara_core::config::LunaraConfig;
//!
//! let config = LunaraConfig::load().expect("invalid configuration");
//! assert!(config.kdf_iterations >= 100_000);
//! ```
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LUNARA_KDF_ITERATIONS` | 100000 |
//! | `LUNARA_RECIPIENT_SALT_MODE` | `per_message` (`constant` for the fixed protocol salt) |
//! | `LUNARA_GATEWAY_HOST` | `gateway.pinata.cloud` |
//! | `LUNARA_PINNING_API_URL` | `https://api.pinata.cloud` |
//! | `LUNARA_PINNING_JWT` | unset |
//! | `LUNARA_APP_BASE_URL` | `http://localhost:5173` |
//! | `LUNARA_HTTP_TIMEOUT_SECS` | 30 |
//! | `LUNARA_NETWORK_MAX_ATTEMPTS` / `LUNARA_NETWORK_BACKOFF_MS` | 4 / 250 |
//! | `LUNARA_WALLET_MAX_ATTEMPTS` / `LUNARA_WALLET_BACKOFF_MS` | 3 / 500 |

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Salt choice for recipient-keyed envelopes.
///
/// Readers always use the salt carried in the envelope, so both modes decrypt
/// each other's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientSaltMode {
    /// Fresh random hex salt per envelope.
    #[default]
    PerMessage,
    /// The fixed protocol salt `privycycle-sharing-v1`.
    ProtocolConstant,
}

impl FromStr for RecipientSaltMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "per_message" | "random" => Ok(Self::PerMessage),
            "constant" | "protocol_constant" => Ok(Self::ProtocolConstant),
            other => Err(Error::Config(format!("unknown recipient salt mode: {}", other))),
        }
    }
}

impl fmt::Display for RecipientSaltMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerMessage => write!(f, "per_message"),
            Self::ProtocolConstant => write!(f, "constant"),
        }
    }
}

/// Top-level lunara configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct LunaraConfig {
    /// PBKDF2 iteration count for both key schemes.
    pub kdf_iterations: u32,
    pub recipient_salt_mode: RecipientSaltMode,
    /// Public gateway host used to build gateway URLs and fetch content.
    pub gateway_host: String,
    /// Pinning service API base URL.
    pub pinning_api_url: String,
    /// Bearer token for the pinning service.
    pub pinning_jwt: Option<String>,
    /// Application origin used in shareable links.
    pub app_base_url: String,
    pub http_timeout: Duration,
    pub network_retry: RetryPolicy,
    pub wallet_retry: RetryPolicy,
}

impl fmt::Debug for LunaraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LunaraConfig")
            .field("kdf_iterations", &self.kdf_iterations)
            .field("recipient_salt_mode", &self.recipient_salt_mode)
            .field("gateway_host", &self.gateway_host)
            .field("pinning_api_url", &self.pinning_api_url)
            .field("pinning_jwt", &self.pinning_jwt.as_ref().map(|_| "<redacted>"))
            .field("app_base_url", &self.app_base_url)
            .field("http_timeout", &self.http_timeout)
            .field("network_retry", &self.network_retry)
            .field("wallet_retry", &self.wallet_retry)
            .finish()
    }
}

impl Default for LunaraConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: defaults::KDF_ITERATIONS,
            recipient_salt_mode: RecipientSaltMode::default(),
            gateway_host: defaults::GATEWAY_HOST.to_string(),
            pinning_api_url: defaults::PINNING_API_URL.to_string(),
            pinning_jwt: None,
            app_base_url: defaults::APP_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(defaults::HTTP_TIMEOUT_SECS),
            network_retry: RetryPolicy::network(),
            wallet_retry: RetryPolicy::wallet(),
        }
    }
}

impl LunaraConfig {
    /// Read `.env` if present, then the environment, then validate.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Build from `LUNARA_*` environment variables. Unset or unparsable values
    /// fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let mut network_retry = defaults.network_retry.clone();
        if let Some(n) = parsed("LUNARA_NETWORK_MAX_ATTEMPTS") {
            network_retry.max_attempts = n as u32;
        }
        if let Some(ms) = parsed("LUNARA_NETWORK_BACKOFF_MS") {
            network_retry.base_delay = Duration::from_millis(ms);
        }

        let mut wallet_retry = defaults.wallet_retry.clone();
        if let Some(n) = parsed("LUNARA_WALLET_MAX_ATTEMPTS") {
            wallet_retry.max_attempts = n as u32;
        }
        if let Some(ms) = parsed("LUNARA_WALLET_BACKOFF_MS") {
            wallet_retry.base_delay = Duration::from_millis(ms);
        }

        Self {
            kdf_iterations: parsed("LUNARA_KDF_ITERATIONS")
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(defaults.kdf_iterations),
            recipient_salt_mode: lookup("LUNARA_RECIPIENT_SALT_MODE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.recipient_salt_mode),
            gateway_host: lookup("LUNARA_GATEWAY_HOST").unwrap_or(defaults.gateway_host),
            pinning_api_url: lookup("LUNARA_PINNING_API_URL").unwrap_or(defaults.pinning_api_url),
            pinning_jwt: lookup("LUNARA_PINNING_JWT").filter(|s| !s.is_empty()),
            app_base_url: lookup("LUNARA_APP_BASE_URL").unwrap_or(defaults.app_base_url),
            http_timeout: parsed("LUNARA_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            network_retry,
            wallet_retry,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations < defaults::KDF_MIN_ITERATIONS {
            return Err(Error::Config(format!(
                "kdf_iterations must be at least {}, got {}",
                defaults::KDF_MIN_ITERATIONS,
                self.kdf_iterations
            )));
        }

        if self.gateway_host.is_empty() || self.gateway_host.contains('/') {
            return Err(Error::Config(format!(
                "gateway_host must be a bare host name, got: {:?}",
                self.gateway_host
            )));
        }

        for (name, value) in [
            ("pinning_api_url", &self.pinning_api_url),
            ("app_base_url", &self.app_base_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(Error::Config(format!(
                    "{} must start with http:// or https://, got: {}",
                    name, value
                )));
            }
        }

        if self.http_timeout.is_zero() {
            return Err(Error::Config("http_timeout must be non-zero".to_string()));
        }

        if self.network_retry.max_attempts == 0 || self.wallet_retry.max_attempts == 0 {
            return Err(Error::Config("retry max_attempts must be at least 1".to_string()));
        }

        Ok(())
    }
}
