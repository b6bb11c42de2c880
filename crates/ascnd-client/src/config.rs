//! Client configuration, validation, and the runtime-mutable credential.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("ascnd-rust-client/", env!("CARGO_PKG_VERSION"));

/// Environment variable overriding `server_address`.
pub const ENV_SERVER_ADDRESS: &str = "ASCND_SERVER_ADDRESS";

/// Environment variable overriding `api_key`.
pub const ENV_API_KEY: &str = "ASCND_API_KEY";

/// Configuration options for [`AscndClient`](crate::AscndClient).
///
/// This is the unvalidated form, as written in a config file or built in
/// code. [`ClientConfig::validate`] turns it into [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address of the Ascnd API, `host:port` or a full URI (required).
    pub server_address: String,
    /// API key sent as a bearer token. Empty means no credential.
    pub api_key: String,
    /// Use TLS for the channel (default: true).
    pub use_ssl: bool,
    /// Connection timeout in milliseconds (default: 5000).
    pub connection_timeout_ms: i64,
    /// Per-attempt request timeout in milliseconds (default: 10000).
    pub request_timeout_ms: i64,
    /// Retries on transient failures after the first attempt (default: 3).
    pub max_retries: i32,
    /// Base delay for exponential backoff in milliseconds (default: 100).
    pub retry_delay_ms: i64,
    /// Custom User-Agent. Empty means [`DEFAULT_USER_AGENT`].
    pub user_agent: String,
    /// Log every attempt at info level instead of debug (default: false).
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            api_key: String::new(),
            use_ssl: true,
            connection_timeout_ms: 5000,
            request_timeout_ms: 10000,
            max_retries: 3,
            retry_delay_ms: 100,
            user_agent: String::new(),
            verbose: false,
        }
    }
}

impl ClientConfig {
    /// Creates a config with the given address and API key and defaults elsewhere.
    pub fn new(server_address: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Loads a config from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => Ok(toml::from_str(&contents)?),
            "json" => Ok(serde_json::from_str(&contents)?),
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Overrides `server_address` and `api_key` from `ASCND_SERVER_ADDRESS`
    /// and `ASCND_API_KEY` when they are set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup(ENV_SERVER_ADDRESS).filter(|v| !v.is_empty()) {
            self.server_address = addr;
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
        self
    }

    /// Validates every field and produces the typed settings the engine runs on.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        if self.server_address.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        let connection_timeout =
            positive_millis("connection_timeout_ms", self.connection_timeout_ms)?;
        let request_timeout = positive_millis("request_timeout_ms", self.request_timeout_ms)?;
        let max_retries =
            u32::try_from(self.max_retries).map_err(|_| ConfigError::NegativeRetryCount)?;
        let retry_delay_ms =
            u64::try_from(self.retry_delay_ms).map_err(|_| ConfigError::NegativeRetryDelay)?;

        let user_agent = if self.user_agent.is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            self.user_agent.clone()
        };

        Ok(Settings {
            server_address: self.server_address.clone(),
            use_ssl: self.use_ssl,
            connection_timeout,
            request_timeout,
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(retry_delay_ms),
            },
            user_agent,
            verbose: self.verbose,
        })
    }
}

fn positive_millis(field: &'static str, value: i64) -> Result<Duration, ConfigError> {
    match u64::try_from(value) {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::NonPositiveTimeout { field }),
    }
}

/// Validated, immutable client parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Address of the Ascnd API.
    pub server_address: String,
    /// Use TLS for the channel.
    pub use_ssl: bool,
    /// Timeout for establishing the connection.
    pub connection_timeout: Duration,
    /// Deadline applied to each attempt.
    pub request_timeout: Duration,
    /// Retry budget and backoff base.
    pub retry: RetryPolicy,
    /// User-Agent sent on the channel.
    pub user_agent: String,
    /// Log attempts at info level.
    pub verbose: bool,
}

/// The API key, the only configuration value that may change after construction.
#[derive(Debug, Default)]
pub struct Credential {
    api_key: Mutex<String>,
}

impl Credential {
    /// Creates a credential holding `api_key`. Empty means none.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Mutex::new(api_key.into()),
        }
    }

    /// Replaces the key.
    pub fn set(&self, api_key: impl Into<String>) {
        *self.api_key.lock() = api_key.into();
    }

    /// Returns the current key, empty if none is set.
    pub fn get(&self) -> String {
        self.api_key.lock().clone()
    }

    /// Returns the key to attach to an outgoing call, if any.
    pub fn token(&self) -> Option<String> {
        let key = self.api_key.lock();
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn valid_config() -> ClientConfig {
        ClientConfig {
            server_address: "api.example.com:443".to_string(),
            api_key: "test-api-key".to_string(),
            use_ssl: true,
            connection_timeout_ms: 5000,
            request_timeout_ms: 10000,
            max_retries: 3,
            retry_delay_ms: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_values() {
        let config = ClientConfig::default();
        assert!(config.server_address.is_empty());
        assert!(config.api_key.is_empty());
        assert!(config.use_ssl);
        assert_eq!(config.connection_timeout_ms, 5000);
        assert_eq!(config.request_timeout_ms, 10000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 100);
        assert!(config.user_agent.is_empty());
        assert!(!config.verbose);
    }

    #[test]
    fn test_valid_config_passes() {
        let settings = valid_config().validate().unwrap();
        assert_eq!(settings.server_address, "api.example.com:443");
        assert_eq!(settings.connection_timeout, Duration::from_secs(5));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.retry.max_retries, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(100));
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_minimal_config_passes() {
        let config = ClientConfig {
            server_address: "localhost:50051".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_server_address_fails() {
        let config = ClientConfig {
            server_address: String::new(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyEndpoint));
        assert_eq!(err.to_string(), "server_address cannot be empty");
    }

    #[test]
    fn test_non_positive_connection_timeout_fails() {
        for value in [0, -1] {
            let config = ClientConfig {
                connection_timeout_ms: value,
                ..valid_config()
            };
            let err = config.validate().unwrap_err();
            assert_eq!(err.to_string(), "connection_timeout_ms must be positive");
        }
    }

    #[test]
    fn test_non_positive_request_timeout_fails() {
        for value in [0, -100] {
            let config = ClientConfig {
                request_timeout_ms: value,
                ..valid_config()
            };
            let err = config.validate().unwrap_err();
            assert_eq!(err.to_string(), "request_timeout_ms must be positive");
        }
    }

    #[test]
    fn test_negative_max_retries_fails() {
        let config = ClientConfig {
            max_retries: -1,
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NegativeRetryCount));
        assert_eq!(err.to_string(), "max_retries cannot be negative");
    }

    #[test]
    fn test_negative_retry_delay_fails() {
        let config = ClientConfig {
            retry_delay_ms: -50,
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NegativeRetryDelay));
        assert_eq!(err.to_string(), "retry_delay_ms cannot be negative");
    }

    #[test]
    fn test_zero_retries_and_zero_delay_are_valid() {
        let config = ClientConfig {
            max_retries: 0,
            retry_delay_ms: 0,
            ..valid_config()
        };
        let settings = config.validate().unwrap();
        assert_eq!(settings.retry.max_retries, 0);
        assert_eq!(settings.retry.base_delay, Duration::ZERO);
    }

    #[test]
    fn test_custom_user_agent_kept() {
        let config = ClientConfig {
            user_agent: "MyGame/1.0".to_string(),
            ..valid_config()
        };
        assert_eq!(config.validate().unwrap().user_agent, "MyGame/1.0");
    }

    #[test]
    fn test_from_file_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
server_address = "api.ascnd.gg:443"
api_key = "super-secret-key"
request_timeout_ms = 30000
max_retries = 5
verbose = true
            "#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server_address, "api.ascnd.gg:443");
        assert_eq!(config.api_key, "super-secret-key");
        assert_eq!(config.request_timeout_ms, 30000);
        assert_eq!(config.max_retries, 5);
        assert!(config.verbose);
        assert_eq!(config.connection_timeout_ms, 5000);
        assert!(config.use_ssl);
    }

    #[test]
    fn test_from_file_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(
            file,
            r#"{{"server_address": "localhost:50051", "use_ssl": false, "retry_delay_ms": 250}}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server_address, "localhost:50051");
        assert!(!config.use_ssl);
        assert_eq!(config.retry_delay_ms, 250);
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let file = NamedTempFile::with_suffix(".yaml").unwrap();
        assert!(ClientConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_SERVER_ADDRESS, "override:443"),
            (ENV_API_KEY, ""),
        ]
        .into_iter()
        .collect();

        let config = valid_config()
            .with_overrides_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.server_address, "override:443");
        assert_eq!(config.api_key, "test-api-key");
    }

    #[test]
    fn test_credential_token() {
        let credential = Credential::new("");
        assert_eq!(credential.token(), None);
        credential.set("key-1");
        assert_eq!(credential.token().as_deref(), Some("key-1"));
        assert_eq!(credential.get(), "key-1");
    }

    #[test]
    fn test_credential_concurrent_updates_never_tear() {
        let credential = Arc::new(Credential::new("key-initial-0000"));
        let valid: Vec<String> = (0..100).map(|i| format!("key-{i:012}")).collect();

        let writer = {
            let credential = Arc::clone(&credential);
            let valid = valid.clone();
            std::thread::spawn(move || {
                for key in valid {
                    credential.set(key);
                }
            })
        };

        let reader = {
            let credential = Arc::clone(&credential);
            let valid = valid.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let key = credential.get();
                    assert!(key == "key-initial-0000" || valid.contains(&key));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(credential.get(), "key-000000000099");
    }
}
