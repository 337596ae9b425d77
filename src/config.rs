use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, SubflowError};
use crate::translate::RetryPolicy;

// Default values for optional sections
fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the JSON-RPC server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Port the JSON-RPC server listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Base URL of the Generative Language API
    pub endpoint: String,
    /// Model used when a job does not name one
    pub default_model: String,
    /// Replicas per oracle call when a job does not set one
    pub default_batch_size: usize,
    /// HTTP timeout for a single oracle call, in seconds.
    ///
    /// A call that hangs past it counts as one failed attempt, so `max_attempts` bounds
    /// how long a batch can wait on an unresponsive oracle.
    pub request_timeout_secs: u64,
    /// Attempts per batch before the oracle is declared unavailable (0 = unlimited)
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds
    pub retry_initial_delay_secs: u64,
    /// Backoff growth factor between retries
    #[serde(default = "default_multiplier")]
    pub retry_multiplier: f64,
    /// Upper bound for the retry delay, in seconds
    pub retry_max_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long finished jobs and idle sessions are kept, in seconds
    pub retention_secs: u64,
    /// Interval between retention sweeps, in seconds
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            default_model: "gemini-1.5-flash-8b".to_string(),
            default_batch_size: 50,
            request_timeout_secs: 300,
            max_attempts: 8,
            retry_initial_delay_secs: 10,
            retry_multiplier: default_multiplier(),
            retry_max_delay_secs: 300,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_secs: 60 * 60,
            sweep_interval_secs: 30 * 60,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            translate: TranslateConfig::default(),
            store: StoreConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl TranslateConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_secs(self.retry_initial_delay_secs),
            multiplier: self.retry_multiplier,
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
        }
    }
}

impl StoreConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubflowError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SubflowError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubflowError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.translate.default_batch_size == 0 {
            return Err(SubflowError::Config("translate.default_batch_size must be at least 1".to_string()));
        }
        if self.translate.retry_multiplier < 1.0 {
            return Err(SubflowError::Config("translate.retry_multiplier must be >= 1.0".to_string()));
        }
        if self.store.sweep_interval_secs == 0 {
            return Err(SubflowError::Config("store.sweep_interval_secs must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.server.port = 7777;
        config.translate.max_attempts = 0;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 7777);
        assert_eq!(loaded.translate.max_attempts, 0);
        assert_eq!(loaded.translate.default_model, "gemini-1.5-flash-8b");
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[server]\nport = 8080\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_addr, "127.0.0.1");
        assert_eq!(config.store.retention(), Duration::from_secs(3600));
        assert_eq!(config.store.sweep_interval(), Duration::from_secs(1800));
        assert_eq!(config.translate.retry_policy().initial_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[translate]\nendpoint = \"http://x\"\ndefault_model = \"m\"\ndefault_batch_size = 0\n\
             request_timeout_secs = 1\nmax_attempts = 1\nretry_initial_delay_secs = 1\nretry_max_delay_secs = 1\n",
        )
        .unwrap();

        assert!(matches!(Config::from_file(&path), Err(SubflowError::Config(_))));
    }
}
