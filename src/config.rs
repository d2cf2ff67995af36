use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MessengerError, Result};

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub conversation_interval_secs: u64,
    pub unread_interval_secs: u64,
    pub clock_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:5000/api".to_string(),
                request_timeout_secs: 30,
            },
            polling: PollingConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            session: SessionConfig { token_path: None },
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            conversation_interval_secs: 2,
            unread_interval_secs: 30,
            clock_interval_secs: 5,
        }
    }
}

impl PollingConfig {
    pub const fn conversation_interval(&self) -> Duration {
        Duration::from_secs(self.conversation_interval_secs)
    }

    pub const fn unread_interval(&self) -> Duration {
        Duration::from_secs(self.unread_interval_secs)
    }

    pub const fn clock_interval(&self) -> Duration {
        Duration::from_secs(self.clock_interval_secs)
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally from an explicit file instead of the default locations
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false))
                .add_source(File::with_name("config").required(false)),
        };

        let app_config: Self = builder
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("CONTACT_MESSENGER").separator("__"))
            .build()?
            .try_deserialize()?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate API config
        let url = url::Url::parse(&self.api.base_url)
            .map_err(|e| MessengerError::InvalidConfig(format!("Invalid api.base_url {}: {e}", self.api.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MessengerError::InvalidConfig(format!(
                "api.base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(MessengerError::InvalidConfig(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate polling config
        let intervals = [
            ("conversation_interval_secs", self.polling.conversation_interval_secs),
            ("unread_interval_secs", self.polling.unread_interval_secs),
            ("clock_interval_secs", self.polling.clock_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(MessengerError::InvalidConfig(format!("{name} must be greater than 0")));
            }
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(MessengerError::InvalidConfig(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(MessengerError::InvalidConfig(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Log file path, if file logging is enabled
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file_path.as_ref().map(PathBuf::from)
    }

    /// Request timeout for the HTTP client
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:5000/api");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.polling.conversation_interval_secs, 2);
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.polling.clock_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
