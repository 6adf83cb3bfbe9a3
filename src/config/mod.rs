//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `FLEET_HUB` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use fleet_hub::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Hub listening on {}", config.server.socket_addr().unwrap());
//! ```

mod error;
mod hub;
mod server;

pub use error::{ConfigError, ValidationError};
pub use hub::HubConfig;
pub use server::{LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable hub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (bind address, logging, CORS)
    #[serde(default)]
    pub server: ServerConfig,

    /// Hub configuration (persistence, heartbeat policy, buffers)
    #[serde(default)]
    pub hub: HubConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FLEET_HUB` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `FLEET_HUB__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `FLEET_HUB__HUB__HEARTBEAT_TIMEOUT_MS=15000` -> `hub.heartbeat_timeout_ms = 15000`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FLEET_HUB")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.hub.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("FLEET_HUB__SERVER__PORT");
        env::remove_var("FLEET_HUB__SERVER__CORS_ORIGINS");
        env::remove_var("FLEET_HUB__SERVER__LOG_FORMAT");
        env::remove_var("FLEET_HUB__HUB__HEARTBEAT_TIMEOUT_MS");
        env::remove_var("FLEET_HUB__HUB__DATA_DIR");
    }

    #[test]
    fn test_load_with_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.hub.heartbeat_timeout_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cors_origins_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("FLEET_HUB__SERVER__CORS_ORIGINS", "http://console.local,http://tablet.local");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.server.cors_origins_list(),
            vec!["http://console.local", "http://tablet.local"]
        );
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("FLEET_HUB__SERVER__PORT", "4000");
        env::set_var("FLEET_HUB__SERVER__LOG_FORMAT", "json");
        env::set_var("FLEET_HUB__HUB__HEARTBEAT_TIMEOUT_MS", "15000");
        env::set_var("FLEET_HUB__HUB__DATA_DIR", "/var/lib/fleet-hub");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.hub.heartbeat_timeout_ms, 15_000);
        assert_eq!(config.hub.data_dir.to_str(), Some("/var/lib/fleet-hub"));
    }

    #[test]
    fn test_validation_error_surfaces() {
        let mut config = AppConfig::default();
        config.hub.latency_window = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroValue("latency_window"))
        );
    }
}
