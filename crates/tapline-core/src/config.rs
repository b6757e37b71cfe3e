// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Tapline engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the SQLite database files
    pub data_dir: PathBuf,
    /// HTTP server address
    pub http_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `TAPLINE_DATA_DIR`: directory for SQLite files (default: `.data`)
    /// - `TAPLINE_HTTP_PORT`: HTTP server port (default: 8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("TAPLINE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".data"));

        let http_port: u16 = std::env::var("TAPLINE_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("TAPLINE_HTTP_PORT", "must be a valid port number")
            })?;

        Ok(Self {
            data_dir,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
        })
    }

    /// Path of the engine database file (instances, journal, waits).
    pub fn engine_db(&self) -> PathBuf {
        self.data_dir.join("engine.db")
    }

    /// Path of the orders database file.
    pub fn orders_db(&self) -> PathBuf {
        self.data_dir.join("orders.db")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("TAPLINE_DATA_DIR");
        guard.remove("TAPLINE_HTTP_PORT");

        let config = Config::from_env().unwrap();

        assert_eq!(config.data_dir, PathBuf::from(".data"));
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.engine_db(), PathBuf::from(".data/engine.db"));
        assert_eq!(config.orders_db(), PathBuf::from(".data/orders.db"));
    }

    #[test]
    fn test_config_custom_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("TAPLINE_DATA_DIR", "/var/lib/tapline");
        guard.set("TAPLINE_HTTP_PORT", "9090");

        let config = Config::from_env().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/tapline"));
        assert_eq!(config.http_addr.port(), 9090);
        assert_eq!(
            config.engine_db(),
            PathBuf::from("/var/lib/tapline/engine.db")
        );
    }

    #[test]
    fn test_config_invalid_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("TAPLINE_HTTP_PORT", "not_a_number");

        let result = Config::from_env();
        assert!(result.is_err());

        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("TAPLINE_HTTP_PORT", _)));
    }

    #[test]
    fn test_config_port_out_of_range() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("TAPLINE_HTTP_PORT", "99999"); // > 65535

        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::Missing("MY_VAR");
        assert_eq!(
            missing.to_string(),
            "missing required environment variable: MY_VAR"
        );

        let invalid = ConfigError::Invalid("MY_VAR", "must be a number");
        assert_eq!(
            invalid.to_string(),
            "invalid value for MY_VAR: must be a number"
        );
    }
}
