// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;

/// Corral control plane configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL of the resource store
    pub database_url: String,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// JSON schema descriptor file; built-in schemas when unset
    pub schema_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CORRAL_DATABASE_URL`: SQLite connection string
    ///
    /// Optional:
    /// - `CORRAL_MAX_CONNECTIONS`: Pool size (default: 5)
    /// - `CORRAL_SCHEMA_PATH`: JSON schema descriptor file (default: built-in schemas)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("CORRAL_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("CORRAL_DATABASE_URL"))?;

        let max_connections = std::env::var("CORRAL_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "CORRAL_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let schema_path = std::env::var("CORRAL_SCHEMA_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            max_connections,
            schema_path,
        })
    }

    /// Whether the database lives in memory only.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
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
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("CORRAL_DATABASE_URL", "sqlite:corral.db");
        guard.remove("CORRAL_MAX_CONNECTIONS");
        guard.remove("CORRAL_SCHEMA_PATH");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite:corral.db");
        assert_eq!(config.max_connections, 5);
        assert!(config.schema_path.is_none());
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("CORRAL_DATABASE_URL", "sqlite::memory:");
        guard.set("CORRAL_MAX_CONNECTIONS", "12");
        guard.set("CORRAL_SCHEMA_PATH", "/etc/corral/schemas.json");

        let config = Config::from_env().unwrap();

        assert_eq!(config.max_connections, 12);
        assert_eq!(
            config.schema_path.as_deref(),
            Some(std::path::Path::new("/etc/corral/schemas.json"))
        );
        assert!(config.is_in_memory());
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("CORRAL_DATABASE_URL");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CORRAL_DATABASE_URL")));
        assert!(err.to_string().contains("CORRAL_DATABASE_URL"));
    }

    #[test]
    fn test_config_invalid_max_connections() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("CORRAL_DATABASE_URL", "sqlite:corral.db");

        for value in ["zero", "0", "-3"] {
            guard.set("CORRAL_MAX_CONNECTIONS", value);
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid("CORRAL_MAX_CONNECTIONS", _)));
        }
    }
}
