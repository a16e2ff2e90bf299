//! Runtime configuration, read from the environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::sync::DEFAULT_BATCH_LIMIT;
use crate::wazuh::{WazuhConfig, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full runtime configuration for the Vigia backend.
#[derive(Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Path of the local SQLite cache file
    pub database_path: PathBuf,
    /// Remote alert source settings
    pub wazuh: WazuhConfig,
    /// Default batch size for sync runs
    pub sync_batch_limit: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("wazuh", &self.wazuh)
            .field("sync_batch_limit", &self.sync_batch_limit)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "VIGIA_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            PathBuf::from(value_or_default(&lookup, "VIGIA_DB_PATH", "vigia.db"));

        let base_url = required_trimmed(&lookup, "ELASTICSEARCH_URL")?;
        if !is_http_url(&base_url) {
            return Err(ConfigError::Invalid(
                "ELASTICSEARCH_URL must start with http:// or https://".to_string(),
            ));
        }
        let username = required_trimmed(&lookup, "ELASTICSEARCH_USERNAME")?;
        let password = required_trimmed(&lookup, "ELASTICSEARCH_PASSWORD")?;
        let index = value_or_default(&lookup, "WAZUH_ALERTS_INDEX", "wazuh-alerts-*");

        let timeout_secs = value_or_default(
            &lookup,
            "FETCH_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid("FETCH_TIMEOUT_SECS must be an integer in [1, 300]".to_string())
        })?;
        if !(1..=300).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "FETCH_TIMEOUT_SECS must be in [1, 300]".to_string(),
            ));
        }

        let retries = value_or_default(&lookup, "FETCH_RETRIES", "0")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::Invalid("FETCH_RETRIES must be an integer in [0, 5]".to_string())
            })?;
        if retries > 5 {
            return Err(ConfigError::Invalid(
                "FETCH_RETRIES must be in [0, 5]".to_string(),
            ));
        }

        let accept_invalid_certs = parse_bool(
            &value_or_default(&lookup, "ELASTICSEARCH_ACCEPT_INVALID_CERTS", "false"),
        )
        .ok_or_else(|| {
            ConfigError::Invalid(
                "ELASTICSEARCH_ACCEPT_INVALID_CERTS must be true or false".to_string(),
            )
        })?;

        let sync_batch_limit = value_or_default(
            &lookup,
            "SYNC_BATCH_LIMIT",
            &DEFAULT_BATCH_LIMIT.to_string(),
        )
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::Invalid("SYNC_BATCH_LIMIT must be an integer in [1, 10000]".to_string())
        })?;
        if !(1..=10_000).contains(&sync_batch_limit) {
            return Err(ConfigError::Invalid(
                "SYNC_BATCH_LIMIT must be in [1, 10000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            database_path,
            wazuh: WazuhConfig {
                base_url,
                index,
                username,
                password,
                timeout: Duration::from_secs(timeout_secs),
                accept_invalid_certs,
                retries,
            },
            sync_batch_limit,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn minimal() -> HashMap<&'static str, &'static str> {
        let mut map = HashMap::new();
        map.insert("ELASTICSEARCH_URL", "https://wazuh.internal:9200");
        map.insert("ELASTICSEARCH_USERNAME", "admin");
        map.insert("ELASTICSEARCH_PASSWORD", "sensitive-password");
        map
    }

    fn from(map: &HashMap<&str, &str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_cluster_credentials() {
        let map: HashMap<&str, &str> = HashMap::new();
        let err = from(&map).unwrap_err();
        assert!(err.to_string().contains("ELASTICSEARCH_URL"));
    }

    #[test]
    fn config_applies_defaults() {
        let config = from(&minimal()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("vigia.db"));
        assert_eq!(config.wazuh.index, "wazuh-alerts-*");
        assert_eq!(config.wazuh.timeout, Duration::from_secs(30));
        assert_eq!(config.wazuh.retries, 0);
        assert!(!config.wazuh.accept_invalid_certs);
        assert_eq!(config.sync_batch_limit, 500);
    }

    #[test]
    fn config_rejects_bad_url() {
        let mut map = minimal();
        map.insert("ELASTICSEARCH_URL", "wazuh.internal:9200");
        assert!(from(&map).is_err());
    }

    #[test]
    fn config_checks_ranges() {
        let mut map = minimal();
        map.insert("FETCH_TIMEOUT_SECS", "0");
        assert!(from(&map).is_err());

        let mut map = minimal();
        map.insert("SYNC_BATCH_LIMIT", "50000");
        assert!(from(&map).is_err());

        let mut map = minimal();
        map.insert("FETCH_RETRIES", "9");
        assert!(from(&map).is_err());
    }

    #[test]
    fn config_parses_bool_flags() {
        let mut map = minimal();
        map.insert("ELASTICSEARCH_ACCEPT_INVALID_CERTS", "1");
        assert!(from(&map).unwrap().wazuh.accept_invalid_certs);

        let mut map = minimal();
        map.insert("ELASTICSEARCH_ACCEPT_INVALID_CERTS", "sometimes");
        assert!(from(&map).is_err());
    }

    #[test]
    fn config_redacts_sensitive_debug_fields() {
        let config = from(&minimal()).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-password"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
