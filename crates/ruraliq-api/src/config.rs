use std::collections::HashMap;
use std::env;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Static bearer token required on `/api` routes when set
    pub api_token: Option<String>,
    /// Largest accepted batch on the sync endpoint
    pub max_batch_size: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "RURALIQ_API_BIND_ADDR", "127.0.0.1:8002");
        let api_token = optional_trimmed(&lookup, "RURALIQ_API_TOKEN");

        let max_batch_size = value_or_default(&lookup, "RURALIQ_MAX_BATCH_SIZE", "500")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "RURALIQ_MAX_BATCH_SIZE must be an integer in [1, 10000]".to_string(),
                )
            })?;
        if !(1..=10_000).contains(&max_batch_size) {
            return Err(ConfigError::Invalid(
                "RURALIQ_MAX_BATCH_SIZE must be in [1, 10000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            api_token,
            max_batch_size,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8002".to_string(),
            api_token: None,
            max_batch_size: 500,
        }
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
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
