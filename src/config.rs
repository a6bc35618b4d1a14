//! Runtime configuration read from the environment (`.env` honoured)

use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub inventory_transfer_url: String,
    pub inventory_timeout: Duration,
    pub inventory_max_retries: usize,
    pub follow_up_url: Option<String>,
    pub email_trigger_url: Option<String>,
    pub notification_timeout: Duration,
    /// Product-name keyword that triggers the warranty email
    pub warranty_keyword: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(name) {
                None => Ok(default),
                Some(value) => value
                    .parse()
                    .map_err(|_| ConfigError::Invalid { name, value }),
            }
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            inventory_transfer_url: required("INVENTORY_TRANSFER_URL")?,
            inventory_timeout: Duration::from_secs(number("INVENTORY_TIMEOUT_SECS", 10)?),
            inventory_max_retries: number("INVENTORY_MAX_RETRIES", 3)? as usize,
            follow_up_url: get("FOLLOW_UP_URL"),
            email_trigger_url: get("EMAIL_TRIGGER_URL"),
            notification_timeout: Duration::from_secs(number("NOTIFICATION_TIMEOUT_SECS", 10)?),
            warranty_keyword: get("WARRANTY_KEYWORD").unwrap_or_else(|| "gani".to_string()),
        })
    }
}
