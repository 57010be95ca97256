use std::env;
use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::constants::*;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REVIEW_INTERVAL_SECS: u64 = 10;
const DEFAULT_BOOT_TIMEOUT_SECS: u64 = 10;
const MAX_INTERVAL_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid number for {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("{name} must be between 1 and {max} seconds, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },
    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: &'static str, value: String },
}

/// Connection details for the remote app API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub api_host: String,
    pub item_id: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_host: Option<String>,
    pub item_id: Option<String>,
    pub api_token: Option<String>,
    pub http_timeout: Duration,
    pub review_enabled: bool,
    pub review_interval: Duration,
    /// Program and arguments of the sandbox worker process
    pub worker_command: Vec<String>,
    pub boot_timeout: Duration,
    pub preloaded_packages: Vec<String>,
    pub header_code: String,
    pub footer_code: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_host: None,
            item_id: None,
            api_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            review_enabled: true,
            review_interval: Duration::from_secs(DEFAULT_REVIEW_INTERVAL_SECS),
            worker_command: Vec::new(),
            boot_timeout: Duration::from_secs(DEFAULT_BOOT_TIMEOUT_SECS),
            preloaded_packages: Vec::new(),
            header_code: String::new(),
            footer_code: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_host = non_empty_var(TUTOR_API_HOST).map(|h| h.trim_end_matches('/').to_string());
        let item_id = non_empty_var(TUTOR_ITEM_ID);
        let api_token = non_empty_var(TUTOR_API_TOKEN);

        let http_timeout = seconds_var(TUTOR_HTTP_TIMEOUT_SECS, defaults.http_timeout)?;
        let review_interval = seconds_var(TUTOR_REVIEW_INTERVAL_SECS, defaults.review_interval)?;
        let boot_timeout = seconds_var(TUTOR_BOOT_TIMEOUT_SECS, defaults.boot_timeout)?;

        let review_enabled = match non_empty_var(TUTOR_REVIEW_ENABLED) {
            Some(raw) => raw
                .trim()
                .to_lowercase()
                .parse::<bool>()
                .map_err(|_| ConfigError::InvalidBool {
                    name: TUTOR_REVIEW_ENABLED,
                    value: raw,
                })?,
            None => defaults.review_enabled,
        };

        let worker_command = non_empty_var(TUTOR_WORKER_COMMAND)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let preloaded_packages = non_empty_var(TUTOR_PRELOADED_PACKAGES)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let header_code = env::var(TUTOR_HEADER_CODE).unwrap_or_default();
        let footer_code = env::var(TUTOR_FOOTER_CODE).unwrap_or_default();

        let config = Self {
            api_host,
            item_id,
            api_token,
            http_timeout,
            review_enabled,
            review_interval,
            worker_command,
            boot_timeout,
            preloaded_packages,
            header_code,
            footer_code,
        };
        debug!(
            "Loaded engine config: api_host={:?}, review_enabled={}, review_interval={:?}",
            config.api_host, config.review_enabled, config.review_interval
        );
        Ok(config)
    }

    /// Remote endpoint, present only when host, item and token are all configured
    pub fn remote(&self) -> Option<RemoteEndpoint> {
        match (&self.api_host, &self.item_id, &self.api_token) {
            (Some(api_host), Some(item_id), Some(token)) => Some(RemoteEndpoint {
                api_host: api_host.clone(),
                item_id: item_id.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn seconds_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let Some(raw) = non_empty_var(name) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidNumber { name, source })?;
    if !(1..=MAX_INTERVAL_SECS).contains(&value) {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            max: MAX_INTERVAL_SECS,
        });
    }
    Ok(Duration::from_secs(value))
}
