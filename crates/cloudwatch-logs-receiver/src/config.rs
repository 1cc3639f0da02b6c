// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Receiver configuration.
//!
//! Configuration can be deserialized from any serde format the host uses, or
//! read from `CW_*` environment variables with [`Config::from_env`]. Either way
//! it must pass [`Config::validate`] before a receiver is built from it.

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::autodiscovery::LogGroupDescriptor;
use crate::client::CallOptions;
use crate::constants::{
    DEFAULT_AUTODISCOVER_LIMIT, DEFAULT_MAX_CONCURRENT_POLLS, DEFAULT_MAX_EVENTS_PER_REQUEST,
    DEFAULT_POLL_INTERVAL, DEFAULT_REGION, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_DELAY_MS, MIN_POLL_INTERVAL,
};
use crate::errors::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region attached to every record as `aws.region`
    pub region: String,
    pub logs: LogsConfig,
    /// Log level for [`crate::logger::init`] (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            logs: LogsConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub poll_interval: Duration,
    /// Page size for `filter_log_events`
    pub max_events_per_request: usize,
    /// Bounds every provider call and the consumer call
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub request_timeout: Duration,
    pub max_concurrent_polls: usize,
    /// Epoch milliseconds to start from for groups polled for the first time.
    /// Defaults to one poll interval before the first poll.
    pub start_from: Option<i64>,
    pub retry_strategy: RetryStrategy,
    pub groups: GroupsConfig,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_events_per_request: DEFAULT_MAX_EVENTS_PER_REQUEST,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_polls: DEFAULT_MAX_CONCURRENT_POLLS,
            start_from: None,
            retry_strategy: RetryStrategy::default(),
            groups: GroupsConfig::default(),
        }
    }
}

impl LogsConfig {
    #[must_use]
    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            timeout: self.request_timeout,
            retry_strategy: self.retry_strategy.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub autodiscover: Option<AutodiscoverConfig>,
    /// Static groups keyed by name. When non-empty autodiscovery is skipped.
    pub named: BTreeMap<String, StreamConfig>,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            autodiscover: Some(AutodiscoverConfig::default()),
            named: BTreeMap::new(),
        }
    }
}

impl GroupsConfig {
    #[must_use]
    pub fn uses_static_groups(&self) -> bool {
        !self.named.is_empty()
    }

    #[must_use]
    pub fn static_groups(&self) -> Vec<LogGroupDescriptor> {
        self.named
            .iter()
            .map(|(name, streams)| LogGroupDescriptor {
                name: name.clone(),
                streams: streams.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutodiscoverConfig {
    /// Log group name prefix, applied server side
    pub prefix: Option<String>,
    /// Maximum number of groups to discover, 0 means unbounded
    pub limit: usize,
    /// Stream filter applied to every discovered group
    pub streams: StreamConfig,
}

impl Default for AutodiscoverConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            limit: DEFAULT_AUTODISCOVER_LIMIT,
            streams: StreamConfig::default(),
        }
    }
}

/// Restricts which log streams of a group are fetched. Empty means all streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub names: Vec<String>,
    pub prefixes: Vec<String>,
}

impl StreamConfig {
    fn validate(&self, owner: &str) -> Result<(), ConfigError> {
        if !self.names.is_empty() && !self.prefixes.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{owner}: cannot specify both stream names and stream prefixes"
            )));
        }
        Ok(())
    }
}

/// Retry behavior for retryable provider errors. Counts are total attempts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Retry right away
    Immediate(u64),
    /// Wait `delay_ms * attempt` between attempts
    LinearBackoff(u64, u64),
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::LinearBackoff(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS)
    }
}

impl RetryStrategy {
    #[must_use]
    pub fn max_attempts(&self) -> u64 {
        match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                (*attempts).max(1)
            }
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u64) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::LinearBackoff(_, delay_ms) => {
                Duration::from_millis(delay_ms.saturating_mul(attempt))
            }
        }
    }
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(region) = env::var("CW_REGION") {
            config.region = region;
        }
        if let Some(secs) = parse_env::<u64>("CW_POLL_INTERVAL_SECS")? {
            config.logs.poll_interval = Duration::from_secs(secs);
        }
        if let Some(max_events) = parse_env::<usize>("CW_MAX_EVENTS_PER_REQUEST")? {
            config.logs.max_events_per_request = max_events;
        }
        if let Some(secs) = parse_env::<u64>("CW_REQUEST_TIMEOUT_SECS")? {
            config.logs.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max_polls) = parse_env::<usize>("CW_MAX_CONCURRENT_POLLS")? {
            config.logs.max_concurrent_polls = max_polls;
        }

        let autodiscover = config
            .logs
            .groups
            .autodiscover
            .get_or_insert_with(AutodiscoverConfig::default);
        if let Ok(prefix) = env::var("CW_AUTODISCOVER_PREFIX") {
            if !prefix.trim().is_empty() {
                autodiscover.prefix = Some(prefix);
            }
        }
        if let Some(limit) = parse_env::<usize>("CW_AUTODISCOVER_LIMIT")? {
            autodiscover.limit = limit;
        }

        if let Ok(groups) = env::var("CW_LOG_GROUPS") {
            config.logs.groups.named = groups
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), StreamConfig::default()))
                .collect();
        }

        if let Ok(level) = env::var("CW_LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logs.poll_interval < MIN_POLL_INTERVAL {
            return Err(ConfigError::Invalid(
                "poll interval must be at least one second".to_string(),
            ));
        }

        if self.logs.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.logs.max_events_per_request == 0 {
            return Err(ConfigError::Invalid(
                "max events per request must be greater than 0".to_string(),
            ));
        }

        if self.logs.max_concurrent_polls == 0 {
            return Err(ConfigError::Invalid(
                "max concurrent polls must be greater than 0".to_string(),
            ));
        }

        let groups = &self.logs.groups;
        if !groups.uses_static_groups() && groups.autodiscover.is_none() {
            return Err(ConfigError::Invalid(
                "either autodiscover or named log groups must be configured".to_string(),
            ));
        }

        for (name, streams) in &groups.named {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "named log group cannot be empty".to_string(),
                ));
            }
            streams.validate(name)?;
        }

        if let Some(autodiscover) = &groups.autodiscover {
            autodiscover.streams.validate("autodiscover")?;
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Env { name, value }),
        Err(_) => Ok(None),
    }
}

/// Accepts whole or fractional seconds.
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
