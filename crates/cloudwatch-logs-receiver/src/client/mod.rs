// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Provider client capability.
//!
//! [`LogsClient`] is the only way the receiver talks to CloudWatch Logs. Hosts
//! plug in an implementation backed by their SDK and credentials; tests use
//! the in-memory `FakeClient`, built with the `test-utils` feature.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryStrategy;
use crate::errors::{ProviderError, ProviderErrorKind};

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeClient;

/// A log group as listed by `describe_log_groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroup {
    pub log_group_name: String,
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub stored_bytes: Option<i64>,
}

impl LogGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            log_group_name: name.into(),
            arn: None,
            creation_time: None,
            stored_bytes: None,
        }
    }
}

/// One log line as returned by `filter_log_events`. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub ingestion_time: Option<i64>,
    #[serde(default)]
    pub log_stream_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl RawLogEvent {
    pub fn new(stream: impl Into<String>, timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            ingestion_time: Some(timestamp),
            log_stream_name: Some(stream.into()),
            message: Some(message.into()),
            timestamp: Some(timestamp),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeLogGroupsRequest {
    pub log_group_name_prefix: Option<String>,
    pub limit: Option<usize>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeLogGroupsPage {
    pub log_groups: Vec<LogGroup>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterLogEventsRequest {
    pub log_group_name: String,
    pub log_stream_names: Vec<String>,
    pub log_stream_name_prefix: Option<String>,
    /// Inclusive, epoch milliseconds
    pub start_time: i64,
    /// Inclusive, epoch milliseconds
    pub end_time: i64,
    pub limit: usize,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterLogEventsPage {
    pub events: Vec<RawLogEvent>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait LogsClient: Send + Sync {
    /// Lists one page of log groups.
    async fn describe_log_groups(
        &self,
        request: DescribeLogGroupsRequest,
    ) -> Result<DescribeLogGroupsPage, ProviderError>;

    /// Fetches one page of events, oldest first.
    async fn filter_log_events(
        &self,
        request: FilterLogEventsRequest,
    ) -> Result<FilterLogEventsPage, ProviderError>;
}

/// Per-call bounds shared by autodiscovery and the pollers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout: Duration,
    pub retry_strategy: RetryStrategy,
}

/// Runs a single provider call under the configured timeout, retrying
/// retryable failures. Backoff sleeps end early on cancellation, in which case
/// the last error is returned.
pub(crate) async fn call_with_retry<T, F, Fut>(
    operation: &'static str,
    options: &CallOptions,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = options.retry_strategy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match timeout(options.timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::new(
                ProviderErrorKind::Timeout,
                format!("{operation} timed out after {:?}", options.timeout),
            ),
        };

        if !error.is_retryable() || attempt >= max_attempts {
            return Err(error);
        }

        warn!("{operation} failed (attempt {attempt}/{max_attempts}), retrying: {error}");

        let backoff = options.retry_strategy.backoff(attempt);
        tokio::select! {
            _ = sleep(backoff) => {}
            _ = cancel.cancelled() => {
                debug!("{operation} retry abandoned on shutdown");
                return Err(error);
            }
        }
    }
}
