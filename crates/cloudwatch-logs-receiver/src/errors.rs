// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the receiver.
//!
//! Every error here is scoped to the smallest unit it affects: a single
//! provider call, one log group, or one cycle. None of them stop the receiver;
//! the scheduler logs them and returns to idle.

use crate::client::RawLogEvent;
use crate::poller::PollCursor;

/// Configuration could not be built or is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },
}

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Throttled,
    Unavailable,
    Timeout,
    NotFound,
    AccessDenied,
    InvalidRequest,
    Other,
}

impl ProviderErrorKind {
    /// Throttling and transport level failures are worth another attempt, everything else is not.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Throttled | ProviderErrorKind::Unavailable | ProviderErrorKind::Timeout
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Throttled, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::AccessDenied, message)
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to list log groups: {0}")]
    Provider(#[from] ProviderError),

    #[error("Log group discovery cancelled")]
    Cancelled,
}

/// Failure of one group's poll.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PollError {
    /// The first page failed, nothing was ingested for the group.
    #[error("Failed to fetch events for log group {group}: {source}")]
    Fetch {
        group: String,
        #[source]
        source: ProviderError,
    },

    /// A later page failed. `events` and `cursor` cover the pages that succeeded.
    #[error("Fetch for log group {group} failed after {pages} page(s): {source}")]
    PartialFetch {
        group: String,
        pages: usize,
        events: Vec<RawLogEvent>,
        cursor: PollCursor,
        #[source]
        source: ProviderError,
    },

    #[error("Poll of log group {group} cancelled")]
    Cancelled { group: String },
}

/// The consumer declined a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkRejection {
    #[error("Consumer is closed")]
    Closed,

    #[error("Batch rejected: {0}")]
    Rejected(String),
}

/// Outcome of a cycle that did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    #[error("Consumer rejected batch of {records} records: {source}")]
    SinkRejected {
        records: usize,
        #[source]
        source: SinkRejection,
    },

    #[error("Consumer did not accept batch of {records} records in time")]
    SinkTimeout { records: usize },

    #[error("Cycle cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Receiver task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::Invalid("poll interval too short".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: poll interval too short"
        );

        let error = PollError::Fetch {
            group: "group-1".to_string(),
            source: ProviderError::access_denied("not authorized"),
        };
        assert_eq!(
            error.to_string(),
            "Failed to fetch events for log group group-1: AccessDenied: not authorized"
        );
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ProviderError::throttled("slow down").is_retryable());
        assert!(ProviderError::new(ProviderErrorKind::Timeout, "t").is_retryable());
        assert!(ProviderError::new(ProviderErrorKind::Unavailable, "u").is_retryable());
        assert!(!ProviderError::not_found("gone").is_retryable());
        assert!(!ProviderError::access_denied("no").is_retryable());
        assert!(!ProviderError::new(ProviderErrorKind::InvalidRequest, "bad").is_retryable());
        assert!(!ProviderError::new(ProviderErrorKind::Other, "?").is_retryable());
    }

    #[test]
    fn test_receiver_error_from_config() {
        let error: ReceiverError = ConfigError::Invalid("x".into()).into();
        assert_eq!(error.to_string(), "Invalid configuration: x");
    }
}
