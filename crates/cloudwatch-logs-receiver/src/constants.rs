// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size passed to every `filter_log_events` call.
pub const DEFAULT_MAX_EVENTS_PER_REQUEST: usize = 1_000;

pub const DEFAULT_AUTODISCOVER_LIMIT: usize = 50;

/// Largest page `describe_log_groups` accepts.
pub const MAX_DESCRIBE_PAGE_SIZE: usize = 50;

pub const DEFAULT_MAX_CONCURRENT_POLLS: usize = 4;

pub const DEFAULT_RETRY_ATTEMPTS: u64 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

// Record attribute keys
pub const ATTR_AWS_REGION: &str = "aws.region";
pub const ATTR_LOG_GROUP_NAME: &str = "cloudwatch.log.group.name";
pub const ATTR_LOG_STREAM: &str = "cloudwatch.log.stream";
pub const ATTR_EVENT_ID: &str = "id";
