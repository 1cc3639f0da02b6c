// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use cloudwatch_logs_receiver::client::{LogGroup, RawLogEvent};
use cloudwatch_logs_receiver::config::RetryStrategy;
use cloudwatch_logs_receiver::converter::LogRecord;
use cloudwatch_logs_receiver::sink::MemoryConsumer;
use cloudwatch_logs_receiver::Config;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogGroupsResponse {
    log_groups: Vec<LogGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterLogEventsResponse {
    events: Vec<RawLogEvent>,
}

/// Log groups from a recorded `DescribeLogGroups` response
pub fn fixture_log_groups() -> Vec<LogGroup> {
    let response: DescribeLogGroupsResponse =
        serde_json::from_str(include_str!("../testdata/describe-log-groups.json"))
            .expect("Failed to parse describe-log-groups fixture");
    response.log_groups
}

/// Events from a recorded `FilterLogEvents` response
pub fn fixture_events() -> Vec<RawLogEvent> {
    let response: FilterLogEventsResponse =
        serde_json::from_str(include_str!("../testdata/filter-log-events.json"))
            .expect("Failed to parse filter-log-events fixture");
    response.events
}

/// One second ticks, everything since the epoch, no retries
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.logs.poll_interval = Duration::from_secs(1);
    config.logs.start_from = Some(0);
    config.logs.retry_strategy = RetryStrategy::Immediate(1);
    config
}

/// Waits until `consumer` holds at least `count` records
pub async fn wait_for_records(consumer: &MemoryConsumer, count: usize) -> bool {
    timeout(Duration::from_secs(5), async {
        while consumer.record_count() < count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

pub fn bodies(records: &[LogRecord]) -> Vec<String> {
    records.iter().map(|r| r.body.clone()).collect()
}
