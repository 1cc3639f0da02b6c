// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use cloudwatch_logs_receiver::client::{FakeClient, LogsClient, RawLogEvent};
use cloudwatch_logs_receiver::errors::ProviderError;
use cloudwatch_logs_receiver::scheduler::Scheduler;
use cloudwatch_logs_receiver::sink::{ChannelConsumer, LogsConsumer, MemoryConsumer};
use cloudwatch_logs_receiver::{LogsReceiver, SchedulerState};
use common::helpers::{
    bodies, fixture_events, fixture_log_groups, test_config, wait_for_records,
};
use common::mocks::SlowClient;
use std::sync::Arc;
use tokio::time::{timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

fn scheduler(
    config: cloudwatch_logs_receiver::Config,
    client: &Arc<FakeClient>,
    consumer: &Arc<MemoryConsumer>,
) -> Scheduler {
    Scheduler::new(
        Arc::new(config),
        Arc::clone(client) as Arc<dyn LogsClient>,
        Arc::clone(consumer) as Arc<dyn LogsConsumer>,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn receiver_delivers_single_event() {
    let client = Arc::new(
        FakeClient::new()
            .with_groups(["group-1"])
            .with_events("group-1", vec![RawLogEvent::new("stream-1", 1_000, "hello")]),
    );
    let consumer = Arc::new(MemoryConsumer::new());
    let mut config = test_config();
    if let Some(autodiscover) = config.logs.groups.autodiscover.as_mut() {
        autodiscover.limit = 1;
    }

    let receiver = LogsReceiver::new(
        config,
        Arc::clone(&client) as Arc<dyn LogsClient>,
        Arc::clone(&consumer) as Arc<dyn LogsConsumer>,
    )
    .expect("Failed to create receiver");
    let started = Instant::now();
    let handle = receiver.start();

    assert!(wait_for_records(&consumer, 1).await, "no records delivered");
    assert!(started.elapsed() < Duration::from_secs(1));
    handle.shutdown().await.expect("Failed to shut down receiver");

    let first_batch = &consumer.all_batches()[0];
    assert_eq!(first_batch.len(), 1);
    let record = &first_batch[0];
    assert_eq!(record.body, "hello");
    assert_eq!(record.log_group(), Some("group-1"));
    assert_eq!(record.log_stream(), Some("stream-1"));
    assert_eq!(record.timestamp, 1_000);
    assert_eq!(handle.state().await, SchedulerState::Stopped);
}

#[tokio::test]
async fn recorded_responses_are_converted() {
    let groups = fixture_log_groups();
    let events = fixture_events();
    assert_eq!(groups[0].stored_bytes, Some(1024));

    let client = Arc::new(
        FakeClient::new()
            .with_groups(groups.iter().map(|g| g.log_group_name.clone()))
            .with_events("group-1", events),
    );
    let consumer = Arc::new(MemoryConsumer::new());
    let mut config = test_config();
    config.region = "us-east-2".to_string();
    let mut scheduler = scheduler(config, &client, &consumer);

    let report = scheduler.run_cycle().await.expect("cycle failed");

    assert_eq!(report.groups_polled, 2);
    assert_eq!(report.records_emitted, 2);
    let records = consumer.all_records();
    assert_eq!(
        bodies(&records),
        vec!["hello", r#"{"level":"error","msg":"disk full"}"#]
    );
    assert_eq!(records[0].timestamp, 1_665_166_251_014);
    assert_eq!(records[0].observed_timestamp, 1_665_166_252_124);
    assert_eq!(
        records[0].attribute("id"),
        Some("37134448277055698880077365577645869800162629528367333376")
    );
    assert_eq!(
        records[1].resource.get("aws.region").map(String::as_str),
        Some("us-east-2")
    );
    assert_eq!(
        scheduler.cursor("group-1").map(|c| c.last_seen()),
        Some(1_665_166_251_015)
    );
}

#[tokio::test]
async fn failing_group_does_not_block_others() {
    let client = Arc::new(
        FakeClient::new()
            .with_groups(["A", "B"])
            .with_events(
                "B",
                vec![
                    RawLogEvent::new("s", 100, "b1"),
                    RawLogEvent::new("s", 200, "b2"),
                ],
            ),
    );
    client.fail_fetch_always("A", ProviderError::access_denied("not authorized"));
    let consumer = Arc::new(MemoryConsumer::new());
    let mut scheduler = scheduler(test_config(), &client, &consumer);

    let report = scheduler.run_cycle().await.expect("cycle failed");

    assert_eq!(report.failed_groups, vec!["A".to_string()]);
    let batches = consumer.all_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(bodies(&batches[0]), vec!["b1", "b2"]);

    client.clear_failures();
    client.add_events("A", vec![RawLogEvent::new("s", 150, "a1")]);
    let report = scheduler.run_cycle().await.expect("cycle failed");

    assert!(report.failed_groups.is_empty());
    assert_eq!(client.filter_requests_for("A").len(), 2);
    assert!(bodies(&consumer.all_records()).contains(&"a1".to_string()));
}

#[tokio::test]
async fn discovery_is_bounded_by_limit() {
    let client = Arc::new(
        FakeClient::new()
            .with_groups(["group-1", "group-2", "group-3"])
            .with_page_sizes(2, 100),
    );
    let consumer = Arc::new(MemoryConsumer::new());
    let mut config = test_config();
    if let Some(autodiscover) = config.logs.groups.autodiscover.as_mut() {
        autodiscover.limit = 1;
    }
    let mut scheduler = scheduler(config, &client, &consumer);

    let report = scheduler.run_cycle().await.expect("cycle failed");

    assert_eq!(report.groups_polled, 1);
    assert_eq!(client.describe_requests().len(), 1);
    assert_eq!(client.describe_requests()[0].limit, Some(1));
    let polled: Vec<String> = client
        .filter_requests()
        .into_iter()
        .map(|r| r.log_group_name)
        .collect();
    assert_eq!(polled, vec!["group-1"]);
}

#[tokio::test]
async fn discovery_failure_falls_back_to_previous_groups() {
    let client = Arc::new(
        FakeClient::new()
            .with_groups(["A"])
            .with_events("A", vec![RawLogEvent::new("s", 100, "a1")]),
    );
    let consumer = Arc::new(MemoryConsumer::new());
    let mut scheduler = scheduler(test_config(), &client, &consumer);

    scheduler.run_cycle().await.expect("cycle failed");
    client.add_events("A", vec![RawLogEvent::new("s", 300, "a2")]);
    client.fail_describe_once(None, ProviderError::throttled("rate exceeded"));

    let report = scheduler.run_cycle().await.expect("cycle failed");

    assert!(report.discovery_failed);
    assert_eq!(report.groups_polled, 1);
    assert!(bodies(&consumer.all_records()).contains(&"a2".to_string()));
    assert_eq!(scheduler.cursor("A").map(|c| c.last_seen()), Some(300));
}

#[tokio::test]
async fn channel_consumer_receives_batches() {
    let client = Arc::new(
        FakeClient::new()
            .with_groups(["group-1"])
            .with_events("group-1", vec![RawLogEvent::new("s", 100, "hello")]),
    );
    let (consumer, mut rx) = ChannelConsumer::new(8);

    let handle = LogsReceiver::new(
        test_config(),
        Arc::clone(&client) as Arc<dyn LogsClient>,
        Arc::new(consumer),
    )
    .expect("Failed to create receiver")
    .start();

    let batch = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for batch")
        .expect("channel closed");
    handle.shutdown().await.expect("Failed to shut down receiver");

    assert_eq!(bodies(&batch), vec!["hello"]);
}

#[tokio::test]
async fn shutdown_interrupts_pagination() {
    let events = (0..20)
        .map(|i| RawLogEvent::new("s", 100 + i, format!("event-{i}")))
        .collect();
    let inner = Arc::new(
        FakeClient::new()
            .with_groups(["group-1"])
            .with_events("group-1", events)
            .with_page_sizes(10, 1),
    );
    let client = SlowClient {
        inner: Arc::clone(&inner),
        delay: Duration::from_millis(100),
    };
    let consumer = Arc::new(MemoryConsumer::new());

    let handle = LogsReceiver::new(
        test_config(),
        Arc::new(client),
        Arc::clone(&consumer) as Arc<dyn LogsConsumer>,
    )
    .expect("Failed to create receiver")
    .start();

    tokio::time::sleep(Duration::from_millis(450)).await;
    let started = Instant::now();
    handle.shutdown().await.expect("Failed to shut down receiver");

    // At most the in-flight page is waited for
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(inner.filter_requests().len() < 20);
    assert_eq!(consumer.record_count(), 0);
    assert_eq!(handle.state().await, SchedulerState::Stopped);
}
