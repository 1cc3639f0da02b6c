// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cycle scheduling.
//!
//! Each tick runs one cycle: `Idle -> Discovering -> Polling -> Emitting -> Idle`.
//! `Stopped` is entered on shutdown from any state. Cycles never overlap; a
//! slow cycle delays the next tick.
//!
//! The scheduler owns the working set and one [`PollCursor`] per group in it.
//! A successful discovery replaces the working set and drops the cursors of
//! groups no longer in it, so a group that disappears and comes back starts
//! over. A failed discovery keeps the previous working set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::autodiscovery::{self, LogGroupDescriptor};
use crate::client::{LogsClient, RawLogEvent};
use crate::config::Config;
use crate::converter::{EventConverter, LogRecord};
use crate::errors::{CycleError, DiscoveryError, PollError};
use crate::poller::{self, now_millis, PollCursor, PollOutcome};
use crate::sink::LogsConsumer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Discovering,
    Polling,
    Emitting,
    Stopped,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub groups_polled: usize,
    pub records_emitted: usize,
    /// Groups skipped this cycle because their first page failed
    pub failed_groups: Vec<String>,
    /// Groups whose events were only partially fetched
    pub partial_groups: Vec<String>,
    pub discovery_failed: bool,
}

pub struct Scheduler {
    config: Arc<Config>,
    client: Arc<dyn LogsClient>,
    consumer: Arc<dyn LogsConsumer>,
    converter: EventConverter,
    working_set: Option<Vec<LogGroupDescriptor>>,
    cursors: HashMap<String, PollCursor>,
    cancel: CancellationToken,
    status: Arc<RwLock<SchedulerState>>,
    status_tx: broadcast::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        config: Arc<Config>,
        client: Arc<dyn LogsClient>,
        consumer: Arc<dyn LogsConsumer>,
        cancel: CancellationToken,
    ) -> Self {
        let converter = EventConverter::new(&config.region);
        let (status_tx, _status_rx) = broadcast::channel(16);
        Self {
            config,
            client,
            consumer,
            converter,
            working_set: None,
            cursors: HashMap::new(),
            cancel,
            status: Arc::new(RwLock::new(SchedulerState::Idle)),
            status_tx,
        }
    }

    #[must_use]
    pub fn status(&self) -> Arc<RwLock<SchedulerState>> {
        Arc::clone(&self.status)
    }

    #[must_use]
    pub fn status_sender(&self) -> broadcast::Sender<SchedulerState> {
        self.status_tx.clone()
    }

    #[must_use]
    pub fn working_set(&self) -> Option<&[LogGroupDescriptor]> {
        self.working_set.as_deref()
    }

    #[must_use]
    pub fn cursor(&self, group: &str) -> Option<PollCursor> {
        self.cursors.get(group).copied()
    }

    #[must_use]
    pub fn cursors(&self) -> &HashMap<String, PollCursor> {
        &self.cursors
    }

    /// Ticks until cancelled. The first tick fires immediately.
    pub async fn run(mut self) {
        let mut ticker = interval(self.config.logs.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Polling log groups every {:?}",
            self.config.logs.poll_interval
        );

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => debug!(
                            "Cycle complete: {} groups polled, {} records emitted",
                            report.groups_polled, report.records_emitted
                        ),
                        Err(CycleError::Cancelled) => break,
                        Err(e) => warn!("Cycle failed: {e}"),
                    }
                }
            }
        }

        self.set_state(SchedulerState::Stopped).await;
        debug!("Scheduler stopped");
    }

    /// Runs one full cycle and returns to `Idle`, unless cancelled.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let result = self.cycle().await;
        if !matches!(result, Err(CycleError::Cancelled)) {
            self.set_state(SchedulerState::Idle).await;
        }
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        self.set_state(SchedulerState::Discovering).await;
        report.discovery_failed = !self.refresh_working_set().await;
        if self.cancel.is_cancelled() {
            return Err(CycleError::Cancelled);
        }

        let groups = self.working_set.clone().unwrap_or_default();
        if groups.is_empty() {
            debug!("No log groups to poll");
            return Ok(report);
        }

        // Cursors exist from a group's first poll on, even when it fails
        let initial = self.initial_cursor();
        for group in &groups {
            self.cursors.entry(group.name.clone()).or_insert(initial);
        }

        self.set_state(SchedulerState::Polling).await;
        let results = self.poll_groups(&groups, initial).await;
        if self.cancel.is_cancelled() {
            // Nothing is emitted, so cursors stay where they were
            return Err(CycleError::Cancelled);
        }

        self.set_state(SchedulerState::Emitting).await;
        report.groups_polled = groups.len();
        let mut batch: Vec<LogRecord> = Vec::new();
        for (group, result) in groups.iter().zip(results) {
            match result {
                Some(Ok(PollOutcome { events, cursor })) => {
                    self.emit_into(&mut batch, &group.name, events);
                    self.cursors.insert(group.name.clone(), cursor);
                }
                Some(Err(PollError::PartialFetch {
                    events,
                    cursor,
                    source,
                    pages,
                    ..
                })) => {
                    warn!(
                        "Log group {} failed after {pages} page(s), remainder retried next cycle: {source}",
                        group.name
                    );
                    self.emit_into(&mut batch, &group.name, events);
                    self.cursors.insert(group.name.clone(), cursor);
                    report.partial_groups.push(group.name.clone());
                }
                Some(Err(e @ PollError::Fetch { .. })) => {
                    warn!("Skipping log group for this cycle: {e}");
                    report.failed_groups.push(group.name.clone());
                }
                Some(Err(PollError::Cancelled { .. })) => return Err(CycleError::Cancelled),
                None => report.failed_groups.push(group.name.clone()),
            }
        }

        let records = batch.len();
        report.records_emitted = records;
        if batch.is_empty() {
            return Ok(report);
        }

        match timeout(self.config.logs.request_timeout, self.consumer.consume(batch)).await {
            Ok(Ok(())) => {
                debug!("Emitted {records} records");
                Ok(report)
            }
            Ok(Err(source)) => Err(CycleError::SinkRejected { records, source }),
            Err(_) => Err(CycleError::SinkTimeout { records }),
        }
    }

    /// Returns false if discovery was attempted and failed.
    async fn refresh_working_set(&mut self) -> bool {
        let groups_config = &self.config.logs.groups;
        if groups_config.uses_static_groups() {
            if self.working_set.is_none() {
                self.working_set = Some(groups_config.static_groups());
            }
            return true;
        }

        let Some(autodiscover) = groups_config.autodiscover.as_ref() else {
            self.working_set = Some(Vec::new());
            return true;
        };

        let options = self.config.logs.call_options();
        match autodiscovery::discover(self.client.as_ref(), autodiscover, &options, &self.cancel)
            .await
        {
            Ok(groups) => {
                self.cursors
                    .retain(|name, _| groups.iter().any(|group| &group.name == name));
                debug!("Working set refreshed with {} log groups", groups.len());
                self.working_set = Some(groups);
                true
            }
            Err(DiscoveryError::Cancelled) => {
                debug!("Log group discovery interrupted by shutdown");
                false
            }
            Err(e) => {
                match &self.working_set {
                    Some(previous) => warn!(
                        "{e}, keeping previous working set of {} log groups",
                        previous.len()
                    ),
                    None => warn!("{e}, no log groups to poll this cycle"),
                }
                false
            }
        }
    }

    /// Polls every group concurrently, bounded by `max_concurrent_polls`.
    /// Results are returned in the order of `groups`; `None` marks a poll task
    /// that did not finish.
    async fn poll_groups(
        &self,
        groups: &[LogGroupDescriptor],
        initial: PollCursor,
    ) -> Vec<Option<Result<PollOutcome, PollError>>> {
        let semaphore = Arc::new(Semaphore::new(self.config.logs.max_concurrent_polls));
        let page_size = self.config.logs.max_events_per_request;
        let options = self.config.logs.call_options();

        let mut tasks = JoinSet::new();
        for (index, group) in groups.iter().enumerate() {
            let cursor = self.cursors.get(&group.name).copied().unwrap_or(initial);
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let options = options.clone();
            let group = group.clone();

            tasks.spawn(async move {
                let cancelled = || PollError::Cancelled {
                    group: group.name.clone(),
                };
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(cancelled()));
                };
                if cancel.is_cancelled() {
                    return (index, Err(cancelled()));
                }
                let result =
                    poller::poll(client.as_ref(), &group, cursor, page_size, &options, &cancel)
                        .await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<PollOutcome, PollError>>> =
            (0..groups.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = results.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(e) => error!("Poll task failed: {e}"),
            }
        }
        results
    }

    fn initial_cursor(&self) -> PollCursor {
        let start = self.config.logs.start_from.unwrap_or_else(|| {
            let interval_ms =
                i64::try_from(self.config.logs.poll_interval.as_millis()).unwrap_or(i64::MAX);
            now_millis().saturating_sub(interval_ms)
        });
        PollCursor::new(start)
    }

    fn emit_into(&self, batch: &mut Vec<LogRecord>, group: &str, events: Vec<RawLogEvent>) {
        batch.extend(
            events
                .into_iter()
                .map(|event| self.converter.convert(event, group)),
        );
    }

    async fn set_state(&self, state: SchedulerState) {
        *self.status.write().await = state;
        let _ = self.status_tx.send(state);
    }
}
