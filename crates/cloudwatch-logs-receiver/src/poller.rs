// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-group event polling.
//!
//! A poll fetches every page of events between the group's cursor (inclusive)
//! and "now". A group with several stream prefixes is read as one page
//! sequence per prefix, since the provider only accepts a single prefix per
//! request.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::autodiscovery::LogGroupDescriptor;
use crate::client::{
    call_with_retry, CallOptions, FilterLogEventsRequest, LogsClient, RawLogEvent,
};
use crate::errors::{PollError, ProviderError};

/// Timestamp (epoch milliseconds) of the newest event already consumed for a group.
///
/// The cursor only moves forward. The next poll starts at this timestamp
/// inclusive, so events sharing the boundary timestamp may be delivered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCursor {
    last_seen: i64,
}

impl PollCursor {
    #[must_use]
    pub fn new(last_seen: i64) -> Self {
        Self { last_seen }
    }

    #[must_use]
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    pub fn advance(&mut self, timestamp: i64) {
        self.last_seen = self.last_seen.max(timestamp);
    }

    /// Cursor covering `events`, never behind `self`.
    #[must_use]
    pub fn advanced_past(mut self, events: &[RawLogEvent]) -> Self {
        for ts in events.iter().filter_map(|event| event.timestamp) {
            self.advance(ts);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Oldest first
    pub events: Vec<RawLogEvent>,
    pub cursor: PollCursor,
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

struct Sequence {
    events: Vec<RawLogEvent>,
    pages: usize,
    failure: Option<ProviderError>,
}

pub async fn poll(
    client: &dyn LogsClient,
    group: &LogGroupDescriptor,
    cursor: PollCursor,
    page_size: usize,
    options: &CallOptions,
    cancel: &CancellationToken,
) -> Result<PollOutcome, PollError> {
    let end_time = now_millis().max(cursor.last_seen());

    let prefixes: Vec<Option<String>> = if group.streams.prefixes.is_empty() {
        vec![None]
    } else {
        group.streams.prefixes.iter().cloned().map(Some).collect()
    };

    let mut sequences = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        let request = FilterLogEventsRequest {
            log_group_name: group.name.clone(),
            log_stream_names: group.streams.names.clone(),
            log_stream_name_prefix: prefix,
            start_time: cursor.last_seen(),
            end_time,
            limit: page_size,
            next_token: None,
        };
        let sequence = fetch_sequence(client, request, options, cancel).await;
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled {
                group: group.name.clone(),
            });
        }
        sequences.push(sequence);
    }

    let pages: usize = sequences.iter().map(|s| s.pages).sum();
    let multiple = sequences.len() > 1;

    // A failed sequence pins the cursor to what it confirmed; completed
    // sequences reached `end_time` and do not constrain it.
    let mut confirmed: Option<PollCursor> = None;
    let mut first_failure: Option<ProviderError> = None;
    let mut events = Vec::new();
    for sequence in sequences {
        if let Some(failure) = sequence.failure {
            let boundary = cursor.advanced_past(&sequence.events);
            confirmed = Some(match confirmed {
                Some(current) if current.last_seen() <= boundary.last_seen() => current,
                _ => boundary,
            });
            first_failure.get_or_insert(failure);
        }
        events.extend(sequence.events);
    }

    if multiple {
        events.sort_by_key(|event| event.timestamp.unwrap_or(i64::MIN));
    }

    match first_failure {
        None => {
            let cursor = cursor.advanced_past(&events);
            debug!(
                "Fetched {} events from log group {} in {pages} page(s)",
                events.len(),
                group.name
            );
            Ok(PollOutcome { events, cursor })
        }
        Some(source) if pages == 0 => Err(PollError::Fetch {
            group: group.name.clone(),
            source,
        }),
        Some(source) => Err(PollError::PartialFetch {
            group: group.name.clone(),
            pages,
            events,
            cursor: confirmed.unwrap_or(cursor),
            source,
        }),
    }
}

async fn fetch_sequence(
    client: &dyn LogsClient,
    mut request: FilterLogEventsRequest,
    options: &CallOptions,
    cancel: &CancellationToken,
) -> Sequence {
    let mut sequence = Sequence {
        events: Vec::new(),
        pages: 0,
        failure: None,
    };

    loop {
        if cancel.is_cancelled() {
            return sequence;
        }

        let result = call_with_retry("filter_log_events", options, cancel, || {
            client.filter_log_events(request.clone())
        })
        .await;

        match result {
            Ok(page) => {
                sequence.pages += 1;
                sequence.events.extend(page.events);
                match page.next_token {
                    Some(token) => request.next_token = Some(token),
                    None => return sequence,
                }
            }
            Err(e) => {
                sequence.failure = Some(e);
                return sequence;
            }
        }
    }
}
