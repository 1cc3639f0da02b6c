// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`LogsClient`] with scripted failures.
//!
//! Pagination tokens are the stringified offset of the next item, so a failure
//! can be pinned to a specific page: `None` is the first page, `Some("2")` the
//! page starting at the third item, and so on.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    DescribeLogGroupsPage, DescribeLogGroupsRequest, FilterLogEventsPage, FilterLogEventsRequest,
    LogGroup, LogsClient, RawLogEvent,
};
use crate::errors::{ProviderError, ProviderErrorKind};

#[derive(Debug)]
struct ScriptedFailure {
    at_token: Option<String>,
    error: ProviderError,
}

#[derive(Debug, Default)]
struct FakeState {
    groups: Vec<LogGroup>,
    group_page_size: Option<usize>,
    events: HashMap<String, Vec<RawLogEvent>>,
    event_page_size: Option<usize>,
    describe_failures: VecDeque<ScriptedFailure>,
    fetch_failures: HashMap<String, VecDeque<ScriptedFailure>>,
    always_failing: HashMap<String, ProviderError>,
    describe_requests: Vec<DescribeLogGroupsRequest>,
    filter_requests: Vec<FilterLogEventsRequest>,
}

#[derive(Debug, Default)]
pub struct FakeClient {
    state: Mutex<FakeState>,
}

impl FakeClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_groups<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_state(|state| {
            state
                .groups
                .extend(names.into_iter().map(|name| LogGroup::new(name)));
        })
    }

    #[must_use]
    pub fn with_events(self, group: &str, events: Vec<RawLogEvent>) -> Self {
        self.add_events(group, events);
        self
    }

    /// Page sizes default to "everything in one page".
    #[must_use]
    pub fn with_page_sizes(self, groups: usize, events: usize) -> Self {
        self.with_state(|state| {
            state.group_page_size = Some(groups.max(1));
            state.event_page_size = Some(events.max(1));
        })
    }

    pub fn add_events(&self, group: &str, events: Vec<RawLogEvent>) {
        self.lock()
            .events
            .entry(group.to_string())
            .or_default()
            .extend(events);
    }

    pub fn set_groups<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().groups = names.into_iter().map(|name| LogGroup::new(name)).collect();
    }

    /// Fails the next `describe_log_groups` call made with `at_token`.
    pub fn fail_describe_once(&self, at_token: Option<&str>, error: ProviderError) {
        self.lock().describe_failures.push_back(ScriptedFailure {
            at_token: at_token.map(str::to_string),
            error,
        });
    }

    /// Fails the next `filter_log_events` call for `group` made with `at_token`.
    pub fn fail_fetch_once(&self, group: &str, at_token: Option<&str>, error: ProviderError) {
        self.lock()
            .fetch_failures
            .entry(group.to_string())
            .or_default()
            .push_back(ScriptedFailure {
                at_token: at_token.map(str::to_string),
                error,
            });
    }

    /// Fails every `filter_log_events` call for `group` until cleared.
    pub fn fail_fetch_always(&self, group: &str, error: ProviderError) {
        self.lock().always_failing.insert(group.to_string(), error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.describe_failures.clear();
        state.fetch_failures.clear();
        state.always_failing.clear();
    }

    #[must_use]
    pub fn describe_requests(&self) -> Vec<DescribeLogGroupsRequest> {
        self.lock().describe_requests.clone()
    }

    #[must_use]
    pub fn filter_requests(&self) -> Vec<FilterLogEventsRequest> {
        self.lock().filter_requests.clone()
    }

    #[must_use]
    pub fn filter_requests_for(&self, group: &str) -> Vec<FilterLogEventsRequest> {
        self.lock()
            .filter_requests
            .iter()
            .filter(|request| request.log_group_name == group)
            .cloned()
            .collect()
    }

    fn with_state(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn take_failure(
    failures: &mut VecDeque<ScriptedFailure>,
    token: &Option<String>,
) -> Option<ProviderError> {
    let index = failures.iter().position(|f| &f.at_token == token)?;
    failures.remove(index).map(|f| f.error)
}

fn parse_offset(token: &Option<String>) -> Result<usize, ProviderError> {
    match token {
        None => Ok(0),
        Some(token) => token.parse::<usize>().map_err(|_| {
            ProviderError::new(
                ProviderErrorKind::InvalidRequest,
                format!("invalid next token {token:?}"),
            )
        }),
    }
}

fn paginate<T: Clone>(items: &[T], offset: usize, page_size: usize) -> (Vec<T>, Option<String>) {
    let end = offset.saturating_add(page_size).min(items.len());
    let page = items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
    let next_token = (end < items.len()).then(|| end.to_string());
    (page, next_token)
}

fn stream_matches(request: &FilterLogEventsRequest, event: &RawLogEvent) -> bool {
    let stream = event.log_stream_name.as_deref().unwrap_or_default();
    if !request.log_stream_names.is_empty()
        && !request.log_stream_names.iter().any(|name| name == stream)
    {
        return false;
    }
    match &request.log_stream_name_prefix {
        Some(prefix) => stream.starts_with(prefix.as_str()),
        None => true,
    }
}

#[async_trait]
impl LogsClient for FakeClient {
    async fn describe_log_groups(
        &self,
        request: DescribeLogGroupsRequest,
    ) -> Result<DescribeLogGroupsPage, ProviderError> {
        let mut state = self.lock();
        state.describe_requests.push(request.clone());

        if let Some(error) = take_failure(&mut state.describe_failures, &request.next_token) {
            return Err(error);
        }

        let matching: Vec<LogGroup> = state
            .groups
            .iter()
            .filter(|group| match &request.log_group_name_prefix {
                Some(prefix) => group.log_group_name.starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        let page_size = match (state.group_page_size, request.limit) {
            (Some(size), Some(limit)) => size.min(limit),
            (Some(size), None) => size,
            (None, Some(limit)) => limit,
            (None, None) => usize::MAX,
        };
        let offset = parse_offset(&request.next_token)?;
        let (log_groups, next_token) = paginate(&matching, offset, page_size.max(1));

        Ok(DescribeLogGroupsPage {
            log_groups,
            next_token,
        })
    }

    async fn filter_log_events(
        &self,
        request: FilterLogEventsRequest,
    ) -> Result<FilterLogEventsPage, ProviderError> {
        let mut state = self.lock();
        state.filter_requests.push(request.clone());

        if let Some(error) = state.always_failing.get(&request.log_group_name) {
            return Err(error.clone());
        }
        if let Some(failures) = state.fetch_failures.get_mut(&request.log_group_name) {
            if let Some(error) = take_failure(failures, &request.next_token) {
                return Err(error);
            }
        }

        let Some(events) = state.events.get(&request.log_group_name) else {
            if state
                .groups
                .iter()
                .any(|group| group.log_group_name == request.log_group_name)
            {
                return Ok(FilterLogEventsPage::default());
            }
            return Err(ProviderError::not_found(format!(
                "log group {} does not exist",
                request.log_group_name
            )));
        };

        let mut matching: Vec<RawLogEvent> = events
            .iter()
            .filter(|event| {
                event
                    .timestamp
                    .is_some_and(|ts| ts >= request.start_time && ts <= request.end_time)
            })
            .filter(|event| stream_matches(&request, event))
            .cloned()
            .collect();
        matching.sort_by_key(|event| event.timestamp);

        let page_size = state
            .event_page_size
            .unwrap_or(usize::MAX)
            .min(request.limit.max(1));
        let offset = parse_offset(&request.next_token)?;
        let (events, next_token) = paginate(&matching, offset, page_size);

        Ok(FilterLogEventsPage { events, next_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_describe_paginates_by_offset() {
        let client = FakeClient::new()
            .with_groups(["a", "b", "c"])
            .with_page_sizes(2, 10);

        let first = client
            .describe_log_groups(DescribeLogGroupsRequest::default())
            .await
            .expect("first page");
        assert_eq!(first.log_groups.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let second = client
            .describe_log_groups(DescribeLogGroupsRequest {
                next_token: first.next_token,
                ..Default::default()
            })
            .await
            .expect("second page");
        assert_eq!(second.log_groups, vec![LogGroup::new("c")]);
        assert_eq!(second.next_token, None);
    }

    #[tokio::test]
    async fn test_filter_respects_window_and_streams() {
        let client = FakeClient::new().with_groups(["g"]).with_events(
            "g",
            vec![
                RawLogEvent::new("app-1", 30, "late"),
                RawLogEvent::new("app-1", 10, "early"),
                RawLogEvent::new("web-1", 20, "web"),
                RawLogEvent::new("app-2", 99, "out of window"),
            ],
        );

        let page = client
            .filter_log_events(FilterLogEventsRequest {
                log_group_name: "g".to_string(),
                log_stream_name_prefix: Some("app-".to_string()),
                start_time: 10,
                end_time: 50,
                limit: 100,
                ..Default::default()
            })
            .await
            .expect("page");

        let messages: Vec<_> = page
            .events
            .iter()
            .filter_map(|event| event.message.as_deref())
            .collect();
        assert_eq!(messages, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_scripted_failure_fires_once() {
        let client = FakeClient::new().with_groups(["g"]);
        client.fail_fetch_once("g", None, ProviderError::throttled("slow down"));

        let request = FilterLogEventsRequest {
            log_group_name: "g".to_string(),
            end_time: i64::MAX,
            limit: 10,
            ..Default::default()
        };
        assert!(client.filter_log_events(request.clone()).await.is_err());
        assert!(client.filter_log_events(request).await.is_ok());
        assert_eq!(client.filter_requests_for("g").len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let client = FakeClient::new();
        let error = client
            .filter_log_events(FilterLogEventsRequest {
                log_group_name: "missing".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind, ProviderErrorKind::NotFound);
    }
}
