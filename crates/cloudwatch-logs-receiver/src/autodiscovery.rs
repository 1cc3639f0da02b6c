// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log group autodiscovery.
//!
//! Lists log groups page by page until the provider runs out of pages or the
//! configured limit is reached. A failure on any page fails the whole call;
//! the scheduler then keeps polling the previous working set.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{call_with_retry, CallOptions, DescribeLogGroupsRequest, LogsClient};
use crate::config::{AutodiscoverConfig, StreamConfig};
use crate::constants::MAX_DESCRIBE_PAGE_SIZE;
use crate::errors::DiscoveryError;

/// A log group the receiver polls, with the streams to read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupDescriptor {
    pub name: String,
    pub streams: StreamConfig,
}

impl LogGroupDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            streams: StreamConfig::default(),
        }
    }
}

pub async fn discover(
    client: &dyn LogsClient,
    config: &AutodiscoverConfig,
    options: &CallOptions,
    cancel: &CancellationToken,
) -> Result<Vec<LogGroupDescriptor>, DiscoveryError> {
    let limit = (config.limit > 0).then_some(config.limit);
    let prefix = config.prefix.as_deref().filter(|p| !p.is_empty());

    let mut groups = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        let page_limit = limit.map(|limit| (limit - groups.len()).min(MAX_DESCRIBE_PAGE_SIZE));
        let request = DescribeLogGroupsRequest {
            log_group_name_prefix: prefix.map(str::to_string),
            limit: page_limit,
            next_token: next_token.take(),
        };

        let page = call_with_retry("describe_log_groups", options, cancel, || {
            client.describe_log_groups(request.clone())
        })
        .await?;

        for group in page.log_groups {
            if limit.is_some_and(|limit| groups.len() >= limit) {
                break;
            }
            // Providers that ignore the prefix are filtered here
            if prefix.is_some_and(|p| !group.log_group_name.starts_with(p)) {
                continue;
            }
            groups.push(LogGroupDescriptor {
                name: group.log_group_name,
                streams: config.streams.clone(),
            });
        }

        if limit.is_some_and(|limit| groups.len() >= limit) {
            break;
        }
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    debug!("Discovered {} log groups", groups.len());
    Ok(groups)
}
