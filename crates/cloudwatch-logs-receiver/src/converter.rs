// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conversion of provider events into vendor-neutral log records.
//!
//! Conversion never fails: a missing or non-positive event timestamp falls back
//! to the ingestion time, and the message is carried as opaque text.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::client::RawLogEvent;
use crate::constants::{ATTR_AWS_REGION, ATTR_EVENT_ID, ATTR_LOG_GROUP_NAME, ATTR_LOG_STREAM};
use crate::poller::now_millis;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Event time, epoch milliseconds
    pub timestamp: i64,
    /// Ingestion time, epoch milliseconds
    pub observed_timestamp: i64,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
    pub resource: BTreeMap<String, String>,
}

impl LogRecord {
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn log_group(&self) -> Option<&str> {
        self.attribute(ATTR_LOG_GROUP_NAME)
    }

    #[must_use]
    pub fn log_stream(&self) -> Option<&str> {
        self.attribute(ATTR_LOG_STREAM)
    }
}

#[derive(Debug, Clone)]
pub struct EventConverter {
    resource: BTreeMap<String, String>,
}

impl EventConverter {
    pub fn new(region: &str) -> Self {
        let mut resource = BTreeMap::new();
        resource.insert(ATTR_AWS_REGION.to_string(), region.to_string());
        Self { resource }
    }

    #[must_use]
    pub fn convert(&self, event: RawLogEvent, group: &str) -> LogRecord {
        let observed_timestamp = event
            .ingestion_time
            .filter(|ts| *ts > 0)
            .unwrap_or_else(now_millis);
        let timestamp = event
            .timestamp
            .filter(|ts| *ts > 0)
            .unwrap_or(observed_timestamp);

        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_LOG_GROUP_NAME.to_string(), group.to_string());
        if let Some(stream) = event.log_stream_name {
            attributes.insert(ATTR_LOG_STREAM.to_string(), stream);
        }
        if let Some(id) = event.event_id {
            attributes.insert(ATTR_EVENT_ID.to_string(), id);
        }

        LogRecord {
            timestamp,
            observed_timestamp,
            body: event.message.unwrap_or_default(),
            attributes,
            resource: self.resource.clone(),
        }
    }
}
