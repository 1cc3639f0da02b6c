// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock implementations for integration tests

use async_trait::async_trait;
use cloudwatch_logs_receiver::client::{
    DescribeLogGroupsPage, DescribeLogGroupsRequest, FakeClient, FilterLogEventsPage,
    FilterLogEventsRequest, LogsClient,
};
use cloudwatch_logs_receiver::errors::ProviderError;
use std::sync::Arc;
use std::time::Duration;

/// Delays every call before handing it to a [`FakeClient`]
pub struct SlowClient {
    pub inner: Arc<FakeClient>,
    pub delay: Duration,
}

#[async_trait]
impl LogsClient for SlowClient {
    async fn describe_log_groups(
        &self,
        request: DescribeLogGroupsRequest,
    ) -> Result<DescribeLogGroupsPage, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.describe_log_groups(request).await
    }

    async fn filter_log_events(
        &self,
        request: FilterLogEventsRequest,
    ) -> Result<FilterLogEventsPage, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.filter_log_events(request).await
    }
}
