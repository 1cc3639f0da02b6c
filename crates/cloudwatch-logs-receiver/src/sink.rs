// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Output side of the receiver.
//!
//! The scheduler hands each cycle's records to a [`LogsConsumer`] in a single
//! call. A rejected batch fails the cycle but does not move any cursor back;
//! redelivery is the consumer's concern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::converter::LogRecord;
use crate::errors::SinkRejection;

#[async_trait]
pub trait LogsConsumer: Send + Sync {
    async fn consume(&self, batch: Vec<LogRecord>) -> Result<(), SinkRejection>;
}

/// Forwards batches over a bounded channel. A full channel applies
/// backpressure to the cycle; a dropped receiver rejects every batch.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::Sender<Vec<LogRecord>>,
}

impl ChannelConsumer {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<LogRecord>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl LogsConsumer for ChannelConsumer {
    async fn consume(&self, batch: Vec<LogRecord>) -> Result<(), SinkRejection> {
        let records = batch.len();
        self.tx
            .send(batch)
            .await
            .map_err(|_| SinkRejection::Closed)?;
        debug!("Forwarded batch of {records} records");
        Ok(())
    }
}

/// Keeps every accepted batch in memory.
#[derive(Debug, Default)]
pub struct MemoryConsumer {
    batches: Mutex<Vec<Vec<LogRecord>>>,
    reject: AtomicBool,
}

impl MemoryConsumer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every batch is rejected and not stored.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    #[must_use]
    pub fn all_batches(&self) -> Vec<Vec<LogRecord>> {
        self.lock().clone()
    }

    #[must_use]
    pub fn all_records(&self) -> Vec<LogRecord> {
        self.lock().iter().flatten().cloned().collect()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.lock().iter().map(Vec::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<LogRecord>>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LogsConsumer for MemoryConsumer {
    async fn consume(&self, batch: Vec<LogRecord>) -> Result<(), SinkRejection> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SinkRejection::Rejected(format!(
                "refusing batch of {} records",
                batch.len()
            )));
        }
        self.lock().push(batch);
        Ok(())
    }
}
