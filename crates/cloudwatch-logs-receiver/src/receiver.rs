// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host-facing lifecycle.
//!
//! [`LogsReceiver::new`] takes explicit configuration plus the injected client
//! and consumer. [`LogsReceiver::start`] spawns the scheduler and returns a
//! [`ReceiverHandle`] used to observe and stop it.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::LogsClient;
use crate::config::Config;
use crate::errors::ReceiverError;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::sink::LogsConsumer;

pub struct LogsReceiver {
    config: Arc<Config>,
    client: Arc<dyn LogsClient>,
    consumer: Arc<dyn LogsConsumer>,
}

impl std::fmt::Debug for LogsReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogsReceiver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LogsReceiver {
    /// Validates `config` and builds a receiver around the injected client and consumer.
    pub fn new(
        config: Config,
        client: Arc<dyn LogsClient>,
        consumer: Arc<dyn LogsConsumer>,
    ) -> Result<Self, ReceiverError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            client,
            consumer,
        })
    }

    /// Starts polling. Must be called from within a tokio runtime.
    pub fn start(self) -> ReceiverHandle {
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            Arc::clone(&self.config),
            self.client,
            self.consumer,
            cancel.clone(),
        );
        let status = scheduler.status();
        let status_tx = scheduler.status_sender();

        info!("Starting CloudWatch Logs receiver in {}", self.config.region);
        let task = tokio::spawn(scheduler.run());

        ReceiverHandle {
            status,
            status_tx,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Handle to a running receiver. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReceiverHandle {
    status: Arc<RwLock<SchedulerState>>,
    status_tx: broadcast::Sender<SchedulerState>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ReceiverHandle {
    pub async fn state(&self) -> SchedulerState {
        *self.status.read().await
    }

    /// Subscribe to state transitions.
    pub fn state_receiver(&self) -> broadcast::Receiver<SchedulerState> {
        self.status_tx.subscribe()
    }

    /// Stops ticking and waits for the scheduler to reach `Stopped`. An
    /// in-flight cycle is abandoned at its next page or group boundary.
    /// Calling this more than once is fine.
    pub async fn shutdown(&self) -> Result<(), ReceiverError> {
        self.cancel.cancel();

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            debug!("Waiting for scheduler to stop");
            task.await
                .map_err(|e| ReceiverError::TaskFailed(e.to_string()))?;
            info!("CloudWatch Logs receiver stopped");
        }
        Ok(())
    }
}
