// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pull-based receiver for CloudWatch Logs.
//!
//! On every poll interval the receiver refreshes the set of log groups to watch
//! (either a static list or prefix-based autodiscovery), fetches new events for
//! each group starting at that group's cursor, converts them into
//! vendor-neutral [`converter::LogRecord`]s and hands the combined batch to a
//! [`sink::LogsConsumer`].
//!
//! ```text
//!   interval tick
//!        │
//!        v
//!   ┌──────────────┐    describe_log_groups
//!   │ Autodiscovery│ ───────────────────────┐
//!   └──────┬───────┘                        │
//!          │ working set                    v
//!          v                         ┌─────────────┐
//!   ┌──────────────┐ filter_log_events│ LogsClient │
//!   │ Group pollers│ ────────────────>└─────────────┘
//!   └──────┬───────┘
//!          │ raw events
//!          v
//!   ┌──────────────┐
//!   │  Converter   │
//!   └──────┬───────┘
//!          │ one batch per cycle
//!          v
//!   ┌──────────────┐
//!   │ LogsConsumer │
//!   └──────────────┘
//! ```
//!
//! Credentials and transport live behind [`client::LogsClient`]; the receiver
//! only depends on its two paginated calls.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod autodiscovery;
pub mod client;
pub mod config;
pub mod constants;
pub mod converter;
pub mod errors;
pub mod logger;
pub mod poller;
pub mod receiver;
pub mod scheduler;
pub mod sink;

pub use config::Config;
pub use receiver::{LogsReceiver, ReceiverHandle};
pub use scheduler::SchedulerState;
