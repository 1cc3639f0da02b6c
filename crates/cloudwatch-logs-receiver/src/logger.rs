// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log output for hosts that do not install their own subscriber.
//!
//! Lines are prefixed with `CW_RECEIVER` so they stand apart from the
//! application logs the receiver itself collects:
//!
//! ```text
//! CW_RECEIVER | WARN | Skipping log group for this cycle: ...
//! CW_RECEIVER | DEBUG | cycle{n=3}: Emitted 42 records
//! ```

use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::errors::ConfigError;

const PREFIX: &str = "CW_RECEIVER";

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "{PREFIX} | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter for the receiver's own logs at `log_level`, with noisy HTTP stacks silenced.
pub fn env_filter(log_level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{log_level}"))
        .map_err(|e| ConfigError::Invalid(format!("could not parse log level: {e}")))
}

/// Installs a global subscriber using [`Formatter`].
pub fn init(log_level: &str) -> Result<(), ConfigError> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(log_level)?)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Invalid(format!("setting default subscriber failed: {e}")))?;

    tracing::debug!("Logging subsystem enabled");
    Ok(())
}
