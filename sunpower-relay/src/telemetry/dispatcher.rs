//! Hand telemetry records to the delivery queue

use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;
use tokio::time::sleep;

use super::record::TelemetryRecord;
use crate::chords::{Delivery, build_uri, redact};

/// Roughly one month of one-per-second submissions
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 31 * 24 * 60 * 60;

/// Pause after each submission
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Bound passed to the queue on every submission
    pub max_queue_length: usize,
    pub throttle: Duration,
    /// Flag measurements as test data on the portal
    pub test: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            throttle: DEFAULT_THROTTLE,
            test: false,
        }
    }
}

/// Serializes records into ingest URIs and submits them, throttled
pub struct TelemetryDispatcher<'a> {
    delivery: &'a dyn Delivery,
    options: DispatchOptions,
}

impl<'a> TelemetryDispatcher<'a> {
    pub fn new(delivery: &'a dyn Delivery, options: DispatchOptions) -> Self {
        Self { delivery, options }
    }

    /// Submit one record; returns the URI that was queued
    pub async fn dispatch(&self, record: &TelemetryRecord) -> Result<String> {
        let uri = build_uri(&record.host, record, self.options.test);
        debug!("Submitting {}", redact(&uri));

        self.delivery
            .submit(uri.clone(), self.options.max_queue_length)
            .await
            .context("Failed to submit record to delivery queue")?;

        if !self.options.throttle.is_zero() {
            sleep(self.options.throttle).await;
        }

        Ok(uri)
    }
}
