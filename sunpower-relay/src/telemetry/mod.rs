//! Telemetry records and their submission
//!
//! Rows become [`TelemetryRecord`]s through the configured variable bindings;
//! the dispatcher turns each record into a CHORDS ingest URI and queues it.

pub mod dispatcher;
pub mod record;

pub use dispatcher::{DispatchOptions, TelemetryDispatcher};
pub use record::{AT_KEY, TelemetryRecord, map_records};
