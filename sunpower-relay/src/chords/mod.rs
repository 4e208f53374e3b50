//! CHORDS portal delivery
//!
//! The pipeline hands fully-formed ingest URIs to a [`Delivery`]
//! implementation and never talks to the network itself. [`ChordsRelay`]
//! persists submissions in SQLite and drains them from a background task
//! with rate limiting and retry.

pub mod config;
pub mod queue;
pub mod relay;
pub mod uri;

pub use config::DeliveryConfig;
pub use relay::ChordsRelay;
pub use uri::{build_uri, redact};

use anyhow::Result;
use async_trait::async_trait;

/// Queue of ingest URIs drained in the background
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Begin draining; call once before submitting
    fn start(&self) -> Result<()>;

    /// Enqueue one URI, keeping at most `max_queue_length` pending entries
    async fn submit(&self, uri: String, max_queue_length: usize) -> Result<()>;

    /// Submissions not yet delivered
    async fn pending_count(&self) -> Result<usize>;
}
