//! Background relay draining the persistent queue to the CHORDS portal

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};
use sqlx::SqlitePool;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::config::DeliveryConfig;
use super::queue;
use super::uri::redact;
use super::Delivery;

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
enum SendOutcome {
    Delivered,
    /// Transient failure; try again later
    Retry(String),
    /// The portal refused the measurement; retrying will not help
    Rejected(String),
}

/// SQLite-backed queue with a background HTTP sender
pub struct ChordsRelay {
    pool: SqlitePool,
    client: Client,
    config: DeliveryConfig,
    sender: Mutex<Option<JoinHandle<()>>>,
}

impl ChordsRelay {
    /// Open the queue database configured in `config`
    pub async fn open(config: &DeliveryConfig) -> Result<Self> {
        let path = config.resolve_queue_path()?;
        let pool = queue::connect(&path).await?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let relay = Self::from_parts(pool, client, config.clone());
        let left_over = relay.pending_count().await?;
        if left_over > 0 {
            info!(
                "Delivery queue {} holds {} submissions from a previous run",
                path.display(),
                left_over
            );
        }

        Ok(relay)
    }

    pub(crate) fn from_parts(pool: SqlitePool, client: Client, config: DeliveryConfig) -> Self {
        Self {
            pool,
            client,
            config,
            sender: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Delivery for ChordsRelay {
    fn start(&self) -> Result<()> {
        let mut sender = self
            .sender
            .lock()
            .map_err(|_| anyhow!("Relay sender lock poisoned"))?;

        if sender.is_some() {
            warn!("Relay sender already started");
            return Ok(());
        }

        let pool = self.pool.clone();
        let client = self.client.clone();
        let config = self.config.clone();
        *sender = Some(tokio::spawn(run_sender(pool, client, config)));

        debug!("Relay sender started");
        Ok(())
    }

    async fn submit(&self, uri: String, max_queue_length: usize) -> Result<()> {
        queue::enqueue(&self.pool, &uri).await?;

        let evicted = queue::evict_oldest(&self.pool, max_queue_length).await?;
        if evicted > 0 {
            warn!(
                "Delivery queue over {} entries; dropped {} oldest",
                max_queue_length, evicted
            );
        }

        Ok(())
    }

    async fn pending_count(&self) -> Result<usize> {
        queue::pending_count(&self.pool).await
    }
}

impl Drop for ChordsRelay {
    fn drop(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            if let Some(handle) = sender.take() {
                handle.abort();
            }
        }
    }
}

/// Send queued URIs oldest first, forever
async fn run_sender(pool: SqlitePool, client: Client, config: DeliveryConfig) {
    let send_interval = config.send_interval();

    loop {
        let next = match queue::next_pending(&pool).await {
            Ok(next) => next,
            Err(e) => {
                error!("{:#}", e);
                sleep(config.poll_interval()).await;
                continue;
            }
        };

        let Some(item) = next else {
            sleep(config.poll_interval()).await;
            continue;
        };

        match send_once(&client, &item.uri).await {
            SendOutcome::Delivered => {
                debug!("Delivered {}", redact(&item.uri));
                if let Err(e) = queue::remove(&pool, item.id).await {
                    error!("{:#}", e);
                }
            }
            SendOutcome::Rejected(reason) => {
                error!("CHORDS rejected {}: {}", redact(&item.uri), reason);
                if let Err(e) = queue::remove(&pool, item.id).await {
                    error!("{:#}", e);
                }
            }
            SendOutcome::Retry(reason) => {
                let attempts = match queue::record_failure(&pool, item.id, &reason).await {
                    Ok(attempts) => attempts,
                    Err(e) => {
                        error!("{:#}", e);
                        item.attempts + 1
                    }
                };
                let attempts = u32::try_from(attempts).unwrap_or(u32::MAX);

                if config.retry.exhausted(attempts) {
                    error!(
                        "Giving up on {} after {} attempts: {}",
                        redact(&item.uri),
                        attempts,
                        reason
                    );
                    if let Err(e) = queue::remove(&pool, item.id).await {
                        error!("{:#}", e);
                    }
                } else {
                    let delay = config.retry.delay_for_attempt(attempts);
                    warn!(
                        "Delivery attempt {} failed ({}); retrying in {:?}",
                        attempts, reason, delay
                    );
                    sleep(delay).await;
                }
            }
        }

        if !send_interval.is_zero() {
            sleep(send_interval).await;
        }
    }
}

async fn send_once(client: &Client, uri: &str) -> SendOutcome {
    match client.get(uri).send().await {
        Ok(response) => classify_status(response.status()),
        Err(e) => SendOutcome::Retry(e.to_string()),
    }
}

fn classify_status(status: StatusCode) -> SendOutcome {
    if status.is_success() {
        SendOutcome::Delivered
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        SendOutcome::Retry(format!("HTTP {}", status))
    } else {
        SendOutcome::Rejected(format!("HTTP {}", status))
    }
}
