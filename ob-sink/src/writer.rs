//! # Time-Series Sink (L2)
//!
//! A bounded-channel consumer that batches [`Quote`]s and [`WhaleEvent`]s
//! into InfluxDB line-protocol and flushes on whichever of size or time
//! threshold is hit first. Persistence is a correctness boundary: the
//! channel is bounded and callers `send().await` into it, so a full
//! channel naturally slows the producer rather than dropping data.

use crate::error::SinkError;
use crate::line_protocol::{event_to_line, quote_to_line};
use bookwatch_core::config::SinkConfig;
use bookwatch_core::types::{Quote, WhaleEvent};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// One unit of work accepted by the sink: a quote or a whale event.
/// Arrival order is preserved end to end #[derive(Debug, Clone)]
pub enum SinkItem {
    Quote(Quote),
    Event(WhaleEvent),
}

impl From<Quote> for SinkItem {
    fn from(q: Quote) -> Self {
        SinkItem::Quote(q)
    }
}

impl From<WhaleEvent> for SinkItem {
    fn from(e: WhaleEvent) -> Self {
        SinkItem::Event(e)
    }
}

/// Handle returned by [`Sink::start`]. Dropping it does not stop the
/// writer — call [`SinkHandle::stop`] for a clean shutdown that flushes
/// any buffered lines first.
#[derive(Debug)]
pub struct SinkHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl SinkHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            error!(?err, "sink task panicked during shutdown");
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sink {
    config: SinkConfig,
    http: reqwest::Client,
}

impl Sink {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Spawns the batching writer task and returns a handle plus the
    /// bounded sender producers push into.
    pub fn start(self) -> (SinkHandle, mpsc::Sender<SinkItem>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(self.config, self.http, rx, shutdown_rx));
        (SinkHandle { shutdown_tx, task }, tx)
    }
}

async fn run(
    config: SinkConfig,
    http: reqwest::Client,
    mut rx: mpsc::Receiver<SinkItem>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut buffer: Vec<String> = Vec::with_capacity(config.batch_size);
    let mut ticker = tokio::time::interval(config.batch_timeout());
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    while let Ok(item) = rx.try_recv() {
                        buffer.push(encode(&item));
                    }
                    flush(&config, &http, &mut buffer).await;
                    info!("sink drained and shut down");
                    return;
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(&config, &http, &mut buffer).await;
                }
            }
            item = rx.recv() => {
                match item {
                    Some(item) => {
                        buffer.push(encode(&item));
                        if buffer.len() >= config.batch_size {
                            flush(&config, &http, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&config, &http, &mut buffer).await;
                        info!("sink input channel closed, exiting");
                        return;
                    }
                }
            }
        }
    }
}

fn encode(item: &SinkItem) -> String {
    match item {
        SinkItem::Quote(q) => quote_to_line(q),
        SinkItem::Event(e) => event_to_line(e),
    }
}

async fn flush(config: &SinkConfig, http: &reqwest::Client, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let body = buffer.join("\n");
    let url = format!(
        "{}/api/v2/write?org={}&bucket={}&precision=ms",
        config.influxdb_url, config.influxdb_org, config.influxdb_bucket
    );

    let result = http
        .post(&url)
        .header("Authorization", format!("Token {}", config.influxdb_token))
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            buffer.clear();
        }
        Ok(response) => {
            let err = SinkError::Flush {
                url: url.clone(),
                reason: format!("status {}", response.status()),
            };
            warn!(%err, lines = buffer.len(), "dropping batch after rejected write");
            buffer.clear();
        }
        Err(e) => {
            let err = SinkError::Flush {
                url,
                reason: e.to_string(),
            };
            warn!(%err, lines = buffer.len(), "dropping batch after failed write");
            buffer.clear();
        }
    }
}
