//! # Exchange Feed Client (L1)
//!
//! Maintains a resilient duplex connection to the depth and trade
//! streams for a configured set of symbols, keeps the connection alive
//! with application-level pings, tracks connection health and
//! bootstraps each symbol via an initial REST snapshot before the first
//! depth message is forwarded.

use crate::{
    error::FeedError,
    protocol::{
        parse_inbound, InboundMessage, Ping, RestDepthResponse, SubscribeDepth, SubscribeTrade,
    },
};
use bookwatch_core::config::FeedConfig;
use futures_util::{SinkExt, StreamExt};
use smol_str::SmolStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

pub use crate::protocol::{DepthPushData, RawTrade, RestDepthData};

/// One item handed to the Book Diff Engine (C1). Strict arrival order
/// per symbol is preserved; ordering across symbols is not guaranteed
/// and does not need to be (C1 processes each symbol independently).
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Bootstrap {
        symbol: SmolStr,
        snapshot: RestDepthData,
    },
    Depth {
        symbol: SmolStr,
        data: DepthPushData,
    },
    Trade {
        symbol: SmolStr,
        trade: RawTrade,
    },
}

/// Handle returned by [`FeedClient::start`]. Dropping it does not stop
/// the feed — call [`FeedHandle::stop`] for a clean, draining shutdown.
#[derive(Debug)]
pub struct FeedHandle {
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl FeedHandle {
    /// Scoped shutdown: signals the run loop, then waits for it to drain
    /// in-flight messages and close the transport. Guarantees no further
    /// events are sent on the returned channel after this resolves.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            error!(?err, "feed task panicked during shutdown");
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedClient {
    config: FeedConfig,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    /// Establishes the duplex connection, subscribes to depth (full
    /// refresh, limit = `config.order_book_depth`) and trades for every
    /// symbol, bootstraps each via REST, then forwards messages in
    /// strict per-symbol arrival order until [`FeedHandle::stop`] is
    /// called or the backoff ceiling is exceeded.
    pub fn start(self, symbols: Vec<String>) -> (FeedHandle, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let task = tokio::spawn(run(self.config, symbols, event_tx, shutdown_rx));

        (FeedHandle { shutdown_tx, task }, event_rx)
    }
}

async fn run(
    config: FeedConfig,
    symbols: Vec<String>,
    event_tx: mpsc::Sender<FeedEvent>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    let http = reqwest::Client::new();
    let mut backoff = BackoffPolicy::new(&config);

    loop {
        if *shutdown_rx.borrow() {
            info!("feed shutdown requested before (re)connect");
            return;
        }

        match connect_and_run(&config, &symbols, &http, &event_tx, &mut shutdown_rx).await {
            Ok(()) => {
                info!("feed run loop exited cleanly");
                return;
            }
            Err(FeedError::FeedUnavailable(ceiling)) => {
                error!(?ceiling, "feed unavailable: backoff ceiling exceeded, giving up");
                return;
            }
            Err(err) => {
                warn!(%err, "feed connection lost, reconnecting");
                let delay = backoff.next_delay();
                match delay {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => {
                        error!("backoff ceiling exceeded, stopping feed");
                        return;
                    }
                }
            }
        }
    }
}

/// One connection attempt: open transport, subscribe, bootstrap via
/// REST, then forward messages until the socket fails or shutdown is
/// requested. Returns `Ok(())` only on a clean, requested shutdown.
async fn connect_and_run(
    config: &FeedConfig,
    symbols: &[String],
    http: &reqwest::Client,
    event_tx: &mpsc::Sender<FeedEvent>,
    shutdown_rx: &mut tokio::sync::watch::Receiver<bool>,
) -> Result<(), FeedError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(&config.ws_url)
        .await
        .map_err(|e| FeedError::Transport(e.to_string()))?;
    info!(url = %config.ws_url, "connected to exchange feed");

    let (mut write, mut read) = ws_stream.split();

    for symbol in symbols {
        let depth_sub = SubscribeDepth::new(symbol.clone(), config.order_book_depth);
        send_json(&mut write, &depth_sub).await?;
        let trade_sub = SubscribeTrade::new(symbol.clone());
        send_json(&mut write, &trade_sub).await?;
    }

    for symbol in symbols {
        match bootstrap_symbol(http, &config.rest_url, symbol).await {
            Ok(snapshot) => {
                if event_tx
                    .send(FeedEvent::Bootstrap {
                        symbol: SmolStr::new(symbol),
                        snapshot,
                    })
                    .await
                    .is_err()
                {
                    return Ok(()); // receiver gone, nothing left to do
                }
            }
            Err(err) => {
                // Bootstrap failure: proceed with empty state, warn.
                // The first depth message seeds the book instead.
                warn!(%symbol, %err, "bootstrap failed, proceeding with empty state");
            }
        }
    }

    // MEXC-style single-symbol depth pushes omit the symbol field; when
    // exactly one symbol is configured we can safely fill it in.
    let fallback_symbol = (symbols.len() == 1).then(|| symbols[0].clone());

    let ping_interval = config.ping_interval();
    let mut ping_ticker = tokio::time::interval(ping_interval);
    ping_ticker.tick().await; // consume the immediate first tick
    let mut missed_pongs: u32 = 0;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    info!("draining in-flight messages before shutdown");
                    let _ = write.close().await;
                    return Ok(());
                }
            }
            _ = ping_ticker.tick() => {
                if awaiting_pong {
                    missed_pongs += 1;
                    if missed_pongs >= config.ping_miss_threshold {
                        return Err(FeedError::Transport("ping miss threshold exceeded".into()));
                    }
                }
                send_json(&mut write, &Ping::default()).await?;
                awaiting_pong = true;
                debug!("sent application-level ping");
            }
            frame = read.next() => {
                let Some(frame) = frame else {
                    return Err(FeedError::Transport("stream closed by peer".into()));
                };
                let frame = frame.map_err(|e| FeedError::Transport(e.to_string()))?;
                match frame {
                    WsMessage::Text(text) => {
                        match parse_inbound(&text, fallback_symbol.as_deref()) {
                            Ok(InboundMessage::Depth { symbol, data }) => {
                                if event_tx
                                    .send(FeedEvent::Depth { symbol: SmolStr::new(symbol), data })
                                    .await
                                    .is_err()
                                {
                                    return Ok(());
                                }
                            }
                            Ok(InboundMessage::Trade { symbol, trades }) => {
                                for trade in trades {
                                    if event_tx
                                        .send(FeedEvent::Trade { symbol: SmolStr::new(symbol.clone()), trade })
                                        .await
                                        .is_err()
                                    {
                                        return Ok(());
                                    }
                                }
                            }
                            Ok(InboundMessage::Pong) => {
                                awaiting_pong = false;
                                missed_pongs = 0;
                                debug!("received pong");
                            }
                            Ok(InboundMessage::Ack | InboundMessage::Other) => {}
                            Err(err) => {
                                // Malformed JSON: drop the message, increment parse-error counter.
                                warn!(%err, "dropping malformed message");
                            }
                        }
                    }
                    WsMessage::Close(frame) => {
                        return Err(FeedError::Transport(format!("peer closed: {frame:?}")));
                    }
                    WsMessage::Ping(payload) => {
                        let _ = write.send(WsMessage::Pong(payload)).await;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_json<S, T>(write: &mut S, value: &T) -> Result<(), FeedError>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    T: serde::Serialize,
{
    let payload = serde_json::to_string(value).map_err(|e| FeedError::Parse(e.to_string()))?;
    write
        .send(WsMessage::Text(payload.into()))
        .await
        .map_err(|_| FeedError::Transport("failed to write subscribe/ping frame".into()))
}

async fn bootstrap_symbol(
    http: &reqwest::Client,
    rest_url: &str,
    symbol: &str,
) -> Result<RestDepthData, FeedError> {
    let url = format!("{rest_url}/api/v1/contract/depth/{symbol}");
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| FeedError::Bootstrap {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;

    let parsed: RestDepthResponse = response.json().await.map_err(|e| FeedError::Bootstrap {
        symbol: symbol.to_string(),
        reason: e.to_string(),
    })?;

    if !parsed.success {
        return Err(FeedError::Bootstrap {
            symbol: symbol.to_string(),
            reason: "exchange reported success=false".into(),
        });
    }

    parsed.data.ok_or_else(|| FeedError::Bootstrap {
        symbol: symbol.to_string(),
        reason: "missing data field".into(),
    })
}

/// Exponential backoff: starts at `backoff_initial_secs`, doubles up to
/// `backoff_max_secs`, and reports exhaustion once the cumulative elapsed
/// time exceeds `backoff_ceiling_secs`.
#[derive(Debug)]
struct BackoffPolicy {
    current: Duration,
    max: Duration,
    ceiling: Duration,
    elapsed: Duration,
}

impl BackoffPolicy {
    fn new(config: &FeedConfig) -> Self {
        Self {
            current: Duration::from_secs(config.backoff_initial_secs),
            max: Duration::from_secs(config.backoff_max_secs),
            ceiling: Duration::from_secs(config.backoff_ceiling_secs),
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the delay to sleep before the next reconnect attempt, or
    /// `None` once the cumulative elapsed backoff exceeds the ceiling.
    fn next_delay(&mut self) -> Option<Duration> {
        self.elapsed += self.current;
        if self.elapsed > self.ceiling {
            return None;
        }
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwatch_core::config::FeedConfig;

    fn config() -> FeedConfig {
        FeedConfig {
            trading_pairs: vec!["BTC_USDT".into()],
            order_book_depth: 20,
            ws_url: "wss://example.invalid/ws".into(),
            rest_url: "https://example.invalid".into(),
            ping_interval_secs: 15,
            ping_miss_threshold: 2,
            backoff_initial_secs: 5,
            backoff_max_secs: 60,
            backoff_ceiling_secs: 130,
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let config = config();
        let mut backoff = BackoffPolicy::new(&config);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(10)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(20)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(40)));
        // cumulative elapsed now 75s; current delay capped would be 60s but
        // cumulative elapsed (75 + 60 = 135) exceeds the 130s ceiling.
        assert_eq!(backoff.next_delay(), None);
    }
}
