//! `run`: wires L1 (feed) into C1 (book diff), which fans quotes and
//! events out to L2 (sink) directly and to C2 (detector) through a
//! bounded, drop-oldest handoff queue. Detector alerts are folded back
//! into the same sink stream as ordinary whale events.

use std::sync::Arc;

use bookwatch_book::BookDiffEngine;
use bookwatch_core::config::Config;
use bookwatch_core::types::EventFilters;
use bookwatch_detector::{DetectorInput, DetectorQueue, ManipulationDetector};
use bookwatch_feed::{FeedClient, FeedEvent};
use bookwatch_sink::{Sink, SinkItem};
use tracing::{info, warn};

use crate::error::AppError;

pub async fn run(config: Config) -> Result<(), AppError> {
    let symbols = config.feed.trading_pairs.clone();
    let depth = config.feed.order_book_depth as usize;
    let filters = EventFilters {
        min_volume: config.book.min_volume,
        min_usd: config.book.min_usd,
        max_usd: config.book.max_usd,
        min_distance_pct: config.book.min_distance_pct,
        max_distance_pct: config.book.max_distance_pct,
    };

    let (feed_handle, mut feed_rx) = FeedClient::new(config.feed.clone()).start(symbols);
    let (sink_handle, sink_tx) = Sink::new(config.sink.clone()).start();

    let queue = Arc::new(DetectorQueue::new(config.sink.detector_channel_capacity));
    let detector_task = tokio::spawn(run_detector(
        Arc::clone(&queue),
        ManipulationDetector::new(config.detector.clone()),
        sink_tx.clone(),
    ));

    let mut book = BookDiffEngine::new(depth, filters);

    info!("bookwatch pipeline running; ctrl-c to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            event = feed_rx.recv() => {
                let Some(event) = event else {
                    warn!("feed channel closed, stopping");
                    break;
                };
                handle_feed_event(event, depth, &mut book, &queue, &sink_tx).await;
            }
        }
    }

    feed_handle.stop().await;
    drop(queue);
    detector_task.abort();
    sink_handle.stop().await;
    Ok(())
}

/// Runs C2 on its own task, pulling off the C1->C2 queue so a slow
/// detector pass never backpressures C1. Also owns the lifecycle GC
/// tick, since GC touches the same per-symbol state as event intake.
async fn run_detector(queue: Arc<DetectorQueue>, mut detector: ManipulationDetector, sink_tx: tokio::sync::mpsc::Sender<SinkItem>) {
    let mut gc_ticker = tokio::time::interval(std::time::Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = gc_ticker.tick() => {
                detector.gc(chrono::Utc::now());
            }
            input = queue.pop() => {
                match input {
                    DetectorInput::Event(event) => {
                        let alerts = detector.on_event(&event);
                        send_to_sink(&sink_tx, SinkItem::Event(event)).await;
                        for alert in alerts {
                            send_to_sink(&sink_tx, SinkItem::Event(alert)).await;
                        }
                    }
                    DetectorInput::Snapshot { symbol, timestamp, bids, asks } => {
                        for alert in detector.on_snapshot(&symbol, timestamp, &bids, &asks) {
                            send_to_sink(&sink_tx, SinkItem::Event(alert)).await;
                        }
                    }
                }
            }
        }
    }
}

async fn handle_feed_event(
    event: FeedEvent,
    depth: usize,
    book: &mut BookDiffEngine,
    queue: &DetectorQueue,
    sink_tx: &tokio::sync::mpsc::Sender<SinkItem>,
) {
    match event {
        FeedEvent::Bootstrap { symbol, snapshot } => {
            book.bootstrap(symbol, snapshot);
        }
        FeedEvent::Depth { symbol, data } => {
            let out = book.on_depth(symbol.clone(), data);
            if let Some(quote) = out.quote {
                send_to_sink(sink_tx, SinkItem::Quote(quote)).await;
            }
            for event in out.events {
                queue.push(DetectorInput::Event(event.clone()));
                send_to_sink(sink_tx, SinkItem::Event(event)).await;
            }
            if let Some(state) = book.book(&symbol) {
                let bids = state.visible_bids(depth);
                let asks = state.visible_asks(depth);
                queue.push(DetectorInput::Snapshot {
                    symbol,
                    timestamp: chrono::Utc::now(),
                    bids,
                    asks,
                });
            }
        }
        FeedEvent::Trade { symbol, trade } => {
            if let Some(event) = book.on_trade(symbol, trade) {
                queue.push(DetectorInput::Event(event.clone()));
                send_to_sink(sink_tx, SinkItem::Event(event)).await;
            }
        }
    }
}

/// Sends one item to the sink's bounded channel, warning if the sender
/// has to wait for room (the channel is near its `channel_capacity`
/// ceiling) and on an outright send failure (writer task gone).
async fn send_to_sink(sink_tx: &tokio::sync::mpsc::Sender<SinkItem>, item: SinkItem) {
    if sink_tx.capacity() == 0 {
        warn!("sink channel full, waiting to enqueue");
    }
    if sink_tx.send(item).await.is_err() {
        warn!("sink channel closed, dropping item");
    }
}
