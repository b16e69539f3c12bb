//! The C1->C2 handoff queue. C1 must never block on the detector, so
//! this is not a `tokio::sync::mpsc` channel (whose bounded sender
//! backpressures on a full buffer, matching `ob_sink::writer`'s
//! intentionally blocking channel instead): once `capacity` queued
//! inputs are waiting, a push drops the oldest one to make room.

use std::collections::VecDeque;
use std::sync::Mutex;

use bookwatch_core::types::{PriceLevel, WhaleEvent};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use tokio::sync::Notify;
use tracing::warn;

use crate::error::DetectorError;

/// One unit of work handed from C1 to C2: either a single diff/trade
/// event or a periodic snapshot of the visible book for the layering
/// scan.
#[derive(Debug, Clone)]
pub enum DetectorInput {
    Event(WhaleEvent),
    Snapshot {
        symbol: SmolStr,
        timestamp: DateTime<Utc>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    },
}

#[derive(Debug)]
pub struct DetectorQueue {
    capacity: usize,
    inner: Mutex<VecDeque<DetectorInput>>,
    notify: Notify,
}

impl DetectorQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Enqueues `input`. Never blocks and never fails: once full, the
    /// oldest queued input is dropped and logged via
    /// [`DetectorError::DetectorOverflow`].
    pub fn push(&self, input: DetectorInput) {
        let dropped = {
            let mut queue = self.inner.lock().expect("detector queue mutex poisoned");
            let dropped = queue.len() >= self.capacity;
            if dropped {
                queue.pop_front();
            }
            queue.push_back(input);
            dropped
        };
        self.notify.notify_one();
        if dropped {
            let err = DetectorError::DetectorOverflow { capacity: self.capacity };
            warn!(%err);
        }
    }

    /// Waits for and removes the oldest queued input.
    pub async fn pop(&self) -> DetectorInput {
        loop {
            if let Some(input) = self.inner.lock().expect("detector queue mutex poisoned").pop_front() {
                return input;
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwatch_core::types::{EventSide, EventType};
    use rust_decimal::Decimal;

    fn event(price: Decimal) -> WhaleEvent {
        WhaleEvent {
            symbol: SmolStr::new("BTC_USDT"),
            timestamp: Utc::now(),
            event_type: EventType::NewBid,
            side: EventSide::Bid,
            price,
            volume: Decimal::ONE,
            usd_value: price,
            distance_from_mid_pct: Decimal::ZERO,
            level: 1,
            order_count: 1,
            mid_price: price,
            best_bid: price,
            best_ask: price,
            spread: Decimal::ZERO,
            info: String::new(),
        }
    }

    #[tokio::test]
    async fn overflow_drops_oldest_not_newest() {
        let queue = DetectorQueue::new(2);
        queue.push(DetectorInput::Event(event(Decimal::ONE)));
        queue.push(DetectorInput::Event(event(Decimal::TWO)));
        queue.push(DetectorInput::Event(event(Decimal::from(3))));

        let DetectorInput::Event(first) = queue.pop().await else { panic!("expected event") };
        assert_eq!(first.price, Decimal::TWO);
        let DetectorInput::Event(second) = queue.pop().await else { panic!("expected event") };
        assert_eq!(second.price, Decimal::from(3));
    }

    #[tokio::test]
    async fn pop_waits_for_a_push() {
        let queue = DetectorQueue::new(4);
        queue.push(DetectorInput::Event(event(Decimal::ONE)));
        let DetectorInput::Event(got) = queue.pop().await else { panic!("expected event") };
        assert_eq!(got.price, Decimal::ONE);
    }
}
