//! The manipulation detector itself (C2): consumes C1's event stream and
//! periodic book snapshots, maintains a windowed lifecycle table per
//! symbol, and produces advisory pattern events plus a bounded
//! per-symbol indicator score.

use crate::layering::{self, LayeringFinding};
use crate::lifecycle::{LifecycleStatus, OrderLifecycle};
use bookwatch_core::config::DetectorConfig;
use bookwatch_core::types::{EventSide, EventType, PriceLevel, WhaleEvent};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::VecDeque;
use tracing::debug;

/// Weighted sub-scores, each clamped to `[0, 100]`, and their composite.
/// Weights cancellation 0.25, flash-order 0.20, layering
/// 0.25, order-rate 0.15, phantom-liquidity 0.15.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorIndicators {
    pub cancellation_rate: Decimal,
    pub flash_order_rate: Decimal,
    pub layering_score: Decimal,
    pub order_rate: Decimal,
    pub phantom_liquidity_ratio: Decimal,
    pub composite: Decimal,
}

#[derive(Debug, Default)]
struct SymbolState {
    lifecycles: Vec<OrderLifecycle>,
    recent_activity: VecDeque<DateTime<Utc>>,
    stuffing_active: bool,
    total_opens: u64,
    total_cancels: u64,
    total_fills: u64,
    total_flash_orders: u64,
    last_layering_score: Decimal,
}

#[derive(Debug)]
pub struct ManipulationDetector {
    config: DetectorConfig,
    symbols: FnvHashMap<SmolStr, SymbolState>,
}

fn clamp_pct(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::from(100))
}

/// Count of recently closed, low-fill lifecycles on `side` — orders that
/// rested then vanished without trading down, the lifecycle-level
/// evidence a layering wall isn't real resting interest.
fn phantom_lifecycle_count(lifecycles: &[OrderLifecycle], side: EventSide) -> u64 {
    lifecycles
        .iter()
        .filter(|lc| lc.side == side && lc.status == LifecycleStatus::Cancelled)
        .count() as u64
}

impl ManipulationDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            symbols: FnvHashMap::default(),
        }
    }

    /// Feeds one C1 event in, returning any advisory pattern events it
    /// triggers (flash order, quote stuffing). Never fails: the detector
    /// must never block or backpressure C1.
    pub fn on_event(&mut self, event: &WhaleEvent) -> Vec<WhaleEvent> {
        let state = self.symbols.entry(event.symbol.clone()).or_default();
        let mut alerts = Vec::new();

        match event.event_type {
            EventType::NewBid | EventType::NewAsk => {
                if event.usd_value >= self.config.whale_threshold_usd {
                    state.lifecycles.push(OrderLifecycle::open(
                        event.symbol.clone(),
                        event.side,
                        event.price,
                        event.volume,
                        event.usd_value,
                        event.timestamp,
                    ));
                    state.total_opens += 1;
                }
                track_activity(&mut state.recent_activity, event.timestamp);
            }
            EventType::Decrease => {
                if let Some(lc) = find_open(&mut state.lifecycles, event.side, event.price) {
                    lc.record_decrease(event.volume, event.timestamp);
                }
            }
            EventType::LeftTop => {
                track_activity(&mut state.recent_activity, event.timestamp);
                if let Some(lc) = find_open(&mut state.lifecycles, event.side, event.price) {
                    let is_flash = lc.is_flash(event.timestamp, self.config.flash_order_threshold_chrono());
                    lc.close(event.timestamp);
                    if lc.status == LifecycleStatus::Cancelled {
                        state.total_cancels += 1;
                    }
                    if is_flash {
                        state.total_flash_orders += 1;
                        alerts.push(pattern_event(
                            event,
                            EventType::FlashOrder,
                            event.side,
                            format!("lifetime_ms={}", (event.timestamp - lc.first_seen).num_milliseconds()),
                        ));
                    }
                }
            }
            EventType::MarketBuy | EventType::MarketSell => {
                state.total_fills += 1;
            }
            _ => {}
        }

        if let Some(alert) = self.check_quote_stuffing(&event.symbol, event.timestamp) {
            alerts.push(alert);
        }

        alerts
    }

    fn check_quote_stuffing(&mut self, symbol: &SmolStr, now: DateTime<Utc>) -> Option<WhaleEvent> {
        let state = self.symbols.get_mut(symbol)?;
        let count = state.recent_activity.len() as u32;
        let over_threshold = count > self.config.quote_stuffing_rate;

        if over_threshold && !state.stuffing_active {
            state.stuffing_active = true;
            return Some(WhaleEvent {
                symbol: symbol.clone(),
                timestamp: now,
                event_type: EventType::QuoteStuffing,
                side: EventSide::Bid,
                price: Decimal::ZERO,
                volume: Decimal::ZERO,
                usd_value: Decimal::ZERO,
                distance_from_mid_pct: Decimal::ZERO,
                level: 0,
                order_count: count as u64,
                mid_price: Decimal::ZERO,
                best_bid: Decimal::ZERO,
                best_ask: Decimal::ZERO,
                spread: Decimal::ZERO,
                info: format!("rate={count}/s"),
            });
        }
        if !over_threshold {
            state.stuffing_active = false;
        }
        None
    }

    /// Runs the layering scan against the current visible levels of one
    /// full book snapshot. A finding whose side also carries enough
    /// closed, low-fill lifecycle evidence (see
    /// [`phantom_lifecycle_count`]) is promoted to an additional
    /// `spoof_candidate` event alongside the plain `layering` one.
    pub fn on_snapshot(
        &mut self,
        symbol: &SmolStr,
        timestamp: DateTime<Utc>,
        visible_bids: &[PriceLevel],
        visible_asks: &[PriceLevel],
    ) -> Vec<WhaleEvent> {
        let mut findings: Vec<LayeringFinding> = Vec::new();
        if let Some(f) = layering::detect(
            EventSide::Bid,
            visible_bids,
            self.config.layering_threshold,
            self.config.layering_min_levels,
            self.config.layering_allow_gap,
        ) {
            findings.push(f);
        }
        if let Some(f) = layering::detect(
            EventSide::Ask,
            visible_asks,
            self.config.layering_threshold,
            self.config.layering_min_levels,
            self.config.layering_allow_gap,
        ) {
            findings.push(f);
        }

        let state = self.symbols.entry(symbol.clone()).or_default();
        state.last_layering_score = if findings.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(100)
        };

        let mut events = Vec::new();
        for finding in findings {
            let evidence = phantom_lifecycle_count(&state.lifecycles, finding.side);
            if evidence >= self.config.spoof_lifecycle_evidence_min {
                events.push(WhaleEvent {
                    symbol: symbol.clone(),
                    timestamp,
                    event_type: EventType::SpoofCandidate,
                    side: finding.side,
                    price: finding.levels[0].price,
                    volume: finding.levels.iter().map(|l| l.volume).sum(),
                    usd_value: finding.levels.iter().map(|l| l.usd_value).sum(),
                    distance_from_mid_pct: Decimal::ZERO,
                    level: finding.levels.len() as u32,
                    order_count: 0,
                    mid_price: Decimal::ZERO,
                    best_bid: Decimal::ZERO,
                    best_ask: Decimal::ZERO,
                    spread: Decimal::ZERO,
                    info: format!("{}; {evidence} phantom lifecycle(s)", finding.describe()),
                });
            }
            events.push(WhaleEvent {
                symbol: symbol.clone(),
                timestamp,
                event_type: EventType::Layering,
                side: finding.side,
                price: finding.levels[0].price,
                volume: finding.levels.iter().map(|l| l.volume).sum(),
                usd_value: finding.levels.iter().map(|l| l.usd_value).sum(),
                distance_from_mid_pct: Decimal::ZERO,
                level: finding.levels.len() as u32,
                order_count: 0,
                mid_price: Decimal::ZERO,
                best_bid: Decimal::ZERO,
                best_ask: Decimal::ZERO,
                spread: Decimal::ZERO,
                info: finding.describe(),
            });
        }
        events
    }

    /// Drops lifecycle records older than `lifecycle_horizon`. Expired
    /// records that never closed contribute to `total_cancels` before
    /// being dropped.
    pub fn gc(&mut self, now: DateTime<Utc>) {
        let horizon = self.config.lifecycle_horizon();
        for state in self.symbols.values_mut() {
            let before = state.lifecycles.len();
            state.lifecycles.retain(|lc| {
                let age = now.signed_duration_since(lc.first_seen);
                let expired = age > ChronoDuration::from_std(horizon).unwrap_or(ChronoDuration::MAX);
                if expired && lc.is_open() {
                    state.total_cancels += 1;
                }
                !expired
            });
            let dropped = before - state.lifecycles.len();
            if dropped > 0 {
                debug!(dropped, "garbage-collected stale order lifecycles");
            }

            while state
                .recent_activity
                .front()
                .is_some_and(|ts| now.signed_duration_since(*ts) > ChronoDuration::seconds(1))
            {
                state.recent_activity.pop_front();
            }
        }
    }

    /// Produces the bounded composite score described in
    /// [`DetectorIndicators`]'s weights. Returns `None` if the symbol
    /// has never been observed.
    pub fn compute_indicators(&self, symbol: &str) -> Option<DetectorIndicators> {
        let state = self.symbols.get(symbol)?;

        let cancellation_rate = if state.total_opens > 0 {
            clamp_pct(Decimal::from(state.total_cancels) / Decimal::from(state.total_opens) * Decimal::from(100))
        } else {
            Decimal::ZERO
        };
        let flash_order_rate = if state.total_opens > 0 {
            clamp_pct(Decimal::from(state.total_flash_orders) / Decimal::from(state.total_opens) * Decimal::from(100))
        } else {
            Decimal::ZERO
        };
        let layering_score = clamp_pct(state.last_layering_score);
        let order_rate = clamp_pct(Decimal::from(state.recent_activity.len() as u64) * Decimal::from(10));
        let phantom_liquidity_ratio = if state.total_fills > 0 {
            clamp_pct(Decimal::from(state.total_cancels) / Decimal::from(state.total_fills) * Decimal::from(100))
        } else if state.total_cancels > 0 {
            Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        let composite = clamp_pct(
            cancellation_rate * Decimal::new(25, 2)
                + flash_order_rate * Decimal::new(20, 2)
                + layering_score * Decimal::new(25, 2)
                + order_rate * Decimal::new(15, 2)
                + phantom_liquidity_ratio * Decimal::new(15, 2),
        );

        Some(DetectorIndicators {
            cancellation_rate,
            flash_order_rate,
            layering_score,
            order_rate,
            phantom_liquidity_ratio,
            composite,
        })
    }
}

fn track_activity(activity: &mut VecDeque<DateTime<Utc>>, at: DateTime<Utc>) {
    activity.push_back(at);
    while activity
        .front()
        .is_some_and(|ts| at.signed_duration_since(*ts) > ChronoDuration::seconds(1))
    {
        activity.pop_front();
    }
}

fn find_open(lifecycles: &mut [OrderLifecycle], side: EventSide, price: Decimal) -> Option<&mut OrderLifecycle> {
    lifecycles
        .iter_mut()
        .rev()
        .find(|lc| lc.is_open() && lc.side == side && lc.price == price)
}

fn pattern_event(source: &WhaleEvent, event_type: EventType, side: EventSide, info: String) -> WhaleEvent {
    WhaleEvent {
        symbol: source.symbol.clone(),
        timestamp: source.timestamp,
        event_type,
        side,
        price: source.price,
        volume: source.volume,
        usd_value: source.usd_value,
        distance_from_mid_pct: source.distance_from_mid_pct,
        level: source.level,
        order_count: source.order_count,
        mid_price: source.mid_price,
        best_bid: source.best_bid,
        best_ask: source.best_ask,
        spread: source.spread,
        info,
    }
}

trait DetectorConfigExt {
    fn flash_order_threshold_chrono(&self) -> ChronoDuration;
}

impl DetectorConfigExt for DetectorConfig {
    fn flash_order_threshold_chrono(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.flash_order_threshold()).unwrap_or(ChronoDuration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> DetectorConfig {
        DetectorConfig {
            flash_order_threshold_ms: 10_000,
            layering_min_levels: 2,
            layering_threshold: dec!(30000),
            layering_allow_gap: 1,
            quote_stuffing_rate: 10,
            lifecycle_horizon_secs: 3600,
            whale_threshold_usd: dec!(100000),
            spoof_lifecycle_evidence_min: 2,
        }
    }

    fn event(event_type: EventType, side: EventSide, price: Decimal, volume: Decimal, at: DateTime<Utc>) -> WhaleEvent {
        WhaleEvent {
            symbol: SmolStr::new("BTC_USDT"),
            timestamp: at,
            event_type,
            side,
            price,
            volume,
            usd_value: price * volume,
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

    #[test]
    fn flash_order_detected_on_quick_left_top_with_negligible_fill() {
        let mut detector = ManipulationDetector::new(config());
        let t0 = Utc::now();
        let opened = event(EventType::NewBid, EventSide::Bid, dec!(100), dec!(2000), t0);
        assert!(detector.on_event(&opened).is_empty());

        let closed = event(EventType::LeftTop, EventSide::Bid, dec!(100), dec!(2000), t0 + ChronoDuration::seconds(3));
        let alerts = detector.on_event(&closed);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event_type, EventType::FlashOrder);
    }

    #[test]
    fn no_flash_order_when_mostly_filled() {
        let mut detector = ManipulationDetector::new(config());
        let t0 = Utc::now();
        let opened = event(EventType::NewBid, EventSide::Bid, dec!(100), dec!(2000), t0);
        detector.on_event(&opened);

        let dec_event = event(EventType::Decrease, EventSide::Bid, dec!(100), dec!(1800), t0 + ChronoDuration::seconds(1));
        detector.on_event(&dec_event);

        let closed = event(EventType::LeftTop, EventSide::Bid, dec!(100), dec!(200), t0 + ChronoDuration::seconds(2));
        let alerts = detector.on_event(&closed);
        assert!(alerts.is_empty());
    }

    #[test]
    fn quote_stuffing_triggers_once_per_window() {
        let mut detector = ManipulationDetector::new(config());
        let t0 = Utc::now();
        let mut total_alerts = 0;
        for i in 0..15 {
            let e = event(EventType::NewBid, EventSide::Bid, dec!(1), dec!(1), t0 + ChronoDuration::milliseconds(i * 10));
            total_alerts += detector
                .on_event(&e)
                .iter()
                .filter(|a| a.event_type == EventType::QuoteStuffing)
                .count();
        }
        assert_eq!(total_alerts, 1);
    }

    #[test]
    fn layering_detected_from_snapshot() {
        let mut detector = ManipulationDetector::new(config());
        let bids = vec![
            PriceLevel::new(dec!(100), dec!(1000), 1).unwrap(),
            PriceLevel::new(dec!(99), dec!(1000), 1).unwrap(),
        ];
        let asks = vec![];
        let symbol = SmolStr::new("BTC_USDT");
        let events = detector.on_snapshot(&symbol, Utc::now(), &bids, &asks);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Layering);

        let indicators = detector.compute_indicators("BTC_USDT").unwrap();
        assert_eq!(indicators.layering_score, dec!(100));
    }

    #[test]
    fn spoof_candidate_promoted_when_layering_meets_phantom_lifecycle_evidence() {
        let mut detector = ManipulationDetector::new(config());
        let symbol = SmolStr::new("BTC_USDT");
        let t0 = Utc::now();

        for i in 0..2 {
            let price = Decimal::from(100 + i);
            let opened = event(EventType::NewBid, EventSide::Bid, price, dec!(5000), t0);
            detector.on_event(&opened);
            let closed = event(EventType::LeftTop, EventSide::Bid, price, dec!(5000), t0 + ChronoDuration::seconds(1));
            detector.on_event(&closed);
        }

        let bids = vec![
            PriceLevel::new(dec!(100), dec!(1000), 1).unwrap(),
            PriceLevel::new(dec!(99), dec!(1000), 1).unwrap(),
        ];
        let events = detector.on_snapshot(&symbol, t0 + ChronoDuration::seconds(2), &bids, &[]);
        assert!(events.iter().any(|e| e.event_type == EventType::SpoofCandidate));
        assert!(events.iter().any(|e| e.event_type == EventType::Layering));
    }

    #[test]
    fn layering_without_lifecycle_evidence_stays_plain() {
        let mut detector = ManipulationDetector::new(config());
        let bids = vec![
            PriceLevel::new(dec!(100), dec!(1000), 1).unwrap(),
            PriceLevel::new(dec!(99), dec!(1000), 1).unwrap(),
        ];
        let symbol = SmolStr::new("BTC_USDT");
        let events = detector.on_snapshot(&symbol, Utc::now(), &bids, &[]);
        assert!(!events.iter().any(|e| e.event_type == EventType::SpoofCandidate));
    }

    #[test]
    fn composite_score_is_bounded() {
        let mut detector = ManipulationDetector::new(config());
        let t0 = Utc::now();
        for i in 0..50 {
            let price = Decimal::from(100 + i);
            let opened = event(EventType::NewBid, EventSide::Bid, price, dec!(5000), t0);
            detector.on_event(&opened);
            let closed = event(EventType::LeftTop, EventSide::Bid, price, dec!(5000), t0 + ChronoDuration::seconds(1));
            detector.on_event(&closed);
        }
        let indicators = detector.compute_indicators("BTC_USDT").unwrap();
        assert!(indicators.composite >= Decimal::ZERO && indicators.composite <= Decimal::from(100));
    }
}
