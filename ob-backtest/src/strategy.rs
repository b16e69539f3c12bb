//! The strategy capability surface and its three concrete variants.

use std::collections::VecDeque;

use bookwatch_core::types::{EventSide, EventType, Quote, WhaleEvent};
use rust_decimal::Decimal;

use crate::portfolio::Portfolio;
use crate::types::{Signal, SignalAction};

/// A snapshot of the current market the strategy decides against. Built
/// fresh per tick by the engine, never mutated by the strategy.
#[derive(Debug, Clone, Copy)]
pub struct MarketState<'a> {
    pub quote: &'a Quote,
}

/// Capability set every strategy variant implements. Stored behind this
/// trait object (or an enum of variants), never looked up by name.
pub trait Strategy: std::fmt::Debug {
    /// Called once before the first tick.
    fn initialize(&mut self, _initial_capital: Decimal) {}

    /// Called for every whale event in the replayed stream. Returning
    /// `Some(signal)` requests the engine open or close a position.
    fn on_whale_event(&mut self, event: &WhaleEvent, market: &MarketState<'_>, portfolio: &Portfolio) -> Option<Signal>;

    /// Called for every quote tick, whale event or not. Default: no-op.
    fn on_tick(&mut self, _market: &MarketState<'_>, _portfolio: &Portfolio) -> Option<Signal> {
        None
    }
}

/// Opens in the direction of any sufficiently large whale trade: follows
/// market buys long, market sells short.
#[derive(Debug, Clone)]
pub struct WhaleFollowing {
    pub min_usd: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub timeout_seconds: u64,
}

impl Strategy for WhaleFollowing {
    fn on_whale_event(&mut self, event: &WhaleEvent, _market: &MarketState<'_>, portfolio: &Portfolio) -> Option<Signal> {
        if event.usd_value < self.min_usd || !portfolio.positions().is_empty() {
            return None;
        }
        let action = match event.event_type {
            EventType::MarketBuy => SignalAction::OpenLong,
            EventType::MarketSell => SignalAction::OpenShort,
            _ => return None,
        };
        Some(Signal {
            action: Some(action),
            stop_loss_pct: Some(self.stop_loss_pct),
            take_profit_pct: Some(self.take_profit_pct),
            timeout_seconds: Some(self.timeout_seconds),
            ..Signal::default()
        })
    }
}

/// Tracks a rolling window of recent market sells vs buys; arms when
/// sell-dominated flow suggests a dump, fires a long on the first
/// sufficiently large buy afterwards (a reversal bet against exhausted
/// selling pressure).
#[derive(Debug, Clone)]
pub struct MomentumReversal {
    pub window: usize,
    pub min_usd: Decimal,
    pub sell_buy_ratio_threshold: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub timeout_seconds: u64,
    recent: VecDeque<(EventSide, Decimal)>,
    armed: bool,
}

impl MomentumReversal {
    pub fn new(
        window: usize,
        min_usd: Decimal,
        sell_buy_ratio_threshold: Decimal,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            window,
            min_usd,
            sell_buy_ratio_threshold,
            stop_loss_pct,
            take_profit_pct,
            timeout_seconds,
            recent: VecDeque::new(),
            armed: false,
        }
    }

    fn sell_buy_ratio(&self) -> Option<Decimal> {
        let sell_usd: Decimal = self
            .recent
            .iter()
            .filter(|(side, _)| *side == EventSide::Sell)
            .map(|(_, usd)| *usd)
            .sum();
        let buy_usd: Decimal = self
            .recent
            .iter()
            .filter(|(side, _)| *side == EventSide::Buy)
            .map(|(_, usd)| *usd)
            .sum();
        (buy_usd > Decimal::ZERO).then(|| sell_usd / buy_usd)
    }
}

impl Strategy for MomentumReversal {
    fn on_whale_event(&mut self, event: &WhaleEvent, _market: &MarketState<'_>, portfolio: &Portfolio) -> Option<Signal> {
        if event.usd_value < self.min_usd {
            return None;
        }
        let side = match event.event_type {
            EventType::MarketBuy => EventSide::Buy,
            EventType::MarketSell => EventSide::Sell,
            _ => return None,
        };

        self.recent.push_back((side, event.usd_value));
        if self.recent.len() > self.window {
            self.recent.pop_front();
        }

        if !self.armed {
            if let Some(ratio) = self.sell_buy_ratio() {
                if ratio >= self.sell_buy_ratio_threshold {
                    self.armed = true;
                }
            }
            return None;
        }

        if side == EventSide::Buy && portfolio.positions().is_empty() {
            self.armed = false;
            self.recent.clear();
            return Some(Signal {
                action: Some(SignalAction::OpenLong),
                stop_loss_pct: Some(self.stop_loss_pct),
                take_profit_pct: Some(self.take_profit_pct),
                timeout_seconds: Some(self.timeout_seconds),
                ..Signal::default()
            });
        }
        None
    }
}

/// Reverses against market sells that fill well below the mid — a large
/// seller accepting a deep discount suggests forced/panic selling the
/// price is likely to recover from. Triggers on `market_sell` events
/// whose `distance_from_mid_pct` (signed, negative below mid) exceeds
/// `min_distance_from_mid_pct` in magnitude and whose `usd_value`
/// exceeds `min_market_sell_usd`.
#[derive(Debug, Clone)]
pub struct DeepFillReversal {
    pub min_distance_from_mid_pct: Decimal,
    pub min_market_sell_usd: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

impl Strategy for DeepFillReversal {
    fn on_whale_event(&mut self, event: &WhaleEvent, _market: &MarketState<'_>, portfolio: &Portfolio) -> Option<Signal> {
        if event.event_type != EventType::MarketSell || !portfolio.positions().is_empty() {
            return None;
        }
        if event.usd_value < self.min_market_sell_usd {
            return None;
        }
        if event.distance_from_mid_pct.abs() < self.min_distance_from_mid_pct {
            return None;
        }
        Some(Signal {
            action: Some(SignalAction::OpenLong),
            stop_loss_pct: Some(self.stop_loss_pct),
            take_profit_pct: Some(self.take_profit_pct),
            ..Signal::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    fn whale_event(event_type: EventType, side: EventSide, usd_value: Decimal, distance_from_mid_pct: Decimal) -> WhaleEvent {
        WhaleEvent {
            symbol: SmolStr::new("BTC_USDT"),
            timestamp: Utc::now(),
            event_type,
            side,
            price: dec!(100),
            volume: dec!(1),
            usd_value,
            distance_from_mid_pct,
            level: 1,
            order_count: 1,
            mid_price: dec!(100),
            best_bid: dec!(99.9),
            best_ask: dec!(100.1),
            spread: dec!(0.2),
            info: String::new(),
        }
    }

    fn quote() -> Quote {
        Quote::compute(SmolStr::new("BTC_USDT"), Utc::now(), dec!(99.9), dec!(100.1))
    }

    #[test]
    fn whale_following_opens_long_on_large_market_buy() {
        let mut strategy = WhaleFollowing {
            min_usd: dec!(100000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
            timeout_seconds: 3600,
        };
        let q = quote();
        let market = MarketState { quote: &q };
        let portfolio = Portfolio::new(dec!(10000), Utc::now());
        let event = whale_event(EventType::MarketBuy, EventSide::Buy, dec!(150000), dec!(0.05));
        let signal = strategy.on_whale_event(&event, &market, &portfolio).expect("signal");
        assert_eq!(signal.action, Some(SignalAction::OpenLong));
    }

    #[test]
    fn whale_following_ignores_small_trades() {
        let mut strategy = WhaleFollowing {
            min_usd: dec!(100000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
            timeout_seconds: 3600,
        };
        let q = quote();
        let market = MarketState { quote: &q };
        let portfolio = Portfolio::new(dec!(10000), Utc::now());
        let event = whale_event(EventType::MarketBuy, EventSide::Buy, dec!(500), dec!(0.05));
        assert!(strategy.on_whale_event(&event, &market, &portfolio).is_none());
    }

    #[test]
    fn deep_fill_reversal_matches_s3_scenario() {
        let mut strategy = DeepFillReversal {
            min_distance_from_mid_pct: dec!(0.1),
            min_market_sell_usd: dec!(100000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
        };
        let q = quote();
        let market = MarketState { quote: &q };
        let portfolio = Portfolio::new(dec!(10000), Utc::now());
        let event = whale_event(EventType::MarketSell, EventSide::Sell, dec!(150000), dec!(-0.2));
        let signal = strategy.on_whale_event(&event, &market, &portfolio).expect("signal");
        assert_eq!(signal.action, Some(SignalAction::OpenLong));
        assert_eq!(signal.stop_loss_pct, Some(dec!(1.5)));
        assert_eq!(signal.take_profit_pct, Some(dec!(3.0)));
    }

    #[test]
    fn deep_fill_reversal_ignores_shallow_fills() {
        let mut strategy = DeepFillReversal {
            min_distance_from_mid_pct: dec!(0.1),
            min_market_sell_usd: dec!(100000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
        };
        let q = quote();
        let market = MarketState { quote: &q };
        let portfolio = Portfolio::new(dec!(10000), Utc::now());
        let event = whale_event(EventType::MarketSell, EventSide::Sell, dec!(150000), dec!(-0.02));
        assert!(strategy.on_whale_event(&event, &market, &portfolio).is_none());
    }

    #[test]
    fn momentum_reversal_arms_on_dump_then_fires_on_buy() {
        let mut strategy = MomentumReversal::new(5, dec!(10000), dec!(2), dec!(1.5), dec!(3.0), 1800);
        let q = quote();
        let market = MarketState { quote: &q };
        let portfolio = Portfolio::new(dec!(10000), Utc::now());

        let sell = whale_event(EventType::MarketSell, EventSide::Sell, dec!(50000), dec!(-0.1));
        assert!(strategy.on_whale_event(&sell, &market, &portfolio).is_none());
        assert!(strategy.armed);

        let buy = whale_event(EventType::MarketBuy, EventSide::Buy, dec!(20000), dec!(0.1));
        let signal = strategy.on_whale_event(&buy, &market, &portfolio).expect("signal");
        assert_eq!(signal.action, Some(SignalAction::OpenLong));
    }
}
