use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Which side of the book a level, diff or lifecycle record belongs to.
///
/// Distinct from [`EventSide`]: a [`BookSide`] only ever describes resting
/// liquidity, never an aggressive trade.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    pub fn opposite(self) -> Self {
        match self {
            BookSide::Bid => BookSide::Ask,
            BookSide::Ask => BookSide::Bid,
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => write!(f, "bid"),
            BookSide::Ask => write!(f, "ask"),
        }
    }
}

/// The four values a [`WhaleEvent::side`] may take, per the wire contract
/// persisted to the sink: `bid`, `ask`, `buy`, `sell`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSide {
    Bid,
    Ask,
    Buy,
    Sell,
}

impl From<BookSide> for EventSide {
    fn from(side: BookSide) -> Self {
        match side {
            BookSide::Bid => EventSide::Bid,
            BookSide::Ask => EventSide::Ask,
        }
    }
}

impl fmt::Display for EventSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventSide::Bid => "bid",
            EventSide::Ask => "ask",
            EventSide::Buy => "buy",
            EventSide::Sell => "sell",
        };
        write!(f, "{s}")
    }
}

/// A single resting price level: `volume == 0` is forbidden by
/// construction — a zero-volume update is a deletion signal and must
/// never be stored as a [`PriceLevel`]. See [`PriceLevel::new`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
    pub order_count: u64,
}

impl PriceLevel {
    /// Returns `None` for a zero-or-negative volume — callers must treat
    /// that as a deletion of the level, never construct a [`PriceLevel`]
    /// from it.
    pub fn new(price: Decimal, volume: Decimal, order_count: u64) -> Option<Self> {
        if volume <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            price,
            volume,
            order_count,
        })
    }

    pub fn usd_value(&self) -> Decimal {
        self.price * self.volume
    }
}

/// Immutable quote emitted on every processed depth message where both
/// sides of the book are non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: SmolStr,
    pub timestamp: DateTime<Utc>,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub mid_price: Decimal,
    pub spread: Decimal,
}

impl Quote {
    pub fn compute(symbol: SmolStr, timestamp: DateTime<Utc>, best_bid: Decimal, best_ask: Decimal) -> Self {
        let mid_price = (best_bid + best_ask) / Decimal::TWO;
        let spread = best_ask - best_bid;
        Self {
            symbol,
            timestamp,
            best_bid,
            best_ask,
            mid_price,
            spread,
        }
    }

    /// Spread expressed in basis points of the mid, per the GLOSSARY
    /// definition `(best_ask - best_bid) / mid * 10000`.
    pub fn spread_bps(&self) -> Decimal {
        if self.mid_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.spread / self.mid_price) * Decimal::from(10_000)
    }
}

/// The canonical microstructure event taxonomy. String tags are part of
/// the wire contract with downstream readers (sink, backtest loader) and
/// must be reused byte-for-byte —.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewBid,
    NewAsk,
    EnteredTop,
    LeftTop,
    Increase,
    Decrease,
    MarketBuy,
    MarketSell,
    FlashOrder,
    Layering,
    QuoteStuffing,
    SpoofCandidate,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::NewBid => "new_bid",
            EventType::NewAsk => "new_ask",
            EventType::EnteredTop => "entered_top",
            EventType::LeftTop => "left_top",
            EventType::Increase => "increase",
            EventType::Decrease => "decrease",
            EventType::MarketBuy => "market_buy",
            EventType::MarketSell => "market_sell",
            EventType::FlashOrder => "flash_order",
            EventType::Layering => "layering",
            EventType::QuoteStuffing => "quote_stuffing",
            EventType::SpoofCandidate => "spoof_candidate",
        };
        write!(f, "{s}")
    }
}

/// Immutable microstructure event, produced by value by the book diff
/// engine (C1) or the manipulation detector (C2).
///
/// `level` is 1 for top-of-book, increasing outward; 0 if not
/// applicable (e.g. a pattern event spanning several levels).
/// `distance_from_mid_pct` is signed: positive means the level/trade sits
/// above the mid, negative means below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleEvent {
    pub symbol: SmolStr,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub side: EventSide,
    pub price: Decimal,
    pub volume: Decimal,
    pub usd_value: Decimal,
    pub distance_from_mid_pct: Decimal,
    pub level: u32,
    pub order_count: u64,
    pub mid_price: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub spread: Decimal,
    pub info: String,
}

impl WhaleEvent {
    /// Enforces the disambiguation invariant property 2:
    /// the taxonomy's side-bearing event types must carry a matching
    /// `side`. Debug-only; callers are trusted to construct correctly,
    /// this is a cheap last-line assertion exercised by unit tests.
    #[cfg(debug_assertions)]
    pub fn debug_assert_side_consistent(&self) {
        let expected = match self.event_type {
            EventType::NewBid => Some(EventSide::Bid),
            EventType::NewAsk => Some(EventSide::Ask),
            EventType::MarketBuy => Some(EventSide::Buy),
            EventType::MarketSell => Some(EventSide::Sell),
            _ => None,
        };
        if let Some(expected) = expected {
            debug_assert_eq!(
                self.side, expected,
                "event_type {:?} requires side {:?}, got {:?}",
                self.event_type, expected, self.side
            );
        }
    }
}

/// Per-event filters applied by the book diff engine before emission.
/// Stricter filters must never produce an event absent under looser
/// filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventFilters {
    pub min_volume: Decimal,
    pub min_usd: Decimal,
    pub max_usd: Option<Decimal>,
    pub min_distance_pct: Option<Decimal>,
    pub max_distance_pct: Option<Decimal>,
}

impl EventFilters {
    pub fn passes(&self, volume: Decimal, usd_value: Decimal, distance_from_mid_pct: Decimal) -> bool {
        if volume < self.min_volume {
            return false;
        }
        if usd_value < self.min_usd {
            return false;
        }
        if let Some(max_usd) = self.max_usd {
            if usd_value > max_usd {
                return false;
            }
        }
        let abs_distance = distance_from_mid_pct.abs();
        if let Some(min_distance) = self.min_distance_pct {
            if abs_distance < min_distance {
                return false;
            }
        }
        if let Some(max_distance) = self.max_distance_pct {
            if abs_distance > max_distance {
                return false;
            }
        }
        true
    }
}

impl Default for EventFilters {
    fn default() -> Self {
        Self {
            min_volume: Decimal::ZERO,
            min_usd: Decimal::ZERO,
            max_usd: None,
            min_distance_pct: None,
            max_distance_pct: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_level_rejects_zero_volume() {
        assert!(PriceLevel::new(dec!(100), Decimal::ZERO, 1).is_none());
        assert!(PriceLevel::new(dec!(100), dec!(-1), 1).is_none());
        assert!(PriceLevel::new(dec!(100), dec!(1), 1).is_some());
    }

    #[test]
    fn quote_computes_mid_and_spread() {
        let quote = Quote::compute(SmolStr::new("BTC_USDT"), Utc::now(), dec!(99), dec!(101));
        assert_eq!(quote.mid_price, dec!(100));
        assert_eq!(quote.spread, dec!(2));
    }

    #[test]
    fn event_filters_idempotence_stricter_never_adds() {
        let loose = EventFilters {
            min_volume: dec!(0),
            min_usd: dec!(0),
            ..Default::default()
        };
        let strict = EventFilters {
            min_volume: dec!(10),
            min_usd: dec!(1000),
            ..Default::default()
        };
        // Any input passing `strict` must also pass `loose`.
        let cases = [
            (dec!(5), dec!(500), dec!(0.1)),
            (dec!(15), dec!(2000), dec!(0.1)),
            (dec!(0.5), dec!(50), dec!(0.1)),
        ];
        for (volume, usd, distance) in cases {
            if strict.passes(volume, usd, distance) {
                assert!(loose.passes(volume, usd, distance));
            }
        }
    }

    #[test]
    fn event_type_strings_match_wire_contract() {
        assert_eq!(EventType::NewBid.to_string(), "new_bid");
        assert_eq!(EventType::EnteredTop.to_string(), "entered_top");
        assert_eq!(EventType::QuoteStuffing.to_string(), "quote_stuffing");
    }
}
