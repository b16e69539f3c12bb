//! # Book Diff Engine (C1)
//!
//! Converts raw depth snapshots into a typed event stream while
//! preserving the distinction between a newly placed order and a
//! pre-existing order re-entering the visible window because a
//! shallower level was consumed.

use crate::error::BookError;
use crate::state::{level_map_from, BookState, LevelMap};
use bookwatch_core::types::{BookSide, EventFilters, EventSide, EventType, PriceLevel, Quote, WhaleEvent};
use bookwatch_feed::client::{DepthPushData, RawTrade, RestDepthData};
use bookwatch_feed::protocol::TradeSide;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tracing::{debug, warn};

/// Output of processing a single depth message: exactly one [`Quote`] if
/// both sides are non-empty and not crossed, plus
/// zero or more filtered [`WhaleEvent`]s in the order new/entered,
/// increase/decrease, left_top.
#[derive(Debug, Default, Clone)]
pub struct DiffOutput {
    pub quote: Option<Quote>,
    pub events: Vec<WhaleEvent>,
}

#[derive(Debug)]
pub struct BookDiffEngine {
    depth: usize,
    filters: EventFilters,
    books: FnvHashMap<SmolStr, BookState>,
}

impl BookDiffEngine {
    pub fn new(depth: usize, filters: EventFilters) -> Self {
        Self {
            depth,
            filters,
            books: FnvHashMap::default(),
        }
    }

    pub fn book(&self, symbol: &str) -> Option<&BookState> {
        self.books.get(symbol)
    }

    /// Seeds a symbol from an initial REST snapshot. Previous-state maps
    /// are reset to mirror this snapshot (not cleared to empty) so the
    /// very next depth message can already disambiguate `entered_top`
    /// from `new_bid` against real prior state.
    pub fn bootstrap(&mut self, symbol: SmolStr, snapshot: RestDepthData) {
        let full_bids = level_map_from(snapshot.bids.iter().filter_map(to_level));
        let full_asks = level_map_from(snapshot.asks.iter().filter_map(to_level));

        let mut state = BookState {
            full_bids,
            full_asks,
            ..BookState::default()
        };
        state.prev_visible_bids = level_map_from(state.visible_bids(self.depth));
        state.prev_visible_asks = level_map_from(state.visible_asks(self.depth));
        state.prev_full_bids = state.full_bids.clone();
        state.prev_full_asks = state.full_asks.clone();
        state.initialized = true;

        self.books.insert(symbol, state);
    }

    /// Processes one depth message for `symbol`, mutating its
    /// [`BookState`] and returning the quote/events it produced.
    pub fn on_depth(&mut self, symbol: SmolStr, data: DepthPushData) -> DiffOutput {
        let state = self.books.entry(symbol.clone()).or_default();

        if state.current_version != 0 && data.version != state.current_version.wrapping_add(1) {
            state.version_gap_count += 1;
            debug!(%symbol, expected = state.current_version + 1, got = data.version, "version gap detected");
        }
        state.current_version = data.version;

        apply_updates(&mut state.full_bids, &data.bids);
        apply_updates(&mut state.full_asks, &data.asks);

        let current_visible_bids = level_map_from(state.visible_bids(self.depth));
        let current_visible_asks = level_map_from(state.visible_asks(self.depth));

        let timestamp = data.timestamp_utc();
        let best_bid = current_visible_bids.values().map(|l| l.price).max();
        let best_ask = current_visible_asks.values().map(|l| l.price).min();

        let mut quote = None;
        if let (Some(bb), Some(ba)) = (best_bid, best_ask) {
            if bb < ba {
                let q = Quote::compute(symbol.clone(), timestamp, bb, ba);
                state.last_mid = Some(q.mid_price);
                state.last_best_bid = Some(bb);
                state.last_best_ask = Some(ba);
                quote = Some(q);
            } else {
                let err = BookError::CrossedBook {
                    symbol: symbol.to_string(),
                    best_bid: bb,
                    best_ask: ba,
                };
                warn!(%err, "skipping quote emission");
            }
        } else if best_bid.is_none() || best_ask.is_none() {
            let side = if best_bid.is_none() { "bid" } else { "ask" };
            let err = BookError::EmptySide {
                symbol: symbol.to_string(),
                side,
            };
            debug!(%err, "skipping quote emission");
        }

        if !state.initialized {
            // A symbol that never received a REST bootstrap seeds itself
            // from its first depth message instead.
            state.prev_visible_bids = current_visible_bids;
            state.prev_visible_asks = current_visible_asks;
            state.prev_full_bids = state.full_bids.clone();
            state.prev_full_asks = state.full_asks.clone();
            state.initialized = true;
            return DiffOutput { quote, events: Vec::new() };
        }

        let mut new_entered = Vec::new();
        let mut inc_dec = Vec::new();
        let mut left = Vec::new();

        let mid = state.last_mid;
        diff_side(
            BookSide::Bid,
            &symbol,
            timestamp,
            &state.prev_visible_bids,
            &current_visible_bids,
            &state.prev_full_bids,
            mid,
            state.last_best_bid,
            state.last_best_ask,
            &self.filters,
            &mut new_entered,
            &mut inc_dec,
            &mut left,
        );
        diff_side(
            BookSide::Ask,
            &symbol,
            timestamp,
            &state.prev_visible_asks,
            &current_visible_asks,
            &state.prev_full_asks,
            mid,
            state.last_best_bid,
            state.last_best_ask,
            &self.filters,
            &mut new_entered,
            &mut inc_dec,
            &mut left,
        );

        state.prev_visible_bids = current_visible_bids;
        state.prev_visible_asks = current_visible_asks;
        state.prev_full_bids = state.full_bids.clone();
        state.prev_full_asks = state.full_asks.clone();

        let mut events = new_entered;
        events.extend(inc_dec);
        events.extend(left);

        DiffOutput { quote, events }
    }

    /// Every trade yields one `market_buy`/`market_sell` event, signed
    /// against the last known mid. Returns `None` if no mid is known yet
    /// (book not initialized) or the trade's side byte is unrecognized.
    pub fn on_trade(&mut self, symbol: SmolStr, trade: RawTrade) -> Option<WhaleEvent> {
        let state = self.books.entry(symbol.clone()).or_default();
        let mid = state.last_mid?;
        let side = trade.side()?;

        let event_type = match side {
            TradeSide::Buy => EventType::MarketBuy,
            TradeSide::Sell => EventType::MarketSell,
        };
        let event_side = match side {
            TradeSide::Buy => EventSide::Buy,
            TradeSide::Sell => EventSide::Sell,
        };

        let distance = distance_from_mid_pct(trade.p, mid);
        let usd_value = trade.p * trade.v;

        if !self.filters.passes(trade.v, usd_value, distance) {
            return None;
        }

        Some(WhaleEvent {
            symbol,
            timestamp: trade.timestamp_utc(),
            event_type,
            side: event_side,
            price: trade.p,
            volume: trade.v,
            usd_value,
            distance_from_mid_pct: distance,
            level: 0,
            order_count: 0,
            mid_price: mid,
            best_bid: state.last_best_bid.unwrap_or(Decimal::ZERO),
            best_ask: state.last_best_ask.unwrap_or(Decimal::ZERO),
            spread: state
                .last_best_ask
                .zip(state.last_best_bid)
                .map(|(a, b)| a - b)
                .unwrap_or(Decimal::ZERO),
            info: String::new(),
        })
    }
}

fn to_level(raw: &bookwatch_feed::protocol::RawLevel) -> Option<PriceLevel> {
    PriceLevel::new(raw.price(), raw.volume(), raw.order_count())
}

/// Applies `side == 0 -> remove, else -> overwrite` .
fn apply_updates(full: &mut LevelMap, raw_levels: &[bookwatch_feed::protocol::RawLevel]) {
    for raw in raw_levels {
        match PriceLevel::new(raw.price(), raw.volume(), raw.order_count()) {
            Some(level) => {
                full.insert(level.price, level);
            }
            None => {
                full.remove(&raw.price());
            }
        }
    }
}

fn distance_from_mid_pct(price: Decimal, mid: Decimal) -> Decimal {
    if mid.is_zero() {
        return Decimal::ZERO;
    }
    (price - mid) / mid * Decimal::from(100)
}

/// Rank (1-indexed, 1 = top of book) of `price` within `levels`, sorted
/// the way the exchange presents that side.
fn rank_of(side: BookSide, levels: &LevelMap, price: Decimal) -> u32 {
    let mut prices: Vec<Decimal> = levels.keys().copied().collect();
    match side {
        BookSide::Bid => prices.sort_by(|a, b| b.cmp(a)),
        BookSide::Ask => prices.sort(),
    }
    prices
        .iter()
        .position(|p| *p == price)
        .map(|idx| (idx + 1) as u32)
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn diff_side(
    side: BookSide,
    symbol: &SmolStr,
    timestamp: DateTime<Utc>,
    prev_visible: &LevelMap,
    current_visible: &LevelMap,
    prev_full: &LevelMap,
    mid: Option<Decimal>,
    best_bid: Option<Decimal>,
    best_ask: Option<Decimal>,
    filters: &EventFilters,
    new_entered: &mut Vec<WhaleEvent>,
    inc_dec: &mut Vec<WhaleEvent>,
    left: &mut Vec<WhaleEvent>,
) {
    let mid = mid.unwrap_or(Decimal::ZERO);
    let best_bid = best_bid.unwrap_or(Decimal::ZERO);
    let best_ask = best_ask.unwrap_or(Decimal::ZERO);
    let spread = best_ask - best_bid;
    let event_side = EventSide::from(side);

    let build = |event_type: EventType,
                 price: Decimal,
                 volume: Decimal,
                 order_count: u64,
                 level: u32|
     -> Option<WhaleEvent> {
        let distance = distance_from_mid_pct(price, mid);
        let usd_value = price * volume;
        if !filters.passes(volume, usd_value, distance) {
            return None;
        }
        Some(WhaleEvent {
            symbol: symbol.clone(),
            timestamp,
            event_type,
            side: event_side,
            price,
            volume,
            usd_value,
            distance_from_mid_pct: distance,
            level,
            order_count,
            mid_price: mid,
            best_bid,
            best_ask,
            spread,
            info: String::new(),
        })
    };

    for (price, level) in current_visible {
        match prev_visible.get(price) {
            None => {
                // Disambiguation property: a price absent
                // from the previous visible window but present in the
                // previous full book pre-existed; it is re-entering the
                // window, not a new placement.
                let event_type = if prev_full.contains_key(price) {
                    EventType::EnteredTop
                } else {
                    match side {
                        BookSide::Bid => EventType::NewBid,
                        BookSide::Ask => EventType::NewAsk,
                    }
                };
                let rank = rank_of(side, current_visible, *price);
                if let Some(event) = build(event_type, *price, level.volume, level.order_count, rank) {
                    new_entered.push(event);
                }
            }
            Some(prev_level) if prev_level.volume != level.volume => {
                let delta = level.volume - prev_level.volume;
                let event_type = if delta > Decimal::ZERO {
                    EventType::Increase
                } else {
                    EventType::Decrease
                };
                let rank = rank_of(side, current_visible, *price);
                if let Some(event) = build(event_type, *price, delta.abs(), level.order_count, rank) {
                    inc_dec.push(event);
                }
            }
            Some(_) => {
                // Same price, same volume: no-op. Two orders collapsing
                // into one at identical total volume is not observable
                // from level-2 data.
            }
        }
    }

    for (price, prev_level) in prev_visible {
        if !current_visible.contains_key(price) {
            let rank = rank_of(side, prev_visible, *price);
            if let Some(event) = build(
                EventType::LeftTop,
                *price,
                prev_level.volume,
                prev_level.order_count,
                rank,
            ) {
                left.push(event);
            }
        }
    }
}
