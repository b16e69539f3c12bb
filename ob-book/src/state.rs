//! Per-symbol book state: the full book, the previously-visible window
//! and the previously-full book, carried across messages so the engine
//! can disambiguate a truly new order from a pre-existing one re-entering
//! the visible top-N.

use bookwatch_core::types::PriceLevel;
use fnv::FnvHashMap;
use rust_decimal::Decimal;

pub type LevelMap = FnvHashMap<Decimal, PriceLevel>;

#[derive(Debug, Clone, Default)]
pub struct BookState {
    pub full_bids: LevelMap,
    pub full_asks: LevelMap,
    pub prev_visible_bids: LevelMap,
    pub prev_visible_asks: LevelMap,
    pub prev_full_bids: LevelMap,
    pub prev_full_asks: LevelMap,
    pub current_version: u64,
    pub version_gap_count: u64,
    pub initialized: bool,
    /// Last mid computed from a non-crossed quote; used to stamp
    /// `distance_from_mid_pct` on trade events even when the book is
    /// momentarily crossed or one side is briefly empty.
    pub last_mid: Option<Decimal>,
    pub last_best_bid: Option<Decimal>,
    pub last_best_ask: Option<Decimal>,
}

impl BookState {
    /// Visible top-`depth` window, sorted descending (bids) or ascending
    /// (asks) by price. Every key here is also a key in the full book.
    pub fn visible_bids(&self, depth: usize) -> Vec<PriceLevel> {
        let mut levels: Vec<PriceLevel> = self.full_bids.values().copied().collect();
        levels.sort_by(|a, b| b.price.cmp(&a.price));
        levels.truncate(depth);
        levels
    }

    pub fn visible_asks(&self, depth: usize) -> Vec<PriceLevel> {
        let mut levels: Vec<PriceLevel> = self.full_asks.values().copied().collect();
        levels.sort_by(|a, b| a.price.cmp(&b.price));
        levels.truncate(depth);
        levels
    }

    pub fn best_bid(&self, depth: usize) -> Option<Decimal> {
        self.visible_bids(depth).first().map(|l| l.price)
    }

    pub fn best_ask(&self, depth: usize) -> Option<Decimal> {
        self.visible_asks(depth).first().map(|l| l.price)
    }
}

pub fn level_map_from(levels: impl IntoIterator<Item = PriceLevel>) -> LevelMap {
    levels.into_iter().map(|l| (l.price, l)).collect()
}
