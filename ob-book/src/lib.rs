#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
//! # Bookwatch Book
//!
//! The per-symbol order book diff engine (C1): turns raw depth pushes and
//! trades from `bookwatch-feed` into [`bookwatch_core::types::Quote`]s and
//! [`bookwatch_core::types::WhaleEvent`]s, distinguishing a genuinely new
//! order from one re-entering the visible window.

/// Per-symbol book state carried across messages.
pub mod state;

/// The diff engine itself: bootstrap, on_depth, on_trade.
pub mod engine;

/// Book-specific non-fatal error taxonomy.
pub mod error;

pub use engine::{BookDiffEngine, DiffOutput};
pub use error::BookError;
pub use state::BookState;

#[cfg(test)]
mod tests {
    use super::*;
    use bookwatch_core::types::{EventFilters, EventType};
    use bookwatch_feed::protocol::{DepthPushData, RawLevel, RestDepthData};
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    fn symbol() -> SmolStr {
        SmolStr::new("BTC_USDT")
    }

    fn bootstrap_snapshot() -> RestDepthData {
        RestDepthData {
            bids: vec![
                RawLevel(dec!(100), dec!(5), 2),
                RawLevel(dec!(99), dec!(3), 1),
                RawLevel(dec!(98), dec!(2), 1),
                RawLevel(dec!(97), dec!(1), 1),
            ],
            asks: vec![
                RawLevel(dec!(101), dec!(4), 2),
                RawLevel(dec!(102), dec!(2), 1),
                RawLevel(dec!(103), dec!(1), 1),
            ],
        }
    }

    /// Bootstrap with depth N=3, then a full-refresh snapshot that
    /// removes the top bid and reveals the 4th level.
    /// Expect `left_top` at 100 and `entered_top` at 97, and critically
    /// no `new_bid` — 97 pre-existed in the bootstrap full book.
    #[test]
    fn s1_entered_top_not_confused_with_new_bid() {
        let mut engine = BookDiffEngine::new(3, EventFilters::default());
        engine.bootstrap(symbol(), bootstrap_snapshot());

        let msg = DepthPushData {
            version: 1,
            timestamp: 1_700_000_000_000,
            bids: vec![
                RawLevel(dec!(100), dec!(0), 0),
                RawLevel(dec!(99), dec!(3), 1),
                RawLevel(dec!(98), dec!(2), 1),
                RawLevel(dec!(97), dec!(1), 1),
            ],
            asks: vec![],
        };
        let out = engine.on_depth(symbol(), msg);

        assert!(out
            .events
            .iter()
            .any(|e| e.event_type == EventType::LeftTop && e.price == dec!(100)));
        assert!(out
            .events
            .iter()
            .any(|e| e.event_type == EventType::EnteredTop && e.price == dec!(97)));
        assert!(!out.events.iter().any(|e| e.event_type == EventType::NewBid));
    }

    #[test]
    fn genuinely_new_price_is_new_bid() {
        let mut engine = BookDiffEngine::new(3, EventFilters::default());
        engine.bootstrap(symbol(), bootstrap_snapshot());

        let msg = DepthPushData {
            version: 1,
            timestamp: 1_700_000_000_000,
            bids: vec![RawLevel(dec!(100.5), dec!(1), 1)],
            asks: vec![],
        };
        let out = engine.on_depth(symbol(), msg);

        let ev = out
            .events
            .iter()
            .find(|e| e.price == dec!(100.5))
            .expect("new top-of-book bid should be reported");
        assert_eq!(ev.event_type, EventType::NewBid);
        assert_eq!(ev.level, 1);
    }

    #[test]
    fn volume_increase_and_decrease_detected() {
        let mut engine = BookDiffEngine::new(3, EventFilters::default());
        engine.bootstrap(symbol(), bootstrap_snapshot());

        let msg = DepthPushData {
            version: 1,
            timestamp: 1_700_000_000_000,
            bids: vec![RawLevel(dec!(100), dec!(8), 3)],
            asks: vec![RawLevel(dec!(101), dec!(1), 1)],
        };
        let out = engine.on_depth(symbol(), msg);

        let inc = out
            .events
            .iter()
            .find(|e| e.price == dec!(100))
            .expect("increase at 100");
        assert_eq!(inc.event_type, EventType::Increase);
        assert_eq!(inc.volume, dec!(3));

        let dec = out
            .events
            .iter()
            .find(|e| e.price == dec!(101))
            .expect("decrease at 101");
        assert_eq!(dec.event_type, EventType::Decrease);
        assert_eq!(dec.volume, dec!(3));
    }

    #[test]
    fn quote_skipped_when_book_crossed() {
        let mut engine = BookDiffEngine::new(3, EventFilters::default());
        engine.bootstrap(symbol(), bootstrap_snapshot());

        let msg = DepthPushData {
            version: 1,
            timestamp: 1_700_000_000_000,
            bids: vec![RawLevel(dec!(105), dec!(1), 1)],
            asks: vec![],
        };
        let out = engine.on_depth(symbol(), msg);
        assert!(out.quote.is_none());
    }

    #[test]
    fn stricter_filters_never_add_events_missing_under_looser_ones() {
        let loose = EventFilters::default();
        let strict = EventFilters {
            min_usd: dec!(1000),
            ..EventFilters::default()
        };

        let mut loose_engine = BookDiffEngine::new(3, loose);
        let mut strict_engine = BookDiffEngine::new(3, strict);
        loose_engine.bootstrap(symbol(), bootstrap_snapshot());
        strict_engine.bootstrap(symbol(), bootstrap_snapshot());

        let msg = DepthPushData {
            version: 1,
            timestamp: 1_700_000_000_000,
            bids: vec![RawLevel(dec!(100.5), dec!(1), 1)],
            asks: vec![],
        };
        let loose_out = loose_engine.on_depth(symbol(), msg.clone());
        let strict_out = strict_engine.on_depth(symbol(), msg);

        assert!(strict_out.events.len() <= loose_out.events.len());
    }
}
