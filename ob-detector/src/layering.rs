//! Layering detector: scans one side of the visible book for runs of
//! large levels that look like a wall meant to influence price rather
//! than to trade.

use bookwatch_core::types::{EventSide, PriceLevel};
use rust_decimal::Decimal;

/// One level that contributed to a detected layering run.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredLevel {
    pub price: Decimal,
    pub volume: Decimal,
    pub usd_value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayeringFinding {
    pub side: EventSide,
    pub levels: Vec<LayeredLevel>,
}

impl LayeringFinding {
    /// A one-line breakdown suitable for `WhaleEvent::info`.
    pub fn describe(&self) -> String {
        self.levels
            .iter()
            .map(|l| format!("{}@{}", l.volume, l.price))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Walks the top `≤10` levels of `side` (already sorted best-to-worst)
/// looking for `≥ min_layers` levels above `threshold`, allowing up to
/// `allow_gap` thin levels between them without breaking the run.
/// Returns the longest such run, if any.
pub fn detect(
    side: EventSide,
    levels: &[PriceLevel],
    threshold: Decimal,
    min_layers: usize,
    allow_gap: usize,
) -> Option<LayeringFinding> {
    let window = &levels[..levels.len().min(10)];

    let mut best: Vec<LayeredLevel> = Vec::new();
    let mut current: Vec<LayeredLevel> = Vec::new();
    let mut gap_used = 0usize;

    for level in window {
        let usd_value = level.usd_value();
        if usd_value > threshold {
            current.push(LayeredLevel {
                price: level.price,
                volume: level.volume,
                usd_value,
            });
            gap_used = 0;
        } else if !current.is_empty() && gap_used < allow_gap {
            gap_used += 1;
        } else {
            if current.len() > best.len() {
                best = std::mem::take(&mut current);
            } else {
                current.clear();
            }
            gap_used = 0;
        }
    }
    if current.len() > best.len() {
        best = current;
    }

    if best.len() >= min_layers {
        Some(LayeringFinding { side, levels: best })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: i64, volume: i64) -> PriceLevel {
        PriceLevel::new(Decimal::from(price), Decimal::from(volume), 1).unwrap()
    }

    #[test]
    fn finds_consecutive_large_levels() {
        let levels = vec![level(100, 1000), level(99, 1000), level(98, 1)];
        let found = detect(EventSide::Bid, &levels, dec!(30000), 2, 1).unwrap();
        assert_eq!(found.levels.len(), 2);
    }

    #[test]
    fn tolerates_single_level_gap() {
        let levels = vec![level(100, 1000), level(99, 1), level(98, 1000)];
        let found = detect(EventSide::Bid, &levels, dec!(30000), 2, 1).unwrap();
        assert_eq!(found.levels.len(), 2);
    }

    #[test]
    fn no_finding_below_min_layers() {
        let levels = vec![level(100, 1000), level(99, 1), level(98, 1)];
        assert!(detect(EventSide::Bid, &levels, dec!(30000), 2, 1).is_none());
    }
}
