//! Peak-to-trough drawdown tracking over an equity curve.
//!
//! [`DrawdownGenerator`] is fed equity observations in time order. It
//! emits a completed [`Drawdown`] each time the curve recovers to a new
//! high after having dipped below the previous one; [`MaxDrawdownGenerator`]
//! folds the emitted drawdowns down to the single worst one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single completed peak-to-trough move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Magnitude of the drop, `peak - trough`, always non-negative.
    pub value: Decimal,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
}

impl Drawdown {
    pub fn duration(&self) -> chrono::TimeDelta {
        self.time_end - self.time_start
    }
}

/// Tracks the running peak/trough of an equity curve and emits a
/// [`Drawdown`] once the curve recovers above the prior peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownGenerator {
    peak: Decimal,
    peak_time: DateTime<Utc>,
    trough: Decimal,
    trough_time: DateTime<Utc>,
    in_drawdown: bool,
}

impl DrawdownGenerator {
    pub fn init(initial_equity: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            peak: initial_equity,
            peak_time: timestamp,
            trough: initial_equity,
            trough_time: timestamp,
            in_drawdown: false,
        }
    }

    /// Feeds one more equity observation. Returns `Some` exactly when a
    /// drawdown just closed out (the curve recovered to a new peak after
    /// having dipped).
    pub fn update(&mut self, equity: Decimal, timestamp: DateTime<Utc>) -> Option<Drawdown> {
        if equity >= self.peak {
            let closed = self.in_drawdown.then(|| Drawdown {
                value: self.peak - self.trough,
                time_start: self.peak_time,
                time_end: self.trough_time,
            });
            self.peak = equity;
            self.peak_time = timestamp;
            self.trough = equity;
            self.trough_time = timestamp;
            self.in_drawdown = false;
            closed
        } else {
            if equity < self.trough {
                self.trough = equity;
                self.trough_time = timestamp;
            }
            self.in_drawdown = true;
            None
        }
    }

    /// Returns the in-progress drawdown, if any, without resetting
    /// state. Call this once at the end of a run to capture a drawdown
    /// that never recovered before the data ended.
    pub fn generate(&self) -> Option<Drawdown> {
        self.in_drawdown.then(|| Drawdown {
            value: self.peak - self.trough,
            time_start: self.peak_time,
            time_end: self.trough_time,
        })
    }
}

/// The single largest drawdown observed during a run.
pub mod max {
    use super::Drawdown;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct MaxDrawdown(pub Drawdown);

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct MaxDrawdownGenerator {
        current: Option<Drawdown>,
    }

    impl MaxDrawdownGenerator {
        pub fn update(&mut self, next: &Drawdown) {
            let replace = match &self.current {
                Some(cur) => next.value > cur.value,
                None => true,
            };
            if replace {
                self.current = Some(*next);
            }
        }

        pub fn generate(&self) -> Option<MaxDrawdown> {
            self.current.map(MaxDrawdown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t(day: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + day * 86_400, 0).unwrap()
    }

    #[test]
    fn dip_then_recovery_emits_one_drawdown() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        assert_eq!(gen.update(dec!(90), t(1)), None);
        assert_eq!(gen.update(dec!(95), t(2)), None);
        let closed = gen.update(dec!(120), t(3)).expect("recovery above prior peak");
        assert_eq!(closed.value, dec!(10));
        assert_eq!(closed.time_start, t(0));
        assert_eq!(closed.time_end, t(1));
    }

    #[test]
    fn unresolved_drawdown_surfaces_via_generate() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        gen.update(dec!(80), t(1));
        assert!(gen.generate().is_some());
    }

    #[test]
    fn max_drawdown_keeps_the_worst() {
        let mut max_gen = max::MaxDrawdownGenerator::default();
        max_gen.update(&Drawdown { value: dec!(5), time_start: t(0), time_end: t(1) });
        max_gen.update(&Drawdown { value: dec!(20), time_start: t(2), time_end: t(3) });
        max_gen.update(&Drawdown { value: dec!(8), time_start: t(4), time_end: t(5) });
        assert_eq!(max_gen.generate().unwrap().0.value, dec!(20));
    }
}
