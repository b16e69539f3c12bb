#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
//! # Bookwatch Analytics
//!
//! Pure, stateless performance metrics over a backtest run's realized
//! trades and equity curve: Sharpe, Sortino, Calmar, win rate, profit
//! factor, and drawdown. Nothing here touches the order book or the
//! detector — every calculation takes already-aggregated numbers
//! (a return series' mean/std-dev, a count of winning trades, a peak
//! and trough) and turns them into one metric value.
//!
//! ```text
//! ob-analytics/
//!  ├─ algorithm.rs  # mean, std-dev, downside-deviation over a return series
//!  ├─ metric/       # one file per metric, each independently computed
//!  └─ time.rs       # annualization periods (Daily, Annual252, Annual365, ...)
//! ```

/// Mean, standard deviation, and downside deviation over a series of
/// period returns, feeding the ratio metrics in [`metric`].
pub mod algorithm;

/// One module per metric: [`metric::sharpe`], [`metric::sortino`],
/// [`metric::calmar`], [`metric::win_rate`], [`metric::profit_factor`],
/// [`metric::drawdown`].
pub mod metric;

/// Annualization periods used to scale a ratio metric computed over one
/// interval onto another (e.g. daily Sharpe onto an annualized figure).
pub mod time;

use chrono::{DateTime, Utc};

/// Anything that carries a UTC timestamp, for chronological ordering of
/// heterogeneous series.
pub trait Timed {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Pairs an arbitrary value with the timestamp it was observed at.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedValue<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> TimedValue<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

impl<T> Timed for TimedValue<T> {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
pub mod test_utils {
    use chrono::{DateTime, Utc};

    pub fn time_plus_days(base: DateTime<Utc>, plus: u64) -> DateTime<Utc> {
        base + chrono::Duration::days(plus as i64)
    }
}
