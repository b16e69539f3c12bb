//! Time-interval conventions used to annualize per-period metrics.
//!
//! A [`TimeInterval`] is anything that knows how long it spans; metrics
//! computed over one interval can be [`scale`](crate::metric::sharpe::SharpeRatio::scale)d
//! to another, e.g. from the backtest's actual trading window to a
//! standard annualization convention.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

pub trait TimeInterval: Clone + std::fmt::Debug + PartialEq {
    fn interval(&self) -> TimeDelta;
}

impl TimeInterval for TimeDelta {
    fn interval(&self) -> TimeDelta {
        *self
    }
}

/// One calendar day.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Daily;

impl TimeInterval for Daily {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(1)
    }
}

/// 252 trading days — the traditional equities-market annualization
/// convention.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Annual252;

impl TimeInterval for Annual252 {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(252)
    }
}

/// 365 calendar days — the crypto-market annualization convention, used
/// here since spot/perp futures trade continuously.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Annual365;

impl TimeInterval for Annual365 {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(365)
    }
}
