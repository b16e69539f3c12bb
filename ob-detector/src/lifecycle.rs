//! `OrderLifecycle`: tracks a single whale-sized resting order from the
//! moment it enters the top of book until it leaves, so the detector can
//! tell a flash order (placed, then pulled before any real fill) from an
//! order that traded down naturally.

use bookwatch_core::types::EventSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use smol_str::SmolStr;

/// Where a lifecycle currently sits. Terminal once `Filled` or
/// `Cancelled` — a closed lifecycle never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    Active,
    Filled,
    Cancelled,
}

/// Synthetic order identity for level-2 data, which carries no real
/// order IDs: `(symbol, side, price, volume bucket)`. The opening volume
/// is truncated to its integer part so ordinary partial-fill jitter
/// doesn't mint a new identity for what is observably the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId {
    pub symbol: SmolStr,
    pub side: EventSide,
    pub price: Decimal,
    pub volume_bucket: Decimal,
}

impl OrderId {
    pub fn new(symbol: SmolStr, side: EventSide, price: Decimal, opened_volume: Decimal) -> Self {
        Self {
            symbol,
            side,
            price,
            volume_bucket: opened_volume.trunc(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderLifecycle {
    pub order_id: OrderId,
    pub side: EventSide,
    pub price: Decimal,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub opened_volume: Decimal,
    pub opened_usd: Decimal,
    pub cumulative_decrease: Decimal,
    pub modifications: u32,
    pub status: LifecycleStatus,
    pub closed_at: Option<DateTime<Utc>>,
}

impl OrderLifecycle {
    pub fn open(symbol: SmolStr, side: EventSide, price: Decimal, volume: Decimal, usd_value: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            order_id: OrderId::new(symbol, side, price, volume),
            side,
            price,
            first_seen: at,
            last_seen: at,
            opened_volume: volume,
            opened_usd: usd_value,
            cumulative_decrease: Decimal::ZERO,
            modifications: 0,
            status: LifecycleStatus::Active,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == LifecycleStatus::Active
    }

    /// Fraction of the originally placed volume that was ever drained by
    /// observed `decrease` events, before the level left the top of book.
    pub fn decrease_fraction(&self) -> Decimal {
        if self.opened_volume.is_zero() {
            return Decimal::ZERO;
        }
        (self.cumulative_decrease / self.opened_volume).min(Decimal::ONE)
    }

    /// Records an observed volume decrease against the resting order.
    pub fn record_decrease(&mut self, volume: Decimal, at: DateTime<Utc>) {
        self.cumulative_decrease += volume;
        self.last_seen = at;
        self.modifications += 1;
    }

    /// Closes the lifecycle. Most of the resting volume having drained
    /// via observed decreases is taken as evidence the order filled
    /// rather than was pulled; `decrease_fraction() < 50%` at close time
    /// is recorded as `Cancelled`.
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.last_seen = at;
        self.closed_at = Some(at);
        self.status = if self.decrease_fraction() >= Decimal::new(50, 2) {
            LifecycleStatus::Filled
        } else {
            LifecycleStatus::Cancelled
        };
    }

    /// A flash order: closed within `window` of opening, with less than
    /// 10% of its volume ever drained by observed fills/cancels.
    pub fn is_flash(&self, closed_at: DateTime<Utc>, window: chrono::Duration) -> bool {
        closed_at - self.first_seen <= window && self.decrease_fraction() < Decimal::new(10, 2)
    }

    /// How long the order rested before closing; `None` while still active.
    pub fn estimated_lifespan(&self) -> Option<chrono::Duration> {
        self.closed_at.map(|closed| closed - self.first_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(secs)
    }

    #[test]
    fn closing_with_little_drain_is_cancelled() {
        let mut lc = OrderLifecycle::open(SmolStr::new("BTC_USDT"), EventSide::Bid, dec!(100), dec!(10), dec!(1000), t(0));
        lc.record_decrease(dec!(1), t(1));
        lc.close(t(2));
        assert_eq!(lc.status, LifecycleStatus::Cancelled);
        assert_eq!(lc.estimated_lifespan(), Some(Duration::seconds(2)));
    }

    #[test]
    fn closing_after_heavy_drain_is_filled() {
        let mut lc = OrderLifecycle::open(SmolStr::new("BTC_USDT"), EventSide::Bid, dec!(100), dec!(10), dec!(1000), t(0));
        lc.record_decrease(dec!(8), t(5));
        lc.close(t(6));
        assert_eq!(lc.status, LifecycleStatus::Filled);
    }

    #[test]
    fn order_id_buckets_partial_fill_jitter() {
        let a = OrderId::new(SmolStr::new("BTC_USDT"), EventSide::Bid, dec!(100), dec!(10.4));
        let b = OrderId::new(SmolStr::new("BTC_USDT"), EventSide::Bid, dec!(100), dec!(10.9));
        assert_eq!(a, b);
    }
}
