use crate::time::TimeInterval;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Risk-adjusted return over one [`TimeInterval`]: excess return (mean
/// return above the risk-free rate) divided by the return series'
/// standard deviation.
///
/// Undefined at zero volatility — that's treated as an unbounded ratio
/// rather than a division error, so `value` saturates to `Decimal::MAX`
/// instead of the calculation failing.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SharpeRatio<Interval> {
    pub value: Decimal,
    pub interval: Interval,
}

impl<Interval> SharpeRatio<Interval>
where
    Interval: TimeInterval,
{
    pub fn calculate(risk_free_return: Decimal, mean_return: Decimal, std_dev_returns: Decimal, returns_period: Interval) -> Self {
        let value = if std_dev_returns.is_zero() {
            Decimal::MAX
        } else {
            let excess_returns = mean_return - risk_free_return;
            excess_returns.checked_div(std_dev_returns).unwrap()
        };
        Self {
            value,
            interval: returns_period,
        }
    }

    /// Re-expresses this ratio as if it had been measured over
    /// `target` instead, scaling by `sqrt(target_seconds / self_seconds)`
    /// under the assumption that period returns are IID.
    pub fn scale<TargetInterval>(self, target: TargetInterval) -> SharpeRatio<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let target_secs = Decimal::from(target.interval().num_seconds()).abs();
        let current_secs = Decimal::from(self.interval.interval().num_seconds()).abs();
        let scale_factor = target_secs
            .checked_div(current_secs)
            .unwrap_or(Decimal::MAX)
            .sqrt()
            .expect("interval seconds are always positive");

        SharpeRatio {
            value: self.value.checked_mul(scale_factor).unwrap_or(Decimal::MAX),
            interval: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Annual252, Daily};
    use chrono::TimeDelta;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_volatility_saturates_to_max() {
        let result = SharpeRatio::calculate(dec!(0.001), dec!(0.002), dec!(0.0), TimeDelta::hours(2));
        assert_eq!(result.value, Decimal::MAX);
    }

    #[test]
    fn arbitrary_interval_matches_hand_computed_ratio() {
        let period = TimeDelta::hours(2);
        let actual = SharpeRatio::calculate(dec!(0.0015), dec!(0.0025), dec!(0.02), period);
        assert_eq!(actual.value, dec!(0.05));
        assert_eq!(actual.interval, period);
    }

    #[test]
    fn named_interval_matches_hand_computed_ratio() {
        let actual = SharpeRatio::calculate(dec!(0.0015), dec!(0.0025), dec!(0.02), Daily);
        assert_eq!(actual.value, dec!(0.05));
        assert_eq!(actual.interval, Daily);
    }

    #[test]
    fn scaling_daily_to_annual_252() {
        let daily = SharpeRatio { value: dec!(0.05), interval: Daily };
        let annualized = daily.scale(Annual252);
        assert_eq!(annualized.value, dec!(0.7937253933193771771504847261));
        assert_eq!(annualized.interval, Annual252);
    }
}
