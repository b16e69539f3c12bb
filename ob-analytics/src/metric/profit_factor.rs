use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Gross profit divided by gross loss (both taken as absolute values).
/// Above 1 means the winners outweighed the losers.
///
/// Three edge cases, none of them an error:
/// - no profit and no loss at all: `None`, there's nothing to divide
/// - loss is zero, profit is not: `Decimal::MAX` (no downside observed)
/// - profit is zero, loss is not: `Decimal::MIN` (pure downside)
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct ProfitFactor {
    pub value: Decimal,
}

impl ProfitFactor {
    pub fn calculate(gross_profit: Decimal, gross_loss: Decimal) -> Option<Self> {
        let value = match (gross_profit.is_zero(), gross_loss.is_zero()) {
            (true, true) => return None,
            (_, true) => Decimal::MAX,
            (true, _) => Decimal::MIN,
            (false, false) => gross_profit.abs().checked_div(gross_loss.abs())?,
        };
        Some(Self { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn tiny_profit_and_loss_cancel_to_one() {
        let tiny = Decimal::from_scientific("1e-20").unwrap();
        assert_eq!(ProfitFactor::calculate(tiny, tiny).unwrap().value, Decimal::ONE);
    }

    #[test]
    fn huge_profit_and_loss_cancel_to_one() {
        let half_max = Decimal::MAX / dec!(2);
        assert_eq!(ProfitFactor::calculate(half_max, half_max).unwrap().value, Decimal::ONE);
    }

    #[test]
    fn no_activity_has_no_factor() {
        assert_eq!(ProfitFactor::calculate(dec!(0.0), dec!(0.0)), None);
    }

    #[test]
    fn pure_downside_is_min() {
        assert_eq!(ProfitFactor::calculate(dec!(0.0), dec!(1.0)).unwrap().value, Decimal::MIN);
    }

    #[test]
    fn no_downside_is_max() {
        assert_eq!(ProfitFactor::calculate(dec!(1.0), dec!(0.0)).unwrap().value, Decimal::MAX);
    }

    #[test]
    fn ordinary_mix() {
        assert_eq!(ProfitFactor::calculate(dec!(10.0), dec!(5.0)).unwrap().value, dec!(2.0));
    }

    #[test]
    fn loss_input_need_not_be_pre_abs() {
        assert_eq!(ProfitFactor::calculate(dec!(10.0), dec!(-5.0)).unwrap().value, dec!(2.0));
    }

    #[test]
    fn preserves_full_decimal_precision() {
        assert_eq!(
            ProfitFactor::calculate(dec!(10.5555), dec!(5.2345)).unwrap().value,
            Decimal::from_str("2.016524978507975928933040405").unwrap()
        );
    }
}
