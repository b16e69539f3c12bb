use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fraction of trades that closed in profit, in `[0, 1]`.
///
/// `None` when there were no trades to judge (`total == 0`) rather than
/// a manufactured zero — a strategy that never traded has no win rate,
/// good or bad.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct WinRate {
    pub value: Decimal,
}

impl WinRate {
    pub fn calculate(wins: Decimal, total: Decimal) -> Option<Self> {
        if total.is_zero() {
            return None;
        }
        let value = wins.abs().checked_div(total.abs())?;
        Some(Self { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_trades_has_no_win_rate() {
        assert_eq!(WinRate::calculate(Decimal::ZERO, Decimal::ZERO), None);
    }

    #[test]
    fn every_trade_won() {
        assert_eq!(WinRate::calculate(Decimal::TEN, Decimal::TEN).unwrap().value, Decimal::ONE);
    }

    #[test]
    fn no_trade_won() {
        assert_eq!(WinRate::calculate(Decimal::ZERO, Decimal::TEN).unwrap().value, Decimal::ZERO);
    }

    #[test]
    fn majority_winners() {
        assert_eq!(WinRate::calculate(dec!(6), Decimal::TEN).unwrap().value, dec!(0.6));
    }
}
