use crate::time::TimeInterval;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Representa o Calmar Ratio sobre um [`TimeInterval`] específico.
///
/// Compara o retorno em excesso com o maior drawdown observado no mesmo
/// período, no lugar do desvio padrão usado pelo
/// [`crate::metric::sharpe::SharpeRatio`] — penaliza perdas profundas e
/// prolongadas mais do que a volatilidade comum.
///
/// Referência: <https://www.investopedia.com/terms/c/calmarratio.asp>
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct CalmarRatio<Interval> {
    pub value: Decimal,
    pub interval: Interval,
}

impl<Interval> CalmarRatio<Interval>
where
    Interval: TimeInterval,
{
    /// `max_drawdown` must be passed as a positive magnitude (as produced
    /// by [`crate::metric::drawdown::Drawdown::value`]).
    pub fn calculate(
        risk_free_return: Decimal,
        mean_return: Decimal,
        max_drawdown: Decimal,
        returns_period: Interval,
    ) -> Self {
        if max_drawdown.is_zero() {
            Self {
                value: Decimal::MAX,
                interval: returns_period,
            }
        } else {
            let excess_returns = mean_return - risk_free_return;
            let ratio = excess_returns.checked_div(max_drawdown.abs()).unwrap();
            Self {
                value: ratio,
                interval: returns_period,
            }
        }
    }

    pub fn scale<TargetInterval>(self, target: TargetInterval) -> CalmarRatio<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let target_secs = Decimal::from(target.interval().num_seconds());
        let current_secs = Decimal::from(self.interval.interval().num_seconds());

        let scale = target_secs
            .abs()
            .checked_div(current_secs.abs())
            .unwrap_or(Decimal::MAX);

        CalmarRatio {
            value: self.value.checked_mul(scale).unwrap_or(Decimal::MAX),
            interval: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Daily;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_drawdown_yields_max() {
        let result = CalmarRatio::calculate(dec!(0.001), dec!(0.002), dec!(0), Daily);
        assert_eq!(result.value, Decimal::MAX);
    }

    #[test]
    fn calculate_with_nonzero_drawdown() {
        let result = CalmarRatio::calculate(dec!(0.0015), dec!(0.0025), dec!(0.05), Daily);
        assert_eq!(result.value, dec!(0.02));
    }
}
