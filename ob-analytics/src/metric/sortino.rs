use crate::time::TimeInterval;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Representa o Sortino Ratio sobre um [`TimeInterval`] específico.
///
/// Variante do [`crate::metric::sharpe::SharpeRatio`] que penaliza apenas a
/// volatilidade de baixa (downside deviation), ignorando oscilações para
/// cima — mais adequado quando a distribuição de retornos não é simétrica.
///
/// Referência: <https://www.investopedia.com/terms/s/sortinoratio.asp>
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SortinoRatio<Interval> {
    pub value: Decimal,
    pub interval: Interval,
}

impl<Interval> SortinoRatio<Interval>
where
    Interval: TimeInterval,
{
    pub fn calculate(
        risk_free_return: Decimal,
        mean_return: Decimal,
        downside_deviation: Decimal,
        returns_period: Interval,
    ) -> Self {
        if downside_deviation.is_zero() {
            Self {
                value: Decimal::MAX,
                interval: returns_period,
            }
        } else {
            let excess_returns = mean_return - risk_free_return;
            let ratio = excess_returns.checked_div(downside_deviation).unwrap();
            Self {
                value: ratio,
                interval: returns_period,
            }
        }
    }

    /// Escala do intervalo atual para o [`TimeInterval`] alvo, assumindo
    /// retornos IID (mesma convenção usada pelo Sharpe).
    pub fn scale<TargetInterval>(self, target: TargetInterval) -> SortinoRatio<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let target_secs = Decimal::from(target.interval().num_seconds());
        let current_secs = Decimal::from(self.interval.interval().num_seconds());

        let scale = target_secs
            .abs()
            .checked_div(current_secs.abs())
            .unwrap_or(Decimal::MAX)
            .sqrt()
            .expect("ensured seconds are positive");

        SortinoRatio {
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
    fn zero_downside_deviation_yields_max() {
        let result = SortinoRatio::calculate(dec!(0.001), dec!(0.002), dec!(0), Daily);
        assert_eq!(result.value, Decimal::MAX);
    }

    #[test]
    fn calculate_with_nonzero_downside_deviation() {
        let result = SortinoRatio::calculate(dec!(0.0015), dec!(0.0025), dec!(0.01), Daily);
        assert_eq!(result.value, dec!(0.1));
    }
}
