use crate::time::TimeInterval;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Representa a taxa de retorno média sobre um [`TimeInterval`] específico.
///
/// Diferente do [`crate::metric::sharpe::SharpeRatio`], não é ajustada ao
/// risco — é simplesmente o retorno médio por período, útil como insumo
/// para outras métricas (ex: [`crate::metric::calmar::CalmarRatio`]).
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct RateOfReturn<Interval> {
    pub value: Decimal,
    pub interval: Interval,
}

impl<Interval> RateOfReturn<Interval>
where
    Interval: TimeInterval,
{
    pub fn calculate(mean_return: Decimal, returns_period: Interval) -> Self {
        Self {
            value: mean_return,
            interval: returns_period,
        }
    }

    /// Escala linearmente para o [`TimeInterval`] alvo (retornos médios se
    /// somam ao longo do tempo, diferente do desvio padrão que escala com
    /// a raiz quadrada do tempo).
    pub fn scale<TargetInterval>(self, target: TargetInterval) -> RateOfReturn<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let target_secs = Decimal::from(target.interval().num_seconds());
        let current_secs = Decimal::from(self.interval.interval().num_seconds());

        let scale = target_secs
            .abs()
            .checked_div(current_secs.abs())
            .unwrap_or(Decimal::MAX);

        RateOfReturn {
            value: self.value.checked_mul(scale).unwrap_or(Decimal::MAX),
            interval: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Annual365, Daily};
    use rust_decimal_macros::dec;

    #[test]
    fn scales_daily_return_to_annual() {
        let daily = RateOfReturn::calculate(dec!(0.001), Daily);
        let annual = daily.scale(Annual365);
        assert_eq!(annual.value, dec!(0.365));
    }
}
