//! Fill simulation: spread crossing, slippage, and taker/maker fees.

use bookwatch_core::config::{BacktestConfig, SlippageModel};
use rust_decimal::Decimal;
use tracing::warn;

/// One simulated fill: the price actually paid/received plus the costs
/// broken out separately so the portfolio can account for them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub price: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
}

/// Simulates taker fills against a quote's mid/spread using a configured
/// fee and slippage model. Stateless beyond its configuration.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    taker_fee_pct: Decimal,
    maker_fee_pct: Decimal,
    slippage_model: SlippageModel,
    slippage_pct: Decimal,
}

impl ExecutionSimulator {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            taker_fee_pct: config.taker_fee_pct,
            maker_fee_pct: config.maker_fee_pct,
            slippage_model: config.slippage_model,
            slippage_pct: config.slippage_pct,
        }
    }

    /// Fills a market buy at `mid + half_spread + slippage`, taker fee on
    /// notional.
    pub fn simulate_market_buy(&self, mid_price: Decimal, spread: Decimal, size: Decimal) -> Fill {
        let half_spread = spread / Decimal::TWO;
        let slippage_amount = self.calculate_slippage(mid_price, size);
        let price = mid_price + half_spread + slippage_amount;
        let commission = price * size * self.taker_fee_pct / Decimal::ONE_HUNDRED;
        Fill {
            price,
            commission,
            slippage: slippage_amount * size,
        }
    }

    /// Fills a market sell at `mid - half_spread - slippage`, taker fee on
    /// notional.
    pub fn simulate_market_sell(&self, mid_price: Decimal, spread: Decimal, size: Decimal) -> Fill {
        let half_spread = spread / Decimal::TWO;
        let slippage_amount = self.calculate_slippage(mid_price, size);
        let price = mid_price - half_spread - slippage_amount;
        let commission = price * size * self.taker_fee_pct / Decimal::ONE_HUNDRED;
        Fill {
            price,
            commission,
            slippage: slippage_amount * size,
        }
    }

    /// A resting (maker) fill at exactly the requested price — used for
    /// stop-loss/take-profit/timeout exits, which this engine treats as
    /// already-at-the-trigger-price executions.
    pub fn simulate_maker_fill(&self, price: Decimal, size: Decimal) -> Fill {
        Fill {
            price,
            commission: price * size * self.maker_fee_pct / Decimal::ONE_HUNDRED,
            slippage: Decimal::ZERO,
        }
    }

    /// Per-unit slippage. Fixed: `price * slippage_pct`. VolumeBased scales
    /// that up with size (`price * slippage_pct * (1 + min(size*0.1, 2.0))`).
    /// Orderbook is unimplemented here — no order-book depth is available
    /// to a single-symbol quote+whale-event replay — and falls back to
    /// VolumeBased with a warning.
    fn calculate_slippage(&self, price: Decimal, size: Decimal) -> Decimal {
        let base = price * self.slippage_pct / Decimal::ONE_HUNDRED;
        match self.slippage_model {
            SlippageModel::Fixed => base,
            SlippageModel::VolumeBased => {
                let multiplier = Decimal::ONE + (size * Decimal::new(1, 1)).min(Decimal::TWO);
                base * multiplier
            }
            SlippageModel::Orderbook => {
                warn!("orderbook slippage model requested but not available in replay mode; using volume_based");
                let multiplier = Decimal::ONE + (size * Decimal::new(1, 1)).min(Decimal::TWO);
                base * multiplier
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(model: SlippageModel) -> BacktestConfig {
        BacktestConfig {
            slippage_model: model,
            slippage_pct: dec!(0.02),
            taker_fee_pct: dec!(0.06),
            maker_fee_pct: dec!(0.02),
            ..Default::default()
        }
    }

    #[test]
    fn market_buy_fills_above_mid() {
        let sim = ExecutionSimulator::from_config(&config(SlippageModel::Fixed));
        let fill = sim.simulate_market_buy(dec!(100), dec!(0.2), dec!(1));
        assert!(fill.price > dec!(100));
        assert!(fill.commission > Decimal::ZERO);
    }

    #[test]
    fn market_sell_fills_below_mid() {
        let sim = ExecutionSimulator::from_config(&config(SlippageModel::Fixed));
        let fill = sim.simulate_market_sell(dec!(100), dec!(0.2), dec!(1));
        assert!(fill.price < dec!(100));
    }

    #[test]
    fn volume_based_slippage_grows_with_size() {
        let sim = ExecutionSimulator::from_config(&config(SlippageModel::VolumeBased));
        let small = sim.simulate_market_buy(dec!(100), Decimal::ZERO, dec!(1));
        let large = sim.simulate_market_buy(dec!(100), Decimal::ZERO, dec!(50));
        assert!(large.price - dec!(100) > small.price - dec!(100));
    }

    #[test]
    fn orderbook_model_falls_back_to_volume_based() {
        let ob_sim = ExecutionSimulator::from_config(&config(SlippageModel::Orderbook));
        let vb_sim = ExecutionSimulator::from_config(&config(SlippageModel::VolumeBased));
        let ob_fill = ob_sim.simulate_market_buy(dec!(100), Decimal::ZERO, dec!(5));
        let vb_fill = vb_sim.simulate_market_buy(dec!(100), Decimal::ZERO, dec!(5));
        assert_eq!(ob_fill.price, vb_fill.price);
    }
}
