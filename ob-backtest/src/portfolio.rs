//! Position sizing, cash accounting, and equity-curve tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use smol_str::SmolStr;

use bookwatch_analytics::metric::drawdown::max::{MaxDrawdown, MaxDrawdownGenerator};
use bookwatch_analytics::metric::drawdown::DrawdownGenerator;

use crate::execution::ExecutionSimulator;
use crate::types::{EquityPoint, ExitReason, Position, PositionSide, Trade};

/// Tracks cash, open positions, closed trades, and the equity curve for a
/// single backtest run. One `Portfolio` per run; never shared.
#[derive(Debug)]
pub struct Portfolio {
    initial_capital: Decimal,
    cash: Decimal,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    drawdown: DrawdownGenerator,
    max_drawdown: MaxDrawdownGenerator,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal, start_time: DateTime<Utc>) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: Vec::new(),
            trades: Vec::new(),
            equity_curve: vec![EquityPoint {
                timestamp: start_time,
                cash: initial_capital,
                unrealized_pnl: Decimal::ZERO,
                equity: initial_capital,
            }],
            drawdown: DrawdownGenerator::init(initial_capital, start_time),
            max_drawdown: MaxDrawdownGenerator::default(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn max_drawdown(&self) -> Option<MaxDrawdown> {
        self.max_drawdown.generate()
    }

    /// Current equity: cash plus unrealized PnL across open positions
    /// (Python `Portfolio.equity`).
    pub fn equity(&self) -> Decimal {
        self.cash
            + self
                .positions
                .iter()
                .map(|p| p.unrealized_pnl)
                .sum::<Decimal>()
    }

    /// `min(fixed_fraction_size, risk_bounded_size)` — the more conservative
    /// of the two sizing methods.
    ///
    /// All `*_pct` arguments are whole percentages (`10` means 10%),
    /// matching [`bookwatch_core::config::BacktestConfig`]'s convention.
    pub fn calculate_position_size(
        &self,
        price: Decimal,
        position_size_pct: Decimal,
        max_risk_per_trade_pct: Decimal,
        stop_loss_pct: Option<Decimal>,
    ) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let equity = self.equity();
        let fixed_fraction_size = (equity * position_size_pct / Decimal::ONE_HUNDRED) / price;

        let risk_bounded_size = match stop_loss_pct.filter(|p| *p > Decimal::ZERO) {
            Some(sl_pct) => {
                let risk_budget = equity * max_risk_per_trade_pct / Decimal::ONE_HUNDRED;
                let loss_per_unit = price * sl_pct / Decimal::ONE_HUNDRED;
                if loss_per_unit > Decimal::ZERO {
                    risk_budget / loss_per_unit
                } else {
                    fixed_fraction_size
                }
            }
            None => fixed_fraction_size,
        };

        fixed_fraction_size.min(risk_bounded_size).max(Decimal::ZERO)
    }

    pub fn can_open_position(&self, notional: Decimal, max_positions: usize) -> bool {
        self.positions.len() < max_positions && notional <= self.equity()
    }

    /// Debits cash by the entry commission and slippage only — exposure
    /// notional is tracked via unrealized PnL, not moved out of cash
    /// (`equity = cash + sum(unrealized_pnl)`).
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &mut self,
        symbol: SmolStr,
        side: PositionSide,
        entry_time: DateTime<Utc>,
        entry_price: Decimal,
        size: Decimal,
        commission: Decimal,
        slippage: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        timeout: Option<DateTime<Utc>>,
        metadata: std::collections::HashMap<String, String>,
    ) {
        self.cash -= commission + slippage;
        self.positions.push(Position {
            symbol,
            side,
            entry_time,
            entry_price,
            size,
            stop_loss,
            take_profit,
            timeout,
            entry_commission: commission,
            entry_slippage: slippage,
            unrealized_pnl: Decimal::ZERO,
            metadata,
        });
    }

    /// Closes the position at `index`: the price-move PnL (net of this
    /// fill's commission/slippage) flows into cash, and a [`Trade`] with
    /// the *total* (entry + exit) costs netted out is recorded.
    pub fn close_position(
        &mut self,
        index: usize,
        exit_time: DateTime<Utc>,
        exit_price: Decimal,
        commission: Decimal,
        slippage: Decimal,
        reason: ExitReason,
    ) -> Trade {
        let position = self.positions.remove(index);

        let price_move_pnl = match position.side {
            PositionSide::Long => (exit_price - position.entry_price) * position.size,
            PositionSide::Short => (position.entry_price - exit_price) * position.size,
        };

        self.cash += price_move_pnl - commission - slippage;

        let total_costs = position.entry_commission + position.entry_slippage + commission + slippage;
        let realized_pnl = price_move_pnl - total_costs;

        let cost_basis = position.entry_price * position.size;
        let pnl_pct = if cost_basis > Decimal::ZERO {
            (realized_pnl / cost_basis) * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let trade = Trade {
            symbol: position.symbol,
            side: position.side,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time,
            exit_price,
            size: position.size,
            realized_pnl,
            pnl_pct,
            commission: position.entry_commission + commission,
            slippage: position.entry_slippage + slippage,
            exit_reason: reason,
            metadata: position.metadata,
        };
        self.trades.push(trade.clone());
        trade
    }

    /// Force-closes every open position, e.g. at the end of a run. Each
    /// exit is simulated as a real market fill against its own side
    /// rather than assumed free, matching every other exit path.
    pub fn close_all_positions(
        &mut self,
        exit_time: DateTime<Utc>,
        exit_price: Decimal,
        spread: Decimal,
        execution: &ExecutionSimulator,
        reason: ExitReason,
    ) -> Vec<Trade> {
        let mut closed = Vec::new();
        while !self.positions.is_empty() {
            let position = &self.positions[0];
            let fill = match position.side {
                PositionSide::Long => execution.simulate_market_sell(exit_price, spread, position.size),
                PositionSide::Short => execution.simulate_market_buy(exit_price, spread, position.size),
            };
            closed.push(self.close_position(0, exit_time, fill.price, fill.commission, fill.slippage, reason));
        }
        closed
    }

    /// Marks open positions to `current_price`, appends an equity-curve
    /// sample, and feeds the drawdown generators.
    pub fn update(&mut self, current_price: Decimal, timestamp: DateTime<Utc>) {
        for position in &mut self.positions {
            position.update_pnl(current_price);
        }

        let unrealized_pnl: Decimal = self.positions.iter().map(|p| p.unrealized_pnl).sum();
        let equity = self.cash + unrealized_pnl;

        self.equity_curve.push(EquityPoint {
            timestamp,
            cash: self.cash,
            unrealized_pnl,
            equity,
        });

        if let Some(drawdown) = self.drawdown_update(equity, timestamp) {
            self.max_drawdown.update(&drawdown);
        }
    }

    fn drawdown_update(
        &mut self,
        equity: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Option<bookwatch_analytics::metric::drawdown::Drawdown> {
        self.drawdown.update(equity, timestamp)
    }

    /// Folds in whatever drawdown was still open when the run ended.
    pub fn finalize_drawdown(&mut self) {
        if let Some(drawdown) = self.drawdown.generate() {
            self.max_drawdown.update(&drawdown);
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn opening_and_closing_a_long_position_realizes_pnl() {
        let mut portfolio = Portfolio::new(dec!(10000), t(0));
        portfolio.open_position(
            "BTCUSDT".into(),
            PositionSide::Long,
            t(1),
            dec!(100),
            dec!(10),
            Decimal::ZERO,
            Decimal::ZERO,
            None,
            None,
            None,
            Default::default(),
        );
        assert_eq!(portfolio.cash(), dec!(10000));

        let trade = portfolio.close_position(0, t(2), dec!(103), Decimal::ZERO, Decimal::ZERO, ExitReason::TakeProfit);
        assert_eq!(trade.realized_pnl, dec!(30));
        assert_eq!(trade.pnl_pct, dec!(3.0));
        assert_eq!(portfolio.cash(), dec!(10030));
        assert!(portfolio.positions().is_empty());
    }

    #[test]
    fn position_size_takes_the_more_conservative_of_the_two_methods() {
        let portfolio = Portfolio::new(dec!(10000), t(0));
        let size = portfolio.calculate_position_size(dec!(100), dec!(10), dec!(1), Some(dec!(1.5)));
        // fixed-fraction: (10000*10%)/100 = 10; risk-bounded: (10000*1%)/(100*1.5%) = 66.67
        assert_eq!(size, dec!(10));
    }

    #[test]
    fn update_tracks_equity_and_drawdown() {
        let mut portfolio = Portfolio::new(dec!(10000), t(0));
        portfolio.update(dec!(10000), t(1));
        portfolio.update(dec!(9000), t(2));
        portfolio.update(dec!(9500), t(3));
        portfolio.finalize_drawdown();
        let max_dd = portfolio.max_drawdown().expect("a drawdown occurred");
        assert_eq!(max_dd.0.value, dec!(1000));
    }
}
