//! Aggregate backtest metrics.

use rust_decimal::Decimal;

use bookwatch_analytics::algorithm::{downside_deviation, mean, returns_from_equity_curve, std_dev};
use bookwatch_analytics::metric::calmar::CalmarRatio;
use bookwatch_analytics::metric::profit_factor::ProfitFactor;
use bookwatch_analytics::metric::sharpe::SharpeRatio;
use bookwatch_analytics::metric::sortino::SortinoRatio;
use bookwatch_analytics::metric::win_rate::WinRate;
use bookwatch_analytics::time::Annual365;

use crate::error::BacktestError;
use crate::portfolio::Portfolio;
use crate::types::{EquityPoint, Trade};

/// The full set of performance metrics produced by one backtest run.
/// `data_unavailable`/`insufficient_capital_skips` are the "recorded,
/// not thrown" failure signals
#[derive(Debug, Clone, Default)]
pub struct BacktestResult {
    pub data_unavailable: bool,
    pub insufficient_capital_skips: u32,

    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return: Decimal,
    pub total_return_pct: Decimal,

    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub mean_win: Decimal,
    pub mean_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub profit_factor: Decimal,

    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub calmar_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_duration: chrono::TimeDelta,

    pub max_win_streak: u32,
    pub max_loss_streak: u32,
    pub avg_trade_duration: chrono::TimeDelta,

    pub trades: Vec<Trade>,
}

impl BacktestResult {
    pub fn data_unavailable(error: BacktestError) -> Self {
        tracing::warn!(%error, "backtest run recorded as data-unavailable");
        Self {
            data_unavailable: true,
            ..Self::default()
        }
    }

    /// Builds a full result from a finished portfolio. `risk_free_pct` is
    /// a whole percent (e.g. `2` means 2%), matching
    /// [`bookwatch_core::config::BacktestConfig`]'s convention.
    pub fn from_portfolio(portfolio: &Portfolio, risk_free_pct: Decimal, insufficient_capital_skips: u32) -> Self {
        let trades = portfolio.trades().to_vec();
        let equity: Vec<Decimal> = portfolio.equity_curve().iter().map(|p| p.equity).collect();

        let initial_capital = portfolio.initial_capital();
        let final_equity = equity.last().copied().unwrap_or(initial_capital);
        let total_return = final_equity - initial_capital;
        let total_return_pct = if initial_capital > Decimal::ZERO {
            (total_return / initial_capital) * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let winners: Vec<&Trade> = trades.iter().filter(|t| t.is_winner()).collect();
        let losers: Vec<&Trade> = trades.iter().filter(|t| !t.is_winner()).collect();

        let win_rate_pct = WinRate::calculate(Decimal::from(winners.len()), Decimal::from(trades.len()))
            .map(|w| w.value * Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::ZERO);
        let gross_profit: Decimal = winners.iter().map(|t| t.realized_pnl).sum();
        let gross_loss: Decimal = losers.iter().map(|t| t.realized_pnl).sum::<Decimal>().abs();
        let profit_factor = ProfitFactor::calculate(gross_profit, gross_loss)
            .map(|p| p.value)
            .unwrap_or(Decimal::ONE);

        let mean_win = mean(&winners.iter().map(|t| t.realized_pnl).collect::<Vec<_>>()).unwrap_or(Decimal::ZERO);
        let mean_loss = mean(&losers.iter().map(|t| t.realized_pnl).collect::<Vec<_>>()).unwrap_or(Decimal::ZERO);
        let largest_win = winners.iter().map(|t| t.realized_pnl).max().unwrap_or(Decimal::ZERO);
        let largest_loss = losers.iter().map(|t| t.realized_pnl).min().unwrap_or(Decimal::ZERO);

        // Windowless edge cases: fewer than two equity points or zero
        // volatility collapse every ratio to zero rather than dividing
        // by zero. The per-sample period is the equity curve's
        // average spacing; ratios are calculated at that period then
        // scaled to an annual figure via `TimeInterval::scale`.
        let returns = returns_from_equity_curve(&equity);
        let period = average_period(portfolio.equity_curve());
        let year_secs = Decimal::from(chrono::TimeDelta::days(365).num_seconds());
        let period_secs = Decimal::from(period.num_seconds().max(1));
        let risk_free_return = risk_free_pct / Decimal::ONE_HUNDRED * period_secs / year_secs;

        let (sharpe_ratio, sortino_ratio) = if returns.len() < 2 {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            let mean_return = mean(&returns).unwrap_or(Decimal::ZERO);
            let sharpe = match std_dev(&returns) {
                Some(sd) if sd > Decimal::ZERO => {
                    SharpeRatio::calculate(risk_free_return, mean_return, sd, period).scale(Annual365).value
                }
                _ => Decimal::ZERO,
            };
            let sortino = match downside_deviation(&returns, Decimal::ZERO) {
                Some(dd) if dd > Decimal::ZERO => {
                    SortinoRatio::calculate(risk_free_return, mean_return, dd, period).scale(Annual365).value
                }
                Some(_) => Decimal::MAX,
                None => Decimal::ZERO,
            };
            (sharpe, sortino)
        };

        let (max_drawdown, max_drawdown_duration) = match portfolio.max_drawdown() {
            Some(dd) => (dd.0.value, dd.0.duration()),
            None => (Decimal::ZERO, chrono::TimeDelta::zero()),
        };

        let calmar_ratio = if !returns.is_empty() {
            let mean_return = mean(&returns).unwrap_or(Decimal::ZERO);
            CalmarRatio::calculate(risk_free_return, mean_return, max_drawdown, period)
                .scale(Annual365)
                .value
        } else {
            Decimal::ZERO
        };

        let (max_win_streak, max_loss_streak) = win_loss_streaks(&trades);
        let avg_trade_duration = average_duration(&trades);

        Self {
            data_unavailable: false,
            insufficient_capital_skips,
            initial_capital,
            final_equity,
            total_return,
            total_return_pct,
            total_trades: trades.len(),
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate_pct,
            mean_win,
            mean_loss,
            largest_win,
            largest_loss,
            profit_factor,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            max_drawdown_duration,
            max_win_streak,
            max_loss_streak,
            avg_trade_duration,
            trades,
        }
    }
}

/// Average spacing between equity-curve samples; falls back to one day
/// when there are fewer than two samples to measure a gap from.
fn average_period(equity_curve: &[EquityPoint]) -> chrono::TimeDelta {
    if equity_curve.len() < 2 {
        return chrono::TimeDelta::days(1);
    }
    let total = equity_curve.last().unwrap().timestamp - equity_curve.first().unwrap().timestamp;
    let steps = (equity_curve.len() - 1) as i32;
    total / steps
}

fn win_loss_streaks(trades: &[Trade]) -> (u32, u32) {
    let mut max_win = 0u32;
    let mut max_loss = 0u32;
    let mut current_win = 0u32;
    let mut current_loss = 0u32;
    for trade in trades {
        if trade.is_winner() {
            current_win += 1;
            current_loss = 0;
        } else {
            current_loss += 1;
            current_win = 0;
        }
        max_win = max_win.max(current_win);
        max_loss = max_loss.max(current_loss);
    }
    (max_win, max_loss)
}

fn average_duration(trades: &[Trade]) -> chrono::TimeDelta {
    if trades.is_empty() {
        return chrono::TimeDelta::zero();
    }
    let total_secs: i64 = trades.iter().map(|t| t.duration().num_seconds()).sum();
    chrono::TimeDelta::seconds(total_secs / trades.len() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExitReason, PositionSide};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    fn t(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn single_winning_trade_matches_spec_s5_scenario() {
        let mut portfolio = Portfolio::new(dec!(10000), t(0));
        portfolio.open_position(
            SmolStr::new("BTCUSDT"),
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
        portfolio.update(dec!(100), t(1));
        portfolio.close_position(0, t(2), dec!(103), Decimal::ZERO, Decimal::ZERO, ExitReason::TakeProfit);
        portfolio.update(dec!(103), t(2));
        portfolio.finalize_drawdown();

        let result = BacktestResult::from_portfolio(&portfolio, dec!(2), 0);
        assert_eq!(result.total_trades, 1);
        assert_eq!(result.winning_trades, 1);
        assert_eq!(result.win_rate_pct, dec!(100));
        assert_eq!(result.profit_factor, Decimal::MAX);
        assert_eq!(result.max_drawdown, Decimal::ZERO);
        assert!((result.total_return_pct - dec!(0.30)).abs() < dec!(0.01));
    }

    #[test]
    fn win_loss_streaks_count_consecutive_runs() {
        let win = |pnl: Decimal| Trade {
            symbol: SmolStr::new("X"),
            side: PositionSide::Long,
            entry_time: t(0),
            entry_price: dec!(1),
            exit_time: t(1),
            exit_price: dec!(1),
            size: dec!(1),
            realized_pnl: pnl,
            pnl_pct: Decimal::ZERO,
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            exit_reason: ExitReason::TakeProfit,
            metadata: Default::default(),
        };
        let trades = vec![win(dec!(1)), win(dec!(1)), win(dec!(-1)), win(dec!(-1)), win(dec!(-1)), win(dec!(1))];
        let (max_win, max_loss) = win_loss_streaks(&trades);
        assert_eq!(max_win, 2);
        assert_eq!(max_loss, 3);
    }
}
