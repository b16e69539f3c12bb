//! `run-backtest`: replays a historical window through one of the
//! built-in strategy variants and prints the resulting metrics.

use std::sync::Arc;

use bookwatch_backtest::engine::{BacktestEngine, BacktestParams};
use bookwatch_backtest::store::{CachedStore, HistoricalStore, InfluxStore};
use bookwatch_backtest::strategy::{DeepFillReversal, MomentumReversal, Strategy, WhaleFollowing};
use bookwatch_core::config::Config;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use smol_str::SmolStr;
use tracing::info;

use crate::error::AppError;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &Config,
    symbol: String,
    start: String,
    end: String,
    capital: Decimal,
    strategy_name: String,
) -> Result<(), AppError> {
    let start = parse_timestamp(&start)?;
    let end = parse_timestamp(&end)?;

    let mut strategy = build_strategy(&strategy_name)?;

    let store: Arc<dyn HistoricalStore> = Arc::new(CachedStore::new(
        Arc::new(InfluxStore::new(config.sink.clone())),
        config.backtest.cache_ttl(),
    ));
    let engine = BacktestEngine::new(store);
    let params = BacktestParams {
        symbol: SmolStr::new(&symbol),
        start,
        end,
        initial_capital: capital,
        config: config.backtest.clone(),
    };

    let result = engine.run(&params, strategy.as_mut()).await?;

    if result.data_unavailable {
        info!(symbol = %symbol, "no historical data for the requested window");
        return Ok(());
    }

    info!(
        trades = result.total_trades,
        win_rate_pct = %result.win_rate_pct,
        total_return_pct = %result.total_return_pct,
        sharpe_ratio = %result.sharpe_ratio,
        max_drawdown = %result.max_drawdown,
        insufficient_capital_skips = result.insufficient_capital_skips,
        "backtest complete"
    );
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::BadTimestamp(raw.to_string(), e))
}

fn build_strategy(name: &str) -> Result<Box<dyn Strategy>, AppError> {
    match name {
        "whale-following" => Ok(Box::new(WhaleFollowing {
            min_usd: dec!(100_000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
            timeout_seconds: 3_600,
        })),
        "momentum-reversal" => Ok(Box::new(MomentumReversal::new(
            50,
            dec!(10_000),
            dec!(2.0),
            dec!(1.5),
            dec!(3.0),
            1_800,
        ))),
        "deep-fill-reversal" => Ok(Box::new(DeepFillReversal {
            min_distance_from_mid_pct: dec!(0.1),
            min_market_sell_usd: dec!(100_000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
        })),
        other => Err(AppError::UnknownStrategy(other.to_string())),
    }
}
