use thiserror::Error;

/// C3 backtest errors.
///
/// `DataUnavailable` and `InsufficientCapital` are *recorded, not
/// thrown* `BacktestEngine::run` never returns them as
/// `Err`, it surfaces them via [`crate::result::BacktestResult`] fields.
/// The variants exist so internal plumbing has a typed value to
/// construct and log.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no quote/whale-event data for {symbol} in [{start}, {end}]")]
    DataUnavailable {
        symbol: String,
        start: String,
        end: String,
    },

    #[error("insufficient capital: need {needed}, have {available}")]
    InsufficientCapital {
        needed: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("invalid backtest config: {0}")]
    ConfigInvalid(String),

    #[error("historical store request failed: {0}")]
    Store(String),
}
