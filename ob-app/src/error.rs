use thiserror::Error;

/// Errors surfaced at the binary's top level: config loading, subcommand
/// wiring and anything the component crates bubble up uncaught.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file {path}: {reason}")]
    ConfigRead { path: String, reason: String },

    #[error(transparent)]
    ConfigInvalid(#[from] bookwatch_core::error::Error),

    #[error("invalid command-line timestamp {0:?}: {1}")]
    BadTimestamp(String, chrono::ParseError),

    #[error(transparent)]
    Backtest(#[from] bookwatch_backtest::BacktestError),

    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),
}
