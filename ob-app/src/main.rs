//! Bookwatch binary: loads configuration, then either runs the live
//! pipeline (`run`) or replays a historical window through a strategy
//! (`run-backtest`).

mod backtest_cmd;
mod cli;
mod error;
mod run;

use clap::Parser;
use cli::{Cli, Command};
use error::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    bookwatch_core::logging::init_logging();

    let cli = Cli::parse();
    let raw = std::fs::read_to_string(&cli.config).map_err(|e| AppError::ConfigRead {
        path: cli.config.display().to_string(),
        reason: e.to_string(),
    })?;
    let config = bookwatch_core::config::Config::from_toml_str(&raw)?;

    match cli.command {
        Command::Run => run::run(config).await,
        Command::RunBacktest { symbol, start, end, capital, strategy } => {
            backtest_cmd::run(&config, symbol, start, end, capital, strategy).await
        }
    }
}
