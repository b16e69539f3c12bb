//! Command-line surface: a config path plus one verb. CLI argument
//! plumbing beyond that is intentionally minimal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookwatch", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "bookwatch.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the live pipeline: L1 feed -> C1 book diff -> {L2 sink, C2 detector}.
    Run,

    /// Replay historical quotes/whale events through a strategy (C3).
    RunBacktest {
        /// Symbol to replay, e.g. BTC_USDT.
        #[arg(long)]
        symbol: String,

        /// Window start, RFC 3339 (e.g. 2024-01-01T00:00:00Z).
        #[arg(long)]
        start: String,

        /// Window end, RFC 3339.
        #[arg(long)]
        end: String,

        /// Starting capital.
        #[arg(long, default_value = "10000")]
        capital: rust_decimal::Decimal,

        /// One of: whale-following, momentum-reversal, deep-fill-reversal.
        #[arg(long, default_value = "deep-fill-reversal")]
        strategy: String,
    },
}
