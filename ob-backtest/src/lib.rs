//! # Backtest Engine (C3)
//!
//! A deterministic, single-symbol replay of quotes and whale events
//! against a pluggable [`strategy::Strategy`], producing a
//! [`result::BacktestResult`] of performance metrics. One run is a pure
//! function of `(symbol, time window, strategy, config)` — no shared
//! mutable state outlives a single [`engine::BacktestEngine::run`] call.
//!
//! ```text
//! ob-backtest/
//!  ├─ store.rs      # HistoricalStore: reads quotes/whale events back from InfluxDB
//!  ├─ portfolio.rs  # cash accounting, position sizing, equity/drawdown tracking
//!  ├─ execution.rs  # fill simulation: spread crossing, slippage, fees
//!  ├─ strategy.rs   # the Strategy capability trait and its three variants
//!  ├─ engine.rs     # the unified tick-driven timeline
//!  └─ result.rs     # aggregate performance metrics
//! ```

pub mod engine;
pub mod error;
pub mod execution;
pub mod portfolio;
pub mod result;
pub mod store;
pub mod strategy;
pub mod types;

pub use engine::{BacktestEngine, BacktestParams};
pub use error::BacktestError;
pub use result::BacktestResult;
pub use store::{CachedStore, HistoricalStore, InfluxStore, MemoryStore};
