#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
//! # Bookwatch Core
//!
//! Shared domain types, configuration schema, error taxonomy and tracing
//! setup used by every Bookwatch crate: the feed client, the book diff
//! engine, the manipulation detector, the time-series sink and the
//! backtest engine all depend on this crate and nothing else in the
//! workspace.
//!
//! Nothing in here touches I/O. It exists so the other crates share one
//! definition of a [`Quote`](types::Quote), a [`WhaleEvent`](types::WhaleEvent)
//! and a [`Config`](config::Config).

/// Core domain types: price levels, book sides, quotes and whale events.
pub mod types;

/// Nested configuration schema, one sub-config per component.
pub mod config;

/// Crate-wide error taxonomy, one variant family per component boundary.
pub mod error;

/// `tracing` subscriber setup shared by every binary in the workspace.
pub mod logging;

pub use error::Error;
