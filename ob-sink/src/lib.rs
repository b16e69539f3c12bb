#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
//! # Bookwatch Sink
//!
//! The time-series sink (L2): batches [`bookwatch_core::types::Quote`]s
//! and [`bookwatch_core::types::WhaleEvent`]s into InfluxDB
//! line-protocol and flushes on size or time threshold, whichever comes
//! first.

/// Line-protocol encoding for the two persisted measurements.
pub mod line_protocol;

/// The batching writer actor.
pub mod writer;

/// Sink-specific error taxonomy.
pub mod error;

pub use error::SinkError;
pub use writer::{Sink, SinkHandle, SinkItem};
