#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
//! # Bookwatch Detector
//!
//! The manipulation detector (C2): a read-only consumer of C1's event
//! stream and periodic book snapshots that surfaces flash orders,
//! layering, quote stuffing and spoof candidates, plus a bounded
//! per-symbol indicator score. Every output is advisory — this crate
//! never blocks or backpressures the feed; the queue in [`channel`] is
//! how callers enforce that at the wiring layer.

/// Per-order lifecycle tracking used to disambiguate flash orders.
pub mod lifecycle;

/// Pure layering-run detection over a sorted slice of price levels.
pub mod layering;

/// The detector itself: event/snapshot intake, GC, indicator scoring.
pub mod detector;

/// The bounded, drop-oldest C1->C2 handoff queue.
pub mod channel;

/// Detector-specific error taxonomy (advisory; rarely surfaced).
pub mod error;

pub use channel::{DetectorInput, DetectorQueue};
pub use detector::{DetectorIndicators, ManipulationDetector};
pub use error::DetectorError;
pub use lifecycle::{LifecycleStatus, OrderId, OrderLifecycle};
