#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
//! # Bookwatch Feed
//!
//! The exchange feed client (L1): a resilient duplex WebSocket connection
//! to a crypto-futures exchange's depth and trade streams, with an
//! application-level ping loop and a REST bootstrap snapshot per symbol.

/// Wire protocol types: subscribe requests, pushes, REST snapshot.
pub mod protocol;

/// The resilient feed client: connect, subscribe, bootstrap, forward.
pub mod client;

/// Feed-specific error taxonomy.
pub mod error;

pub use client::{FeedClient, FeedEvent, FeedHandle};
pub use error::FeedError;
