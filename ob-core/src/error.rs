use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors shared across every Bookwatch component. Component-specific
/// errors (`bookwatch_feed::FeedError`, `bookwatch_book::BookError`, ...)
/// live in their own crates and are aggregated by the binary crate, the
/// same way `toucan-core::error::ToucanError` aggregates
/// `toucan-data::error::DataError` and `toucan-execution::IndexError`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum Error {
    /// Pre-startup configuration failure. Fatal.
    #[error("config invalid: {0}")]
    ConfigInvalid(String),
}

/// Indicates the receiver side of a component's output channel was
/// dropped: a unit struct with a blanket `From<mpsc::error::SendError<T>>`
/// impl so any producer can `?`-propagate a channel hangup without boxing.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
#[error("receiver dropped")]
pub struct RxDropped;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RxDropped {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self
    }
}
