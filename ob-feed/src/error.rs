use thiserror::Error;

/// Errors surfaced by the exchange feed client. `Transport`
/// and `Parse` are never fatal to the process — only `FeedUnavailable`
/// (backoff ceiling exceeded) terminates the feed task.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Parse(String),

    #[error("bootstrap snapshot failed for {symbol}: {reason}")]
    Bootstrap { symbol: String, reason: String },

    #[error("subscribe rejected: {0}")]
    SubscribeRejected(String),

    #[error("feed unavailable: backoff ceiling of {0:?} exceeded")]
    FeedUnavailable(std::time::Duration),
}
