use thiserror::Error;

/// L2 sink errors. Unlike the detector's, these are not advisory —
/// persistence is a correctness boundary.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink channel is full, producer must block")]
    Backpressure,

    #[error("flush to {url} failed: {reason}")]
    Flush { url: String, reason: String },
}
