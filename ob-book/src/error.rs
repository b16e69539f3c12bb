use thiserror::Error;

/// Non-fatal book conditions, logged rather than propagated: the engine
/// keeps running a symbol through either of these, it just withholds a
/// [`crate::engine::DiffOutput::quote`] for that message.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("symbol {0} has no bootstrap snapshot and no depth message has arrived yet")]
    Uninitialized(String),

    #[error("book for {symbol} is crossed: best_bid {best_bid} >= best_ask {best_ask}")]
    CrossedBook {
        symbol: String,
        best_bid: rust_decimal::Decimal,
        best_ask: rust_decimal::Decimal,
    },

    #[error("symbol {symbol} has an empty {side} side after processing a depth message")]
    EmptySide { symbol: String, side: &'static str },
}
