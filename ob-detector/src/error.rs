use thiserror::Error;

/// Advisory-only: the detector never propagates these as a blocking
/// `Result`. `InvalidConfig` is the one place that does surface a
/// failure, from construction against a malformed config.
/// `DetectorOverflow` is never returned either — it's logged at the
/// point the C1->C2 handoff queue drops an input, so there's a typed
/// value to format into that log line.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid detector config: {0}")]
    InvalidConfig(String),

    #[error("detector queue over capacity ({capacity}), dropped oldest pending input")]
    DetectorOverflow { capacity: usize },
}
