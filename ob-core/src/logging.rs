//! # Logging Configuration
//!
//! Standardized `tracing` setup shared by every Bookwatch binary.
//!
//! - **Configurable output**: human-readable or JSON
//! - **Environment filtering**: `RUST_LOG`, default `info`
//!
//! ```rust,no_run
//! use bookwatch_core::logging::init_logging;
//!
//! init_logging();
//! tracing::info!("bookwatch starting");
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize human-readable logging, respecting `RUST_LOG` (default `info`).
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// Initialize JSON logging for aggregators / observability pipelines.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}
