//! Top-level configuration for a running Bookwatch system.
//!
//! One nested struct per component. Loaded from TOML with
//! [`Config::from_toml_str`]; all fields
//! have defaults so a minimal file only needs to set `trading_pairs`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level configuration for a full Bookwatch deployment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub book: BookConfig,
    pub sink: SinkConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, crate::Error> {
        toml::from_str(raw).map_err(|e| crate::Error::ConfigInvalid(e.to_string()))
    }
}

/// L1 Exchange Feed Client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Symbols the feed subscribes to.
    pub trading_pairs: Vec<String>,
    /// Subscription depth limit (5|10|20); also the visible-window size.
    #[serde(default = "default_depth")]
    pub order_book_depth: u8,
    /// WebSocket endpoint base URL.
    pub ws_url: String,
    /// REST snapshot endpoint base URL.
    pub rest_url: String,
    /// Application-level ping interval, seconds. Default 15s.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Consecutive missed pongs before the connection is considered dead.
    #[serde(default = "default_ping_miss_threshold")]
    pub ping_miss_threshold: u32,
    /// Initial reconnect backoff, seconds. Default 5s.
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,
    /// Reconnect backoff ceiling, seconds. Default 60s.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Total elapsed backoff time before `FeedUnavailable` is raised.
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,
}

fn default_depth() -> u8 {
    20
}
fn default_ping_interval_secs() -> u64 {
    15
}
fn default_ping_miss_threshold() -> u32 {
    2
}
fn default_backoff_initial_secs() -> u64 {
    5
}
fn default_backoff_max_secs() -> u64 {
    60
}
fn default_backoff_ceiling_secs() -> u64 {
    600
}

impl FeedConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

/// Per-symbol whale-class USD thresholds and C1 event filters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BookConfig {
    /// Whale threshold classes, e.g. `large` / `huge` / `mega`, keyed by
    /// a symbol family prefix (e.g. "BTC"), matching
    /// `whale_threshold_*_{large,huge,mega}`
    #[serde(default)]
    pub whale_thresholds: BTreeMap<String, WhaleThresholds>,
    #[serde(default)]
    pub min_usd: Decimal,
    pub max_usd: Option<Decimal>,
    pub min_distance_pct: Option<Decimal>,
    pub max_distance_pct: Option<Decimal>,
    #[serde(default)]
    pub min_volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct WhaleThresholds {
    pub large: Decimal,
    pub huge: Decimal,
    pub mega: Decimal,
}

/// L2 Time-Series Sink configuration: batch on size or time, whichever
/// hits first, writing to an InfluxDB-compatible line-protocol endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SinkConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    #[serde(default = "default_detector_channel_capacity")]
    pub detector_channel_capacity: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_influxdb_url")]
    pub influxdb_url: String,
    #[serde(default)]
    pub influxdb_token: String,
    #[serde(default = "default_influxdb_org")]
    pub influxdb_org: String,
    #[serde(default = "default_influxdb_bucket")]
    pub influxdb_bucket: String,
}

fn default_batch_size() -> usize {
    500
}
fn default_batch_timeout_ms() -> u64 {
    1_000
}
fn default_detector_channel_capacity() -> usize {
    4_096
}
fn default_channel_capacity() -> usize {
    8_192
}
fn default_influxdb_url() -> String {
    "http://localhost:8086".to_string()
}
fn default_influxdb_org() -> String {
    "bitpulse".to_string()
}
fn default_influxdb_bucket() -> String {
    "orderbook".to_string()
}

impl SinkConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

/// C2 Manipulation Detector configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DetectorConfig {
    #[serde(default = "default_flash_order_threshold_ms")]
    pub flash_order_threshold_ms: u64,
    #[serde(default = "default_layering_min_levels")]
    pub layering_min_levels: usize,
    #[serde(default = "default_layering_threshold")]
    pub layering_threshold: Decimal,
    #[serde(default = "default_layering_allow_gap")]
    pub layering_allow_gap: usize,
    #[serde(default = "default_quote_stuffing_rate")]
    pub quote_stuffing_rate: u32,
    #[serde(default = "default_lifecycle_horizon_secs")]
    pub lifecycle_horizon_secs: u64,
    #[serde(default = "default_whale_threshold_usd")]
    pub whale_threshold_usd: Decimal,
    /// Minimum count of recently closed, low-fill ("phantom") lifecycles
    /// on a layered side before that layering finding is promoted to a
    /// `spoof_candidate` event.
    #[serde(default = "default_spoof_lifecycle_evidence_min")]
    pub spoof_lifecycle_evidence_min: u64,
}

fn default_flash_order_threshold_ms() -> u64 {
    10_000
}
fn default_layering_min_levels() -> usize {
    2
}
fn default_layering_threshold() -> Decimal {
    Decimal::from(30_000)
}
fn default_layering_allow_gap() -> usize {
    1
}
fn default_quote_stuffing_rate() -> u32 {
    10
}
fn default_lifecycle_horizon_secs() -> u64 {
    3_600
}
fn default_whale_threshold_usd() -> Decimal {
    Decimal::from(100_000)
}
fn default_spoof_lifecycle_evidence_min() -> u64 {
    2
}

impl DetectorConfig {
    pub fn flash_order_threshold(&self) -> Duration {
        Duration::from_millis(self.flash_order_threshold_ms)
    }
    pub fn lifecycle_horizon(&self) -> Duration {
        Duration::from_secs(self.lifecycle_horizon_secs)
    }
}

/// C3 Backtest Engine configuration: portfolio sizing, caps, and the
/// execution simulator's fee/slippage model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestConfig {
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: Decimal,
    #[serde(default = "default_max_risk_per_trade_pct")]
    pub max_risk_per_trade_pct: Decimal,
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    #[serde(default = "default_taker_fee_pct")]
    pub taker_fee_pct: Decimal,
    #[serde(default = "default_maker_fee_pct")]
    pub maker_fee_pct: Decimal,
    #[serde(default)]
    pub slippage_model: SlippageModel,
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: Decimal,
    #[serde(default)]
    pub execution_delay_ms: u64,
    #[serde(default = "default_risk_free_pct")]
    pub risk_free_pct: Decimal,
    #[serde(default)]
    pub min_whale_usd: Decimal,
    /// How long a loaded `(symbol, start, end)` window stays cached
    /// before the next request re-fetches it, so a parameter sweep that
    /// re-runs the same window under different strategy settings only
    /// hits the store once. Invalidation is TTL-only: nothing clears an
    /// entry early.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            position_size_pct: default_position_size_pct(),
            max_risk_per_trade_pct: default_max_risk_per_trade_pct(),
            max_positions: default_max_positions(),
            taker_fee_pct: default_taker_fee_pct(),
            maker_fee_pct: default_maker_fee_pct(),
            slippage_model: SlippageModel::default(),
            slippage_pct: default_slippage_pct(),
            execution_delay_ms: 0,
            risk_free_pct: default_risk_free_pct(),
            min_whale_usd: Decimal::ZERO,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl BacktestConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_position_size_pct() -> Decimal {
    Decimal::from(10)
}
fn default_max_risk_per_trade_pct() -> Decimal {
    Decimal::from(1)
}
fn default_max_positions() -> usize {
    3
}
fn default_taker_fee_pct() -> Decimal {
    rust_decimal::Decimal::new(6, 2) // 0.06
}
fn default_maker_fee_pct() -> Decimal {
    rust_decimal::Decimal::new(2, 2) // 0.02
}
fn default_slippage_pct() -> Decimal {
    rust_decimal::Decimal::new(2, 2) // 0.02
}
fn default_risk_free_pct() -> Decimal {
    Decimal::from(2)
}
fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlippageModel {
    #[default]
    Fixed,
    VolumeBased,
    /// Stubbed falls back to `VolumeBased`.
    Orderbook,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let raw = r#"
            [feed]
            trading_pairs = ["BTC_USDT"]
            ws_url = "wss://contract.example.com/ws"
            rest_url = "https://contract.example.com"

            [book]

            [sink]

            [detector]
        "#;
        let config = Config::from_toml_str(raw).unwrap();
        assert_eq!(config.feed.order_book_depth, 20);
        assert_eq!(config.sink.batch_size, 500);
        assert_eq!(config.detector.layering_min_levels, 2);
        assert_eq!(config.backtest.max_positions, 3);
    }

    #[test]
    fn malformed_config_is_config_invalid() {
        let err = Config::from_toml_str("not valid toml {{{").unwrap_err();
        matches!(err, crate::Error::ConfigInvalid(_));
    }
}
