//! Historical data access: the backtest engine's input contract is the
//! two measurements `ob-sink` writes — [`InfluxStore`] reads them back
//! via a hand-rolled Flux query and CSV parse over `reqwest`, mirroring
//! `ob-sink`'s hand-rolled line-protocol write path (`ob_sink::writer`)
//! for the read direction. [`CachedStore`] wraps any [`HistoricalStore`]
//! with a TTL-keyed cache so a parameter sweep over the same window
//! doesn't refetch it per strategy variant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use smol_str::SmolStr;

use bookwatch_core::config::SinkConfig;
use bookwatch_core::types::{EventSide, EventType, Quote, WhaleEvent};

use crate::error::BacktestError;

/// Loads the quote and whale-event series a backtest run replays.
/// Abstracted so tests can supply an in-memory fixture instead of a
/// live InfluxDB instance.
#[async_trait::async_trait]
pub trait HistoricalStore: Send + Sync {
    async fn load_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, BacktestError>;

    async fn load_whale_events(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WhaleEvent>, BacktestError>;
}

/// Reads `orderbook_price`/`orderbook_whale_events` back from InfluxDB
/// via its Flux HTTP query endpoint, requesting `text/csv` so the
/// response can be parsed without a dedicated client crate.
#[derive(Debug, Clone)]
pub struct InfluxStore {
    config: SinkConfig,
    http: reqwest::Client,
}

impl InfluxStore {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn query_csv(&self, flux: &str) -> Result<String, BacktestError> {
        let url = format!("{}/api/v2/query?org={}", self.config.influxdb_url, self.config.influxdb_org);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.influxdb_token))
            .header("Accept", "application/csv")
            .header("Content-Type", "application/vnd.flux")
            .body(flux.to_string())
            .send()
            .await
            .map_err(|e| BacktestError::Store(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BacktestError::Store(format!("query failed with status {}", response.status())));
        }
        response.text().await.map_err(|e| BacktestError::Store(e.to_string()))
    }

    fn range_flux(&self, measurement: &str, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "from(bucket: \"{bucket}\") \
             |> range(start: {start}, stop: {end}) \
             |> filter(fn: (r) => r._measurement == \"{measurement}\" and r.symbol == \"{symbol}\") \
             |> pivot(rowKey: [\"_time\"], columnKey: [\"_field\"], valueColumn: \"_value\") \
             |> sort(columns: [\"_time\"])",
            bucket = self.config.influxdb_bucket,
            start = start.to_rfc3339(),
            end = end.to_rfc3339(),
        )
    }
}

#[async_trait::async_trait]
impl HistoricalStore for InfluxStore {
    async fn load_quotes(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Quote>, BacktestError> {
        let flux = self.range_flux("orderbook_price", symbol, start, end);
        let csv = self.query_csv(&flux).await?;
        parse_quotes_csv(&csv, symbol)
    }

    async fn load_whale_events(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WhaleEvent>, BacktestError> {
        let flux = self.range_flux("orderbook_whale_events", symbol, start, end);
        let csv = self.query_csv(&flux).await?;
        parse_whale_events_csv(&csv, symbol)
    }
}

/// Finds the column index of `name` in a Flux CSV header row.
fn column_index(header: &[&str], name: &str) -> Option<usize> {
    header.iter().position(|h| *h == name)
}

fn parse_decimal_column(row: &[&str], idx: Option<usize>) -> Decimal {
    idx.and_then(|i| row.get(i)).and_then(|v| v.parse().ok()).unwrap_or(Decimal::ZERO)
}

fn parse_quotes_csv(csv: &str, symbol: &str) -> Result<Vec<Quote>, BacktestError> {
    let mut lines = csv.lines().filter(|l| !l.is_empty());
    let header: Vec<&str> = match lines.next() {
        Some(h) => h.split(',').collect(),
        None => return Ok(Vec::new()),
    };
    let time_idx = column_index(&header, "_time");
    let bid_idx = column_index(&header, "best_bid");
    let ask_idx = column_index(&header, "best_ask");

    let mut quotes = Vec::new();
    for line in lines {
        let row: Vec<&str> = line.split(',').collect();
        let timestamp = match time_idx.and_then(|i| row.get(i)).and_then(|v| DateTime::parse_from_rfc3339(v).ok()) {
            Some(ts) => ts.with_timezone(&Utc),
            None => continue,
        };
        let best_bid = parse_decimal_column(&row, bid_idx);
        let best_ask = parse_decimal_column(&row, ask_idx);
        quotes.push(Quote::compute(SmolStr::new(symbol), timestamp, best_bid, best_ask));
    }
    Ok(quotes)
}

fn parse_whale_events_csv(csv: &str, symbol: &str) -> Result<Vec<WhaleEvent>, BacktestError> {
    let mut lines = csv.lines().filter(|l| !l.is_empty());
    let header: Vec<&str> = match lines.next() {
        Some(h) => h.split(',').collect(),
        None => return Ok(Vec::new()),
    };
    let time_idx = column_index(&header, "_time");
    let event_type_idx = column_index(&header, "event_type");
    let side_idx = column_index(&header, "side");
    let price_idx = column_index(&header, "price");
    let volume_idx = column_index(&header, "volume");
    let usd_value_idx = column_index(&header, "usd_value");
    let distance_idx = column_index(&header, "distance_from_mid_pct");
    let mid_idx = column_index(&header, "mid_price");
    let bid_idx = column_index(&header, "best_bid");
    let ask_idx = column_index(&header, "best_ask");
    let spread_idx = column_index(&header, "spread");
    let level_idx = column_index(&header, "level");
    let order_count_idx = column_index(&header, "order_count");
    let info_idx = column_index(&header, "info");

    let mut events = Vec::new();
    for line in lines {
        let row: Vec<&str> = line.split(',').collect();
        let timestamp = match time_idx.and_then(|i| row.get(i)).and_then(|v| DateTime::parse_from_rfc3339(v).ok()) {
            Some(ts) => ts.with_timezone(&Utc),
            None => continue,
        };
        let event_type = match event_type_idx.and_then(|i| row.get(i)).and_then(|v| parse_event_type(v)) {
            Some(et) => et,
            None => continue,
        };
        let side = side_idx.and_then(|i| row.get(i)).and_then(|v| parse_event_side(v)).unwrap_or(EventSide::Bid);

        events.push(WhaleEvent {
            symbol: SmolStr::new(symbol),
            timestamp,
            event_type,
            side,
            price: parse_decimal_column(&row, price_idx),
            volume: parse_decimal_column(&row, volume_idx),
            usd_value: parse_decimal_column(&row, usd_value_idx),
            distance_from_mid_pct: parse_decimal_column(&row, distance_idx),
            level: level_idx.and_then(|i| row.get(i)).and_then(|v| v.parse().ok()).unwrap_or(0),
            order_count: order_count_idx.and_then(|i| row.get(i)).and_then(|v| v.parse().ok()).unwrap_or(0),
            mid_price: parse_decimal_column(&row, mid_idx),
            best_bid: parse_decimal_column(&row, bid_idx),
            best_ask: parse_decimal_column(&row, ask_idx),
            spread: parse_decimal_column(&row, spread_idx),
            info: info_idx.and_then(|i| row.get(i)).map(|v| v.trim_matches('"').to_string()).unwrap_or_default(),
        });
    }
    Ok(events)
}

fn parse_event_type(s: &str) -> Option<EventType> {
    Some(match s {
        "new_bid" => EventType::NewBid,
        "new_ask" => EventType::NewAsk,
        "entered_top" => EventType::EnteredTop,
        "left_top" => EventType::LeftTop,
        "increase" => EventType::Increase,
        "decrease" => EventType::Decrease,
        "market_buy" => EventType::MarketBuy,
        "market_sell" => EventType::MarketSell,
        "flash_order" => EventType::FlashOrder,
        "layering" => EventType::Layering,
        "quote_stuffing" => EventType::QuoteStuffing,
        "spoof_candidate" => EventType::SpoofCandidate,
        _ => return None,
    })
}

fn parse_event_side(s: &str) -> Option<EventSide> {
    Some(match s {
        "bid" => EventSide::Bid,
        "ask" => EventSide::Ask,
        "buy" => EventSide::Buy,
        "sell" => EventSide::Sell,
        _ => return None,
    })
}

/// An in-memory fixture store, for tests and for CLI dry-runs over a
/// locally held series instead of a live InfluxDB instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub quotes: Vec<Quote>,
    pub whale_events: Vec<WhaleEvent>,
}

#[async_trait::async_trait]
impl HistoricalStore for MemoryStore {
    async fn load_quotes(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Quote>, BacktestError> {
        Ok(self
            .quotes
            .iter()
            .filter(|q| q.symbol == symbol && q.timestamp >= start && q.timestamp <= end)
            .cloned()
            .collect())
    }

    async fn load_whale_events(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WhaleEvent>, BacktestError> {
        Ok(self
            .whale_events
            .iter()
            .filter(|e| e.symbol == symbol && e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct CacheKey {
    symbol: SmolStr,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

struct CacheEntry {
    data: Arc<(Vec<Quote>, Vec<WhaleEvent>)>,
    cached_at: DateTime<Utc>,
}

/// Wraps another [`HistoricalStore`] with a TTL-only cache keyed on the
/// exact `(symbol, start, end)` window requested, so a parameter sweep
/// that reruns the same window under different strategy settings fetches
/// it from the underlying store at most once per TTL. Nothing evicts an
/// entry early — a changed window is simply a different key. Any
/// `min_whale_usd` filtering the caller does happens on its own copy of
/// the returned `Vec`, after the cache hit, so every sweep iteration can
/// use a different threshold against the same cached events.
pub struct CachedStore {
    inner: Arc<dyn HistoricalStore>,
    ttl: Duration,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn HistoricalStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_fetch(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Arc<(Vec<Quote>, Vec<WhaleEvent>)>, BacktestError> {
        let key = CacheKey {
            symbol: SmolStr::new(symbol),
            start,
            end,
        };

        if let Some(data) = self.fresh_hit(&key) {
            return Ok(data);
        }

        let quotes = self.inner.load_quotes(symbol, start, end).await?;
        let whale_events = self.inner.load_whale_events(symbol, start, end).await?;
        let data = Arc::new((quotes, whale_events));

        let mut cache = self.cache.lock().expect("backtest cache mutex poisoned");
        cache.insert(
            key,
            CacheEntry {
                data: Arc::clone(&data),
                cached_at: Utc::now(),
            },
        );
        Ok(data)
    }

    fn fresh_hit(&self, key: &CacheKey) -> Option<Arc<(Vec<Quote>, Vec<WhaleEvent>)>> {
        let cache = self.cache.lock().expect("backtest cache mutex poisoned");
        let entry = cache.get(key)?;
        let age = Utc::now().signed_duration_since(entry.cached_at);
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        (age < ttl).then(|| Arc::clone(&entry.data))
    }
}

#[async_trait::async_trait]
impl HistoricalStore for CachedStore {
    async fn load_quotes(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Quote>, BacktestError> {
        Ok(self.get_or_fetch(symbol, start, end).await?.0.clone())
    }

    async fn load_whale_events(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WhaleEvent>, BacktestError> {
        Ok(self.get_or_fetch(symbol, start, end).await?.1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        fixture: MemoryStore,
        loads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HistoricalStore for CountingStore {
        async fn load_quotes(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Quote>, BacktestError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.fixture.load_quotes(symbol, start, end).await
        }

        async fn load_whale_events(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WhaleEvent>, BacktestError> {
            self.fixture.load_whale_events(symbol, start, end).await
        }
    }

    #[tokio::test]
    async fn repeated_window_hits_cache_not_the_inner_store() {
        let inner = Arc::new(CountingStore {
            fixture: MemoryStore {
                quotes: vec![Quote::compute(SmolStr::new("BTC_USDT"), Utc::now(), Decimal::from(99), Decimal::from(101))],
                whale_events: Vec::new(),
            },
            loads: AtomicUsize::new(0),
        });
        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now();

        let cached: Arc<dyn HistoricalStore> = Arc::new(CachedStore::new(inner.clone(), Duration::from_secs(300)));
        cached.load_quotes("BTC_USDT", start, end).await.unwrap();
        cached.load_quotes("BTC_USDT", start, end).await.unwrap();
        cached.load_whale_events("BTC_USDT", start, end).await.unwrap();

        assert_eq!(inner.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_ttl_refetches() {
        let inner = Arc::new(CountingStore::default());
        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now();

        let cached = CachedStore::new(inner.clone(), Duration::from_secs(0));
        cached.load_quotes("BTC_USDT", start, end).await.unwrap();
        cached.load_quotes("BTC_USDT", start, end).await.unwrap();

        assert_eq!(inner.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parses_a_minimal_quote_csv() {
        let csv = "_time,best_bid,best_ask\n2024-01-01T00:00:00Z,99.5,100.5\n";
        let quotes = parse_quotes_csv(csv, "BTC_USDT").unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].mid_price, rust_decimal::Decimal::new(1000, 1));
    }

    #[test]
    fn empty_csv_yields_no_rows() {
        assert!(parse_quotes_csv("", "BTC_USDT").unwrap().is_empty());
    }
}
