//! InfluxDB line-protocol encoding for the two measurements this
//! system persists: `orderbook_price` (continuous quotes) and
//! `orderbook_whale_events` (discrete microstructure events). Tag and
//! field names are reused byte-for-byte — they are part of the wire
//! contract with the backtest loader.

use bookwatch_core::types::{Quote, WhaleEvent};

/// Escapes a tag key/value: commas, spaces and equals signs must be
/// backslash-escaped per the line-protocol grammar.
fn escape_tag(value: &str) -> String {
    value.replace('\\', "\\\\").replace(',', "\\,").replace(' ', "\\ ").replace('=', "\\=")
}

/// Escapes a string field value: wrapped in quotes, with quotes and
/// backslashes themselves escaped.
fn escape_field_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn decimal_field(value: rust_decimal::Decimal) -> String {
    value.to_string()
}

/// One `orderbook_price` line, millisecond timestamp precision.
pub fn quote_to_line(quote: &Quote) -> String {
    format!(
        "orderbook_price,symbol={} best_bid={},best_ask={},mid_price={},spread={} {}",
        escape_tag(&quote.symbol),
        decimal_field(quote.best_bid),
        decimal_field(quote.best_ask),
        decimal_field(quote.mid_price),
        decimal_field(quote.spread),
        quote.timestamp.timestamp_millis(),
    )
}

/// One `orderbook_whale_events` line, millisecond timestamp precision.
pub fn event_to_line(event: &WhaleEvent) -> String {
    format!(
        "orderbook_whale_events,symbol={},event_type={},side={} \
         price={},volume={},usd_value={},distance_from_mid_pct={},mid_price={},\
         best_bid={},best_ask={},spread={},level={}i,order_count={}i,info={} {}",
        escape_tag(&event.symbol),
        escape_tag(&event.event_type.to_string()),
        escape_tag(&event.side.to_string()),
        decimal_field(event.price),
        decimal_field(event.volume),
        decimal_field(event.usd_value),
        decimal_field(event.distance_from_mid_pct),
        decimal_field(event.mid_price),
        decimal_field(event.best_bid),
        decimal_field(event.best_ask),
        decimal_field(event.spread),
        event.level,
        event.order_count,
        escape_field_string(&event.info),
        event.timestamp.timestamp_millis(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwatch_core::types::{EventSide, EventType};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    #[test]
    fn quote_line_has_expected_measurement_and_tag() {
        let quote = Quote::compute(SmolStr::new("BTC_USDT"), Utc::now(), dec!(99), dec!(101));
        let line = quote_to_line(&quote);
        assert!(line.starts_with("orderbook_price,symbol=BTC_USDT "));
        assert!(line.contains("mid_price=100"));
    }

    #[test]
    fn event_line_escapes_info_string() {
        let event = WhaleEvent {
            symbol: SmolStr::new("BTC_USDT"),
            timestamp: Utc::now(),
            event_type: EventType::FlashOrder,
            side: EventSide::Bid,
            price: dec!(100),
            volume: dec!(5),
            usd_value: dec!(500),
            distance_from_mid_pct: dec!(0.1),
            level: 1,
            order_count: 2,
            mid_price: dec!(100),
            best_bid: dec!(99.9),
            best_ask: dec!(100.1),
            spread: dec!(0.2),
            info: "lifetime_ms=3000".to_string(),
        };
        let line = event_to_line(&event);
        assert!(line.starts_with("orderbook_whale_events,symbol=BTC_USDT,event_type=flash_order,side=bid "));
        assert!(line.contains("info=\"lifetime_ms=3000\""));
        assert!(line.contains("level=1i"));
    }
}
