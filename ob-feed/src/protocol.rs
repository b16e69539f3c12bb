//! Exchange wire protocol, producer side —. These types
//! mirror MEXC-contract-style futures depth/trade streams: full-refresh
//! depth pushes keyed by a monotonic `version`, application-level JSON
//! ping/pong, and a REST snapshot endpoint used once at bootstrap.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `{method: "sub.depth.full", param: {symbol, limit}}`
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeDepth {
    pub method: &'static str,
    pub param: SubscribeDepthParam,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeDepthParam {
    pub symbol: String,
    pub limit: u8,
}

impl SubscribeDepth {
    pub fn new(symbol: impl Into<String>, limit: u8) -> Self {
        Self {
            method: "sub.depth.full",
            param: SubscribeDepthParam {
                symbol: symbol.into(),
                limit,
            },
        }
    }
}

/// `{method: "sub.deal", param: {symbol}}`
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeTrade {
    pub method: &'static str,
    pub param: SubscribeTradeParam,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeTradeParam {
    pub symbol: String,
}

impl SubscribeTrade {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            method: "sub.deal",
            param: SubscribeTradeParam {
                symbol: symbol.into(),
            },
        }
    }
}

/// `{method: "ping"}`
#[derive(Debug, Clone, Serialize)]
pub struct Ping {
    pub method: &'static str,
}

impl Default for Ping {
    fn default() -> Self {
        Self { method: "ping" }
    }
}

/// One `[price, volume, order_count]` triple as sent on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawLevel(pub Decimal, pub Decimal, pub u64);

impl RawLevel {
    pub fn price(&self) -> Decimal {
        self.0
    }
    pub fn volume(&self) -> Decimal {
        self.1
    }
    pub fn order_count(&self) -> u64 {
        self.2
    }
}

/// Payload of a `push.depth.full` message.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthPushData {
    pub version: u64,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
}

impl DepthPushData {
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// One element of a `push.deal` message's data array.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrade {
    pub t: i64,
    pub p: Decimal,
    pub v: Decimal,
    #[serde(rename = "T")]
    pub side: u8,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl RawTrade {
    pub fn side(&self) -> Option<TradeSide> {
        match self.side {
            1 => Some(TradeSide::Buy),
            2 => Some(TradeSide::Sell),
            _ => None,
        }
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.t)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// `GET /api/v1/contract/depth/{symbol}` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RestDepthResponse {
    pub success: bool,
    pub data: Option<RestDepthData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestDepthData {
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
}

/// A loosely-typed inbound frame used to dispatch before committing to a
/// concrete payload shape: depth pushes, trade pushes, pong replies and
/// subscribe acks/errors all land on the same socket.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    pub channel: Option<String>,
    pub symbol: Option<String>,
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub enum InboundMessage {
    Depth { symbol: String, data: DepthPushData },
    Trade { symbol: String, trades: Vec<RawTrade> },
    Pong,
    Ack,
    Other,
}

pub fn parse_inbound(raw: &str, fallback_symbol: Option<&str>) -> Result<InboundMessage, serde_json::Error> {
    let envelope: InboundEnvelope = serde_json::from_str(raw)?;

    if envelope.channel.as_deref() == Some("pong") {
        return Ok(InboundMessage::Pong);
    }

    match envelope.channel.as_deref() {
        Some("push.depth.full") => {
            let data = envelope
                .data
                .ok_or_else(|| serde::de::Error::missing_field("data"))?;
            let depth: DepthPushData = serde_json::from_value(data)?;
            let symbol = envelope
                .symbol
                .or_else(|| fallback_symbol.map(str::to_owned))
                .ok_or_else(|| serde::de::Error::missing_field("symbol"))?;
            Ok(InboundMessage::Depth { symbol, data: depth })
        }
        Some("push.deal") => {
            let data = envelope
                .data
                .ok_or_else(|| serde::de::Error::missing_field("data"))?;
            let trades: Vec<RawTrade> = serde_json::from_value(data)?;
            let symbol = envelope
                .symbol
                .or_else(|| fallback_symbol.map(str::to_owned))
                .ok_or_else(|| serde::de::Error::missing_field("symbol"))?;
            Ok(InboundMessage::Trade { symbol, trades })
        }
        _ => {
            if envelope.success.is_some() || envelope.error.is_some() {
                Ok(InboundMessage::Ack)
            } else {
                Ok(InboundMessage::Other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_depth_push() {
        let raw = r#"{"channel":"push.depth.full","symbol":"BTC_USDT","data":{"version":5,"timestamp":1700000000000,"bids":[["100.0","5","3"]],"asks":[["101.0","2","1"]]}}"#;
        let msg = parse_inbound(raw, None).unwrap();
        match msg {
            InboundMessage::Depth { symbol, data } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(data.version, 5);
                assert_eq!(data.bids.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_trade_push() {
        let raw = r#"{"channel":"push.deal","symbol":"BTC_USDT","data":[{"t":1700000000000,"p":"100.5","v":"1.2","T":1}]}"#;
        let msg = parse_inbound(raw, None).unwrap();
        match msg {
            InboundMessage::Trade { symbol, trades } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(trades.len(), 1);
                assert_eq!(trades[0].side(), Some(TradeSide::Buy));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_single_symbol_when_omitted() {
        let raw = r#"{"channel":"push.depth.full","data":{"version":1,"timestamp":0,"bids":[],"asks":[]}}"#;
        let msg = parse_inbound(raw, Some("ETH_USDT")).unwrap();
        matches!(msg, InboundMessage::Depth { symbol, .. } if symbol == "ETH_USDT");
    }

    #[test]
    fn pong_is_recognized() {
        let raw = r#"{"channel":"pong"}"#;
        assert!(matches!(parse_inbound(raw, None).unwrap(), InboundMessage::Pong));
    }
}
