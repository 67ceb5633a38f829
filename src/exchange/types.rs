//! Wire-level message types for the exchange's kline/depth streams.
//!
//! The exchange protocol this is modeled on tolerates a handful of
//! alternative field names across message variants (`symbol` vs `s`,
//! `close` vs `c` vs `p`, ...). Rather than encode every alternative as a
//! `serde(alias = ...)`, frames are parsed as a raw [`serde_json::Value`]
//! and fields are resolved through [`first_present`], which mirrors the
//! "first non-null" dynamic-attribute lookup the original collector used.

use crate::error::ParseError;
use serde::Serialize;
use serde_json::Value;

/// Returns the first key in `keys` present and non-null in `obj`.
pub fn first_present<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(k))
        .find(|v| !v.is_null())
}

/// Resolves a string field, tolerating both JSON strings and numbers.
pub fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    first_present(obj, keys).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Resolves a numeric field from a JSON string or number.
pub fn first_f64(obj: &Value, keys: &[&str]) -> Option<f64> {
    first_present(obj, keys).and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    })
}

/// A snapshot of the most recent 1-second kline for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineSnapshot {
    pub symbol: String,
    pub close: f64,
    pub quote_volume: f64,
}

impl KlineSnapshot {
    pub fn from_json(data: &Value) -> Result<Self, ParseError> {
        let symbol = first_str(data, &["symbol", "s"]).ok_or(ParseError::MissingField("symbol"))?;
        let close = first_f64(data, &["c", "close", "p"]).ok_or(ParseError::MissingField("close"))?;
        let quote_volume =
            first_f64(data, &["quoteVol", "q", "quote_volume", "v"]).unwrap_or(0.0);
        Ok(Self {
            symbol,
            close,
            quote_volume,
        })
    }
}

/// A single incremental price-level update: `qty == 0.0` deletes the level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelUpdate {
    pub price: f64,
    pub qty: f64,
}

/// An incremental order-book diff for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthDiff {
    pub symbol: String,
    pub bids: Vec<LevelUpdate>,
    pub asks: Vec<LevelUpdate>,
}

fn parse_levels(value: Option<&Value>) -> Result<Vec<LevelUpdate>, ParseError> {
    let Some(Value::Array(rows)) = value else {
        return Ok(Vec::new());
    };
    rows.iter()
        .map(|row| {
            let pair = row
                .as_array()
                .filter(|a| a.len() >= 2)
                .ok_or(ParseError::MissingField("price/qty pair"))?;
            let price = value_as_f64(&pair[0], "price")?;
            let qty = value_as_f64(&pair[1], "qty")?;
            Ok(LevelUpdate { price, qty })
        })
        .collect()
}

fn value_as_f64(v: &Value, field: &'static str) -> Result<f64, ParseError> {
    match v {
        Value::Number(n) => n.as_f64().ok_or(ParseError::MissingField(field)),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| ParseError::NotNumeric { field, value: s.clone() }),
        _ => Err(ParseError::MissingField(field)),
    }
}

impl DepthDiff {
    pub fn from_json(data: &Value) -> Result<Self, ParseError> {
        let symbol = first_str(data, &["symbol", "s"]).ok_or(ParseError::MissingField("symbol"))?;
        let bids = parse_levels(first_present(data, &["b", "bids"]))?;
        let asks = parse_levels(first_present(data, &["a", "asks"]))?;
        Ok(Self { symbol, bids, asks })
    }
}

/// Outbound `{"method": ..., "params": [...], "id": ...}` control message.
#[derive(Debug, Serialize)]
pub struct SubscriptionMessage {
    pub method: &'static str,
    pub params: Vec<String>,
    pub id: usize,
}

impl SubscriptionMessage {
    pub fn subscribe(conn_idx: usize, symbols: &[String]) -> Self {
        Self::build("SUBSCRIPTION", conn_idx, symbols)
    }

    pub fn unsubscribe(conn_idx: usize, symbols: &[String]) -> Self {
        Self::build("UNSUBSCRIPTION", conn_idx, symbols)
    }

    fn build(method: &'static str, conn_idx: usize, symbols: &[String]) -> Self {
        let mut params = Vec::with_capacity(symbols.len() * 2);
        for sym in symbols {
            params.push(format!("{sym}@kline_1s"));
            params.push(format!("{sym}@depth.diff"));
        }
        Self {
            method,
            params,
            id: conn_idx,
        }
    }
}

/// A 24hr ticker item from the REST scout endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerStat {
    pub symbol: String,
    pub quote_volume: f64,
    pub last_price: f64,
}

impl TickerStat {
    pub fn from_json(item: &Value) -> Option<Self> {
        let symbol = first_str(item, &["symbol", "s"])?;
        let quote_volume =
            first_f64(item, &["quoteVolume", "quote_volume", "q", "volume", "v"]).unwrap_or(0.0);
        let last_price = first_f64(item, &["lastPrice", "last", "c", "close"]).unwrap_or(0.0);
        Some(Self {
            symbol,
            quote_volume,
            last_price,
        })
    }
}
