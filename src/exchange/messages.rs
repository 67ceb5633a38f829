//! Envelope parsing for inbound WebSocket frames.
//!
//! A frame is a JSON object. The stream name lives in `stream` or
//! `channel`; the payload is in `data`, or the frame itself if there is no
//! `data` field. Frames with no stream field are dropped silently (this
//! returns `Ok(None)` rather than an error, since it is not a parse
//! failure — it's an envelope the protocol defines as not-a-data-frame,
//! e.g. a subscription ack).

use serde_json::Value;

use super::types::{DepthDiff, KlineSnapshot};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Kline(KlineSnapshot),
    Depth(DepthDiff),
}

pub fn parse_frame(text: &str) -> Result<Option<InboundMessage>, ParseError> {
    let frame: Value = serde_json::from_str(text)?;

    let stream = frame
        .get("stream")
        .or_else(|| frame.get("channel"))
        .and_then(|v| v.as_str());

    let Some(stream) = stream else {
        return Ok(None);
    };

    let data = frame.get("data").unwrap_or(&frame);

    if stream.contains("kline") {
        Ok(Some(InboundMessage::Kline(KlineSnapshot::from_json(data)?)))
    } else if stream.contains("depth") {
        Ok(Some(InboundMessage::Depth(DepthDiff::from_json(data)?)))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_stream_field_is_dropped_silently() {
        let text = json!({"data": {"s": "BTCUSDT"}}).to_string();
        assert_eq!(parse_frame(&text).unwrap(), None);
    }

    #[test]
    fn kline_frame_with_data_wrapper() {
        let text = json!({
            "stream": "btcusdt@kline_1s",
            "data": {"s": "BTCUSDT", "c": "100.0", "q": "50.0"},
        })
        .to_string();
        let msg = parse_frame(&text).unwrap().unwrap();
        assert_eq!(
            msg,
            InboundMessage::Kline(KlineSnapshot {
                symbol: "BTCUSDT".into(),
                close: 100.0,
                quote_volume: 50.0,
            })
        );
    }

    #[test]
    fn depth_frame_without_data_wrapper_uses_frame_itself() {
        let text = json!({
            "channel": "btcusdt@depth.diff",
            "s": "BTCUSDT",
            "b": [["100.0", "1.0"]],
            "a": [],
        })
        .to_string();
        let msg = parse_frame(&text).unwrap().unwrap();
        match msg {
            InboundMessage::Depth(d) => assert_eq!(d.symbol, "BTCUSDT"),
            _ => panic!("expected depth message"),
        }
    }

    #[test]
    fn unrecognized_stream_name_yields_none() {
        let text = json!({"stream": "btcusdt@ticker", "data": {}}).to_string();
        assert_eq!(parse_frame(&text).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_frame("not json").is_err());
    }
}
