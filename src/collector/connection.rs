//! A single multiplexed WebSocket connection: the socket itself, its
//! assigned symbol set, and its active-stream counter. Grounded on the
//! teacher's `BinanceWebSocket` (`src/binance/websocket.rs`) — same
//! `tokio_tungstenite` connect/split shape — generalized to the spec's
//! connection-group multiplexing instead of one socket per symbol.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream::SplitSink;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::CollectorError;
use crate::exchange::SubscriptionMessage;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;

/// One WebSocket connection and the symbols multiplexed onto it.
pub struct Connection {
    pub idx: usize,
    sink: Mutex<WsSink>,
    stream_count: AtomicUsize,
    pub symbols: StdMutex<Vec<String>>,
}

impl Connection {
    pub fn new(idx: usize, sink: WsSink, symbols: Vec<String>) -> Self {
        let stream_count = symbols.len() * 2;
        Self {
            idx,
            sink: Mutex::new(sink),
            stream_count: AtomicUsize::new(stream_count),
            symbols: StdMutex::new(symbols),
        }
    }

    pub fn stream_count(&self) -> usize {
        self.stream_count.load(Ordering::SeqCst)
    }

    pub fn set_stream_count(&self, count: usize) {
        self.stream_count.store(count, Ordering::SeqCst);
    }

    pub async fn send_text(&self, text: String) -> Result<(), CollectorError> {
        use futures_util::SinkExt;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|source| CollectorError::Send { conn_idx: self.idx, source })
    }

    /// Swap in a freshly-connected sink after a reconnect.
    pub async fn replace_sink(&self, new_sink: WsSink) {
        let mut sink = self.sink.lock().await;
        *sink = new_sink;
    }
}

/// Open a new connection to `ws_url`, returning the split sink/stream pair.
pub async fn connect(ws_url: &str) -> Result<(WsSink, futures_util::stream::SplitStream<WsStream>), CollectorError> {
    use futures_util::StreamExt;
    let (ws, _response) = connect_async(ws_url).await?;
    let (sink, stream) = ws.split();
    Ok((sink, stream))
}

/// Build the `{"method": "SUBSCRIPTION"|"UNSUBSCRIPTION", ...}` control
/// frame for `symbols` on `conn_idx`.
pub fn subscription_frame(method_subscribe: bool, conn_idx: usize, symbols: &[String]) -> String {
    let msg = if method_subscribe {
        SubscriptionMessage::subscribe(conn_idx, symbols)
    } else {
        SubscriptionMessage::unsubscribe(conn_idx, symbols)
    };
    serde_json::to_string(&msg).expect("SubscriptionMessage serialization is infallible")
}
