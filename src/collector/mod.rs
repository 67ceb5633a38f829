//! Multiplexed WebSocket collector (spec §4.2): owns N connections, fans
//! symbol subscriptions across them under the `MAX_STREAMS_PER_CONN` cap,
//! parses inbound kline/depth frames into per-symbol caches, maintains the
//! [`OrderBookReplica`] for each symbol, and runs the post-update quality
//! gate. Grounded on the teacher's `BinanceWebSocket`
//! (`src/binance/websocket.rs` — `connect_async`, split sink/stream,
//! reader-task-over-channel shape), generalized from one socket per symbol
//! to connection-group multiplexing per `original_source/scanner/collector.py::MexcWSClient`.

pub mod connection;
mod rate_limiter;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::CollectorError;
use crate::exchange::{InboundMessage, KlineSnapshot, parse_frame};
use crate::fuser::{self, TickStream};
use crate::orderbook::{Level, OrderBookReplica};
use crate::rolling_window::RollingWindow;
use crate::metrics;
use crate::subscription_manager::SubscriptionTarget;

use connection::{Connection, WsStream};

const QUALITY_VOL_HORIZON_SEC: f64 = 300.0;
const QUALITY_MIN_VOL_USD: f64 = 20_000.0;
const QUALITY_MAX_SPREAD: f64 = 0.015;

/// A fused kline+depth observation for one symbol (spec §3 `Tick`).
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub kline: KlineSnapshot,
    pub depth: BookSnapshot,
    /// Fusion timestamp, taken from the collector's monotonic loop clock.
    pub fused_at: f64,
}

/// A point-in-time view of a symbol's book, captured at fusion time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookSnapshot {
    pub best_bid: Option<(f64, f64)>,
    pub best_ask: Option<(f64, f64)>,
    pub cum_bid_depth: f64,
    pub cum_ask_depth: f64,
}

/// Owns the WebSocket connections, the per-symbol kline/depth caches, and
/// the order-book replicas built from them (spec §4.2). Always held behind
/// an `Arc`, since reader tasks and reconnection both need a handle back to
/// it.
pub struct Collector {
    ws_url: String,
    max_streams_per_conn: usize,
    quality_cooldown_sec: f64,
    connections: Mutex<Vec<Arc<Connection>>>,
    symbol_conn: StdMutex<HashMap<String, usize>>,
    kline_cache: Arc<Mutex<HashMap<String, KlineSnapshot>>>,
    depth_ready: Arc<Mutex<HashSet<String>>>,
    books: Arc<Mutex<HashMap<String, OrderBookReplica>>>,
    quality_vol: Mutex<HashMap<String, RollingWindow<f64>>>,
    subscribed_at: StdMutex<HashMap<String, f64>>,
    rate_limiter: rate_limiter::RateLimiter,
    reconnects: AtomicU64,
    reader_handles: Mutex<Vec<JoinHandle<()>>>,
    start: Instant,
}

impl Collector {
    fn empty(
        ws_url: String,
        max_streams_per_conn: usize,
        max_msg_per_sec: u32,
        quality_cooldown_sec: f64,
    ) -> Self {
        Self {
            ws_url,
            max_streams_per_conn,
            quality_cooldown_sec,
            connections: Mutex::new(Vec::new()),
            symbol_conn: StdMutex::new(HashMap::new()),
            kline_cache: Arc::new(Mutex::new(HashMap::new())),
            depth_ready: Arc::new(Mutex::new(HashSet::new())),
            books: Arc::new(Mutex::new(HashMap::new())),
            quality_vol: Mutex::new(HashMap::new()),
            subscribed_at: StdMutex::new(HashMap::new()),
            rate_limiter: rate_limiter::RateLimiter::new(max_msg_per_sec),
            reconnects: AtomicU64::new(0),
            reader_handles: Mutex::new(Vec::new()),
            start: Instant::now(),
        }
    }

    /// Open the first connection for `initial_symbols` and subscribe the
    /// rest dynamically. The first connection's failure is propagated: an
    /// unresolvable WebSocket URL at initial connect is fatal (spec §7).
    /// Every symbol after the first goes through the same greedy
    /// capacity-assignment path as a runtime [`Collector::subscribe`] call,
    /// which produces the same groups-of-`max_streams_per_conn/2`
    /// partitioning as an explicit upfront chunking would (spec §4.2).
    pub async fn connect(
        ws_url: impl Into<String>,
        max_streams_per_conn: usize,
        max_msg_per_sec: u32,
        quality_cooldown_sec: f64,
        initial_symbols: &[String],
    ) -> Result<Arc<Collector>, CollectorError> {
        let collector = Arc::new(Collector::empty(
            ws_url.into(),
            max_streams_per_conn,
            max_msg_per_sec,
            quality_cooldown_sec,
        ));

        if let Some((first, rest)) = initial_symbols.split_first() {
            collector.open_connection_for(vec![first.clone()]).await?;
            for symbol in rest {
                collector.subscribe(symbol).await;
            }
        }

        Ok(collector)
    }

    /// Current value of the collector's monotonic loop clock, in seconds
    /// since the collector was created.
    pub fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.symbol_conn.lock().unwrap().contains_key(symbol)
    }

    pub fn subscribed_symbol_count(&self) -> usize {
        self.symbol_conn.lock().unwrap().len()
    }

    /// `2 * |subscribed symbols|` (spec §3 invariant, §6 gauge).
    pub fn active_streams(&self) -> usize {
        2 * self.subscribed_symbol_count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn stream_counts(&self) -> Vec<usize> {
        self.connections
            .lock()
            .await
            .iter()
            .map(|c| c.stream_count())
            .collect()
    }

    /// `(best bid, best ask)` as `(price, qty)` pairs, or `None` if either
    /// side of the book is empty or the symbol has no book yet.
    pub async fn get_best(&self, symbol: &str) -> Option<(Level, Level)> {
        self.books.lock().await.get(symbol)?.get_best()
    }

    /// `(bid_depth, ask_depth)` within 0.1% of mid, or `None` without a
    /// book.
    pub async fn get_cum_depth(&self, symbol: &str) -> Option<(f64, f64)> {
        self.books.lock().await.get(symbol)?.cum_depth()
    }

    /// Lazy, infinite stream of fused [`Tick`]s (spec §4.3). Dropping the
    /// returned stream cancels the background merger task.
    pub fn yield_ticks(&self) -> TickStream {
        fuser::spawn(
            Arc::clone(&self.kline_cache),
            Arc::clone(&self.depth_ready),
            Arc::clone(&self.books),
        )
    }

    /// Subscribe to `symbol` if not already subscribed: reuse the first
    /// connection with spare capacity, or open a new one (spec §4.2).
    /// Idempotent; a failed new-connection attempt is logged and swallowed
    /// rather than propagated, since it is a transient-network condition
    /// per spec §7 and the caller (the subscription manager's next poll
    /// cycle) will simply retry it.
    pub async fn subscribe(self: &Arc<Self>, symbol: &str) {
        if self.is_subscribed(symbol) {
            return;
        }

        let target_idx = {
            let conns = self.connections.lock().await;
            let counts: Vec<usize> = conns.iter().map(|c| c.stream_count()).collect();
            find_connection_with_capacity(&counts, self.max_streams_per_conn)
        };

        if let Some(idx) = target_idx {
            let conn = { self.connections.lock().await[idx].clone() };
            self.rate_limiter.acquire().await;
            let frame = connection::subscription_frame(true, idx, &[symbol.to_string()]);
            if conn.send_text(frame).await.is_ok() {
                conn.symbols.lock().unwrap().push(symbol.to_string());
                conn.set_stream_count(conn.stream_count() + 2);
                let now = self.now();
                self.symbol_conn.lock().unwrap().insert(symbol.to_string(), idx);
                self.subscribed_at.lock().unwrap().insert(symbol.to_string(), now);
            }
        } else if let Err(err) = self.open_connection_for(vec![symbol.to_string()]).await {
            tracing::warn!(%symbol, error = %err, "failed to open a connection for a newly subscribed symbol");
        }
    }

    /// Unsubscribe `symbol`: send the UNSUBSCRIPTION frame, decrement its
    /// connection's counter, and purge every per-symbol cache (spec §4.2).
    /// A no-op if the symbol isn't currently subscribed.
    pub async fn unsubscribe(&self, symbol: &str) {
        let idx = self.symbol_conn.lock().unwrap().remove(symbol);
        self.subscribed_at.lock().unwrap().remove(symbol);

        if let Some(idx) = idx {
            let conn = self.connections.lock().await.get(idx).cloned();
            if let Some(conn) = conn {
                self.rate_limiter.acquire().await;
                let frame = connection::subscription_frame(false, idx, &[symbol.to_string()]);
                let _ = conn.send_text(frame).await;
                conn.symbols.lock().unwrap().retain(|s| s != symbol);
                conn.set_stream_count(conn.stream_count().saturating_sub(2));
            }
        }

        self.kline_cache.lock().await.remove(symbol);
        self.depth_ready.lock().await.remove(symbol);
        self.books.lock().await.remove(symbol);
        self.quality_vol.lock().await.remove(symbol);
    }

    /// Open a new WebSocket connection, register `symbols` onto it, send
    /// their initial SUBSCRIPTION frame, and spawn its reader task.
    async fn open_connection_for(
        self: &Arc<Self>,
        symbols: Vec<String>,
    ) -> Result<usize, CollectorError> {
        let (sink, stream) = connection::connect(&self.ws_url).await?;

        let idx = {
            let mut conns = self.connections.lock().await;
            let idx = conns.len();
            conns.push(Arc::new(Connection::new(idx, sink, symbols.clone())));
            idx
        };

        let now = self.now();
        {
            let mut symbol_conn = self.symbol_conn.lock().unwrap();
            let mut subscribed_at = self.subscribed_at.lock().unwrap();
            for sym in &symbols {
                symbol_conn.insert(sym.clone(), idx);
                subscribed_at.insert(sym.clone(), now);
            }
        }

        if !symbols.is_empty() {
            let conn = { self.connections.lock().await[idx].clone() };
            self.rate_limiter.acquire().await;
            let frame = connection::subscription_frame(true, idx, &symbols);
            let _ = conn.send_text(frame).await;
        }

        let handle = tokio::spawn(Self::run_reader(Arc::clone(self), idx, stream));
        self.reader_handles.lock().await.push(handle);

        Ok(idx)
    }

    /// Continuously receive frames for one connection; on close or error,
    /// reconnect with capped exponential backoff and resubmit the
    /// connection's assigned symbols (spec §4.2 "Reader per connection").
    async fn run_reader(
        self: Arc<Self>,
        conn_idx: usize,
        mut stream: futures_util::stream::SplitStream<WsStream>,
    ) {
        let mut backoff = build_backoff();

        loop {
            let needs_reconnect = match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    backoff.reset();
                    self.handle_frame(conn_idx, &text).await;
                    false
                }
                Some(Ok(_)) => false,
                Some(Err(_)) | None => true,
            };

            if needs_reconnect {
                self.reconnects.fetch_add(1, Ordering::SeqCst);
                metrics::record_ws_reconnect();
                stream = self.reconnect_loop(conn_idx, &mut backoff).await;
            }
        }
    }

    /// Retry opening a fresh connection until one succeeds, then swap it
    /// into `conn_idx` and resubmit that connection's currently-assigned
    /// symbols.
    async fn reconnect_loop(
        self: &Arc<Self>,
        conn_idx: usize,
        backoff: &mut ExponentialBackoff,
    ) -> futures_util::stream::SplitStream<WsStream> {
        loop {
            let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(60));
            tokio::time::sleep(delay).await;

            match connection::connect(&self.ws_url).await {
                Ok((sink, new_stream)) => {
                    let conn = { self.connections.lock().await[conn_idx].clone() };
                    conn.replace_sink(sink).await;

                    let symbols = conn.symbols.lock().unwrap().clone();
                    if !symbols.is_empty() {
                        self.rate_limiter.acquire().await;
                        let frame = connection::subscription_frame(true, conn_idx, &symbols);
                        let _ = conn.send_text(frame).await;
                    }

                    backoff.reset();
                    return new_stream;
                }
                Err(_) => continue,
            }
        }
    }

    /// Parse one inbound frame and apply it to the relevant cache, then run
    /// the post-update quality gate. Malformed frames are dropped silently
    /// with a warning (spec §7 "parse error"); envelopes with no
    /// recognized stream name are dropped without logging (not an error —
    /// e.g. a subscription ack).
    async fn handle_frame(self: &Arc<Self>, conn_idx: usize, text: &str) {
        match parse_frame(text) {
            Ok(Some(InboundMessage::Kline(kline))) => {
                let symbol = kline.symbol.clone();
                let now = self.now();
                self.kline_cache.lock().await.insert(symbol.clone(), kline.clone());
                {
                    let mut vol = self.quality_vol.lock().await;
                    vol.entry(symbol.clone())
                        .or_insert_with(|| RollingWindow::new(QUALITY_VOL_HORIZON_SEC))
                        .append(now, kline.quote_volume);
                }
                self.run_quality_check(&symbol).await;
            }
            Ok(Some(InboundMessage::Depth(diff))) => {
                let symbol = diff.symbol.clone();
                {
                    let mut books = self.books.lock().await;
                    books
                        .entry(symbol.clone())
                        .or_insert_with(OrderBookReplica::new)
                        .apply_diff(&diff);
                }
                self.depth_ready.lock().await.insert(symbol.clone());
                self.run_quality_check(&symbol).await;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(conn_idx, error = %err, "dropping malformed frame");
            }
        }
    }

    /// Unsubscribe `symbol` if its relative spread exceeds 1.5% or its
    /// 5-minute quote volume is below $20,000 (spec §4.2). A symbol is
    /// immune for `quality_cooldown_sec` after being (re)subscribed, so a
    /// scout-promoted symbol that hasn't accumulated volume yet isn't
    /// immediately dropped and re-promoted next cycle (spec §9 churn
    /// note; DESIGN.md's cooldown decision).
    async fn run_quality_check(self: &Arc<Self>, symbol: &str) {
        let now = self.now();
        let recently_subscribed = self
            .subscribed_at
            .lock()
            .unwrap()
            .get(symbol)
            .is_some_and(|&ts| now - ts < self.quality_cooldown_sec);
        if recently_subscribed {
            return;
        }

        let spread = {
            let books = self.books.lock().await;
            books.get(symbol).and_then(|b| b.get_best()).map(|((bid_p, _), (ask_p, _))| {
                let mid = (bid_p + ask_p) / 2.0;
                if mid > 0.0 { (ask_p - bid_p) / mid } else { 0.0 }
            })
        };
        let vol_sum = {
            let vol = self.quality_vol.lock().await;
            vol.get(symbol).map(|w| w.sum()).unwrap_or(0.0)
        };

        let fails_spread = spread.is_some_and(|s| s > QUALITY_MAX_SPREAD);
        let fails_volume = vol_sum < QUALITY_MIN_VOL_USD;
        if fails_spread || fails_volume {
            self.unsubscribe(symbol).await;
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Ok(mut handles) = self.reader_handles.try_lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
    }
}

impl SubscriptionTarget for Arc<Collector> {
    async fn subscribe(&self, symbol: &str) {
        Collector::subscribe(self, symbol).await
    }

    async fn unsubscribe(&self, symbol: &str) {
        Collector::unsubscribe(self, symbol).await
    }

    fn is_subscribed(&self, symbol: &str) -> bool {
        Collector::is_subscribed(self, symbol)
    }
}

/// First connection index with room for one more symbol (2 more streams),
/// or `None` if every connection is full.
fn find_connection_with_capacity(stream_counts: &[usize], max_streams_per_conn: usize) -> Option<usize> {
    stream_counts
        .iter()
        .position(|&count| count + 2 <= max_streams_per_conn)
}

fn build_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(1))
        .with_max_interval(Duration::from_secs(60))
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build()
}
