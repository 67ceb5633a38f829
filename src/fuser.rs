//! Tick fusion (spec §4.3): a background task that wakes on a short
//! interval, drains the symbol intersection of the kline/depth caches, and
//! hands each pair off as a [`Tick`] over a bounded channel. Grounded on
//! `original_source/scanner/collector.py::yield_ticks`'s cooperative
//! generator + background merger task, translated to the teacher's
//! `tokio::sync::mpsc` event-channel idiom (`src/market_data/mod.rs`'s
//! `event_tx`/`event_rx` pattern).

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::collector::{BookSnapshot, Tick};
use crate::exchange::KlineSnapshot;
use crate::orderbook::OrderBookReplica;

const MERGE_INTERVAL: Duration = Duration::from_millis(1);
const CHANNEL_CAPACITY: usize = 1024;

/// Lazy, infinite stream of fused [`Tick`]s. Dropping it cancels the
/// background merger task (spec: "on iterator teardown the background task
/// is cancelled and any pending queue items are discarded").
pub struct TickStream {
    receiver: ReceiverStream<Tick>,
    handle: JoinHandle<()>,
}

impl Stream for TickStream {
    type Item = Tick;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Tick>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for TickStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the merger task and return the consumer-facing [`TickStream`].
///
/// A symbol that never produces depth (or kline) never yields a `Tick`: the
/// merger only drains symbols present in *both* caches. A producer update
/// that arrives while a previous one is unconsumed silently overwrites it,
/// since both caches are plain last-value maps.
pub fn spawn(
    kline_cache: Arc<Mutex<HashMap<String, KlineSnapshot>>>,
    depth_ready: Arc<Mutex<HashSet<String>>>,
    books: Arc<Mutex<HashMap<String, OrderBookReplica>>>,
) -> TickStream {
    let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
    let start = Instant::now();

    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(MERGE_INTERVAL).await;

            let ready_symbols: Vec<String> = {
                let klines = kline_cache.lock().await;
                let depths = depth_ready.lock().await;
                klines
                    .keys()
                    .filter(|s| depths.contains(*s))
                    .cloned()
                    .collect()
            };

            for symbol in ready_symbols {
                let kline = {
                    let mut klines = kline_cache.lock().await;
                    klines.remove(&symbol)
                };
                let had_depth = {
                    let mut depths = depth_ready.lock().await;
                    depths.remove(&symbol)
                };
                let (Some(kline), true) = (kline, had_depth) else {
                    continue;
                };

                let depth = {
                    let books = books.lock().await;
                    books
                        .get(&symbol)
                        .map(snapshot_book)
                        .unwrap_or_default()
                };

                let tick = Tick {
                    symbol,
                    kline,
                    depth,
                    fused_at: start.elapsed().as_secs_f64(),
                };

                // A full channel means the consumer is behind; dropping the
                // tick here keeps fusion latency bounded rather than
                // blocking the merger loop indefinitely.
                if tx.try_send(tick).is_err() {
                    break;
                }
            }
        }
    });

    TickStream {
        receiver: ReceiverStream::new(rx),
        handle,
    }
}

fn snapshot_book(book: &OrderBookReplica) -> BookSnapshot {
    let best = book.get_best();
    let depth = book.cum_depth();
    BookSnapshot {
        best_bid: best.map(|(bid, _)| bid),
        best_ask: best.map(|(_, ask)| ask),
        cum_bid_depth: depth.map(|(b, _)| b).unwrap_or(0.0),
        cum_ask_depth: depth.map(|(_, a)| a).unwrap_or(0.0),
    }
}
