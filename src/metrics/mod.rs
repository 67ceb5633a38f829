//! Metrics recording for the four observables named in spec §6.
//!
//! This module records into the `metrics` facade (already a teacher
//! dependency, previously unused); it does not start an exporter — wiring a
//! `metrics-exporter-*` recorder before constructing a [`crate::scanner::Scanner`]
//! is the embedding application's job, per spec §1 ("metrics exposition
//! endpoint" is an external collaborator).

use metrics::{counter, gauge, histogram};

const WS_RECONNECTS_TOTAL: &str = "ws_reconnects_total";
const SIGNALS_TOTAL: &str = "signals_total";
const ACTIVE_STREAMS: &str = "active_streams";
const PIPELINE_LATENCY_MS: &str = "pipeline_latency_ms";

/// A WebSocket connection was lost and a reconnect attempt is starting.
pub fn record_ws_reconnect() {
    counter!(WS_RECONNECTS_TOTAL).increment(1);
}

/// A signal crossed the probability threshold and was emitted.
pub fn record_signal() {
    counter!(SIGNALS_TOTAL).increment(1);
}

/// Gauge of currently active streams, `2 * |subscribed symbols|`.
pub fn set_active_streams(count: u64) {
    gauge!(ACTIVE_STREAMS).set(count as f64);
}

/// Pipeline latency in milliseconds, from tick fusion timestamp to signal
/// emission.
pub fn record_pipeline_latency_ms(latency_ms: f64) {
    histogram!(PIPELINE_LATENCY_MS).record(latency_ms);
}
