//! Realtime market-data ingestion and feature-extraction core for a
//! cryptocurrency pump scanner.
//!
//! Components, leaves first: [`rolling_window`] and [`orderbook`] hold
//! bounded per-symbol state; [`collector`] owns the WebSocket connections and
//! the order-book replicas built from them; [`fuser`] joins kline and depth
//! updates into [`Tick`](collector::Tick)s; [`feature_engine`] turns ticks
//! into [`FeatureVector`](feature_engine::FeatureVector)s; [`filter`] screens
//! them against configured thresholds; [`scout`] polls the REST "hotness"
//! endpoint and [`subscription_manager`] applies its output to the
//! collector; [`scanner`] wires all of the above into the orchestrator.

pub mod collector;
pub mod config;
pub mod error;
pub mod exchange;
pub mod feature_engine;
pub mod filter;
pub mod fuser;
pub mod metrics;
pub mod model;
pub mod orderbook;
pub mod rolling_window;
pub mod scanner;
pub mod scout;
pub mod subscription_manager;
pub mod symbols;

use anyhow::Result;

/// Application result type for consistent error handling.
pub type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Initialize the tracing subscriber: an env-filtered stdout layer plus a
/// rolling daily file sink under `log_file_path`.
pub fn init_logging(
    level: &str,
    log_file_path: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let path = std::path::Path::new(log_file_path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pump-scanner.log".to_string());
    std::fs::create_dir_all(dir).ok();
    let file_appender = tracing_appender::rolling::daily(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pump_scanner_core={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()
        .ok();

    Ok(guard)
}
