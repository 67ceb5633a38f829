use clap::Parser;
use pump_scanner_core::collector::Collector;
use pump_scanner_core::config::Config;
use pump_scanner_core::model::LogisticModel;
use pump_scanner_core::scanner::Scanner;
use pump_scanner_core::scout::VolumeScout;
use pump_scanner_core::{AppResult, init_logging, symbols};
use std::sync::Arc;
use tokio_stream::StreamExt;

#[derive(Parser, Debug)]
#[command(name = "pump-scanner", about = "Realtime crypto pump scanner core")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "scanner.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let config = Config::load_from_file(&cli.config)?;

    let _log_guard = init_logging(&config.logging.level, &config.logging.file_path)?;
    tracing::info!("pump scanner core starting");

    let initial_symbols = bootstrap_initial_symbols(&config).await;
    tracing::info!(count = initial_symbols.len(), "bootstrapped initial symbol set");

    let collector = Collector::connect(
        &config.mexc.ws_url,
        config.ws.max_streams_per_conn,
        config.ws.max_msg_per_sec,
        config.ws.quality_cooldown_sec,
        &initial_symbols,
    )
    .await?;

    let scout = VolumeScout::new(
        &config.mexc.rest_url,
        config.scout.min_quote_vol_usd,
        config.scout.top_n,
    );
    let model = LogisticModel::with_thresholds(config.scanner.metrics.clone());

    let scanner = Arc::new(Scanner::new(
        collector,
        scout,
        &config.subscriptions,
        model,
        config.scanner.metrics.clone(),
        config.scanner.prob_threshold,
    ));

    let mut signals = scanner.run();

    tokio::select! {
        _ = async {
            while let Some(signal) = signals.next().await {
                tracing::info!(
                    symbol = %signal.feature_vector.symbol,
                    probability = signal.probability,
                    vsr = signal.feature_vector.vsr,
                    pm = signal.feature_vector.pm,
                    "signal emitted"
                );
            }
        } => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested, tearing down");
        }
    }

    drop(signals);
    Ok(())
}

/// Seed the initial symbol set from the scout's first poll, falling back to
/// the full exchange symbol list if that poll fails (spec.md is silent on
/// bootstrap; see SPEC_FULL.md's scout/symbols section).
async fn bootstrap_initial_symbols(config: &Config) -> Vec<String> {
    let mut scout = VolumeScout::new(
        &config.mexc.rest_url,
        config.scout.min_quote_vol_usd,
        config.scout.top_n,
    );

    match scout.poll(0.0).await {
        Ok(pairs) if !pairs.is_empty() => pairs.into_iter().map(|p| p.symbol).collect(),
        _ => symbols::fetch_all_pairs(&config.mexc.rest_url)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to an empty initial symbol set");
                Vec::new()
            }),
    }
}
