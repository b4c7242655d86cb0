// src/main.rs
use first_candle_scanner::config::{load_settings, Config, APP_NAME};
use first_candle_scanner::domain::errors::{AppError, AppResult};
use first_candle_scanner::domain::settings::Settings;
use first_candle_scanner::engine::ScanEngine;
use first_candle_scanner::exchange::client::{LoggingSubscriber, MarketDataSource};
use first_candle_scanner::exchange::replay::ReplayDataSource;

use std::sync::Arc;
use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
    log::info!(
        "Upstream gateway {}:{} (client id {})",
        config.connection.host,
        config.connection.port,
        config.connection.client_id
    );

    // Scanner settings survive restarts; a broken file falls back to defaults
    let settings = match load_settings(&config.scanner.settings_file) {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings::default(),
        Err(e) => {
            log::warn!("Error loading settings: {}; using defaults", e);
            Settings::default()
        }
    };
    log::info!("Active settings: {}", settings);

    // Create data source
    let source = create_data_source(&config)?;

    let engine = ScanEngine::from_config(source, settings, &config.scanner)?;
    engine.set_subscriber(Arc::new(LoggingSubscriber));

    log::info!("Connecting to data source...");
    engine.connect().await?;

    if let Some(close) = engine.first_candle_close_today() {
        log::info!(
            "First candle closes at {}",
            engine.clock().local_time(close).format("%H:%M %Z")
        );
    }

    // One immediate scan, then hand over to the monitor
    if let Err(e) = engine.run_scan().await {
        log::error!("Initial scan failed: {}", e);
    }

    engine.start_monitoring(config.scanner.scan_interval());

    log::info!("Scanner running. Press Ctrl+C to exit.");
    ctrl_c()
        .await
        .map_err(|e| AppError::Config(format!("Failed to listen for shutdown signal: {}", e)))?;

    log::info!("Shutting down...");
    engine.stop_monitoring().await;
    engine.disconnect().await?;

    let history = engine.previous_runs(usize::MAX);
    log::info!(
        "Session finished with {} live results and {} archived scans",
        engine.live_results().len(),
        history.len()
    );

    Ok(())
}

fn create_data_source(config: &Config) -> AppResult<Arc<dyn MarketDataSource>> {
    let path = config.scanner.snapshot_file.as_deref().ok_or_else(|| {
        AppError::Config("SNAPSHOT_FILE must point to a recorded market snapshot".to_string())
    })?;

    Ok(Arc::new(ReplayDataSource::from_file(path)?))
}
