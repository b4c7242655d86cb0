// src/exchange/client.rs
use crate::domain::errors::DataResult;
use crate::domain::models::{Bar, Fundamentals, LiveQuote, ResultSet};
use crate::domain::settings::UniverseFilter;
use async_trait::async_trait;

/// Upstream broker / data provider the scanner samples from.
///
/// Implementations own their own connection state and per-call timeouts.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Open the upstream session
    async fn connect(&self) -> DataResult<()>;

    /// Close the upstream session
    async fn disconnect(&self) -> DataResult<()>;

    fn is_connected(&self) -> bool;

    /// Symbols matching the server-side filter. Zero matches is not an error.
    async fn fetch_candidate_universe(&self, filter: &UniverseFilter) -> DataResult<Vec<String>>;

    /// Regular-trading-hours bars at `timeframe_minutes`, oldest first.
    async fn fetch_session_bars(&self, symbol: &str, timeframe_minutes: u32) -> DataResult<Vec<Bar>>;

    /// Live quote snapshot with unavailable fields zero-filled.
    async fn fetch_live_quote(&self, symbol: &str) -> DataResult<LiveQuote>;

    /// Fundamental snapshot; market cap defaults to 0 when unknown.
    async fn fetch_fundamentals(&self, symbol: &str) -> DataResult<Fundamentals>;
}

/// Receives the live set after every completed scan.
pub trait ScanSubscriber: Send + Sync {
    fn on_results_updated(&self, results: &ResultSet);
}

impl<F> ScanSubscriber for F
where
    F: Fn(&ResultSet) + Send + Sync,
{
    fn on_results_updated(&self, results: &ResultSet) {
        self(results)
    }
}

/// Subscriber that writes every update to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSubscriber;

impl ScanSubscriber for LoggingSubscriber {
    fn on_results_updated(&self, results: &ResultSet) {
        if results.is_empty() {
            log::info!("No stocks currently meet the first candle criteria");
            return;
        }

        let mut symbols: Vec<&String> = results.keys().collect();
        symbols.sort();

        log::info!("=== {} stocks meeting criteria ===", results.len());
        for symbol in symbols {
            if let Some(result) = results.get(symbol) {
                log::info!("{}", result);
            }
        }
    }
}
