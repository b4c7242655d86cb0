// src/scanner/orchestrator.rs
use crate::domain::errors::{DataResult, ScanError, ScanOutcome};
use crate::domain::models::{Fundamentals, ResultSet, ScanResult};
use crate::domain::settings::{Settings, UniverseFilter};
use crate::exchange::client::{MarketDataSource, ScanSubscriber};
use crate::market::clock::{TimeSource, WallClock};
use crate::scanner::evaluator::SignalEvaluator;
use crate::scanner::session::SessionState;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_INSTRUMENT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
/// Upstream scanner row limit.
pub const MAX_SCANNER_RESULTS: usize = 50;

/// Tuning knobs for a [`Scanner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScannerOptions {
    /// Upper bound on all upstream work for a single instrument.
    pub instrument_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub max_universe_rows: usize,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            instrument_timeout: DEFAULT_INSTRUMENT_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_universe_rows: MAX_SCANNER_RESULTS,
        }
    }
}

/// Runs scans: fetch the universe, evaluate every candidate, publish the live set.
///
/// At most one scan executes at a time; a second caller waits for the first
/// to finish and then runs its own scan.
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    session: Arc<SessionState>,
    evaluator: SignalEvaluator,
    options: ScannerOptions,
    time: Arc<dyn TimeSource>,
    subscriber: RwLock<Option<Arc<dyn ScanSubscriber>>>,
    scan_guard: Mutex<()>,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        session: Arc<SessionState>,
        evaluator: SignalEvaluator,
        options: ScannerOptions,
    ) -> Self {
        Self {
            source,
            session,
            evaluator,
            options,
            time: Arc::new(WallClock),
            subscriber: RwLock::new(None),
            scan_guard: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Replace the wall clock, e.g. to replay a recorded session.
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Register the callback invoked after every completed scan
    pub fn set_subscriber(&self, subscriber: Arc<dyn ScanSubscriber>) {
        *self
            .subscriber
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscriber);
    }

    pub fn clear_subscriber(&self) {
        *self
            .subscriber
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Run one full scan and publish its results.
    ///
    /// On failure the session keeps its last-known-good live set and history.
    pub async fn run_scan(&self) -> ScanOutcome<ResultSet> {
        let _guard = self.scan_guard.lock().await;

        if !self.source.is_connected() {
            log::error!("Not connected to data source");
            return Err(ScanError::NotConnected);
        }

        // One snapshot for the whole scan, however settings change meanwhile.
        let settings = self.session.settings();
        let now = self.now();
        log::info!("Starting scan... ({})", settings.describe());

        let filter = UniverseFilter::from_settings(&settings, self.options.max_universe_rows);
        let symbols = self
            .source
            .fetch_candidate_universe(&filter)
            .await
            .map_err(|e| {
                log::error!("Error fetching stock universe: {}", e);
                ScanError::Universe(e)
            })?;
        log::info!("Fetched {} stocks from scanner", symbols.len());

        let evaluated: Vec<Option<ScanResult>> = stream::iter(symbols)
            .map(|symbol| self.scan_symbol(symbol, &settings, now))
            .buffer_unordered(self.options.max_concurrent_requests.max(1))
            .collect()
            .await;

        let mut results = ResultSet::new();
        for result in evaluated.into_iter().flatten() {
            log::info!(
                "Found signal: {} - HA:{} Normal:{}",
                result.symbol,
                result.ha_bullish,
                result.normal_bullish
            );
            results.insert(result.symbol.clone(), result);
        }

        if self.session.commit_scan(&settings.describe(), results.clone()) {
            log::debug!("Archived previous scan run");
        }

        let subscriber = self
            .subscriber
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(subscriber) = subscriber {
            subscriber.on_results_updated(&results);
        }

        log::info!("Scan complete. Found {} stocks meeting criteria.", results.len());
        Ok(results)
    }

    /// Evaluate one candidate under the per-instrument timeout. Failures are
    /// logged and count as no result.
    async fn scan_symbol(
        &self,
        symbol: String,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Option<ScanResult> {
        let timeout = self.options.instrument_timeout;

        match tokio::time::timeout(timeout, self.evaluate_symbol(&symbol, settings, now)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                log::debug!("Error scanning {}: {}", symbol, e);
                None
            }
            Err(_) => {
                log::warn!("Scanning {} timed out after {:?}", symbol, timeout);
                None
            }
        }
    }

    async fn evaluate_symbol(
        &self,
        symbol: &str,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> DataResult<Option<ScanResult>> {
        let bars = self
            .source
            .fetch_session_bars(symbol, settings.timeframe_minutes())
            .await?;

        // Quotes and fundamentals are only worth requesting for qualifiers.
        let Some(signal) = self.evaluator.first_candle_signal(&bars, settings, now) else {
            return Ok(None);
        };

        let quote = self.source.fetch_live_quote(symbol).await?;
        let fundamentals = match self.source.fetch_fundamentals(symbol).await {
            Ok(fundamentals) => fundamentals,
            Err(e) => {
                log::debug!("Could not fetch fundamental data for {}: {}", symbol, e);
                Fundamentals::default()
            }
        };

        Ok(Some(self.evaluator.build_result(
            symbol,
            signal,
            &bars,
            &quote,
            &fundamentals,
            settings,
            now,
        )))
    }
}
