// src/engine.rs
use crate::config::ScannerConfig;
use crate::domain::errors::{AppResult, DataResult, ScanOutcome};
use crate::domain::models::{ResultSet, ScanRun};
use crate::domain::settings::Settings;
use crate::exchange::client::{MarketDataSource, ScanSubscriber};
use crate::market::clock::{MarketClock, MarketSchedule, TimeSource, WallClock};
use crate::scanner::evaluator::SignalEvaluator;
use crate::scanner::monitor::{Monitor, MonitorState};
use crate::scanner::orchestrator::{Scanner, ScannerOptions};
use crate::scanner::session::{SessionState, DEFAULT_HISTORY_CAPACITY};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Owns the session state and every component that reads or writes it.
///
/// Construct once and share by reference; there is no global scanner state.
pub struct ScanEngine {
    source: Arc<dyn MarketDataSource>,
    session: Arc<SessionState>,
    scanner: Arc<Scanner>,
    monitor: Monitor,
    clock: MarketClock,
}

pub struct ScanEngineBuilder {
    source: Arc<dyn MarketDataSource>,
    settings: Settings,
    clock: MarketClock,
    options: ScannerOptions,
    history_capacity: usize,
    schedule: Option<Arc<dyn MarketSchedule>>,
    time: Arc<dyn TimeSource>,
}

impl ScanEngineBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: MarketClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(mut self, options: ScannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Override when the monitor considers the market open. Defaults to the clock.
    pub fn schedule(mut self, schedule: Arc<dyn MarketSchedule>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Source of "now" for scans and the scheduler. Defaults to the wall clock.
    pub fn time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn build(self) -> ScanEngine {
        let session = Arc::new(SessionState::new(self.settings, self.history_capacity));
        let scanner = Arc::new(
            Scanner::new(
                self.source.clone(),
                session.clone(),
                SignalEvaluator::new(self.clock),
                self.options,
            )
            .with_time_source(self.time),
        );
        let schedule = self
            .schedule
            .unwrap_or_else(|| Arc::new(self.clock) as Arc<dyn MarketSchedule>);
        let monitor = Monitor::new(scanner.clone(), schedule);

        ScanEngine {
            source: self.source,
            session,
            scanner,
            monitor,
            clock: self.clock,
        }
    }
}

impl ScanEngine {
    pub fn builder(source: Arc<dyn MarketDataSource>) -> ScanEngineBuilder {
        ScanEngineBuilder {
            source,
            settings: Settings::default(),
            clock: MarketClock::default(),
            options: ScannerOptions::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            schedule: None,
            time: Arc::new(WallClock),
        }
    }

    /// Engine wired from application configuration.
    pub fn from_config(
        source: Arc<dyn MarketDataSource>,
        settings: Settings,
        config: &ScannerConfig,
    ) -> AppResult<Self> {
        Ok(Self::builder(source)
            .settings(settings)
            .clock(config.market_clock()?)
            .options(config.scanner_options())
            .history_capacity(config.history_capacity)
            .build())
    }

    pub async fn connect(&self) -> DataResult<()> {
        match self.source.connect().await {
            Ok(()) => {
                log::info!("Connected to data source");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to connect to data source: {}", e);
                Err(e)
            }
        }
    }

    /// Stop monitoring, then close the upstream session.
    pub async fn disconnect(&self) -> DataResult<()> {
        self.monitor.stop().await;
        if self.source.is_connected() {
            self.source.disconnect().await?;
            log::info!("Disconnected from data source");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_connected()
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.session.settings()
    }

    /// Replace the active settings. Scans already in flight keep their snapshot.
    pub fn update_settings(&self, settings: Settings) {
        log::info!("Scanner settings updated: {}", settings);
        self.session.replace_settings(settings);
    }

    pub fn set_subscriber(&self, subscriber: Arc<dyn ScanSubscriber>) {
        self.scanner.set_subscriber(subscriber);
    }

    pub fn clear_subscriber(&self) {
        self.scanner.clear_subscriber();
    }

    /// Run a single scan now, serialised with any scheduled scan.
    pub async fn run_scan(&self) -> ScanOutcome<ResultSet> {
        self.scanner.run_scan().await
    }

    pub fn start_monitoring(&self, interval: Duration) -> bool {
        self.monitor.start(interval)
    }

    pub async fn stop_monitoring(&self) -> bool {
        self.monitor.stop().await
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn live_results(&self) -> ResultSet {
        self.session.live_results()
    }

    /// Most recent archived runs, oldest first.
    pub fn previous_runs(&self, limit: usize) -> Vec<ScanRun> {
        self.session.history(limit)
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn clock(&self) -> &MarketClock {
        &self.clock
    }

    /// When today's first candle completes under the active timeframe.
    pub fn first_candle_close_today(&self) -> Option<DateTime<Utc>> {
        let date = self.clock.session_date(self.scanner.now());
        self.clock
            .first_candle_close(date, self.settings().timeframe_minutes())
    }
}
