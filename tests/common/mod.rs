// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use first_candle_scanner::domain::errors::{DataResult, DataSourceError};
use first_candle_scanner::domain::models::{Bar, Fundamentals, LiveQuote};
use first_candle_scanner::domain::settings::{Exchange, UniverseFilter};
use first_candle_scanner::engine::{ScanEngine, ScanEngineBuilder};
use first_candle_scanner::exchange::client::MarketDataSource;
use first_candle_scanner::exchange::replay::{InstrumentSnapshot, MarketSnapshot, ReplayDataSource};
use first_candle_scanner::market::clock::{MarketSchedule, TimeSource};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

/// Opening bell of the recorded session: Monday 2024-01-08, 09:30 New York.
pub fn today_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 14, 30, 0).unwrap()
}

/// Half an hour into the recorded session.
pub fn scan_time() -> DateTime<Utc> {
    today_open() + Duration::minutes(30)
}

/// Always reports the same instant.
pub struct FixedTime(pub DateTime<Utc>);

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Engine builder pinned to [`scan_time`].
pub fn engine_builder(source: Arc<ScriptedSource>) -> ScanEngineBuilder {
    ScanEngine::builder(source).time_source(Arc::new(FixedTime(scan_time())))
}

/// Two 2-minute bars from today's open. The first closes above its open
/// when `bullish`.
pub fn session_bars(first_volume: u64, bullish: bool) -> Vec<Bar> {
    let open = today_open();
    let (o, c) = if bullish { (10.0, 11.0) } else { (11.0, 10.0) };
    vec![
        Bar {
            timestamp: open,
            open: o,
            high: 11.5,
            low: 9.5,
            close: c,
            volume: first_volume,
        },
        Bar {
            timestamp: open + Duration::minutes(2),
            open: c,
            high: 11.8,
            low: 10.2,
            close: 11.4,
            volume: 80_000,
        },
    ]
}

pub fn instrument(symbol: &str, first_volume: u64, bullish: bool) -> InstrumentSnapshot {
    InstrumentSnapshot {
        symbol: symbol.to_string(),
        exchange: Exchange::Nasdaq,
        timeframe_minutes: 2,
        bars: session_bars(first_volume, bullish),
        quote: LiveQuote {
            last: 11.5,
            bid: 11.49,
            ask: 11.51,
            volume: 1_200_000,
        },
        market_cap: 5e9,
    }
}

pub fn replay(instruments: Vec<InstrumentSnapshot>) -> ReplayDataSource {
    ReplayDataSource::new(MarketSnapshot { instruments })
}

/// Wraps a replay source with injectable failures and call accounting.
pub struct ScriptedSource {
    pub inner: ReplayDataSource,
    pub fail_universe: AtomicBool,
    pub universe_calls: AtomicUsize,
    pub in_flight_universe: AtomicUsize,
    pub max_in_flight_universe: AtomicUsize,
    universe_delay: Mutex<StdDuration>,
    bar_delays: Mutex<HashMap<String, StdDuration>>,
    failing_quotes: Mutex<HashSet<String>>,
    failing_fundamentals: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl ScriptedSource {
    pub fn new(inner: ReplayDataSource) -> Self {
        Self {
            inner,
            fail_universe: AtomicBool::new(false),
            universe_calls: AtomicUsize::new(0),
            in_flight_universe: AtomicUsize::new(0),
            max_in_flight_universe: AtomicUsize::new(0),
            universe_delay: Mutex::new(StdDuration::ZERO),
            bar_delays: Mutex::new(HashMap::new()),
            failing_quotes: Mutex::new(HashSet::new()),
            failing_fundamentals: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_universe_delay(&self, delay: StdDuration) {
        *self.universe_delay.lock().unwrap() = delay;
    }

    pub fn delay_bars(&self, symbol: &str, delay: StdDuration) {
        self.bar_delays.lock().unwrap().insert(symbol.to_string(), delay);
    }

    pub fn fail_quote(&self, symbol: &str) {
        self.failing_quotes.lock().unwrap().insert(symbol.to_string());
    }

    pub fn fail_fundamentals(&self, symbol: &str) {
        self.failing_fundamentals
            .lock()
            .unwrap()
            .insert(symbol.to_string());
    }

    pub fn panic_on_bars(&self, symbol: &str) {
        self.panicking.lock().unwrap().insert(symbol.to_string());
    }

    pub fn clear_panics(&self) {
        self.panicking.lock().unwrap().clear();
    }

    pub fn universe_calls(&self) -> usize {
        self.universe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn connect(&self) -> DataResult<()> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> DataResult<()> {
        self.inner.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn fetch_candidate_universe(&self, filter: &UniverseFilter) -> DataResult<Vec<String>> {
        self.universe_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight_universe.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_universe.fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.universe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_universe.load(Ordering::SeqCst) {
            Err(DataSourceError::Request("scanner subscription rejected".to_string()))
        } else {
            self.inner.fetch_candidate_universe(filter).await
        };

        self.in_flight_universe.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_session_bars(&self, symbol: &str, timeframe_minutes: u32) -> DataResult<Vec<Bar>> {
        if self.panicking.lock().unwrap().contains(symbol) {
            panic!("bar decoder blew up for {}", symbol);
        }

        let delay = self.bar_delays.lock().unwrap().get(symbol).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.inner.fetch_session_bars(symbol, timeframe_minutes).await
    }

    async fn fetch_live_quote(&self, symbol: &str) -> DataResult<LiveQuote> {
        if self.failing_quotes.lock().unwrap().contains(symbol) {
            return Err(DataSourceError::Timeout(format!("quote for {}", symbol)));
        }
        self.inner.fetch_live_quote(symbol).await
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> DataResult<Fundamentals> {
        if self.failing_fundamentals.lock().unwrap().contains(symbol) {
            return Err(DataSourceError::Request(format!("no fundamentals for {}", symbol)));
        }
        self.inner.fetch_fundamentals(symbol).await
    }
}

/// Schedule whose open/closed answer is flipped by the test.
pub struct SwitchSchedule {
    open: AtomicBool,
}

impl SwitchSchedule {
    pub fn new(open: bool) -> Self {
        Self {
            open: AtomicBool::new(open),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl MarketSchedule for SwitchSchedule {
    fn is_open(&self, _at: DateTime<Utc>) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
