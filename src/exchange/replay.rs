// src/exchange/replay.rs
use crate::domain::errors::{AppError, AppResult, DataResult, DataSourceError};
use crate::domain::models::{Bar, Fundamentals, LiveQuote};
use crate::domain::settings::{Exchange, UniverseFilter};
use crate::exchange::client::MarketDataSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Recorded market state for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub exchange: Exchange,
    pub timeframe_minutes: u32,
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub quote: LiveQuote,
    /// Absolute currency units
    #[serde(default)]
    pub market_cap: f64,
}

impl InstrumentSnapshot {
    /// Live last price, or the latest bar close when no trade has printed.
    pub fn reference_price(&self) -> f64 {
        if self.quote.last > 0.0 {
            self.quote.last
        } else {
            self.bars.last().map(|bar| bar.close).unwrap_or_default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub instruments: Vec<InstrumentSnapshot>,
}

/// In-process upstream that serves a recorded [`MarketSnapshot`].
///
/// Universe requests emulate server-side scanner filtering: exchange scope,
/// price, market cap, volume and the row limit.
pub struct ReplayDataSource {
    instruments: RwLock<Vec<InstrumentSnapshot>>,
    connected: AtomicBool,
}

impl ReplayDataSource {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            instruments: RwLock::new(snapshot.instruments),
            connected: AtomicBool::new(false),
        }
    }

    /// Load a snapshot from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open snapshot file {}: {}", path.display(), e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read snapshot file {}: {}", path.display(), e))
        })?;

        let snapshot: MarketSnapshot = serde_json::from_str(&contents)?;
        log::info!(
            "Loaded market snapshot with {} instruments from {}",
            snapshot.instruments.len(),
            path.display()
        );

        Ok(Self::new(snapshot))
    }

    /// Insert or replace an instrument's recorded state.
    pub fn upsert(&self, instrument: InstrumentSnapshot) {
        let mut instruments = self
            .instruments
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match instruments.iter_mut().find(|i| i.symbol == instrument.symbol) {
            Some(existing) => *existing = instrument,
            None => instruments.push(instrument),
        }
    }

    /// Drop an instrument from the recorded universe.
    pub fn remove(&self, symbol: &str) {
        self.instruments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|i| i.symbol != symbol);
    }

    fn ensure_connected(&self) -> DataResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DataSourceError::NotConnected)
        }
    }

    fn with_instrument<T>(
        &self,
        symbol: &str,
        f: impl FnOnce(&InstrumentSnapshot) -> DataResult<T>,
    ) -> DataResult<T> {
        self.ensure_connected()?;
        let instruments = self
            .instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        instruments
            .iter()
            .find(|i| i.symbol == symbol)
            .ok_or_else(|| DataSourceError::InvalidSymbol(symbol.to_string()))
            .and_then(f)
    }
}

#[async_trait]
impl MarketDataSource for ReplayDataSource {
    async fn connect(&self) -> DataResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        log::info!("Connected to replay data source");
        Ok(())
    }

    async fn disconnect(&self) -> DataResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            log::info!("Disconnected from replay data source");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn fetch_candidate_universe(&self, filter: &UniverseFilter) -> DataResult<Vec<String>> {
        self.ensure_connected()?;
        let instruments = self
            .instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let symbols: Vec<String> = instruments
            .iter()
            .filter(|i| filter.exchange.includes(i.exchange))
            .filter(|i| filter.matches(i.reference_price(), i.market_cap, i.quote.volume))
            .take(filter.max_rows)
            .map(|i| i.symbol.clone())
            .collect();

        log::debug!(
            "Replay universe for {} ({}) {:?}: {} symbols",
            filter.location_code(),
            filter.scan_code,
            filter.tags(),
            symbols.len()
        );
        Ok(symbols)
    }

    async fn fetch_session_bars(&self, symbol: &str, timeframe_minutes: u32) -> DataResult<Vec<Bar>> {
        self.with_instrument(symbol, |instrument| {
            if instrument.timeframe_minutes != timeframe_minutes {
                return Err(DataSourceError::Request(format!(
                    "No {}m bars recorded for {} (have {}m)",
                    timeframe_minutes, symbol, instrument.timeframe_minutes
                )));
            }
            // Bars must be strictly ascending with no duplicate timestamps.
            if let Some(pair) = instrument
                .bars
                .windows(2)
                .find(|pair| pair[1].timestamp <= pair[0].timestamp)
            {
                return Err(DataSourceError::Parse(format!(
                    "Bars for {} out of order at {}",
                    symbol, pair[1].timestamp
                )));
            }
            Ok(instrument.bars.clone())
        })
    }

    async fn fetch_live_quote(&self, symbol: &str) -> DataResult<LiveQuote> {
        self.with_instrument(symbol, |instrument| Ok(instrument.quote))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> DataResult<Fundamentals> {
        self.with_instrument(symbol, |instrument| {
            Ok(Fundamentals {
                market_cap: instrument.market_cap,
            })
        })
    }
}
