// src/domain/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One sampling interval of raw price action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Close above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Heikin-Ashi rendition of a [`Bar`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl SmoothedBar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Live quote snapshot. Fields the upstream cannot supply are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
}

/// Fundamental snapshot. Market cap is in absolute currency units, 0 when unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub market_cap: f64,
}

/// A qualifying instrument as produced by the signal evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub last_price: f64,
    pub change_percent: f64,
    pub bid: f64,
    pub ask: f64,
    pub market_cap: f64,
    pub volume: u64,
    pub ha_bullish: bool,
    pub normal_bullish: bool,
    pub first_candle_volume: u64,
    pub scan_time: DateTime<Utc>,
    pub parameters_used: String,
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} last={:.2} chg={:+.2}% bid={:.2} ask={:.2} vol={} first_vol={} HA={} Normal={}",
            self.symbol,
            self.last_price,
            self.change_percent,
            self.bid,
            self.ask,
            self.volume,
            self.first_candle_volume,
            self.ha_bullish,
            self.normal_bullish,
        )
    }
}

/// Qualifying instruments keyed by symbol. Unordered.
pub type ResultSet = HashMap<String, ScanResult>;

/// Archived result set of a superseded scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRun {
    pub timestamp: DateTime<Utc>,
    pub parameters: String,
    pub results: ResultSet,
}

impl ScanRun {
    pub fn new(parameters: &str, results: ResultSet) -> Self {
        Self {
            timestamp: Utc::now(),
            parameters: parameters.to_string(),
            results,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
