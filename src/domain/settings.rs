// src/domain/settings.rs
use crate::domain::errors::SettingsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle timeframes, in minutes, the upstream can deliver.
pub const AVAILABLE_TIMEFRAMES: [u32; 8] = [1, 2, 3, 5, 10, 15, 30, 60];

/// Persisted market-cap bounds are expressed in billions.
pub const MARKET_CAP_SCALE: f64 = 1e9;

/// Scanner scan code used when requesting the candidate universe.
pub const DEFAULT_SCAN_CODE: &str = "MOST_ACTIVE";

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 100.0;
pub const DEFAULT_MIN_MARKET_CAP_BILLIONS: f64 = 0.0;
pub const DEFAULT_MAX_MARKET_CAP_BILLIONS: f64 = 100.0;
pub const DEFAULT_MIN_VOLUME: u64 = 100_000;
pub const DEFAULT_TIMEFRAME: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nasdaq,
    Nyse,
    Both,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Nyse => "NYSE",
            Exchange::Both => "BOTH",
        }
    }

    /// Scanner location code for this scope.
    pub fn location_code(&self) -> &'static str {
        match self {
            Exchange::Nasdaq => "STK.NASDAQ",
            Exchange::Nyse => "STK.NYSE",
            Exchange::Both => "STK.US.MAJOR",
        }
    }

    /// Whether an instrument listed on `listing` falls inside this scope.
    pub fn includes(&self, listing: Exchange) -> bool {
        match self {
            Exchange::Both => true,
            scope => *scope == listing,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated scanner settings.
///
/// Only constructible through [`SettingsBuilder`] (or a [`SettingsRecord`]
/// conversion), so every live instance satisfies its range and timeframe
/// constraints. Never mutated in place: callers replace the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SettingsRecord", into = "SettingsRecord")]
pub struct Settings {
    exchange: Exchange,
    min_price: f64,
    max_price: f64,
    min_market_cap: f64,
    max_market_cap: f64,
    min_volume: u64,
    timeframe_minutes: u32,
    detect_ha_candle: bool,
    detect_normal_candle: bool,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn min_price(&self) -> f64 {
        self.min_price
    }

    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    /// Lower market-cap bound in absolute currency units.
    pub fn min_market_cap(&self) -> f64 {
        self.min_market_cap
    }

    /// Upper market-cap bound in absolute currency units.
    pub fn max_market_cap(&self) -> f64 {
        self.max_market_cap
    }

    pub fn min_volume(&self) -> u64 {
        self.min_volume
    }

    pub fn timeframe_minutes(&self) -> u32 {
        self.timeframe_minutes
    }

    pub fn detect_ha_candle(&self) -> bool {
        self.detect_ha_candle
    }

    pub fn detect_normal_candle(&self) -> bool {
        self.detect_normal_candle
    }

    /// Short tag attached to results and archived runs.
    pub fn describe(&self) -> String {
        format!(
            "TF:{}m | Vol:{} | Price:${:.2}-${:.2}",
            self.timeframe_minutes, self.min_volume, self.min_price, self.max_price
        )
    }

    /// Builder seeded with these values, for deriving a replacement.
    pub fn to_builder(&self) -> SettingsBuilder {
        SettingsBuilder {
            exchange: self.exchange,
            min_price: self.min_price,
            max_price: self.max_price,
            min_market_cap: self.min_market_cap,
            max_market_cap: self.max_market_cap,
            min_volume: self.min_volume,
            timeframe_minutes: self.timeframe_minutes,
            detect_ha_candle: self.detect_ha_candle,
            detect_normal_candle: self.detect_normal_candle,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exchange: Exchange::Both,
            min_price: DEFAULT_MIN_PRICE,
            max_price: DEFAULT_MAX_PRICE,
            min_market_cap: DEFAULT_MIN_MARKET_CAP_BILLIONS * MARKET_CAP_SCALE,
            max_market_cap: DEFAULT_MAX_MARKET_CAP_BILLIONS * MARKET_CAP_SCALE,
            min_volume: DEFAULT_MIN_VOLUME,
            timeframe_minutes: DEFAULT_TIMEFRAME,
            detect_ha_candle: true,
            detect_normal_candle: true,
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Exchange: {} | TF: {}m | Vol: {} | Price: ${:.2}-${:.2} | Market Cap: ${:.2}B-${:.2}B | HA: {} | Normal: {}",
            self.exchange,
            self.timeframe_minutes,
            self.min_volume,
            self.min_price,
            self.max_price,
            self.min_market_cap / MARKET_CAP_SCALE,
            self.max_market_cap / MARKET_CAP_SCALE,
            self.detect_ha_candle,
            self.detect_normal_candle,
        )
    }
}

/// Accumulates settings fields and validates them all at once.
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    exchange: Exchange,
    min_price: f64,
    max_price: f64,
    min_market_cap: f64,
    max_market_cap: f64,
    min_volume: u64,
    timeframe_minutes: u32,
    detect_ha_candle: bool,
    detect_normal_candle: bool,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Settings::default().to_builder()
    }
}

impl SettingsBuilder {
    pub fn exchange(mut self, exchange: Exchange) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn price_range(mut self, min: f64, max: f64) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    /// Bounds in absolute currency units.
    pub fn market_cap_range(mut self, min: f64, max: f64) -> Self {
        self.min_market_cap = min;
        self.max_market_cap = max;
        self
    }

    pub fn min_volume(mut self, min_volume: u64) -> Self {
        self.min_volume = min_volume;
        self
    }

    pub fn timeframe_minutes(mut self, minutes: u32) -> Self {
        self.timeframe_minutes = minutes;
        self
    }

    pub fn detect_ha_candle(mut self, enabled: bool) -> Self {
        self.detect_ha_candle = enabled;
        self
    }

    pub fn detect_normal_candle(mut self, enabled: bool) -> Self {
        self.detect_normal_candle = enabled;
        self
    }

    /// Validate and freeze. Reports every violated constraint, never clamps.
    pub fn build(self) -> Result<Settings, SettingsError> {
        let mut errors = Vec::new();

        if !self.min_price.is_finite() || !self.max_price.is_finite() {
            errors.push("Price bounds must be finite numbers".to_string());
        } else {
            if self.min_price < 0.0 {
                errors.push("Minimum price cannot be negative".to_string());
            }
            if self.max_price < self.min_price {
                errors.push("Maximum price must be greater than minimum price".to_string());
            }
        }

        if !self.min_market_cap.is_finite() || !self.max_market_cap.is_finite() {
            errors.push("Market cap bounds must be finite numbers".to_string());
        } else {
            if self.min_market_cap < 0.0 {
                errors.push("Minimum market cap cannot be negative".to_string());
            }
            if self.max_market_cap < self.min_market_cap {
                errors.push("Maximum market cap must be greater than minimum".to_string());
            }
        }

        if !AVAILABLE_TIMEFRAMES.contains(&self.timeframe_minutes) {
            errors.push(format!(
                "Timeframe must be one of: {:?}",
                AVAILABLE_TIMEFRAMES
            ));
        }

        if !errors.is_empty() {
            return Err(SettingsError::Invalid(errors));
        }

        Ok(Settings {
            exchange: self.exchange,
            min_price: self.min_price,
            max_price: self.max_price,
            min_market_cap: self.min_market_cap,
            max_market_cap: self.max_market_cap,
            min_volume: self.min_volume,
            timeframe_minutes: self.timeframe_minutes,
            detect_ha_candle: self.detect_ha_candle,
            detect_normal_candle: self.detect_normal_candle,
        })
    }
}

/// On-disk form of [`Settings`]. Market-cap bounds are in billions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub exchange: Exchange,
    pub min_price: f64,
    pub max_price: f64,
    pub min_market_cap: f64,
    pub max_market_cap: f64,
    pub min_volume: u64,
    pub timeframe_minutes: u32,
    pub detect_ha_candle: bool,
    pub detect_normal_candle: bool,
}

impl TryFrom<SettingsRecord> for Settings {
    type Error = SettingsError;

    fn try_from(record: SettingsRecord) -> Result<Self, Self::Error> {
        Settings::builder()
            .exchange(record.exchange)
            .price_range(record.min_price, record.max_price)
            .market_cap_range(
                record.min_market_cap * MARKET_CAP_SCALE,
                record.max_market_cap * MARKET_CAP_SCALE,
            )
            .min_volume(record.min_volume)
            .timeframe_minutes(record.timeframe_minutes)
            .detect_ha_candle(record.detect_ha_candle)
            .detect_normal_candle(record.detect_normal_candle)
            .build()
    }
}

impl From<Settings> for SettingsRecord {
    fn from(settings: Settings) -> Self {
        Self {
            exchange: settings.exchange,
            min_price: settings.min_price,
            max_price: settings.max_price,
            min_market_cap: settings.min_market_cap / MARKET_CAP_SCALE,
            max_market_cap: settings.max_market_cap / MARKET_CAP_SCALE,
            min_volume: settings.min_volume,
            timeframe_minutes: settings.timeframe_minutes,
            detect_ha_candle: settings.detect_ha_candle,
            detect_normal_candle: settings.detect_normal_candle,
        }
    }
}

/// Server-side filter sent with a candidate-universe request.
///
/// This is the single authoritative price / market-cap filter: the signal
/// evaluator does not re-check those bounds per instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseFilter {
    pub exchange: Exchange,
    pub scan_code: String,
    pub max_rows: usize,
    pub price_min: f64,
    pub price_max: f64,
    pub market_cap_min: f64,
    pub market_cap_max: f64,
    pub volume_min: u64,
}

impl UniverseFilter {
    pub fn from_settings(settings: &Settings, max_rows: usize) -> Self {
        Self {
            exchange: settings.exchange(),
            scan_code: DEFAULT_SCAN_CODE.to_string(),
            max_rows,
            price_min: settings.min_price(),
            price_max: settings.max_price(),
            market_cap_min: settings.min_market_cap(),
            market_cap_max: settings.max_market_cap(),
            volume_min: settings.min_volume(),
        }
    }

    pub fn location_code(&self) -> &'static str {
        self.exchange.location_code()
    }

    /// Scanner filter tags. Bounds that would not narrow the scan are omitted.
    pub fn tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::new();

        if self.price_min > 0.0 {
            tags.push(("priceAbove".to_string(), self.price_min.to_string()));
        }
        if self.price_max.is_finite() {
            tags.push(("priceBelow".to_string(), self.price_max.to_string()));
        }
        if self.market_cap_min > 0.0 {
            tags.push((
                "marketCapAbove".to_string(),
                (self.market_cap_min as u64).to_string(),
            ));
        }
        if self.market_cap_max.is_finite() {
            tags.push((
                "marketCapBelow".to_string(),
                (self.market_cap_max as u64).to_string(),
            ));
        }
        if self.volume_min > 0 {
            tags.push(("volumeAbove".to_string(), self.volume_min.to_string()));
        }

        tags
    }

    /// Whether a candidate's snapshot satisfies the price, cap and volume bounds.
    pub fn matches(&self, price: f64, market_cap: f64, volume: u64) -> bool {
        price >= self.price_min
            && price <= self.price_max
            && market_cap >= self.market_cap_min
            && market_cap <= self.market_cap_max
            && volume >= self.volume_min
    }
}
