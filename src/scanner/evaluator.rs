// src/scanner/evaluator.rs
use crate::analysis::heikin_ashi;
use crate::domain::models::{Bar, Fundamentals, LiveQuote, ScanResult};
use crate::domain::settings::Settings;
use crate::market::clock::MarketClock;
use chrono::{DateTime, Utc};

/// Classification of the session's first candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstCandleSignal {
    pub ha_bullish: bool,
    pub normal_bullish: bool,
    pub first_candle_volume: u64,
}

/// Every enabled signal must be bullish, and at least one must be enabled.
pub fn qualifies(settings: &Settings, ha_bullish: bool, normal_bullish: bool) -> bool {
    let detect_ha = settings.detect_ha_candle();
    let detect_normal = settings.detect_normal_candle();

    (!detect_ha || ha_bullish) && (!detect_normal || normal_bullish) && (detect_ha || detect_normal)
}

/// Percent move of `last_price` against the previous bar's close.
///
/// The reference is the second-to-last close, or the only close when there is
/// a single bar. Zero when there is no usable reference.
pub fn change_percent(bars: &[Bar], last_price: f64) -> f64 {
    let reference = match bars.len() {
        0 => return 0.0,
        1 => bars[0].close,
        n => bars[n - 2].close,
    };

    if reference > 0.0 {
        (last_price - reference) / reference * 100.0
    } else {
        0.0
    }
}

/// Decides whether one instrument qualifies and builds its [`ScanResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalEvaluator {
    clock: MarketClock,
}

impl SignalEvaluator {
    pub fn new(clock: MarketClock) -> Self {
        Self { clock }
    }

    /// Bars belonging to the session `now` falls in, by exchange-local date.
    pub fn session_bars(&self, bars: &[Bar], now: DateTime<Utc>) -> Vec<Bar> {
        let today = self.clock.session_date(now);
        bars.iter()
            .filter(|bar| self.clock.session_date(bar.timestamp) == today)
            .copied()
            .collect()
    }

    /// First-candle classification, or `None` when the instrument does not qualify.
    pub fn first_candle_signal(
        &self,
        bars: &[Bar],
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Option<FirstCandleSignal> {
        let session = self.session_bars(bars, now);
        let first = session.first()?;

        if first.volume < settings.min_volume() {
            return None;
        }

        let normal_bullish = first.is_bullish();
        let ha_bullish = settings.detect_ha_candle() && {
            let smoothed = heikin_ashi::calculate(&session);
            heikin_ashi::is_bullish(&smoothed, 0).unwrap_or_else(|e| {
                log::debug!("Heikin-Ashi classification failed: {}", e);
                false
            })
        };

        if !qualifies(settings, ha_bullish, normal_bullish) {
            return None;
        }

        Some(FirstCandleSignal {
            ha_bullish,
            normal_bullish,
            first_candle_volume: first.volume,
        })
    }

    /// Full evaluation of one instrument against `settings` at `now`.
    pub fn evaluate(
        &self,
        symbol: &str,
        bars: &[Bar],
        quote: &LiveQuote,
        fundamentals: &Fundamentals,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Option<ScanResult> {
        let signal = self.first_candle_signal(bars, settings, now)?;
        Some(self.build_result(symbol, signal, bars, quote, fundamentals, settings, now))
    }

    /// Result record for an instrument whose first candle already qualified.
    #[allow(clippy::too_many_arguments)]
    pub fn build_result(
        &self,
        symbol: &str,
        signal: FirstCandleSignal,
        bars: &[Bar],
        quote: &LiveQuote,
        fundamentals: &Fundamentals,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> ScanResult {
        let last_price = if quote.last > 0.0 {
            quote.last
        } else {
            bars.last().map(|bar| bar.close).unwrap_or_default()
        };

        ScanResult {
            symbol: symbol.to_string(),
            last_price,
            change_percent: change_percent(bars, last_price),
            bid: quote.bid,
            ask: quote.ask,
            market_cap: fundamentals.market_cap,
            volume: quote.volume,
            ha_bullish: signal.ha_bullish,
            normal_bullish: signal.normal_bullish,
            first_candle_volume: signal.first_candle_volume,
            scan_time: now,
            parameters_used: settings.describe(),
        }
    }
}
