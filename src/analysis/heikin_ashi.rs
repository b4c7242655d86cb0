// src/analysis/heikin_ashi.rs
use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::models::{Bar, SmoothedBar};

/// Compute Heikin-Ashi candles matching TradingView's definition.
///
/// - HA close = (open + high + low + close) / 4
/// - HA open  = (previous HA open + previous HA close) / 2, seeded with the first raw open
/// - HA high  = max(high, HA open, HA close)
/// - HA low   = min(low, HA open, HA close)
///
/// Each HA open depends on the previous candle, so the series is built front to back.
pub fn calculate(bars: &[Bar]) -> Vec<SmoothedBar> {
    let mut smoothed = Vec::with_capacity(bars.len());
    let mut previous: Option<(f64, f64)> = None;

    for bar in bars {
        let ha_close = (bar.open + bar.high + bar.low + bar.close) / 4.0;
        let ha_open = match previous {
            Some((prev_open, prev_close)) => (prev_open + prev_close) / 2.0,
            None => bar.open,
        };

        smoothed.push(SmoothedBar {
            timestamp: bar.timestamp,
            open: ha_open,
            high: bar.high.max(ha_open).max(ha_close),
            low: bar.low.min(ha_open).min(ha_close),
            close: ha_close,
        });

        previous = Some((ha_open, ha_close));
    }

    smoothed
}

/// Whether the candle at `index` is bullish (HA close > HA open).
///
/// Negative indexes count from the end (`-1` is the last candle). An empty
/// series is never bullish; any other index outside the series is an error.
pub fn is_bullish(series: &[SmoothedBar], index: isize) -> AnalysisResult<bool> {
    if series.is_empty() {
        return Ok(false);
    }

    let len = series.len();
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index as usize).filter(|i| *i < len)
    };

    match resolved {
        Some(i) => Ok(series[i].is_bullish()),
        None => Err(AnalysisError::IndexOutOfRange { index, len }),
    }
}
