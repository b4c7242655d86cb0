// src/market/mod.rs
pub mod clock;

pub use clock::{MarketClock, MarketSchedule, TimeSource, WallClock, DEFAULT_MARKET_TIMEZONE};
