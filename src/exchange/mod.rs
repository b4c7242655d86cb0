// src/exchange/mod.rs
pub mod client;
pub mod replay;

pub use client::{LoggingSubscriber, MarketDataSource, ScanSubscriber};
pub use replay::{InstrumentSnapshot, MarketSnapshot, ReplayDataSource};
