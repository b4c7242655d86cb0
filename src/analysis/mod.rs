// src/analysis/mod.rs
pub mod heikin_ashi;

pub use heikin_ashi::{calculate as compute_smoothed, is_bullish};
