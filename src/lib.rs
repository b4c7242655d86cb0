// src/lib.rs
// Main library module declarations

pub mod analysis;
pub mod config;
pub mod domain;
pub mod engine;
pub mod exchange;
pub mod market;
pub mod scanner;

pub use config::Config;
pub use domain::errors::{AppError, AppResult};
pub use engine::ScanEngine;
