// src/domain/mod.rs
pub mod errors;
pub mod models;
pub mod settings;

// Re-export common types for convenience
pub use errors::{
    AnalysisError, AnalysisResult, AppError, AppResult, DataResult, DataSourceError, ScanError,
    ScanOutcome, SettingsError,
};
pub use models::{Bar, Fundamentals, LiveQuote, ResultSet, ScanResult, ScanRun, SmoothedBar};
pub use settings::{Exchange, Settings, SettingsBuilder, SettingsRecord, UniverseFilter};
