// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures reported by the upstream market data source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataSourceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected to data source")]
    NotConnected,

    #[error("Request error: {0}")]
    Request(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Data parse error: {0}")]
    Parse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Invalid settings: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl SettingsError {
    /// Every constraint the rejected settings violated.
    pub fn violations(&self) -> &[String] {
        match self {
            SettingsError::Invalid(violations) => violations,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Index {index} out of range for series of length {len}")]
    IndexOutOfRange { index: isize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Not connected to data source")]
    NotConnected,

    #[error("Failed to fetch instrument universe: {0}")]
    Universe(#[source] DataSourceError),
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type DataResult<T> = Result<T, DataSourceError>;
pub type AnalysisResult<T> = Result<T, AnalysisError>;
pub type ScanOutcome<T> = Result<T, ScanError>;
