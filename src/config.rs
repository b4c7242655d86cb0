// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::domain::settings::Settings;
use crate::market::clock::{MarketClock, DEFAULT_MARKET_TIMEZONE};
use crate::scanner::orchestrator::{
    ScannerOptions, DEFAULT_INSTRUMENT_TIMEOUT, DEFAULT_MAX_CONCURRENT_REQUESTS, MAX_SCANNER_RESULTS,
};
use crate::scanner::session::DEFAULT_HISTORY_CAPACITY;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

pub const APP_NAME: &str = "First Candle Market Scanner";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT_PAPER: u16 = 7497;
pub const DEFAULT_PORT_LIVE: u16 = 7496;
pub const DEFAULT_CLIENT_ID: u32 = 1;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SETTINGS_FILE: &str = "scanner_settings.json";
pub const DEFAULT_LOG_FILE: &str = "scanner.log";

/// Scanner application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Upstream connection parameters
    pub connection: ConnectionConfig,

    /// Scan engine configuration
    pub scanner: ScannerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Gateway host address
    pub host: String,

    /// Gateway port (7497 paper, 7496 live)
    pub port: u16,

    /// Client ID for the session
    pub client_id: u32,
}

/// Scan engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between scheduled scans
    pub scan_interval_secs: u64,

    /// Number of archived scan runs to retain
    pub history_capacity: usize,

    /// Upper bound on upstream work per instrument, in seconds
    pub instrument_timeout_secs: u64,

    /// Instruments evaluated concurrently
    pub max_concurrent_requests: usize,

    /// Row limit for candidate universe requests
    pub max_universe_rows: usize,

    /// IANA timezone of the exchange session
    pub market_timezone: String,

    /// Where scanner settings are persisted
    pub settings_file: String,

    /// Recorded market snapshot for the replay data source
    pub snapshot_file: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl ScannerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn scanner_options(&self) -> ScannerOptions {
        ScannerOptions {
            instrument_timeout: Duration::from_secs(self.instrument_timeout_secs),
            max_concurrent_requests: self.max_concurrent_requests,
            max_universe_rows: self.max_universe_rows,
        }
    }

    pub fn market_clock(&self) -> AppResult<MarketClock> {
        MarketClock::from_timezone_name(&self.market_timezone)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let connection = ConnectionConfig {
            host: env::var("SCANNER_HOST").unwrap_or(defaults.connection.host),
            port: parse_env("SCANNER_PORT", defaults.connection.port)?,
            client_id: parse_env("SCANNER_CLIENT_ID", defaults.connection.client_id)?,
        };

        let scanner = ScannerConfig {
            scan_interval_secs: parse_env("SCAN_INTERVAL_SECS", defaults.scanner.scan_interval_secs)?,
            history_capacity: parse_env("HISTORY_CAPACITY", defaults.scanner.history_capacity)?,
            instrument_timeout_secs: parse_env(
                "INSTRUMENT_TIMEOUT_SECS",
                defaults.scanner.instrument_timeout_secs,
            )?,
            max_concurrent_requests: parse_env(
                "MAX_CONCURRENT_REQUESTS",
                defaults.scanner.max_concurrent_requests,
            )?,
            max_universe_rows: parse_env("MAX_UNIVERSE_ROWS", defaults.scanner.max_universe_rows)?,
            market_timezone: env::var("MARKET_TIMEZONE").unwrap_or(defaults.scanner.market_timezone),
            settings_file: env::var("SETTINGS_FILE").unwrap_or(defaults.scanner.settings_file),
            snapshot_file: env::var("SNAPSHOT_FILE").ok(),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.level),
            to_file: parse_env("LOG_TO_FILE", defaults.logging.to_file)?,
            file_path: env::var("LOG_FILE_PATH").ok().or(defaults.logging.file_path),
        };

        Ok(Config {
            connection,
            scanner,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            let file_path = self.logging.file_path.as_deref().unwrap_or(DEFAULT_LOG_FILE);
            let file = File::create(file_path).map_err(|e| {
                AppError::Config(format!("Failed to create log file: {}", e))
            })?;

            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        builder
            .try_init()
            .map_err(|e| AppError::Config(format!("Failed to initialize logger: {}", e)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT_PAPER,
                client_id: DEFAULT_CLIENT_ID,
            },
            scanner: ScannerConfig {
                scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
                history_capacity: DEFAULT_HISTORY_CAPACITY,
                instrument_timeout_secs: DEFAULT_INSTRUMENT_TIMEOUT.as_secs(),
                max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
                max_universe_rows: MAX_SCANNER_RESULTS,
                market_timezone: DEFAULT_MARKET_TIMEZONE.to_string(),
                settings_file: DEFAULT_SETTINGS_FILE.to_string(),
                snapshot_file: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(format!("Invalid value for {}: {}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Load persisted scanner settings. `Ok(None)` when nothing has been saved yet.
pub fn load_settings<P: AsRef<Path>>(path: P) -> AppResult<Option<Settings>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&contents)?;
    log::info!("Loaded scanner settings from {}", path.display());
    Ok(Some(settings))
}

/// Persist scanner settings as pretty JSON.
pub fn save_settings<P: AsRef<Path>>(path: P, settings: &Settings) -> AppResult<()> {
    let path = path.as_ref();
    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;
    log::info!("Settings saved to {}", path.display());
    Ok(())
}
