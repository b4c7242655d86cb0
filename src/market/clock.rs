// src/market/clock.rs
use crate::domain::errors::{AppError, AppResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

pub const DEFAULT_MARKET_TIMEZONE: &str = "America/New_York";

/// Decides whether the scheduler should scan at a given instant.
pub trait MarketSchedule: Send + Sync {
    fn is_open(&self, at: DateTime<Utc>) -> bool;
}

/// Supplies the current instant to scans and the scheduler.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Regular-session calendar of a single exchange. Holidays are not modelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketClock {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl MarketClock {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            timezone,
            open,
            close,
        }
    }

    /// US equities: 09:30-16:00 America/New_York.
    pub fn us_equities() -> Self {
        Self::with_timezone(chrono_tz::America::New_York)
    }

    /// US regular session hours in another timezone.
    pub fn with_timezone(timezone: Tz) -> Self {
        Self::new(
            timezone,
            NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        )
    }

    /// Build from an IANA timezone name such as `America/New_York`.
    pub fn from_timezone_name(name: &str) -> AppResult<Self> {
        let timezone: Tz = name
            .parse()
            .map_err(|e| AppError::Config(format!("Unknown market timezone {}: {}", name, e)))?;
        Ok(Self::with_timezone(timezone))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> DateTime<Tz> {
        at.with_timezone(&self.timezone)
    }

    /// Calendar date of `at` in the exchange's timezone.
    pub fn session_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local_time(at).date_naive()
    }

    /// Opening bell of the session on `date`.
    pub fn session_open(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(self.open))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    /// Closing bell of the session on `date`.
    pub fn session_close(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(self.close))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    /// When the first candle of the session on `date` completes.
    pub fn first_candle_close(&self, date: NaiveDate, timeframe_minutes: u32) -> Option<DateTime<Utc>> {
        self.session_open(date)
            .map(|open| open + Duration::minutes(i64::from(timeframe_minutes)))
    }

    /// Weekday and within the regular session, both bells inclusive.
    pub fn is_market_open(&self, at: DateTime<Utc>) -> bool {
        let local = self.local_time(at);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = local.time();
        self.open <= time && time <= self.close
    }
}

impl Default for MarketClock {
    fn default() -> Self {
        Self::us_equities()
    }
}

impl MarketSchedule for MarketClock {
    fn is_open(&self, at: DateTime<Utc>) -> bool {
        self.is_market_open(at)
    }
}
