//! Simple data models for the weather pipeline.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

// ---

/// Raw current-weather payload from the provider (only the fields we use).
#[derive(Debug, Deserialize)]
pub struct RawWeatherResponse {
    // ---
    pub main: RawMain,
    #[serde(default)]
    pub weather: Vec<RawCondition>,
    pub dt: i64,
}

#[derive(Debug, Deserialize)]
pub struct RawMain {
    pub temp: f64,
    pub feels_like: f64,
}

#[derive(Debug, Deserialize)]
pub struct RawCondition {
    pub main: String,
}

/// One stored observation. Temperatures are Kelvin.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub city: String,
    pub date: NaiveDate,
    pub temp: f64,
    pub feels_like: f64,
    pub weather_condition: String,
    pub timestamp: i64,
}

/// Per-(city, date) rollup recomputed from the full reading history.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailySummary {
    // ---
    pub city: String,
    pub date: NaiveDate,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
    pub reading_count: i64,
}

/// Why a provider payload could not become a [`Reading`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingError {
    #[error("response has no weather condition")]
    MissingCondition,
    #[error("timestamp {0} is out of range")]
    BadTimestamp(i64),
}

impl RawWeatherResponse {
    // ---
    /// Build the stored reading. The date is the UTC calendar day of `dt`.
    pub fn into_reading(self, city: &str) -> Result<Reading, ReadingError> {
        // ---
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or(ReadingError::MissingCondition)?;

        let date = DateTime::from_timestamp(self.dt, 0)
            .ok_or(ReadingError::BadTimestamp(self.dt))?
            .date_naive();

        Ok(Reading {
            city: city.to_string(),
            date,
            temp: self.main.temp,
            feels_like: self.main.feels_like,
            weather_condition: condition.main,
            timestamp: self.dt,
        })
    }
}
