//! Configuration loader for the `weatherwatch` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Everything the pipeline needs to run meaningfully is
//! required; a missing or malformed value fails startup rather than silently
//! defaulting.
//!
use std::env;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

use crate::TempScale;

/// Parse a required environment variable into any `FromStr` type.
macro_rules! require_parsed {
    ($var_name:expr, $ty:ty) => {
        require_env!($var_name)
            .trim()
            .parse::<$ty>()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
    };
}

/// Parse an optional environment variable with a default value.
macro_rules! parse_env_or {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

const DEFAULT_DB_URL: &str = "sqlite://weather_data.db";
const DEFAULT_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// One week. Longer intervals are almost certainly a typo.
const MAX_FETCH_INTERVAL_MINS: u64 = 7 * 24 * 60;

/// A configured city and its coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    lat: f64,
    lon: f64,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Weather provider API key.
    pub api_key: String,

    /// Weather provider current-conditions endpoint.
    pub api_url: String,

    /// Alert threshold, converted to Kelvin from the display scale.
    pub alert_threshold_k: f64,

    /// Consecutive over-threshold readings needed to fire an alert.
    pub alert_consecutive_updates: u32,

    /// Display scale for console output and alert emails.
    pub temp_scale: TempScale,

    /// Poll interval.
    pub fetch_interval: Duration,

    /// Cities in configured iteration order.
    pub cities: Vec<City>,

    /// SQLite connection string.
    pub db_url: String,

    pub email_address: String,
    pub email_password: String,
    pub alert_recipients: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,

    /// Per-request timeout for the weather provider.
    pub http_timeout: Duration,
}

/// Load configuration from environment variables.
///
/// Required:
/// - `API_KEY` – weather provider key
/// - `ALERT_THRESHOLD_TEMP` – alert threshold, in `TEMP_SCALE` units
/// - `ALERT_THRESHOLD_CONSECUTIVE_UPDATES` – run length that fires an alert (>= 1)
/// - `TEMP_SCALE` – `Celsius`, `Fahrenheit`, anything else means Kelvin
/// - `FETCH_INTERVAL` – poll interval in minutes (1 to 10080)
/// - `CITIES` – JSON object `{"Delhi": {"lat": 28.61, "lon": 77.20}, ...}`
/// - `EMAIL_ADDRESS`, `EMAIL_PASSWORD` – SMTP login and sender
/// - `ALERT_RECIPIENTS` – comma separated recipient list
///
/// Optional:
/// - `DATABASE_URL` (default: `sqlite://weather_data.db`)
/// - `WEATHER_API_URL` (default: OpenWeatherMap current weather)
/// - `SMTP_HOST` (default: `smtp.gmail.com`), `SMTP_PORT` (default: 587)
/// - `HTTP_TIMEOUT_SECS` (default: 10)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let api_key = require_env!("API_KEY");
    let threshold = require_parsed!("ALERT_THRESHOLD_TEMP", f64);
    let alert_consecutive_updates = require_parsed!("ALERT_THRESHOLD_CONSECUTIVE_UPDATES", u32);
    let scale_name = require_env!("TEMP_SCALE");
    let fetch_interval_mins = require_parsed!("FETCH_INTERVAL", u64);
    let cities = parse_cities(&require_env!("CITIES"))?;
    let email_address = require_env!("EMAIL_ADDRESS");
    let email_password = require_env!("EMAIL_PASSWORD");
    let alert_recipients = parse_recipients(&require_env!("ALERT_RECIPIENTS"))?;

    let db_url = parse_env_or!("DATABASE_URL", String, DEFAULT_DB_URL.to_string());
    let api_url = parse_env_or!("WEATHER_API_URL", String, DEFAULT_API_URL.to_string());
    let smtp_host = parse_env_or!("SMTP_HOST", String, DEFAULT_SMTP_HOST.to_string());
    let smtp_port = parse_env_or!("SMTP_PORT", u16, 587);
    let http_timeout_secs = parse_env_or!("HTTP_TIMEOUT_SECS", u64, 10);

    if !threshold.is_finite() {
        bail!("Invalid ALERT_THRESHOLD_TEMP: must be a finite number");
    }
    if alert_consecutive_updates == 0 {
        bail!("Invalid ALERT_THRESHOLD_CONSECUTIVE_UPDATES: must be at least 1");
    }
    if fetch_interval_mins == 0 {
        bail!("Invalid FETCH_INTERVAL: must be at least 1 minute");
    }
    if fetch_interval_mins > MAX_FETCH_INTERVAL_MINS {
        bail!(
            "Invalid FETCH_INTERVAL: {} minutes exceeds the maximum of {}",
            fetch_interval_mins,
            MAX_FETCH_INTERVAL_MINS
        );
    }
    let fetch_interval_secs = fetch_interval_mins
        .checked_mul(60)
        .ok_or_else(|| anyhow!("Invalid FETCH_INTERVAL: {} minutes overflows", fetch_interval_mins))?;

    let temp_scale = TempScale::from_name(&scale_name);
    if temp_scale == TempScale::Kelvin && scale_name != "Kelvin" {
        tracing::warn!(
            "TEMP_SCALE '{}' is not Celsius or Fahrenheit, displaying Kelvin",
            scale_name
        );
    }

    Ok(Config {
        api_key,
        api_url,
        alert_threshold_k: temp_scale.to_kelvin(threshold),
        alert_consecutive_updates,
        temp_scale,
        fetch_interval: Duration::from_secs(fetch_interval_secs),
        cities,
        db_url,
        email_address,
        email_password,
        alert_recipients,
        smtp_host,
        smtp_port,
        http_timeout: Duration::from_secs(http_timeout_secs),
    })
}

/// Parse the `CITIES` JSON object, keeping its key order.
pub fn parse_cities(raw: &str) -> Result<Vec<City>> {
    // ---
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| anyhow!("Invalid CITIES: {}", e))?;

    if map.is_empty() {
        bail!("Invalid CITIES: at least one city is required");
    }

    map.into_iter()
        .map(|(name, value)| {
            let coords: Coordinates = serde_json::from_value(value)
                .map_err(|e| anyhow!("Invalid CITIES entry '{}': {}", name, e))?;

            if !(-90.0..=90.0).contains(&coords.lat) {
                bail!("Invalid CITIES entry '{}': lat {} out of range", name, coords.lat);
            }
            if !(-180.0..=180.0).contains(&coords.lon) {
                bail!("Invalid CITIES entry '{}': lon {} out of range", name, coords.lon);
            }

            Ok(City {
                name,
                lat: coords.lat,
                lon: coords.lon,
            })
        })
        .collect()
}

/// Split `ALERT_RECIPIENTS` on commas, dropping blanks.
pub fn parse_recipients(raw: &str) -> Result<Vec<String>> {
    // ---
    let recipients: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect();

    if recipients.is_empty() {
        bail!("Invalid ALERT_RECIPIENTS: at least one recipient is required");
    }
    Ok(recipients)
}

fn mask(secret: &str) -> String {
    // ---
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the API key and email password while showing all other
    /// configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let city_names: Vec<&str> = self.cities.iter().map(|c| c.name.as_str()).collect();

        tracing::info!("Configuration loaded:");
        tracing::info!("  API_KEY         : {}", mask(&self.api_key));
        tracing::info!("  WEATHER_API_URL : {}", self.api_url);
        tracing::info!(
            "  ALERT_THRESHOLD : {:.2} {} ({:.2} K)",
            self.temp_scale.convert(self.alert_threshold_k),
            self.temp_scale,
            self.alert_threshold_k
        );
        tracing::info!("  CONSECUTIVE     : {}", self.alert_consecutive_updates);
        tracing::info!("  TEMP_SCALE      : {}", self.temp_scale);
        tracing::info!("  FETCH_INTERVAL  : {}s", self.fetch_interval.as_secs());
        tracing::info!("  CITIES          : {}", city_names.join(", "));
        tracing::info!("  DATABASE_URL    : {}", self.db_url);
        tracing::info!("  EMAIL_ADDRESS   : {}", self.email_address);
        tracing::info!("  EMAIL_PASSWORD  : {}", mask(&self.email_password));
        tracing::info!("  RECIPIENTS      : {}", self.alert_recipients.join(", "));
        tracing::info!("  SMTP            : {}:{}", self.smtp_host, self.smtp_port);
        tracing::info!("  HTTP_TIMEOUT    : {}s", self.http_timeout.as_secs());
    }
}
