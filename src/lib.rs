//! `weatherwatch`: polls a weather provider for a fixed set of cities,
//! stores every reading in SQLite, keeps per-(city, date) rollups, and emails
//! an alert when a city stays above a temperature threshold for a run of
//! consecutive polls.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules reach each other only through the re-exports below, so `main.rs`
//! and `tests/` never need to know which file a type lives in.

pub mod alert;
pub mod config;
pub mod fetch;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod schema;
pub mod store;
pub mod units;

pub use alert::{AlertDecision, AlertEngine};
pub use config::{City, Config};
pub use fetch::{FetchError, OpenWeatherClient, WeatherSource};
pub use models::{DailySummary, RawWeatherResponse, Reading};
pub use monitor::{Monitor, TickReport};
pub use notify::{Alert, Notifier, NotifyError, SmtpNotifier};
pub use units::TempScale;
