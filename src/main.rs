//! Application entry point for the `weatherwatch` service.
//!
//! This binary orchestrates the full startup sequence for the weather
//! monitor, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the SQLite store and creating the schema if it does not exist
//! - Building the weather client and the SMTP notifier
//! - Running the polling loop until Ctrl-C
//!
//! # Environment Variables
//! See [`weatherwatch::config::load_from_env`] for the pipeline settings.
//! Logging is controlled by:
//! - `WEATHER_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `WEATHER_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! Configuration problems are fatal here; once the loop is running, failures
//! are logged and the loop keeps going.
use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use weatherwatch::{config, schema, store, AlertEngine, Monitor, OpenWeatherClient, SmtpNotifier};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Opening database: {}", cfg.db_url);

    let pool = store::open(&cfg.db_url)
        .await
        .with_context(|| format!("Failed to open database '{}'", cfg.db_url))?;

    schema::create_schema(&pool).await?;

    let source = OpenWeatherClient::new(&cfg.api_url, &cfg.api_key, cfg.http_timeout)
        .context("Failed to build weather client")?;
    let notifier = SmtpNotifier::from_config(&cfg).context("Failed to configure email alerts")?;
    let alerts = AlertEngine::new(cfg.alert_threshold_k, cfg.alert_consecutive_updates);

    let monitor = Monitor::new(
        source,
        notifier,
        pool.clone(),
        cfg.cities.clone(),
        alerts,
        cfg.temp_scale,
    );
    monitor.run(cfg.fetch_interval).await;

    pool.close().await;
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `WEATHER_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `WEATHER_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("WEATHER_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to WEATHER_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("WEATHER_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,lettre=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
