//! The polling pipeline.
//!
//! One tick walks the configured cities in order: fetch, store, alert check.
//! Once every city has been processed it recomputes the daily rollups. Ticks
//! never overlap and cities are never processed concurrently, so the alert
//! counters need no synchronization.

use std::future::Future;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alert::{AlertDecision, AlertEngine};
use crate::notify::{Alert, Notifier};
use crate::{store, City, DailySummary, TempScale, WeatherSource};

// ---

/// What happened during one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    // ---
    pub fetched: usize,
    pub stored: usize,
    pub alerts_fired: Vec<String>,
    /// `None` when the aggregation pass failed.
    pub summaries: Option<Vec<DailySummary>>,
}

pub struct Monitor<S, N> {
    // ---
    source: S,
    notifier: N,
    pool: SqlitePool,
    cities: Vec<City>,
    alerts: AlertEngine,
    scale: TempScale,
}

impl<S: WeatherSource, N: Notifier> Monitor<S, N> {
    // ---
    pub fn new(
        source: S,
        notifier: N,
        pool: SqlitePool,
        cities: Vec<City>,
        alerts: AlertEngine,
        scale: TempScale,
    ) -> Self {
        // ---
        Self {
            source,
            notifier,
            pool,
            cities,
            alerts,
            scale,
        }
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    /// Run the full pipeline once.
    pub async fn run_tick(&mut self) -> TickReport {
        // ---
        let mut report = TickReport::default();

        for city in &self.cities {
            let reading = match self.source.fetch(city).await {
                Ok(reading) => reading,
                Err(e) => {
                    error!("Error fetching data for {}: {}", city.name, e);
                    continue;
                }
            };
            report.fetched += 1;

            // A lost write does not stop the alert check for this reading
            match store::append_reading(&self.pool, &reading).await {
                Ok(()) => report.stored += 1,
                Err(e) => error!("Error inserting data for {}: {}", city.name, e),
            }

            info!(
                "Current weather in {}: Temp: {:.2} {scale}, Feels Like: {:.2} {scale}, Condition: {}",
                city.name,
                self.scale.convert(reading.temp),
                self.scale.convert(reading.feels_like),
                reading.weather_condition,
                scale = self.scale,
            );

            match self.alerts.observe(&city.name, reading.temp) {
                AlertDecision::Triggered { count } => {
                    warn!(
                        "ALERT: {} has crossed {:.2} {} for {} consecutive updates!",
                        city.name,
                        self.scale.convert(self.alerts.threshold_k()),
                        self.scale,
                        count
                    );
                    let alert = Alert {
                        city: city.name.clone(),
                        temp_k: reading.temp,
                        threshold_k: self.alerts.threshold_k(),
                        consecutive: count,
                    };
                    if let Err(e) = self.notifier.notify(&alert).await {
                        error!("Error sending email alert for {}: {}", city.name, e);
                    }
                    report.alerts_fired.push(city.name.clone());
                }
                AlertDecision::Escalating { count } => {
                    debug!("{} above threshold ({} consecutive)", city.name, count);
                }
                AlertDecision::Normal => {}
            }
        }

        report.summaries = self.summarize().await;
        report
    }

    async fn summarize(&self) -> Option<Vec<DailySummary>> {
        // ---
        let summaries = match store::recompute_daily_summaries(&self.pool).await {
            Ok(summaries) => summaries,
            Err(e) => {
                error!("Error generating daily summary: {}", e);
                return None;
            }
        };

        for s in &summaries {
            info!(
                "City: {}, Date: {}, Avg Temp: {:.2} {scale}, Max Temp: {:.2} {scale}, Min Temp: {:.2} {scale}, Weather: {}",
                s.city,
                s.date,
                self.scale.convert(s.avg_temp),
                self.scale.convert(s.max_temp),
                self.scale.convert(s.min_temp),
                s.dominant_condition,
                scale = self.scale,
            );
        }

        Some(summaries)
    }

    /// Tick every `period` until Ctrl-C. See [`Monitor::run_until`].
    pub async fn run(self, period: Duration) {
        // ---
        self.run_until(period, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C, running until killed: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }

    /// Tick every `period` until `shutdown` resolves. The first tick runs one
    /// full period after start. A tick that overruns delays the next one;
    /// ticks are never skipped or run in parallel.
    ///
    /// `shutdown` is polled for the whole run, including while a tick is in
    /// flight; a tick interrupted that way is abandoned where it stands.
    pub async fn run_until<F>(mut self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        // ---
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Monitoring {} cities every {}s",
            self.cities.len(),
            period.as_secs()
        );

        loop {
            let stop = tokio::select! {
                _ = &mut shutdown => true,
                _ = ticker.tick() => tokio::select! {
                    report = self.run_tick() => {
                        debug!(
                            "Tick complete: fetched={} stored={} alerts={:?} summaries={}",
                            report.fetched,
                            report.stored,
                            report.alerts_fired,
                            report.summaries.as_ref().map_or(0, Vec::len)
                        );
                        false
                    }
                    _ = &mut shutdown => {
                        warn!("Shutdown requested mid-tick, abandoning the tick");
                        true
                    }
                },
            };

            if stop {
                info!("Shutdown signal received, stopping monitor");
                break;
            }
        }
    }
}
