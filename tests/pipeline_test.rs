use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::SqlitePool;
use tokio::sync::oneshot;
use tokio_test::assert_ok;

use weatherwatch::models::ReadingError;
use weatherwatch::{
    schema, store, Alert, AlertEngine, City, FetchError, Monitor, Notifier, NotifyError, Reading,
    TempScale, WeatherSource,
};

// 2024-07-01T12:00:00Z
const BASE_TS: i64 = 1719835200;

/// Hands out pre-scripted temperatures per city; `None` simulates a failed fetch.
#[derive(Default)]
struct ScriptedSource {
    script: Mutex<HashMap<String, VecDeque<Option<(f64, &'static str)>>>>,
    calls: Mutex<i64>,
}

impl ScriptedSource {
    fn with(mut self, city: &str, steps: Vec<Option<(f64, &'static str)>>) -> Self {
        // ---
        self.script
            .get_mut()
            .unwrap()
            .insert(city.to_string(), steps.into());
        self
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch(&self, city: &City) -> Result<Reading, FetchError> {
        // ---
        let step = self
            .script
            .lock()
            .unwrap()
            .get_mut(&city.name)
            .and_then(|steps| steps.pop_front())
            .flatten();

        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let timestamp = BASE_TS + *calls * 60;

        let (temp, condition) = step.ok_or(FetchError::Reading(ReadingError::MissingCondition))?;
        Ok(Reading {
            city: city.name.clone(),
            date: DateTime::from_timestamp(timestamp, 0).unwrap().date_naive(),
            temp,
            feels_like: temp + 2.0,
            weather_condition: condition.to_string(),
            timestamp,
        })
    }
}

/// Signals once a fetch has started, then never finishes it.
struct HangingSource {
    started: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl WeatherSource for HangingSource {
    async fn fetch(&self, _city: &City) -> Result<Reading, FetchError> {
        // ---
        let started = self.started.lock().unwrap().take();
        if let Some(tx) = started {
            let _ = tx.send(());
        }
        std::future::pending::<Result<Reading, FetchError>>().await
    }
}

/// Records every dispatch attempt, optionally failing each one.
#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Alert>>>,
    fail: bool,
}

impl RecordingNotifier {
    fn attempts(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        // ---
        self.sent.lock().unwrap().push(alert.clone());
        if self.fail {
            let bad = "nobody".parse::<lettre::Address>().unwrap_err();
            return Err(NotifyError::Address("nobody".to_string(), bad));
        }
        Ok(())
    }
}

fn city(name: &str) -> City {
    City {
        name: name.to_string(),
        lat: 0.0,
        lon: 0.0,
    }
}

async fn memory_pool() -> SqlitePool {
    // ---
    let pool = store::open("sqlite::memory:").await.unwrap();
    assert_ok!(schema::create_schema(&pool).await);
    pool
}

fn celsius(c: f64) -> f64 {
    TempScale::Celsius.to_kelvin(c)
}

#[tokio::test]
async fn delhi_two_consecutive_hot_readings_alert_once() {
    // ---
    let source = ScriptedSource::default().with(
        "Delhi",
        vec![
            Some((celsius(41.0), "Clear")),
            Some((celsius(42.0), "Clear")),
            Some((celsius(30.0), "Rain")),
            Some((celsius(43.0), "Clear")),
            Some((celsius(44.0), "Clear")),
        ],
    );
    let notifier = RecordingNotifier::default();
    let mut monitor = Monitor::new(
        source,
        notifier.clone(),
        memory_pool().await,
        vec![city("Delhi")],
        AlertEngine::new(celsius(40.0), 2),
        TempScale::Celsius,
    );

    let first = monitor.run_tick().await;
    assert!(first.alerts_fired.is_empty());
    assert_eq!(monitor.alerts().count("Delhi"), 1);

    let second = monitor.run_tick().await;
    assert_eq!(second.alerts_fired, vec!["Delhi"]);
    assert_eq!(notifier.attempts().len(), 1);
    assert_eq!(notifier.attempts()[0].consecutive, 2);

    // Cool reading resets the run
    monitor.run_tick().await;
    assert_eq!(monitor.alerts().count("Delhi"), 0);

    // One hot reading is not enough after the reset
    monitor.run_tick().await;
    assert_eq!(notifier.attempts().len(), 1);

    // The second consecutive one fires again
    let fifth = monitor.run_tick().await;
    assert_eq!(fifth.alerts_fired, vec!["Delhi"]);
    assert_eq!(notifier.attempts().len(), 2);
}

#[tokio::test]
async fn failed_fetch_leaves_counter_untouched() {
    // ---
    let source = ScriptedSource::default()
        .with("A", vec![Some((320.0, "Clear")), None, Some((321.0, "Clear"))])
        .with("B", vec![Some((280.0, "Snow")), Some((330.0, "Clear")), None]);
    let notifier = RecordingNotifier::default();
    let mut monitor = Monitor::new(
        source,
        notifier.clone(),
        memory_pool().await,
        vec![city("A"), city("B")],
        AlertEngine::new(300.0, 2),
        TempScale::Kelvin,
    );

    let r1 = monitor.run_tick().await;
    assert_eq!((r1.fetched, r1.stored), (2, 2));

    let r2 = monitor.run_tick().await;
    assert_eq!((r2.fetched, r2.stored), (1, 1));
    assert_eq!(monitor.alerts().count("A"), 1);
    assert_eq!(monitor.alerts().count("B"), 1);

    let r3 = monitor.run_tick().await;
    assert_eq!(r3.fetched, 1);
    assert_eq!(r3.alerts_fired, vec!["A"]);
    assert_eq!(monitor.alerts().count("B"), 1);

    let alerted: Vec<String> = notifier.attempts().into_iter().map(|a| a.city).collect();
    assert_eq!(alerted, vec!["A"]);
}

#[tokio::test]
async fn failed_email_is_not_retried() {
    // ---
    let source = ScriptedSource::default().with(
        "Delhi",
        vec![
            Some((320.0, "Clear")),
            Some((321.0, "Clear")),
            Some((322.0, "Clear")),
        ],
    );
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let mut monitor = Monitor::new(
        source,
        notifier.clone(),
        memory_pool().await,
        vec![city("Delhi")],
        AlertEngine::new(300.0, 2),
        TempScale::Kelvin,
    );

    monitor.run_tick().await;
    let fired = monitor.run_tick().await;
    assert_eq!(fired.alerts_fired, vec!["Delhi"]);

    // Still escalated, no second attempt
    let after = monitor.run_tick().await;
    assert!(after.alerts_fired.is_empty());
    assert_eq!(monitor.alerts().count("Delhi"), 3);
    assert_eq!(notifier.attempts().len(), 1);
}

#[tokio::test]
async fn store_failure_does_not_stop_the_tick() {
    // ---
    // No schema: every insert and the aggregation pass fail
    let pool = store::open("sqlite::memory:").await.unwrap();
    let source = ScriptedSource::default()
        .with("A", vec![Some((320.0, "Clear"))])
        .with("B", vec![Some((320.0, "Clear"))]);
    let notifier = RecordingNotifier::default();
    let mut monitor = Monitor::new(
        source,
        notifier.clone(),
        pool,
        vec![city("A"), city("B")],
        AlertEngine::new(300.0, 1),
        TempScale::Kelvin,
    );

    let report = monitor.run_tick().await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.stored, 0);
    assert_eq!(report.alerts_fired, vec!["A", "B"]);
    assert!(report.summaries.is_none());
}

#[tokio::test]
async fn summaries_cover_full_history() {
    // ---
    let source = ScriptedSource::default()
        .with(
            "Mumbai",
            vec![
                Some((300.0, "Rain")),
                Some((310.0, "Clouds")),
                Some((290.0, "Rain")),
            ],
        )
        .with("Chennai", vec![Some((305.0, "Haze")), None, None]);
    let pool = memory_pool().await;
    let mut monitor = Monitor::new(
        source,
        RecordingNotifier::default(),
        pool.clone(),
        vec![city("Mumbai"), city("Chennai")],
        AlertEngine::new(400.0, 3),
        TempScale::Celsius,
    );

    monitor.run_tick().await;
    monitor.run_tick().await;
    let last = monitor.run_tick().await;

    let summaries = last.summaries.unwrap();
    assert_eq!(summaries.len(), 2);

    assert_eq!(summaries[0].city, "Chennai");
    assert_eq!(summaries[0].reading_count, 1);
    assert_eq!(summaries[0].dominant_condition, "Haze");

    let mumbai = &summaries[1];
    assert_eq!(mumbai.city, "Mumbai");
    assert_eq!(mumbai.avg_temp, 300.0);
    assert_eq!(mumbai.max_temp, 310.0);
    assert_eq!(mumbai.min_temp, 290.0);
    assert_eq!(mumbai.dominant_condition, "Rain");
    assert_eq!(mumbai.reading_count, 3);

    // Persisted table matches the last pass
    assert_eq!(assert_ok!(store::load_daily_summaries(&pool).await), summaries);
}

#[tokio::test]
async fn shutdown_interrupts_a_hanging_tick() {
    // ---
    let (started_tx, started_rx) = oneshot::channel();
    let monitor = Monitor::new(
        HangingSource {
            started: Mutex::new(Some(started_tx)),
        },
        RecordingNotifier::default(),
        memory_pool().await,
        vec![city("Delhi")],
        AlertEngine::new(300.0, 2),
        TempScale::Kelvin,
    );

    // Shutdown is requested only once the first tick is stuck in its fetch
    let shutdown = async {
        started_rx.await.ok();
    };
    let finished = tokio::time::timeout(
        Duration::from_secs(5),
        monitor.run_until(Duration::from_millis(20), shutdown),
    )
    .await;

    assert!(finished.is_ok(), "monitor kept running after shutdown");
}

#[tokio::test]
async fn shutdown_before_first_tick_fetches_nothing() {
    // ---
    let (started_tx, mut started_rx) = oneshot::channel();
    let monitor = Monitor::new(
        HangingSource {
            started: Mutex::new(Some(started_tx)),
        },
        RecordingNotifier::default(),
        memory_pool().await,
        vec![city("Delhi")],
        AlertEngine::new(300.0, 2),
        TempScale::Kelvin,
    );

    monitor.run_until(Duration::from_secs(60), async {}).await;

    // The sender was dropped with the monitor without ever firing
    assert!(started_rx.try_recv().is_err());
}
