//! Reading store and daily summary aggregation.
//!
//! Readings are appended one insert at a time with no de-duplication. The
//! daily rollup is a full recompute over the entire `weather_data` history on
//! every pass: simple and always consistent with the raw table, at the cost of
//! being O(history) per tick.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{DailySummary, Reading};

// ---

/// Open the SQLite store, creating the file if needed.
///
/// The pool holds a single long-lived connection; the monitor loop is strictly
/// sequential so nothing ever waits on it. Idle reaping is disabled so that
/// `sqlite::memory:` databases survive between operations.
pub async fn open(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // ---
    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Append one raw reading.
pub async fn append_reading(pool: &SqlitePool, reading: &Reading) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO weather_data (
            city, date, temp, feels_like, weather_condition, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&reading.city)
    .bind(reading.date)
    .bind(reading.temp)
    .bind(reading.feels_like)
    .bind(&reading.weather_condition)
    .bind(reading.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

/// Recompute every `(city, date)` rollup from raw history and upsert it.
///
/// The dominant condition is the label with the highest occurrence count in
/// the group; ties go to the lexicographically smallest label. Rows are
/// upserted one by one, so an error part way through leaves the earlier
/// upserts committed.
///
/// Returns the recomputed summaries ordered by city, then date.
pub async fn recompute_daily_summaries(
    pool: &SqlitePool,
) -> Result<Vec<DailySummary>, sqlx::Error> {
    // ---
    let summaries: Vec<DailySummary> = sqlx::query_as(
        r#"
        WITH stats AS (
            SELECT
                city,
                date,
                AVG(temp) AS avg_temp,
                MAX(temp) AS max_temp,
                MIN(temp) AS min_temp,
                COUNT(*)  AS reading_count
            FROM weather_data
            GROUP BY city, date
        ),
        condition_counts AS (
            SELECT city, date, weather_condition, COUNT(*) AS occurrences
            FROM weather_data
            GROUP BY city, date, weather_condition
        ),
        ranked AS (
            SELECT
                city,
                date,
                weather_condition,
                ROW_NUMBER() OVER (
                    PARTITION BY city, date
                    ORDER BY occurrences DESC, weather_condition ASC
                ) AS condition_rank
            FROM condition_counts
        )
        SELECT
            s.city,
            s.date,
            s.avg_temp,
            s.max_temp,
            s.min_temp,
            r.weather_condition AS dominant_condition,
            s.reading_count
        FROM stats s
        JOIN ranked r
          ON r.city = s.city AND r.date = s.date AND r.condition_rank = 1
        ORDER BY s.city, s.date
        "#,
    )
    .fetch_all(pool)
    .await?;

    for summary in &summaries {
        upsert_summary(pool, summary).await?;
    }

    Ok(summaries)
}

async fn upsert_summary(pool: &SqlitePool, summary: &DailySummary) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO daily_summary (
            city, date, avg_temp, max_temp, min_temp, dominant_condition, reading_count
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (city, date) DO UPDATE SET
            avg_temp = excluded.avg_temp,
            max_temp = excluded.max_temp,
            min_temp = excluded.min_temp,
            dominant_condition = excluded.dominant_condition,
            reading_count = excluded.reading_count
        "#,
    )
    .bind(&summary.city)
    .bind(summary.date)
    .bind(summary.avg_temp)
    .bind(summary.max_temp)
    .bind(summary.min_temp)
    .bind(&summary.dominant_condition)
    .bind(summary.reading_count)
    .execute(pool)
    .await?;

    Ok(())
}

/// Read back the persisted `daily_summary` table, ordered by city, then date.
pub async fn load_daily_summaries(pool: &SqlitePool) -> Result<Vec<DailySummary>, sqlx::Error> {
    // ---
    sqlx::query_as(
        r#"
        SELECT city, date, avg_temp, max_temp, min_temp, dominant_condition, reading_count
        FROM daily_summary
        ORDER BY city, date
        "#,
    )
    .fetch_all(pool)
    .await
}

/// All stored readings for a city, oldest first.
pub async fn readings_for_city(
    pool: &SqlitePool,
    city: &str,
) -> Result<Vec<Reading>, sqlx::Error> {
    // ---
    sqlx::query_as(
        r#"
        SELECT city, date, temp, feels_like, weather_condition, timestamp
        FROM weather_data
        WHERE city = ?
        ORDER BY timestamp, rowid
        "#,
    )
    .bind(city)
    .fetch_all(pool)
    .await
}
