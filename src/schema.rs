//! Database schema management for `weatherwatch`.
//!
//! Ensures required tables and indexes exist before the first tick.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};

// ---

/// Create the database schema (idempotent).
///
/// Creates the append-only `weather_data` table for raw readings and the
/// `daily_summary` rollup table keyed by `(city, date)`. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw readings, temperatures in Kelvin. Duplicates are allowed.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_data (
            city              TEXT    NOT NULL,
            date              TEXT    NOT NULL,
            temp              REAL    NOT NULL,
            feels_like        REAL    NOT NULL,
            weather_condition TEXT    NOT NULL,
            timestamp         INTEGER NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_summary (
            city               TEXT    NOT NULL,
            date               TEXT    NOT NULL,
            avg_temp           REAL    NOT NULL,
            max_temp           REAL    NOT NULL,
            min_temp           REAL    NOT NULL,
            dominant_condition TEXT    NOT NULL,
            reading_count      INTEGER NOT NULL,
            PRIMARY KEY (city, date)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    add_reading_count_column(&mut *tx).await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_data_city_date
            ON weather_data (city, date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Databases written before `reading_count` existed keep their old
/// `daily_summary` table through `CREATE TABLE IF NOT EXISTS`; add the column.
/// Existing rows get 0 until the next aggregation pass rewrites them.
async fn add_reading_count_column(conn: &mut SqliteConnection) -> Result<()> {
    // ---
    let present: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM pragma_table_info('daily_summary')
        WHERE name = 'reading_count'
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    if present == 0 {
        tracing::info!("Adding reading_count column to daily_summary");
        sqlx::query(
            r#"
            ALTER TABLE daily_summary
                ADD COLUMN reading_count INTEGER NOT NULL DEFAULT 0;
            "#,
        )
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
