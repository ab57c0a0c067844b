//! Database schema management for `aircare-backend`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `readings` table for ingested sensor data, `severity_scores`
/// for the cached 1-4 classifications, and `station_records` for the
/// deduplicated national API history. Safe to call on every startup; no-op
/// if objects already exist.
///
/// The primary key on `station_records.recorded_at` is what makes the
/// poller's check-then-insert race-safe: overlapping ticks can only conflict,
/// never duplicate.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Ingested sensor readings served by `/api/sensor_data`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id          SERIAL PRIMARY KEY,
            temperature DOUBLE PRECISION,
            humidity    DOUBLE PRECISION,
            co2         INTEGER,
            voc         DOUBLE PRECISION,
            pm1         DOUBLE PRECISION,
            pm2_5       DOUBLE PRECISION,
            pm10        DOUBLE PRECISION,
            measured_at TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Cached severity classifications, at most one meaningful row per reading
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS severity_scores (
            id          SERIAL PRIMARY KEY,
            reading_id  INTEGER  NOT NULL REFERENCES readings(id),
            value       SMALLINT NOT NULL,
            computed_at TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // National API history, unique per upstream timestamp
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS station_records (
            recorded_at    TIMESTAMPTZ PRIMARY KEY,
            pm10           DOUBLE PRECISION,
            pm2_5          DOUBLE PRECISION,
            pm10_category  SMALLINT,
            pm2_5_category SMALLINT,
            o3             DOUBLE PRECISION,
            no2            DOUBLE PRECISION,
            co             DOUBLE PRECISION,
            so2            DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for the most-recent-first read endpoints
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_measured_at
            ON readings (measured_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_severity_scores_reading_id
            ON severity_scores (reading_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
