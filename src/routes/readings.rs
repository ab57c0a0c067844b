//! Sensor reading ingestion and listing.
//!
//! Two ingestion shapes feed the same pipeline: the ESP32 firmware posts a
//! CSV line to `/upload`, and `/api/sensor_data` accepts a structured JSON
//! reading. In both cases the reading and its severity score are committed
//! before the device dispatch is attempted, so a dispatch failure can be
//! reported without rolling anything back.

use axum::{
    extract::Query,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::device::DispatchOutcome;
use crate::models::{NewReading, Reading};
use crate::score;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/api/sensor_data", post(post_handler).get(get_handler))
}

/// JSON wrapper the firmware sends: `{"sensor_data": "<csv line>"}`.
#[derive(Debug, Deserialize)]
struct UploadBody {
    // ---
    #[serde(default)]
    sensor_data: String,
}

async fn upload_handler(
    State(state): State<AppState>,
    Json(body): Json<UploadBody>,
) -> impl IntoResponse {
    // ---
    info!("POST /upload - CSV ingestion");

    let reading = match NewReading::from_csv_line(&body.sensor_data) {
        Ok(reading) => reading,
        Err(e) => {
            debug!("Rejected upload payload: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": e })),
            )
                .into_response();
        }
    };

    ingest(&state, reading).await
}

async fn post_handler(
    State(state): State<AppState>,
    Json(reading): Json<NewReading>,
) -> impl IntoResponse {
    // ---
    info!("POST /api/sensor_data - structured ingestion");
    ingest(&state, reading).await
}

/// Store the reading, score it when both PM values are present, and fire the
/// device command once. The caller waits for the dispatch outcome but a
/// failed dispatch never undoes the committed write.
async fn ingest(state: &AppState, new: NewReading) -> axum::response::Response {
    // ---
    let (reading, severity) = match persist_reading(&state.pool, &new).await {
        Ok(stored) => stored,
        Err(e) => {
            error!("Failed to store reading: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "failed to store reading" })),
            )
                .into_response();
        }
    };

    // Dispatch only after the commit, and only when a score exists
    let dispatch: Option<DispatchOutcome> = match score::to_speed(severity) {
        Some(speed) => Some(state.dispatcher.dispatch(i64::from(speed)).await),
        None => None,
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "sensor_data": reading.with_kst(),
            "severity_score": severity,
            "dispatch": dispatch,
        })),
    )
        .into_response()
}

/// Insert the reading and, when derivable, its severity score in one
/// transaction. Returns the stored row and the score value.
async fn persist_reading(
    pool: &PgPool,
    new: &NewReading,
) -> Result<(Reading, Option<u8>), sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    let reading: Reading = sqlx::query_as(
        r#"
        INSERT INTO readings (
            temperature, humidity, co2, voc, pm1, pm2_5, pm10, measured_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new.temperature)
    .bind(new.humidity)
    .bind(new.co2)
    .bind(new.voc)
    .bind(new.pm1)
    .bind(new.pm2_5)
    .bind(new.pm10)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    // The score is a cached derivation, computed only when both inputs exist
    let severity = match (reading.pm2_5, reading.pm10) {
        (Some(pm2_5), Some(pm10)) => {
            let value = score::evaluate(pm2_5, pm10);
            sqlx::query(
                r#"
                INSERT INTO severity_scores (reading_id, value, computed_at)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(reading.id)
            .bind(i16::from(value))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            Some(value)
        }
        _ => None,
    };

    tx.commit().await?;
    Ok((reading, severity))
}

/// Query parameters for the reading list.
#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    // ---
    limit: Option<i64>,
}

async fn get_handler(
    Query(params): Query<ReadingsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    debug!("GET /api/sensor_data - limit={:?}", params.limit);

    let result: Result<Vec<Reading>, sqlx::Error> = sqlx::query_as(
        "SELECT * FROM readings ORDER BY measured_at DESC LIMIT $1",
    )
    .bind(params.limit.unwrap_or(1000))
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(rows) => {
            let readings: Vec<Reading> = rows.into_iter().map(Reading::with_kst).collect();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "sensor_data": readings })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to list readings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "failed to list readings" })),
            )
                .into_response()
        }
    }
}
