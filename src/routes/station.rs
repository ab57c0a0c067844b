//! Stored national API records, newest first.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::error;

use crate::models::StationRecord;
use crate::AppState;

// ---

/// Fixed cap on the station history listing.
const STATION_LIST_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/station", get(handler))
}

async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let result: Result<Vec<StationRecord>, sqlx::Error> = sqlx::query_as(
        "SELECT * FROM station_records ORDER BY recorded_at DESC LIMIT $1",
    )
    .bind(STATION_LIST_LIMIT)
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(rows) => {
            let records: Vec<StationRecord> =
                rows.into_iter().map(StationRecord::with_kst).collect();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "station": state.config.station_name,
                    "data": records,
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to list station records: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "failed to list station records" })),
            )
                .into_response()
        }
    }
}
