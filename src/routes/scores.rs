//! Severity score listing, most-recent-first, joined with source readings.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::error;

use crate::models::ScoreRow;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/scores", get(handler))
}

async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let result: Result<Vec<ScoreRow>, sqlx::Error> = sqlx::query_as(
        r#"
        SELECT s.id, s.reading_id, s.value, s.computed_at, r.pm2_5, r.pm10
        FROM severity_scores s
        JOIN readings r ON r.id = s.reading_id
        ORDER BY s.computed_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(rows) => {
            let scores: Vec<ScoreRow> = rows.into_iter().map(ScoreRow::with_kst).collect();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "scores": scores })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to list scores: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "failed to list scores" })),
            )
                .into_response()
        }
    }
}
