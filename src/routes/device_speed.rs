//! Manual fan speed override for the air cleaner device.
//!
//! Validation happens here at the request boundary; an out-of-range or
//! non-integer speed is rejected with 400 before any outbound call is made.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/device/speed", post(handler))
}

/// Request body: `{"speed": 0..3}`. Digit strings are tolerated because the
/// original dashboard client sent them.
#[derive(Debug, Deserialize)]
struct SpeedRequest {
    // ---
    speed: Option<Value>,
}

fn coerce_speed(value: &Value) -> Option<i64> {
    // ---
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(body): Json<SpeedRequest>,
) -> impl IntoResponse {
    // ---
    let speed = match body.speed.as_ref().and_then(coerce_speed) {
        Some(speed) => speed,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "speed must be an integer 0~3" })),
            )
                .into_response();
        }
    };

    if !(0..=3).contains(&speed) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "speed must be in range 0~3" })),
        )
            .into_response();
    }

    info!("POST /api/device/speed - manual override to {}", speed);

    let outcome = state.dispatcher.dispatch(speed).await;
    let status = if outcome.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    (
        status,
        Json(json!({ "success": outcome.ok, "result": outcome })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_coerce_accepts_integers_and_digit_strings() {
        // ---
        assert_eq!(coerce_speed(&json!(2)), Some(2));
        assert_eq!(coerce_speed(&json!("3")), Some(3));
        assert_eq!(coerce_speed(&json!("0")), Some(0));
    }

    #[test]
    fn test_coerce_rejects_everything_else() {
        // ---
        assert_eq!(coerce_speed(&json!(1.5)), None);
        assert_eq!(coerce_speed(&json!("fast")), None);
        assert_eq!(coerce_speed(&json!("")), None);
        assert_eq!(coerce_speed(&json!("-1")), None);
        assert_eq!(coerce_speed(&json!(null)), None);
        assert_eq!(coerce_speed(&json!([2])), None);
    }
}
