use axum::Router;

use crate::AppState;

mod device_speed;
mod health;
mod readings;
mod scores;
mod station;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(scores::router())
        .merge(device_speed::router())
        .merge(station::router())
        .merge(health::router())
        .with_state(state)
}
