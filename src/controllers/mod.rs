pub mod bookings;
pub mod prices;
pub mod sessions;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::error::{CinemaError, CinemaResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(sessions::routes())
        .merge(bookings::routes())
        .merge(prices::routes())
}

/// Полный роутер приложения: служебные маршруты и API под `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn validate<T: Validate>(request: &T) -> CinemaResult<()> {
    request
        .validate()
        .map_err(|e| CinemaError::validation(e.to_string()))
}
