use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::CinemaError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/cancel", patch(cancel_booking))
        .route("/bookings/{id}", get(get_booking))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
struct CreateBookingRequest {
    #[validate(range(min = 1))]
    session_id: i64,
    #[validate(range(min = 1))]
    seat_id: i64,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    super::validate(&req)?;

    let booking = state.engine.book(req.session_id, req.seat_id).await?;
    // Инвалидируем кеш мест этого сеанса
    state.cache.invalidate_session(booking.session_id).await;

    Ok((StatusCode::CREATED, Json(booking)))
}

// PATCH /api/bookings/cancel
#[derive(Debug, Deserialize, Validate)]
struct CancelBookingRequest {
    #[validate(range(min = 1))]
    booking_id: i64,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    super::validate(&req)?;

    let outcome = state.engine.cancel(req.booking_id).await?;
    if outcome.changed() {
        state.cache.invalidate_session(outcome.booking().session_id).await;
    }

    Ok(Json(serde_json::json!({
        "booking": outcome.booking(),
        "changed": outcome.changed(),
    })))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
) -> Result<impl IntoResponse, CinemaError> {
    let details = state.engine.booking_details(booking_id).await?;
    Ok(Json(details))
}
