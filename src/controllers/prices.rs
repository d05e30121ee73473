use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::CinemaError;
use crate::models::SeatType;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/prices", get(resolve_price))
}

// GET /api/prices?movie_id=1&seat_type=vip
#[derive(Debug, Deserialize, Validate)]
struct PriceQuery {
    #[validate(range(min = 1))]
    movie_id: i64,
    seat_type: SeatType,
}

async fn resolve_price(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PriceQuery>,
) -> Result<impl IntoResponse, CinemaError> {
    super::validate(&params)?;
    let price = state.pricing.resolve_price(params.movie_id, params.seat_type).await?;
    Ok(Json(price))
}
