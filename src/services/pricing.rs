use std::sync::Arc;
use tracing::error;

use crate::error::{CinemaError, CinemaResult, Entity};
use crate::models::{Price, SeatType};
use crate::store::CinemaStore;

/// Отдает единственную активную цену для пары (фильм, тип места).
#[derive(Clone)]
pub struct PricingResolver {
    store: Arc<dyn CinemaStore>,
}

impl PricingResolver {
    pub fn new(store: Arc<dyn CinemaStore>) -> Self {
        Self { store }
    }

    pub async fn resolve_price(&self, movie_id: i64, seat_type: SeatType) -> CinemaResult<Price> {
        if self.store.movie(movie_id).await?.is_none() {
            return Err(CinemaError::not_found(Entity::Movie, movie_id));
        }

        let mut prices = self.store.active_prices(movie_id, seat_type).await?;
        match prices.len() {
            0 => Err(CinemaError::not_found(Entity::MoviePrice(seat_type), movie_id)),
            1 => Ok(prices.remove(0)),
            n => {
                error!(
                    "pricing: {} active prices for movie {} / {}, refusing to guess",
                    n, movie_id, seat_type
                );
                Err(CinemaError::AmbiguousConfiguration {
                    movie_id,
                    seat_type,
                    active_prices: n,
                })
            }
        }
    }
}
