//! Планирование сеансов: фильм + зал + интервал времени.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{CinemaError, CinemaResult, Entity};
use crate::models::{NewSession, Session};
use crate::store::CinemaStore;

#[derive(Clone)]
pub struct SessionScheduler {
    store: Arc<dyn CinemaStore>,
}

impl SessionScheduler {
    pub fn new(store: Arc<dyn CinemaStore>) -> Self {
        Self { store }
    }

    /// Создает сеанс. Все проверки кроме пересечения идут до записи; пересечение
    /// проверяется хранилищем атомарно со вставкой.
    ///
    /// Зал без мест отклоняется с `Validation`: сеанс с нулевым счетчиком
    /// нельзя было бы ни забронировать, ни показать в витрине.
    pub async fn create_session(
        &self,
        movie_id: i64,
        hall_id: i64,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> CinemaResult<Session> {
        if starts_at >= ends_at {
            return Err(CinemaError::validation("starts_at must be before ends_at"));
        }
        if self.store.movie(movie_id).await?.is_none() {
            return Err(CinemaError::not_found(Entity::Movie, movie_id));
        }
        if self.store.hall(hall_id).await?.is_none() {
            return Err(CinemaError::not_found(Entity::Hall, hall_id));
        }

        let seats = self.store.hall_seat_count(hall_id).await?;
        if seats <= 0 {
            return Err(CinemaError::validation(format!("hall {} has no seats", hall_id)));
        }

        let result = self
            .store
            .insert_session(NewSession {
                movie_id,
                hall_id,
                starts_at,
                ends_at,
                seats_available: seats,
            })
            .await;

        match &result {
            Ok(session) => info!(
                "Session {} scheduled: movie {} in hall {} at {} ({} seats)",
                session.id, movie_id, hall_id, starts_at, seats
            ),
            Err(CinemaError::Conflict(reason)) => warn!("Session rejected: {}", reason),
            Err(_) => {}
        }
        result
    }

    pub async fn session(&self, id: i64) -> CinemaResult<Session> {
        self.store
            .session(id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Session, id))
    }

    /// Будущие сеансы, на которые еще есть места. Каждый вызов начинает обход заново.
    pub fn list_upcoming_with_availability(
        &self,
        now: DateTime<Utc>,
    ) -> BoxStream<'_, CinemaResult<Session>> {
        self.store.upcoming_sessions(now)
    }
}
