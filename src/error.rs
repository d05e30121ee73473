//! Ошибки ядра бронирования и их отображение в HTTP-ответы.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::models::SeatType;

/// Сущность, которую не удалось найти.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Movie,
    /// Цена для типа места; id в ошибке — id фильма.
    MoviePrice(SeatType),
    Hall,
    Seat,
    Session,
    Booking,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Movie => "movie",
            Entity::MoviePrice(seat_type) => {
                return write!(f, "{} price for movie", seat_type);
            }
            Entity::Hall => "cinema hall",
            Entity::Seat => "seat",
            Entity::Session => "session",
            Entity::Booking => "booking",
        };
        f.write_str(name)
    }
}

/// Причина конфликта. `SeatTaken` и `SoldOut` должны различаться для клиента:
/// в первом случае есть смысл предложить другое место, во втором нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    SeatTaken { session_id: i64, seat_id: i64 },
    SoldOut { session_id: i64 },
    HallBusy { hall_id: i64 },
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::SeatTaken { session_id, seat_id } => {
                write!(f, "seat {} is already booked for session {}", seat_id, session_id)
            }
            ConflictReason::SoldOut { session_id } => {
                write!(f, "session {} is sold out", session_id)
            }
            ConflictReason::HallBusy { hall_id } => {
                write!(f, "hall {} already has a session in this interval", hall_id)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum CinemaError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(ConflictReason),

    /// Несколько активных цен на одну пару (фильм, тип места) — ошибка данных,
    /// угадывать нужную цену нельзя.
    #[error("{active_prices} active prices for movie {movie_id} and seat type {seat_type}")]
    AmbiguousConfiguration {
        movie_id: i64,
        seat_type: SeatType,
        active_prices: usize,
    },

    #[error("seats_available drift in session {session_id}: stored {stored}, expected {expected}")]
    Inconsistency {
        session_id: i64,
        stored: i32,
        expected: i32,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CinemaError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        CinemaError::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CinemaError::Validation(message.into())
    }

    /// Короткий машиночитаемый код для тела ответа.
    pub fn kind(&self) -> &'static str {
        match self {
            CinemaError::NotFound { .. } => "not_found",
            CinemaError::Validation(_) => "validation_error",
            CinemaError::Conflict(ConflictReason::SeatTaken { .. }) => "seat_taken",
            CinemaError::Conflict(ConflictReason::SoldOut { .. }) => "sold_out",
            CinemaError::Conflict(ConflictReason::HallBusy { .. }) => "hall_busy",
            CinemaError::AmbiguousConfiguration { .. } => "ambiguous_configuration",
            CinemaError::Inconsistency { .. } => "inconsistency",
            CinemaError::Database(_) | CinemaError::Migration(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CinemaError::NotFound { .. } => StatusCode::NOT_FOUND,
            CinemaError::Validation(_) => StatusCode::BAD_REQUEST,
            CinemaError::Conflict(_) => StatusCode::CONFLICT,
            CinemaError::AmbiguousConfiguration { .. }
            | CinemaError::Inconsistency { .. }
            | CinemaError::Database(_)
            | CinemaError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CinemaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Детали ошибок БД наружу не отдаем
            CinemaError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                "Database error".to_string()
            }
            CinemaError::Migration(e) => {
                tracing::error!("migration error: {:?}", e);
                "Database error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type CinemaResult<T> = Result<T, CinemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_taken_and_sold_out_are_distinguishable() {
        let taken = CinemaError::Conflict(ConflictReason::SeatTaken { session_id: 1, seat_id: 2 });
        let sold_out = CinemaError::Conflict(ConflictReason::SoldOut { session_id: 1 });

        assert_eq!(taken.status_code(), StatusCode::CONFLICT);
        assert_eq!(sold_out.status_code(), StatusCode::CONFLICT);
        assert_ne!(taken.kind(), sold_out.kind());
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = CinemaError::not_found(Entity::Session, 42);
        assert_eq!(err.to_string(), "session 42 not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
