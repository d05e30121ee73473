//! Движок бронирования мест.
//!
//! Жизненный цикл места в сеансе: свободно -> активная бронь (book),
//! активная бронь -> отменена (cancel). Повторная продажа всегда создает новую
//! строку брони, старая остается в истории.
//!
//! `seats_available` — кэш числа активных броней. Любое изменение набора
//! активных броней обновляет его в той же атомарной операции хранилища, а
//! `reconcile` пересчитывает его с нуля, если счетчик разошелся.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{CinemaError, CinemaResult, Entity};
use crate::models::{Booking, BookingDetails, CancelOutcome, NewBooking};
use crate::services::pricing::PricingResolver;
use crate::services::scheduler::SessionScheduler;
use crate::store::{CinemaStore, Reconciliation};

#[derive(Clone)]
pub struct BookingEngine {
    store: Arc<dyn CinemaStore>,
    scheduler: SessionScheduler,
    pricing: PricingResolver,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn CinemaStore>, scheduler: SessionScheduler, pricing: PricingResolver) -> Self {
        Self {
            store,
            scheduler,
            pricing,
        }
    }

    pub async fn book(&self, session_id: i64, seat_id: i64) -> CinemaResult<Booking> {
        // 1. Сеанс и место; место должно быть в зале сеанса
        let session = self.scheduler.session(session_id).await?;
        let seat = self
            .store
            .seat(seat_id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Seat, seat_id))?;
        if seat.hall_id != session.hall_id {
            return Err(CinemaError::validation(format!(
                "seat {} belongs to hall {}, session {} runs in hall {}",
                seat.id, seat.hall_id, session.id, session.hall_id
            )));
        }

        // 2. Цена по фильму сеанса и типу места
        let price = self.pricing.resolve_price(session.movie_id, seat.seat_type).await?;
        if price.seat_type != seat.seat_type || price.movie_id != session.movie_id {
            return Err(CinemaError::validation(format!(
                "price {} ({}, movie {}) does not match seat {} ({}, movie {})",
                price.id, price.seat_type, price.movie_id, seat.id, seat.seat_type, session.movie_id
            )));
        }

        // 3-4. Проверка места и счетчика, вставка и декремент — одним коммитом
        let result = self
            .store
            .commit_booking(NewBooking {
                session_id,
                seat_id,
                price_id: price.id,
                price_in_cents: price.price_in_cents,
            })
            .await;

        match &result {
            Ok(booking) => info!(
                "Booking {} created: session {} seat {} ({}) for {} cents",
                booking.id, session_id, seat.label, seat.seat_type, booking.price_in_cents
            ),
            Err(CinemaError::Conflict(reason)) => warn!("Booking rejected: {}", reason),
            Err(_) => {}
        }
        result
    }

    /// Отмена идемпотентна: повторный вызов возвращает `AlreadyCancelled` и
    /// ничего не меняет.
    pub async fn cancel(&self, booking_id: i64) -> CinemaResult<CancelOutcome> {
        let outcome = self.store.commit_cancel(booking_id).await?;
        if outcome.changed() {
            info!(
                "Booking {} cancelled, seat {} of session {} released",
                booking_id,
                outcome.booking().seat_id,
                outcome.booking().session_id
            );
        }
        Ok(outcome)
    }

    /// Пересчитывает `seats_available` из активных броней и перезаписывает счетчик.
    /// Не вызывается на горячем пути, только из обслуживания или вручную.
    pub async fn reconcile(&self, session_id: i64) -> CinemaResult<Reconciliation> {
        let report = self.store.reconcile_counter(session_id).await?;
        if report.drifted() {
            warn!(
                "Session {} seats_available repaired: {} -> {}",
                session_id, report.previous, report.current
            );
        } else {
            info!("Session {} seats_available consistent ({})", session_id, report.current);
        }
        Ok(report)
    }

    pub async fn booking(&self, booking_id: i64) -> CinemaResult<Booking> {
        self.store
            .booking(booking_id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Booking, booking_id))
    }

    /// Бронь с данными для билета: фильм, зал, место и время.
    pub async fn booking_details(&self, booking_id: i64) -> CinemaResult<BookingDetails> {
        let booking = self.booking(booking_id).await?;
        let session = self.scheduler.session(booking.session_id).await?;
        let seat = self
            .store
            .seat(booking.seat_id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Seat, booking.seat_id))?;
        let movie = self
            .store
            .movie(session.movie_id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Movie, session.movie_id))?;
        let hall = self
            .store
            .hall(session.hall_id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Hall, session.hall_id))?;

        Ok(BookingDetails {
            booking,
            movie_name: movie.name,
            hall_name: hall.name,
            seat_label: seat.label,
            seat_type: seat.seat_type,
            starts_at: session.starts_at,
            ends_at: session.ends_at,
        })
    }
}
