//! Проекция для чтения: карта мест сеанса и число свободных мест.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::{CinemaError, CinemaResult};
use crate::models::Seat;
use crate::services::scheduler::SessionScheduler;
use crate::store::{CinemaStore, CounterSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SeatState {
    Free,
    Booked { booking_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMapEntry {
    #[serde(flatten)]
    pub seat: Seat,
    #[serde(flatten)]
    pub state: SeatState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMap {
    pub session_id: i64,
    pub hall_id: i64,
    pub seats: Vec<SeatMapEntry>,
}

impl SeatMap {
    pub fn free_count(&self) -> usize {
        self.seats.iter().filter(|e| e.state == SeatState::Free).count()
    }
}

#[derive(Clone)]
pub struct AvailabilityIndex {
    store: Arc<dyn CinemaStore>,
    scheduler: SessionScheduler,
}

impl AvailabilityIndex {
    pub fn new(store: Arc<dyn CinemaStore>, scheduler: SessionScheduler) -> Self {
        Self { store, scheduler }
    }

    /// Все места зала с пометкой, свободно ли место в этом сеансе.
    pub async fn seat_map(&self, session_id: i64) -> CinemaResult<SeatMap> {
        let session = self.scheduler.session(session_id).await?;
        let seats = self.store.hall_seats(session.hall_id).await?;
        let booked: HashMap<i64, i64> = self
            .store
            .active_bookings(session_id)
            .await?
            .into_iter()
            .map(|b| (b.seat_id, b.id))
            .collect();

        let seats = seats
            .into_iter()
            .map(|seat| {
                let state = match booked.get(&seat.id) {
                    Some(&booking_id) => SeatState::Booked { booking_id },
                    None => SeatState::Free,
                };
                SeatMapEntry { seat, state }
            })
            .collect();

        Ok(SeatMap {
            session_id,
            hall_id: session.hall_id,
            seats,
        })
    }

    /// Кэшированный счетчик, O(1).
    pub async fn seats_available(&self, session_id: i64) -> CinemaResult<i32> {
        Ok(self.scheduler.session(session_id).await?.seats_available)
    }

    /// Сверка счетчика с живым пересчетом. Расхождение только сообщается,
    /// чинит его `BookingEngine::reconcile`.
    pub async fn verify(&self, session_id: i64) -> CinemaResult<CounterSnapshot> {
        let snapshot = self.store.counter_snapshot(session_id).await?;
        if !snapshot.is_consistent() {
            warn!(
                "Session {} counter drift: stored {}, expected {} ({} seats, {} active bookings)",
                session_id,
                snapshot.stored,
                snapshot.expected(),
                snapshot.hall_seats,
                snapshot.active_bookings
            );
            return Err(CinemaError::Inconsistency {
                session_id,
                stored: snapshot.stored,
                expected: snapshot.expected(),
            });
        }
        Ok(snapshot)
    }
}
