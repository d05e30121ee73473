//! Хранилище ядра: справочники (фильмы, цены, залы, места), сеансы и брони.
//!
//! Все операции, меняющие набор активных броней, реализуются бэкендом как
//! одна атомарная единица вместе с обновлением `seats_available`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::CinemaResult;
use crate::models::{
    Booking, CancelOutcome, CinemaHall, Movie, NewBooking, NewPrice, NewSeat, NewSession, Price,
    Seat, SeatType, Session,
};
use crate::seed::{SeedData, SeedReport};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Счетчик свободных мест и живой пересчет, снятые одним согласованным чтением.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub session_id: i64,
    pub stored: i32,
    pub hall_seats: i32,
    pub active_bookings: i32,
}

impl CounterSnapshot {
    pub fn expected(&self) -> i32 {
        self.hall_seats - self.active_bookings
    }

    pub fn is_consistent(&self) -> bool {
        self.stored == self.expected()
    }
}

/// Результат `reconcile`: что лежало в счетчике и что записали.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub session_id: i64,
    pub previous: i32,
    pub current: i32,
}

impl Reconciliation {
    pub fn drifted(&self) -> bool {
        self.previous != self.current
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_movie(&self, name: &str) -> CinemaResult<Movie>;
    async fn movie(&self, id: i64) -> CinemaResult<Option<Movie>>;
    async fn insert_price(&self, price: NewPrice) -> CinemaResult<Price>;
    async fn price(&self, id: i64) -> CinemaResult<Option<Price>>;
    async fn active_prices(&self, movie_id: i64, seat_type: SeatType) -> CinemaResult<Vec<Price>>;
}

#[async_trait]
pub trait HallLayoutStore: Send + Sync {
    async fn insert_hall(&self, name: &str) -> CinemaResult<CinemaHall>;
    async fn hall(&self, id: i64) -> CinemaResult<Option<CinemaHall>>;
    /// Метка места уникальна в пределах зала, дубликат — `Validation`.
    async fn insert_seat(&self, seat: NewSeat) -> CinemaResult<Seat>;
    async fn seat(&self, id: i64) -> CinemaResult<Option<Seat>>;
    async fn hall_seats(&self, hall_id: i64) -> CinemaResult<Vec<Seat>>;
    async fn hall_seat_count(&self, hall_id: i64) -> CinemaResult<i32>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Проверка пересечения с сеансами того же зала и вставка — одна атомарная
    /// операция. Пересечение — `Conflict(HallBusy)`.
    async fn insert_session(&self, session: NewSession) -> CinemaResult<Session>;
    async fn session(&self, id: i64) -> CinemaResult<Option<Session>>;
    async fn session_ids(&self) -> CinemaResult<Vec<i64>>;
    /// Ленивый поток сеансов с `starts_at > now` и свободными местами,
    /// по возрастанию `starts_at`.
    fn upcoming_sessions(&self, now: DateTime<Utc>) -> BoxStream<'_, CinemaResult<Session>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Проверка уникальности активной брони, проверка счетчика, вставка и
    /// декремент — одна атомарная единица.
    async fn commit_booking(&self, booking: NewBooking) -> CinemaResult<Booking>;
    /// Смена статуса на cancelled и инкремент счетчика атомарно. Повторная
    /// отмена ничего не меняет.
    async fn commit_cancel(&self, booking_id: i64) -> CinemaResult<CancelOutcome>;
    async fn booking(&self, id: i64) -> CinemaResult<Option<Booking>>;
    async fn active_bookings(&self, session_id: i64) -> CinemaResult<Vec<Booking>>;
    async fn counter_snapshot(&self, session_id: i64) -> CinemaResult<CounterSnapshot>;
    /// Пересчитывает счетчик из активных броней и перезаписывает его.
    async fn reconcile_counter(&self, session_id: i64) -> CinemaResult<Reconciliation>;
    /// Прямая запись счетчика в обход броней (ручная правка данных).
    /// Возвращает предыдущее значение.
    async fn overwrite_seats_available(&self, session_id: i64, value: i32) -> CinemaResult<i32>;
}

#[async_trait]
pub trait SeedStore: Send + Sync {
    /// Засев справочников одной атомарной операцией и только в пустое
    /// хранилище (нет ни фильмов, ни залов). `None` — засев пропущен.
    async fn load_seed(&self, seed: &SeedData) -> CinemaResult<Option<SeedReport>>;
}

pub trait CinemaStore:
    CatalogStore + HallLayoutStore + SessionStore + BookingStore + SeedStore
{
}

impl<T> CinemaStore for T where
    T: CatalogStore + HallLayoutStore + SessionStore + BookingStore + SeedStore
{
}
