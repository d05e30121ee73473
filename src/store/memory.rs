//! Хранилище в памяти процесса. Используется в тестах и при `STORAGE_BACKEND=memory`.
//!
//! Справочники лежат под `RwLock`, а всё изменяемое состояние сеанса (счетчик,
//! строки броней и индекс занятых мест) — под отдельным мьютексом на сеанс.
//! Мьютекс держится только на время коммита, через `.await` он не проходит.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{
    BookingStore, CatalogStore, CounterSnapshot, HallLayoutStore, Reconciliation, SeedStore,
    SessionStore,
};
use crate::error::{CinemaError, CinemaResult, ConflictReason, Entity};
use crate::models::{
    Booking, BookingStatus, CancelOutcome, CinemaHall, Movie, NewBooking, NewPrice, NewSeat,
    NewSession, Price, Seat, SeatType, Session,
};
use crate::seed::{SeedData, SeedReport};

#[derive(Default)]
struct Sequences {
    movies: AtomicI64,
    prices: AtomicI64,
    halls: AtomicI64,
    seats: AtomicI64,
    sessions: AtomicI64,
    bookings: AtomicI64,
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

#[derive(Default)]
struct Catalog {
    movies: BTreeMap<i64, Movie>,
    prices: BTreeMap<i64, Price>,
}

#[derive(Default)]
struct Layout {
    halls: BTreeMap<i64, CinemaHall>,
    seats: BTreeMap<i64, Seat>,
}

/// Изменяемая часть сеанса.
struct Ledger {
    seats_available: i32,
    updated_at: DateTime<Utc>,
    bookings: BTreeMap<i64, Booking>,
    // seat_id -> booking_id активной брони
    active: HashMap<i64, i64>,
}

struct SessionSlot {
    session: Session,
    ledger: Mutex<Ledger>,
}

impl SessionSlot {
    fn snapshot(&self, ledger: &Ledger) -> Session {
        Session {
            seats_available: ledger.seats_available,
            updated_at: ledger.updated_at,
            ..self.session.clone()
        }
    }

    fn current(&self) -> Session {
        let ledger = lock(&self.ledger);
        self.snapshot(&ledger)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    ids: Sequences,
    catalog: RwLock<Catalog>,
    layout: RwLock<Layout>,
    sessions: RwLock<BTreeMap<i64, Arc<SessionSlot>>>,
    // booking_id -> session_id
    booking_index: RwLock<HashMap<i64, i64>>,
}

// Паника в другом потоке не должна навсегда блокировать хранилище
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, session_id: i64) -> CinemaResult<Arc<SessionSlot>> {
        read(&self.sessions)
            .get(&session_id)
            .cloned()
            .ok_or_else(|| CinemaError::not_found(Entity::Session, session_id))
    }

    fn count_seats(&self, hall_id: i64) -> i32 {
        let count = read(&self.layout)
            .seats
            .values()
            .filter(|s| s.hall_id == hall_id)
            .count();
        i32::try_from(count).unwrap_or(i32::MAX)
    }
}

fn active_count(ledger: &Ledger) -> i32 {
    i32::try_from(ledger.active.len()).unwrap_or(i32::MAX)
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_movie(&self, name: &str) -> CinemaResult<Movie> {
        if name.trim().is_empty() {
            return Err(CinemaError::validation("movie name must not be empty"));
        }
        let now = Utc::now();
        let movie = Movie {
            id: next_id(&self.ids.movies),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        write(&self.catalog).movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn movie(&self, id: i64) -> CinemaResult<Option<Movie>> {
        Ok(read(&self.catalog).movies.get(&id).cloned())
    }

    async fn insert_price(&self, price: NewPrice) -> CinemaResult<Price> {
        if price.price_in_cents < 0 {
            return Err(CinemaError::validation("price_in_cents must be >= 0"));
        }
        let mut catalog = write(&self.catalog);
        if !catalog.movies.contains_key(&price.movie_id) {
            return Err(CinemaError::not_found(Entity::Movie, price.movie_id));
        }
        let now = Utc::now();
        let price = Price {
            id: next_id(&self.ids.prices),
            movie_id: price.movie_id,
            seat_type: price.seat_type,
            price_in_cents: price.price_in_cents,
            active: price.active,
            created_at: now,
            updated_at: now,
        };
        catalog.prices.insert(price.id, price.clone());
        Ok(price)
    }

    async fn price(&self, id: i64) -> CinemaResult<Option<Price>> {
        Ok(read(&self.catalog).prices.get(&id).cloned())
    }

    async fn active_prices(&self, movie_id: i64, seat_type: SeatType) -> CinemaResult<Vec<Price>> {
        Ok(read(&self.catalog)
            .prices
            .values()
            .filter(|p| p.active && p.movie_id == movie_id && p.seat_type == seat_type)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HallLayoutStore for MemoryStore {
    async fn insert_hall(&self, name: &str) -> CinemaResult<CinemaHall> {
        let hall = CinemaHall {
            id: next_id(&self.ids.halls),
            name: name.to_string(),
        };
        write(&self.layout).halls.insert(hall.id, hall.clone());
        Ok(hall)
    }

    async fn hall(&self, id: i64) -> CinemaResult<Option<CinemaHall>> {
        Ok(read(&self.layout).halls.get(&id).cloned())
    }

    async fn insert_seat(&self, seat: NewSeat) -> CinemaResult<Seat> {
        let mut layout = write(&self.layout);
        if !layout.halls.contains_key(&seat.hall_id) {
            return Err(CinemaError::not_found(Entity::Hall, seat.hall_id));
        }
        let duplicate = layout
            .seats
            .values()
            .any(|s| s.hall_id == seat.hall_id && s.label == seat.label);
        if duplicate {
            return Err(CinemaError::validation(format!(
                "seat '{}' already exists in hall {}",
                seat.label, seat.hall_id
            )));
        }
        let seat = Seat {
            id: next_id(&self.ids.seats),
            hall_id: seat.hall_id,
            seat_type: seat.seat_type,
            label: seat.label,
        };
        layout.seats.insert(seat.id, seat.clone());
        Ok(seat)
    }

    async fn seat(&self, id: i64) -> CinemaResult<Option<Seat>> {
        Ok(read(&self.layout).seats.get(&id).cloned())
    }

    async fn hall_seats(&self, hall_id: i64) -> CinemaResult<Vec<Seat>> {
        let mut seats: Vec<Seat> = read(&self.layout)
            .seats
            .values()
            .filter(|s| s.hall_id == hall_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        Ok(seats)
    }

    async fn hall_seat_count(&self, hall_id: i64) -> CinemaResult<i32> {
        Ok(self.count_seats(hall_id))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, new: NewSession) -> CinemaResult<Session> {
        // Проверка и вставка под одной блокировкой на запись
        let mut sessions = write(&self.sessions);
        if let Some(busy) = sessions
            .values()
            .map(|slot| &slot.session)
            .find(|s| s.hall_id == new.hall_id && s.overlaps(new.starts_at, new.ends_at))
        {
            debug!("memory: hall {} busy with session {}", new.hall_id, busy.id);
            return Err(CinemaError::Conflict(ConflictReason::HallBusy { hall_id: new.hall_id }));
        }

        let now = Utc::now();
        let session = Session {
            id: next_id(&self.ids.sessions),
            movie_id: new.movie_id,
            hall_id: new.hall_id,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            seats_available: new.seats_available,
            created_at: now,
            updated_at: now,
        };
        let slot = SessionSlot {
            session: session.clone(),
            ledger: Mutex::new(Ledger {
                seats_available: new.seats_available,
                updated_at: now,
                bookings: BTreeMap::new(),
                active: HashMap::new(),
            }),
        };
        sessions.insert(session.id, Arc::new(slot));
        Ok(session)
    }

    async fn session(&self, id: i64) -> CinemaResult<Option<Session>> {
        let slot = read(&self.sessions).get(&id).cloned();
        Ok(slot.map(|slot| slot.current()))
    }

    async fn session_ids(&self) -> CinemaResult<Vec<i64>> {
        Ok(read(&self.sessions).keys().copied().collect())
    }

    fn upcoming_sessions(&self, now: DateTime<Utc>) -> BoxStream<'_, CinemaResult<Session>> {
        let slots: Vec<Arc<SessionSlot>> = read(&self.sessions)
            .values()
            .filter(|slot| slot.session.starts_at > now)
            .cloned()
            .collect();

        let mut upcoming: Vec<Session> = slots
            .iter()
            .map(|slot| slot.current())
            .filter(|s| s.seats_available > 0)
            .collect();
        upcoming.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));

        stream::iter(upcoming.into_iter().map(Ok)).boxed()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn commit_booking(&self, new: NewBooking) -> CinemaResult<Booking> {
        let slot = self.slot(new.session_id)?;
        let mut ledger = lock(&slot.ledger);

        // Сначала счетчик: в распроданном сеансе клиент должен увидеть SoldOut,
        // а не SeatTaken на каждом месте по очереди
        if ledger.seats_available <= 0 {
            return Err(CinemaError::Conflict(ConflictReason::SoldOut {
                session_id: new.session_id,
            }));
        }
        if ledger.active.contains_key(&new.seat_id) {
            return Err(CinemaError::Conflict(ConflictReason::SeatTaken {
                session_id: new.session_id,
                seat_id: new.seat_id,
            }));
        }

        let now = Utc::now();
        let booking = Booking {
            id: next_id(&self.ids.bookings),
            session_id: new.session_id,
            price_id: new.price_id,
            seat_id: new.seat_id,
            price_in_cents: new.price_in_cents,
            status: BookingStatus::Active,
            created_at: now,
            cancelled_at: None,
        };

        // Индекс пишем до публикации строки, чтобы cancel по id всегда нашел сеанс
        write(&self.booking_index).insert(booking.id, booking.session_id);
        ledger.active.insert(booking.seat_id, booking.id);
        ledger.bookings.insert(booking.id, booking.clone());
        ledger.seats_available -= 1;
        ledger.updated_at = now;

        debug!(
            "memory: booking {} committed, session {} seats_available={}",
            booking.id, booking.session_id, ledger.seats_available
        );
        Ok(booking)
    }

    async fn commit_cancel(&self, booking_id: i64) -> CinemaResult<CancelOutcome> {
        let session_id = read(&self.booking_index)
            .get(&booking_id)
            .copied()
            .ok_or_else(|| CinemaError::not_found(Entity::Booking, booking_id))?;
        let slot = self.slot(session_id)?;
        let mut guard = lock(&slot.ledger);
        let ledger = &mut *guard;

        let booking = ledger
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| CinemaError::not_found(Entity::Booking, booking_id))?;

        if !booking.is_active() {
            return Ok(CancelOutcome::AlreadyCancelled(booking.clone()));
        }

        let now = Utc::now();
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        let cancelled = booking.clone();

        ledger.active.remove(&cancelled.seat_id);
        ledger.seats_available += 1;
        ledger.updated_at = now;

        Ok(CancelOutcome::Cancelled(cancelled))
    }

    async fn booking(&self, id: i64) -> CinemaResult<Option<Booking>> {
        let indexed = read(&self.booking_index).get(&id).copied();
        let Some(session_id) = indexed else {
            return Ok(None);
        };
        let slot = self.slot(session_id)?;
        let ledger = lock(&slot.ledger);
        Ok(ledger.bookings.get(&id).cloned())
    }

    async fn active_bookings(&self, session_id: i64) -> CinemaResult<Vec<Booking>> {
        let slot = self.slot(session_id)?;
        let ledger = lock(&slot.ledger);
        Ok(ledger.bookings.values().filter(|b| b.is_active()).cloned().collect())
    }

    async fn counter_snapshot(&self, session_id: i64) -> CinemaResult<CounterSnapshot> {
        let slot = self.slot(session_id)?;
        let ledger = lock(&slot.ledger);
        Ok(CounterSnapshot {
            session_id,
            stored: ledger.seats_available,
            hall_seats: self.count_seats(slot.session.hall_id),
            active_bookings: active_count(&ledger),
        })
    }

    async fn reconcile_counter(&self, session_id: i64) -> CinemaResult<Reconciliation> {
        let slot = self.slot(session_id)?;
        let mut ledger = lock(&slot.ledger);
        let previous = ledger.seats_available;
        let current = self.count_seats(slot.session.hall_id) - active_count(&ledger);
        if previous != current {
            ledger.seats_available = current;
            ledger.updated_at = Utc::now();
        }
        Ok(Reconciliation {
            session_id,
            previous,
            current,
        })
    }

    async fn overwrite_seats_available(&self, session_id: i64, value: i32) -> CinemaResult<i32> {
        if value < 0 {
            return Err(CinemaError::validation("seats_available must be >= 0"));
        }
        let slot = self.slot(session_id)?;
        let mut ledger = lock(&slot.ledger);
        let previous = ledger.seats_available;
        ledger.seats_available = value;
        ledger.updated_at = Utc::now();
        Ok(previous)
    }
}

#[async_trait]
impl SeedStore for MemoryStore {
    async fn load_seed(&self, seed: &SeedData) -> CinemaResult<Option<SeedReport>> {
        seed.validate()?;
        // Обе блокировки до проверки пустоты: засев либо целиком, либо никак
        let mut catalog = write(&self.catalog);
        let mut layout = write(&self.layout);
        if !catalog.movies.is_empty() || !layout.halls.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let mut report = SeedReport::default();
        for movie in &seed.movies {
            let movie_id = next_id(&self.ids.movies);
            catalog.movies.insert(
                movie_id,
                Movie {
                    id: movie_id,
                    name: movie.name.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
            report.movies += 1;

            for price in &movie.prices {
                let id = next_id(&self.ids.prices);
                catalog.prices.insert(
                    id,
                    Price {
                        id,
                        movie_id,
                        seat_type: price.seat_type,
                        price_in_cents: price.price_in_cents,
                        active: true,
                        created_at: now,
                        updated_at: now,
                    },
                );
                report.prices += 1;
            }
        }

        for hall in &seed.halls {
            let hall_id = next_id(&self.ids.halls);
            layout.halls.insert(
                hall_id,
                CinemaHall {
                    id: hall_id,
                    name: hall.name.clone(),
                },
            );
            report.halls += 1;

            for seat in &hall.seats {
                let id = next_id(&self.ids.seats);
                layout.seats.insert(
                    id,
                    Seat {
                        id,
                        hall_id,
                        seat_type: seat.seat_type,
                        label: seat.label.clone(),
                    },
                );
                report.seats += 1;
            }
        }

        debug!("memory: seeded {:?}", report);
        Ok(Some(report))
    }
}
