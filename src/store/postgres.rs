//! Хранилище на PostgreSQL.
//!
//! Единственность активной брони держит частичный уникальный индекс
//! `uq_bookings_active_seat`: из двух конкурентных вставок одного места вторая
//! дождется коммита первой и получит 23505, который мы отдаем как `SeatTaken`.
//! Декремент счетчика — условный `UPDATE ... WHERE seats_available > 0` в той
//! же транзакции, так что вставка и декремент фиксируются только вместе.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use super::{
    BookingStore, CatalogStore, CounterSnapshot, HallLayoutStore, Reconciliation, SeedStore,
    SessionStore,
};
use crate::database::Database;
use crate::error::{CinemaError, CinemaResult, ConflictReason, Entity};
use crate::models::{
    Booking, CancelOutcome, CinemaHall, Movie, NewBooking, NewPrice, NewSeat, NewSession, Price,
    Seat, SeatType, Session,
};
use crate::seed::{SeedData, SeedReport};

const SESSION_COLUMNS: &str =
    "id, movie_id, hall_id, starts_at, ends_at, seats_available, created_at, updated_at";
const BOOKING_COLUMNS: &str =
    "id, session_id, price_id, seat_id, price_in_cents, status, created_at, cancelled_at";
const PRICE_COLUMNS: &str =
    "id, movie_id, seat_type, price_in_cents, active, created_at, updated_at";
const SEAT_COLUMNS: &str = "id, hall_id, type AS seat_type, name AS label";

const ACTIVE_SEAT_INDEX: &str = "uq_bookings_active_seat";
const SEAT_NAME_CONSTRAINT: &str = "uq_cinema_hall_seats_name";
const EXCLUSION_VIOLATION: &str = "23P01";
// Ключ advisory-блокировки засева, общий для всех инстансов сервиса
const SEED_LOCK_KEY: i64 = 0x5eed_c1e0;

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.constraint() == Some(constraint),
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn is_exclusion_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(EXCLUSION_VIOLATION))
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_movie(&self, name: &str) -> CinemaResult<Movie> {
        if name.trim().is_empty() {
            return Err(CinemaError::validation("movie name must not be empty"));
        }
        let movie = sqlx::query_as::<_, Movie>(
            "INSERT INTO movies (name) VALUES ($1) RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(movie)
    }

    async fn movie(&self, id: i64) -> CinemaResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            "SELECT id, name, created_at, updated_at FROM movies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(movie)
    }

    async fn insert_price(&self, price: NewPrice) -> CinemaResult<Price> {
        if price.price_in_cents < 0 {
            return Err(CinemaError::validation("price_in_cents must be >= 0"));
        }
        let sql = format!(
            "INSERT INTO prices (movie_id, seat_type, price_in_cents, active)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            PRICE_COLUMNS
        );
        sqlx::query_as::<_, Price>(&sql)
            .bind(price.movie_id)
            .bind(price.seat_type)
            .bind(price.price_in_cents)
            .bind(price.active)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    CinemaError::not_found(Entity::Movie, price.movie_id)
                } else {
                    e.into()
                }
            })
    }

    async fn price(&self, id: i64) -> CinemaResult<Option<Price>> {
        let sql = format!("SELECT {} FROM prices WHERE id = $1", PRICE_COLUMNS);
        let price = sqlx::query_as::<_, Price>(&sql)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(price)
    }

    async fn active_prices(&self, movie_id: i64, seat_type: SeatType) -> CinemaResult<Vec<Price>> {
        let sql = format!(
            "SELECT {} FROM prices
             WHERE movie_id = $1 AND seat_type = $2 AND active
             ORDER BY id",
            PRICE_COLUMNS
        );
        let prices = sqlx::query_as::<_, Price>(&sql)
            .bind(movie_id)
            .bind(seat_type)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(prices)
    }
}

#[async_trait]
impl HallLayoutStore for PgStore {
    async fn insert_hall(&self, name: &str) -> CinemaResult<CinemaHall> {
        let hall = sqlx::query_as::<_, CinemaHall>(
            "INSERT INTO cinema_halls (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(hall)
    }

    async fn hall(&self, id: i64) -> CinemaResult<Option<CinemaHall>> {
        let hall = sqlx::query_as::<_, CinemaHall>("SELECT id, name FROM cinema_halls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(hall)
    }

    async fn insert_seat(&self, seat: NewSeat) -> CinemaResult<Seat> {
        let sql = format!(
            "INSERT INTO cinema_hall_seats (name, type, hall_id) VALUES ($1, $2, $3) RETURNING {}",
            SEAT_COLUMNS
        );
        sqlx::query_as::<_, Seat>(&sql)
            .bind(&seat.label)
            .bind(seat.seat_type)
            .bind(seat.hall_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, SEAT_NAME_CONSTRAINT) {
                    CinemaError::validation(format!(
                        "seat '{}' already exists in hall {}",
                        seat.label, seat.hall_id
                    ))
                } else if is_foreign_key_violation(&e) {
                    CinemaError::not_found(Entity::Hall, seat.hall_id)
                } else {
                    e.into()
                }
            })
    }

    async fn seat(&self, id: i64) -> CinemaResult<Option<Seat>> {
        let sql = format!("SELECT {} FROM cinema_hall_seats WHERE id = $1", SEAT_COLUMNS);
        let seat = sqlx::query_as::<_, Seat>(&sql)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(seat)
    }

    async fn hall_seats(&self, hall_id: i64) -> CinemaResult<Vec<Seat>> {
        let sql = format!(
            "SELECT {} FROM cinema_hall_seats WHERE hall_id = $1 ORDER BY name, id",
            SEAT_COLUMNS
        );
        let seats = sqlx::query_as::<_, Seat>(&sql)
            .bind(hall_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(seats)
    }

    async fn hall_seat_count(&self, hall_id: i64) -> CinemaResult<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            "SELECT COUNT(*)::int FROM cinema_hall_seats WHERE hall_id = $1",
        )
        .bind(hall_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, new: NewSession) -> CinemaResult<Session> {
        let mut tx = self.db.pool.begin().await?;

        // Блокируем строку зала: создание сеансов одного зала идет по очереди
        let hall = sqlx::query_scalar::<_, i64>("SELECT id FROM cinema_halls WHERE id = $1 FOR UPDATE")
            .bind(new.hall_id)
            .fetch_optional(&mut *tx)
            .await?;
        if hall.is_none() {
            return Err(CinemaError::not_found(Entity::Hall, new.hall_id));
        }

        let busy = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM movie_sessions
             WHERE hall_id = $1 AND starts_at < $3 AND $2 < ends_at
             ORDER BY starts_at
             LIMIT 1",
        )
        .bind(new.hall_id)
        .bind(new.starts_at)
        .bind(new.ends_at)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(busy) = busy {
            debug!("postgres: hall {} busy with session {}", new.hall_id, busy);
            return Err(CinemaError::Conflict(ConflictReason::HallBusy { hall_id: new.hall_id }));
        }

        let sql = format!(
            "INSERT INTO movie_sessions (movie_id, hall_id, starts_at, ends_at, seats_available)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(new.movie_id)
            .bind(new.hall_id)
            .bind(new.starts_at)
            .bind(new.ends_at)
            .bind(new.seats_available)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_exclusion_violation(&e) {
                    CinemaError::Conflict(ConflictReason::HallBusy { hall_id: new.hall_id })
                } else if is_foreign_key_violation(&e) {
                    CinemaError::not_found(Entity::Movie, new.movie_id)
                } else {
                    e.into()
                }
            })?;

        tx.commit().await?;
        Ok(session)
    }

    async fn session(&self, id: i64) -> CinemaResult<Option<Session>> {
        let sql = format!("SELECT {} FROM movie_sessions WHERE id = $1", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(session)
    }

    async fn session_ids(&self) -> CinemaResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM movie_sessions ORDER BY id")
            .fetch_all(&self.db.pool)
            .await?;
        Ok(ids)
    }

    fn upcoming_sessions(&self, now: DateTime<Utc>) -> BoxStream<'_, CinemaResult<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT id, movie_id, hall_id, starts_at, ends_at, seats_available, created_at, updated_at
             FROM movie_sessions
             WHERE seats_available > 0 AND starts_at > $1
             ORDER BY starts_at, id",
        )
        .bind(now)
        .fetch(&self.db.pool)
        .map_err(CinemaError::from)
        .boxed()
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn commit_booking(&self, new: NewBooking) -> CinemaResult<Booking> {
        let mut tx = self.db.pool.begin().await?;

        // Декремент первым: строка сеанса блокируется до конца транзакции, а
        // распроданный сеанс отвечает SoldOut раньше, чем SeatTaken
        let remaining = sqlx::query_scalar::<_, i32>(
            "UPDATE movie_sessions
             SET seats_available = seats_available - 1, updated_at = NOW()
             WHERE id = $1 AND seats_available > 0
             RETURNING seats_available",
        )
        .bind(new.session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            tx.rollback().await?;
            return Err(CinemaError::Conflict(ConflictReason::SoldOut {
                session_id: new.session_id,
            }));
        };

        // Проигравшая вставка откатывает и декремент вместе с транзакцией
        let sql = format!(
            "INSERT INTO bookings (session_id, price_id, seat_id, price_in_cents)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            BOOKING_COLUMNS
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(new.session_id)
            .bind(new.price_id)
            .bind(new.seat_id)
            .bind(new.price_in_cents)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, ACTIVE_SEAT_INDEX) {
                    CinemaError::Conflict(ConflictReason::SeatTaken {
                        session_id: new.session_id,
                        seat_id: new.seat_id,
                    })
                } else if is_foreign_key_violation(&e) {
                    CinemaError::not_found(Entity::Session, new.session_id)
                } else {
                    e.into()
                }
            })?;

        tx.commit().await?;
        debug!(
            "postgres: booking {} committed, session {} seats_available={}",
            booking.id, booking.session_id, remaining
        );
        Ok(booking)
    }

    async fn commit_cancel(&self, booking_id: i64) -> CinemaResult<CancelOutcome> {
        let mut tx = self.db.pool.begin().await?;

        let session_id = sqlx::query_scalar::<_, i64>("SELECT session_id FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Booking, booking_id))?;

        // Порядок блокировок как в commit_booking: сначала строка сеанса, потом
        // бронь. Иначе повторная продажа того же места ловит deadlock на
        // uq_bookings_active_seat.
        sqlx::query("SELECT id FROM movie_sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "UPDATE bookings
             SET status = 'cancelled', cancelled_at = NOW()
             WHERE id = $1 AND status = 'active'
             RETURNING {}",
            BOOKING_COLUMNS
        );
        let cancelled = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(booking) = cancelled else {
            let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
            let existing = sqlx::query_as::<_, Booking>(&sql)
                .bind(booking_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Ok(CancelOutcome::AlreadyCancelled(existing));
        };

        sqlx::query(
            "UPDATE movie_sessions
             SET seats_available = seats_available + 1, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(CancelOutcome::Cancelled(booking))
    }

    async fn booking(&self, id: i64) -> CinemaResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(booking)
    }

    async fn active_bookings(&self, session_id: i64) -> CinemaResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE session_id = $1 AND status = 'active' ORDER BY id",
            BOOKING_COLUMNS
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(session_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(bookings)
    }

    async fn counter_snapshot(&self, session_id: i64) -> CinemaResult<CounterSnapshot> {
        // Один запрос = один снимок, счетчик и пересчет согласованы между собой
        let row = sqlx::query_as::<_, (i32, i32, i32)>(
            r#"
            SELECT
                s.seats_available,
                (SELECT COUNT(*) FROM cinema_hall_seats h WHERE h.hall_id = s.hall_id)::int,
                (SELECT COUNT(*) FROM bookings b WHERE b.session_id = s.id AND b.status = 'active')::int
            FROM movie_sessions s
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.db.pool)
        .await?;

        let (stored, hall_seats, active_bookings) =
            row.ok_or_else(|| CinemaError::not_found(Entity::Session, session_id))?;
        Ok(CounterSnapshot {
            session_id,
            stored,
            hall_seats,
            active_bookings,
        })
    }

    async fn reconcile_counter(&self, session_id: i64) -> CinemaResult<Reconciliation> {
        let mut tx = self.db.pool.begin().await?;

        // FOR UPDATE ставит book/cancel этого сеанса в очередь за нами
        let previous = sqlx::query_scalar::<_, i32>(
            "SELECT seats_available FROM movie_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CinemaError::not_found(Entity::Session, session_id))?;

        let current = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM cinema_hall_seats h WHERE h.hall_id = s.hall_id)::int
                - (SELECT COUNT(*) FROM bookings b WHERE b.session_id = s.id AND b.status = 'active')::int
            FROM movie_sessions s
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        if previous != current {
            sqlx::query(
                "UPDATE movie_sessions SET seats_available = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(session_id)
            .bind(current)
            .execute(&mut *tx)
            .await?;
            warn!(
                "postgres: session {} counter rewritten {} -> {}",
                session_id, previous, current
            );
        }

        tx.commit().await?;
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
        let mut tx = self.db.pool.begin().await?;
        let previous = sqlx::query_scalar::<_, i32>(
            "SELECT seats_available FROM movie_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CinemaError::not_found(Entity::Session, session_id))?;

        sqlx::query("UPDATE movie_sessions SET seats_available = $2, updated_at = NOW() WHERE id = $1")
            .bind(session_id)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(previous)
    }
}

#[async_trait]
impl SeedStore for PgStore {
    async fn load_seed(&self, seed: &SeedData) -> CinemaResult<Option<SeedReport>> {
        seed.validate()?;
        let mut tx = self.db.pool.begin().await?;

        // Несколько инстансов стартуют одновременно: засевает только первый
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SEED_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let populated = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM movies) OR EXISTS (SELECT 1 FROM cinema_halls)",
        )
        .fetch_one(&mut *tx)
        .await?;
        if populated {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut report = SeedReport::default();
        for movie in &seed.movies {
            let movie_id =
                sqlx::query_scalar::<_, i64>("INSERT INTO movies (name) VALUES ($1) RETURNING id")
                    .bind(&movie.name)
                    .fetch_one(&mut *tx)
                    .await?;
            report.movies += 1;

            for price in &movie.prices {
                sqlx::query(
                    "INSERT INTO prices (movie_id, seat_type, price_in_cents, active)
                     VALUES ($1, $2, $3, TRUE)",
                )
                .bind(movie_id)
                .bind(price.seat_type)
                .bind(price.price_in_cents)
                .execute(&mut *tx)
                .await?;
                report.prices += 1;
            }
        }

        for hall in &seed.halls {
            let hall_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO cinema_halls (name) VALUES ($1) RETURNING id",
            )
            .bind(&hall.name)
            .fetch_one(&mut *tx)
            .await?;
            report.halls += 1;

            for seat in &hall.seats {
                sqlx::query("INSERT INTO cinema_hall_seats (name, type, hall_id) VALUES ($1, $2, $3)")
                    .bind(&seat.label)
                    .bind(seat.seat_type)
                    .bind(hall_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e, SEAT_NAME_CONSTRAINT) {
                            CinemaError::validation(format!(
                                "seat '{}' already exists in hall '{}'",
                                seat.label, hall.name
                            ))
                        } else {
                            e.into()
                        }
                    })?;
                report.seats += 1;
            }
        }

        tx.commit().await?;
        debug!("postgres: seeded {:?}", report);
        Ok(Some(report))
    }
}
