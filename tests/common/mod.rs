#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use cinema_booking::cache::CacheService;
use cinema_booking::config::Config;
use cinema_booking::models::{CinemaHall, Movie, NewPrice, NewSeat, Price, Seat, SeatType, Session};
use cinema_booking::store::{CatalogStore, CinemaStore, HallLayoutStore, MemoryStore};
use cinema_booking::AppState;

/// Фильм с ценами base/vip и зал из двух мест: s1 (base) и s2 (vip).
pub struct Cinema {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub movie: Movie,
    pub hall: CinemaHall,
    pub base_seat: Seat,
    pub vip_seat: Seat,
    pub base_price: Price,
    pub vip_price: Price,
}

/// Фиксированный "завтрашний" день, далеко в будущем относительно реальных часов.
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 6, 1, 0, 0, 0).unwrap() + Duration::hours(i64::from(hour))
}

pub fn state_for(store: Arc<MemoryStore>) -> Arc<AppState> {
    let dyn_store: Arc<dyn CinemaStore> = store;
    AppState::with_store(dyn_store, CacheService::disabled(), Config::in_memory())
}

pub async fn price(store: &MemoryStore, movie_id: i64, seat_type: SeatType, cents: i64) -> Price {
    store
        .insert_price(NewPrice {
            movie_id,
            seat_type,
            price_in_cents: cents,
            active: true,
        })
        .await
        .unwrap()
}

pub async fn hall_with_seats(store: &MemoryStore, name: &str, seats: &[(&str, SeatType)]) -> (CinemaHall, Vec<Seat>) {
    let hall = store.insert_hall(name).await.unwrap();
    let mut created = Vec::with_capacity(seats.len());
    for (label, seat_type) in seats {
        let seat = store
            .insert_seat(NewSeat {
                hall_id: hall.id,
                seat_type: *seat_type,
                label: label.to_string(),
            })
            .await
            .unwrap();
        created.push(seat);
    }
    (hall, created)
}

/// Зал на `n` мест одного базового типа: R1, R2, ...
pub async fn big_hall(store: &MemoryStore, name: &str, n: usize) -> (CinemaHall, Vec<Seat>) {
    let labels: Vec<String> = (1..=n).map(|i| format!("R{:03}", i)).collect();
    let seats: Vec<(&str, SeatType)> = labels.iter().map(|l| (l.as_str(), SeatType::Base)).collect();
    hall_with_seats(store, name, &seats).await
}

pub async fn cinema() -> Cinema {
    let store = Arc::new(MemoryStore::new());
    let movie = store.insert_movie("Stalker").await.unwrap();
    let base_price = price(&store, movie.id, SeatType::Base, 1000).await;
    let vip_price = price(&store, movie.id, SeatType::Vip, 1500).await;
    let (hall, seats) =
        hall_with_seats(&store, "Red Hall", &[("s1", SeatType::Base), ("s2", SeatType::Vip)]).await;

    Cinema {
        state: state_for(store.clone()),
        store,
        movie,
        hall,
        base_seat: seats[0].clone(),
        vip_seat: seats[1].clone(),
        base_price,
        vip_price,
    }
}

impl Cinema {
    /// Сеанс основного фильма в основном зале, часы от начала тестового дня.
    pub async fn session(&self, from: u32, to: u32) -> Session {
        self.state
            .scheduler
            .create_session(self.movie.id, self.hall.id, at(from), at(to))
            .await
            .unwrap()
    }

    pub async fn seats_available(&self, session_id: i64) -> i32 {
        self.state.availability.seats_available(session_id).await.unwrap()
    }
}
