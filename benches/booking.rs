//! Горячий путь бронирования на хранилище в памяти.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use cinema_booking::cache::CacheService;
use cinema_booking::config::Config;
use cinema_booking::models::{NewPrice, NewSeat, Seat, SeatType, Session};
use cinema_booking::store::{CatalogStore, CinemaStore, HallLayoutStore, MemoryStore};
use cinema_booking::AppState;

async fn setup(seats: usize) -> (Arc<AppState>, Session, Vec<Seat>) {
    let store = Arc::new(MemoryStore::new());
    let movie = store.insert_movie("Bench").await.unwrap();
    store
        .insert_price(NewPrice {
            movie_id: movie.id,
            seat_type: SeatType::Base,
            price_in_cents: 1000,
            active: true,
        })
        .await
        .unwrap();

    let hall = store.insert_hall("Bench Hall").await.unwrap();
    let mut created = Vec::with_capacity(seats);
    for i in 0..seats {
        let seat = store
            .insert_seat(NewSeat {
                hall_id: hall.id,
                seat_type: SeatType::Base,
                label: format!("R{:04}", i),
            })
            .await
            .unwrap();
        created.push(seat);
    }

    let dyn_store: Arc<dyn CinemaStore> = store;
    let state = AppState::with_store(dyn_store, CacheService::disabled(), Config::in_memory());
    let starts_at = Utc.with_ymd_and_hms(2099, 1, 1, 18, 0, 0).unwrap();
    let session = state
        .scheduler
        .create_session(movie.id, hall.id, starts_at, starts_at + Duration::hours(2))
        .await
        .unwrap();
    (state, session, created)
}

fn bench_book_cancel(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("booking");

    for seats in [10usize, 500] {
        let (state, session, hall_seats) = rt.block_on(setup(seats));
        let seat_id = hall_seats[seats / 2].id;

        group.bench_with_input(BenchmarkId::new("book_then_cancel", seats), &seats, |b, _| {
            b.to_async(&rt).iter(|| async {
                let booking = state.engine.book(session.id, seat_id).await.unwrap();
                black_box(state.engine.cancel(booking.id).await.unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("seat_map", seats), &seats, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(state.availability.seat_map(session.id).await.unwrap()) })
        });

        group.bench_with_input(BenchmarkId::new("verify", seats), &seats, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(state.availability.verify(session.id).await.unwrap()) })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_book_cancel);
criterion_main!(benches);
