//! Свойства счетчика свободных мест на случайных последовательностях
//! book / cancel / reconcile.

mod common;

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cinema_booking::error::{CinemaError, ConflictReason};
use cinema_booking::models::SeatType;
use cinema_booking::store::{BookingStore, CatalogStore, MemoryStore};

use common::{at, big_hall, price, state_for};

const SEATS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Book(usize),
    Cancel(usize),
    Reconcile,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..SEATS).prop_map(Op::Book),
        3 => (0..SEATS).prop_map(Op::Cancel),
        1 => Just(Op::Reconcile),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// seats_available == мест в зале - активных броней после любой операции,
    /// и активная бронь на место не больше одной.
    #[test]
    fn prop_counter_matches_active_bookings(ops in prop::collection::vec(arb_op(), 1..40)) {
        runtime().block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let movie = store.insert_movie("Mirror").await.unwrap();
            price(&store, movie.id, SeatType::Base, 700).await;
            let (hall, seats) = big_hall(&store, "Hall", SEATS).await;
            let state = state_for(store.clone());
            let session = state
                .scheduler
                .create_session(movie.id, hall.id, at(10), at(12))
                .await
                .unwrap();

            // Модель: место -> id активной брони; плюс все когда-либо выданные id
            let mut model: HashMap<usize, i64> = HashMap::new();
            let mut issued: HashSet<i64> = HashSet::new();

            for op in ops {
                match op {
                    Op::Book(i) => match state.engine.book(session.id, seats[i].id).await {
                        Ok(booking) => {
                            prop_assert!(!model.contains_key(&i));
                            prop_assert!(issued.insert(booking.id), "booking ids are never reused");
                            model.insert(i, booking.id);
                        }
                        Err(CinemaError::Conflict(ConflictReason::SeatTaken { .. })) => {
                            prop_assert!(model.contains_key(&i));
                        }
                        Err(CinemaError::Conflict(ConflictReason::SoldOut { .. })) => {
                            prop_assert_eq!(model.len(), SEATS);
                        }
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    },
                    Op::Cancel(i) => {
                        if let Some(booking_id) = model.remove(&i) {
                            let outcome = state.engine.cancel(booking_id).await.unwrap();
                            prop_assert!(outcome.changed());
                            let again = state.engine.cancel(booking_id).await.unwrap();
                            prop_assert!(!again.changed());
                        }
                    }
                    Op::Reconcile => {
                        let report = state.engine.reconcile(session.id).await.unwrap();
                        prop_assert!(!report.drifted());
                    }
                }

                let available = state.availability.seats_available(session.id).await.unwrap();
                prop_assert!(available >= 0);
                prop_assert_eq!(available as usize, SEATS - model.len());

                let active = store.active_bookings(session.id).await.unwrap();
                prop_assert_eq!(active.len(), model.len());
                let distinct: HashSet<i64> = active.iter().map(|b| b.seat_id).collect();
                prop_assert_eq!(distinct.len(), active.len());

                prop_assert!(state.availability.verify(session.id).await.is_ok());
            }
            Ok(())
        })?;
    }

    /// После любого ручного искажения счетчика reconcile возвращает его к
    /// живому пересчету.
    #[test]
    fn prop_reconcile_repairs_any_overwrite(
        booked in prop::collection::hash_set(0..SEATS, 0..=SEATS),
        garbage in 0i32..100,
    ) {
        runtime().block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let movie = store.insert_movie("Mirror").await.unwrap();
            price(&store, movie.id, SeatType::Base, 700).await;
            let (hall, seats) = big_hall(&store, "Hall", SEATS).await;
            let state = state_for(store.clone());
            let session = state
                .scheduler
                .create_session(movie.id, hall.id, at(10), at(12))
                .await
                .unwrap();

            for &i in &booked {
                state.engine.book(session.id, seats[i].id).await.unwrap();
            }
            let expected = (SEATS - booked.len()) as i32;

            let previous = store.overwrite_seats_available(session.id, garbage).await.unwrap();
            prop_assert_eq!(previous, expected);

            let report = state.engine.reconcile(session.id).await.unwrap();
            prop_assert_eq!(report.previous, garbage);
            prop_assert_eq!(report.current, expected);
            prop_assert_eq!(report.drifted(), garbage != expected);
            prop_assert!(state.availability.verify(session.id).await.is_ok());
            Ok(())
        })?;
    }
}
