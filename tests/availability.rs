mod common;

use cinema_booking::error::{CinemaError, Entity};
use cinema_booking::services::{MaintenanceService, SeatState, SweepStats};
use cinema_booking::store::BookingStore;

use common::cinema;

#[tokio::test]
async fn seat_map_marks_booked_seats() {
    let c = cinema().await;
    let session = c.session(18, 20).await;
    let booking = c.state.engine.book(session.id, c.vip_seat.id).await.unwrap();

    let map = c.state.availability.seat_map(session.id).await.unwrap();
    assert_eq!(map.session_id, session.id);
    assert_eq!(map.hall_id, c.hall.id);
    assert_eq!(map.seats.len(), 2);

    let labels: Vec<&str> = map.seats.iter().map(|e| e.seat.label.as_str()).collect();
    assert_eq!(labels, vec!["s1", "s2"]);
    assert_eq!(map.seats[0].state, SeatState::Free);
    assert_eq!(map.seats[1].state, SeatState::Booked { booking_id: booking.id });
    assert_eq!(map.free_count(), 1);
    assert_eq!(map.free_count() as i32, c.seats_available(session.id).await);

    // Отмененная бронь освобождает место на карте
    c.state.engine.cancel(booking.id).await.unwrap();
    let map = c.state.availability.seat_map(session.id).await.unwrap();
    assert_eq!(map.free_count(), 2);
}

#[tokio::test]
async fn seat_map_serializes_flat() {
    let c = cinema().await;
    let session = c.session(18, 20).await;
    c.state.engine.book(session.id, c.base_seat.id).await.unwrap();

    let map = c.state.availability.seat_map(session.id).await.unwrap();
    let json = serde_json::to_value(&map).unwrap();
    let first = &json["seats"][0];
    assert_eq!(first["label"], "s1");
    assert_eq!(first["seat_type"], "base");
    assert_eq!(first["state"], "booked");
    assert!(first["booking_id"].is_i64());
    assert_eq!(json["seats"][1]["state"], "free");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let c = cinema().await;
    let err = c.state.availability.seats_available(5).await.unwrap_err();
    assert!(matches!(err, CinemaError::NotFound { entity: Entity::Session, id: 5 }));
    let err = c.state.availability.seat_map(5).await.unwrap_err();
    assert!(matches!(err, CinemaError::NotFound { entity: Entity::Session, .. }));
}

#[tokio::test]
async fn verify_detects_drift_and_reconcile_repairs_it() {
    let c = cinema().await;
    let session = c.session(18, 20).await;
    c.state.engine.book(session.id, c.base_seat.id).await.unwrap();

    let snapshot = c.state.availability.verify(session.id).await.unwrap();
    assert_eq!(snapshot.stored, 1);
    assert_eq!(snapshot.hall_seats, 2);
    assert_eq!(snapshot.active_bookings, 1);

    // Ручная правка данных в обход броней
    let previous = c.store.overwrite_seats_available(session.id, 2).await.unwrap();
    assert_eq!(previous, 1);

    let err = c.state.availability.verify(session.id).await.unwrap_err();
    assert!(matches!(
        err,
        CinemaError::Inconsistency { stored: 2, expected: 1, .. }
    ));
    assert_eq!(err.kind(), "inconsistency");

    let report = c.state.engine.reconcile(session.id).await.unwrap();
    assert!(report.drifted());
    assert_eq!((report.previous, report.current), (2, 1));
    assert_eq!(c.seats_available(session.id).await, 1);
    c.state.availability.verify(session.id).await.unwrap();

    // Повторный reconcile ничего не меняет
    let again = c.state.engine.reconcile(session.id).await.unwrap();
    assert!(!again.drifted());
    assert_eq!(again.current, 1);
}

#[tokio::test]
async fn reconcile_restores_bookability_after_counter_loss() {
    let c = cinema().await;
    let session = c.session(18, 20).await;
    c.store.overwrite_seats_available(session.id, 0).await.unwrap();

    let err = c.state.engine.book(session.id, c.base_seat.id).await.unwrap_err();
    assert_eq!(err.kind(), "sold_out");

    c.state.engine.reconcile(session.id).await.unwrap();
    c.state.engine.book(session.id, c.base_seat.id).await.unwrap();
    assert_eq!(c.seats_available(session.id).await, 1);
}

#[tokio::test]
async fn maintenance_sweep_repairs_drifted_sessions() {
    let c = cinema().await;
    let clean = c.session(10, 12).await;
    let drifted = c.session(18, 20).await;
    c.state.engine.book(clean.id, c.base_seat.id).await.unwrap();
    c.store.overwrite_seats_available(drifted.id, 9).await.unwrap();

    let maintenance = MaintenanceService::new(c.state.clone());
    let stats = maintenance.run_reconciliation_sweep().await;
    assert_eq!(
        stats,
        SweepStats {
            checked: 2,
            drifted: 1,
            repaired: 1,
            failed: 0,
        }
    );
    assert!(!stats.is_clean());
    assert_eq!(c.seats_available(drifted.id).await, 2);
    assert_eq!(c.seats_available(clean.id).await, 1);

    let stats = maintenance.run_reconciliation_sweep().await;
    assert!(stats.is_clean());
    assert_eq!(stats.checked, 2);
}
