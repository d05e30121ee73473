use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SeatType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

/// Строка брони. Физически не удаляется: отмена только меняет статус.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub session_id: i64,
    pub price_id: i64,
    pub seat_id: i64,
    pub price_in_cents: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub session_id: i64,
    pub seat_id: i64,
    pub price_id: i64,
    pub price_in_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled(Booking),
    AlreadyCancelled(Booking),
}

impl CancelOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            CancelOutcome::Cancelled(b) | CancelOutcome::AlreadyCancelled(b) => b,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, CancelOutcome::Cancelled(_))
    }
}

/// Бронь вместе с тем, что нужно напечатать на билете: где и когда сидеть.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub movie_name: String,
    pub hall_name: String,
    pub seat_label: String,
    pub seat_type: SeatType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}
