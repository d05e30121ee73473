use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SeatType;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CinemaHall {
    pub id: i64,
    pub name: String,
}

// В таблице cinema_hall_seats колонки называются name/type, в запросах алиасим
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub hall_id: i64,
    pub seat_type: SeatType,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSeat {
    pub hall_id: i64,
    #[serde(default)]
    pub seat_type: SeatType,
    pub label: String,
}
