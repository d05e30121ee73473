use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Тип места. Один и тот же enum используется и для цен, и для мест в зале,
/// чтобы набор значений не мог разъехаться.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "seat_type", rename_all = "snake_case")]
pub enum SeatType {
    #[default]
    Base,
    Vip,
    Couple,
    SuperVip,
}

impl SeatType {
    pub const ALL: [SeatType; 4] = [SeatType::Base, SeatType::Vip, SeatType::Couple, SeatType::SuperVip];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Base => "base",
            SeatType::Vip => "vip",
            SeatType::Couple => "couple",
            SeatType::SuperVip => "super_vip",
        }
    }
}

impl fmt::Display for SeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeatType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown seat type '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Price {
    pub id: i64,
    pub movie_id: i64,
    pub seat_type: SeatType,
    pub price_in_cents: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrice {
    pub movie_id: i64,
    pub seat_type: SeatType,
    pub price_in_cents: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
