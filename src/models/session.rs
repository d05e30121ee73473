use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Один сеанс фильма в зале. После создания меняется только `seats_available`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub movie_id: i64,
    pub hall_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub seats_available: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Пересечение полуинтервалов `[starts_at, ends_at)`: сеансы встык не конфликтуют.
    pub fn overlaps(&self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> bool {
        starts_at < self.ends_at && self.starts_at < ends_at
    }
}

/// Строка витрины: сеанс вместе с названиями фильма и зала.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingSession {
    #[serde(flatten)]
    pub session: Session,
    pub movie_name: String,
    pub hall_name: String,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub movie_id: i64,
    pub hall_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub seats_available: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, hour, 0, 0).unwrap()
    }

    fn session(from: u32, to: u32) -> Session {
        Session {
            id: 1,
            movie_id: 1,
            hall_id: 1,
            starts_at: at(from),
            ends_at: at(to),
            seats_available: 10,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn back_to_back_sessions_do_not_overlap() {
        let s = session(10, 12);
        assert!(!s.overlaps(at(12), at(14)));
        assert!(!s.overlaps(at(8), at(10)));
    }

    #[test]
    fn partial_and_nested_intervals_overlap() {
        let s = session(10, 12);
        assert!(s.overlaps(at(11), at(13)));
        assert!(s.overlaps(at(9), at(11)));
        assert!(s.overlaps(at(10), at(12)));
        assert!(s.overlaps(at(9), at(13)));
    }
}
