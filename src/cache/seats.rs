use crate::cache::{CacheService, Generation};
use crate::services::SeatMap;

pub(crate) fn seat_map_key(session_id: i64) -> String {
    format!("seatmap:{}", session_id)
}

impl CacheService {
    pub async fn get_seat_map(&self, session_id: i64) -> Option<SeatMap> {
        self.get_json(&seat_map_key(session_id)).await
    }

    /// Снимается до чтения карты из хранилища и передается в `save_seat_map`.
    pub async fn seat_map_generation(&self, session_id: i64) -> Option<Generation> {
        self.generation(&seat_map_key(session_id)).await
    }

    /// Ничего не пишет, если после `generation` сеанс успели инвалидировать.
    pub async fn save_seat_map(&self, seat_map: &SeatMap, generation: &Generation) {
        self.set_json(
            &seat_map_key(seat_map.session_id),
            seat_map,
            self.seat_map_ttl,
            generation,
        )
        .await
    }

    /// Сбрасывает все, что зависит от броней сеанса: карту мест и список
    /// ближайших сеансов (в нем лежит счетчик свободных мест).
    pub async fn invalidate_session(&self, session_id: i64) {
        self.invalidate(&[seat_map_key(session_id), super::sessions::UPCOMING_KEY.to_string()])
            .await
    }
}
