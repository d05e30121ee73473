use chrono::{DateTime, Utc};

use crate::cache::{CacheService, Generation};
use crate::models::UpcomingSession;

pub(crate) const UPCOMING_KEY: &str = "sessions:upcoming";

impl CacheService {
    /// Список ближайших сеансов. Запись могла быть сделана до `now`, поэтому
    /// уже начавшиеся сеансы отфильтровываются при чтении.
    pub async fn get_upcoming(&self, now: DateTime<Utc>) -> Option<Vec<UpcomingSession>> {
        let cached: Vec<UpcomingSession> = self.get_json(UPCOMING_KEY).await?;
        Some(cached.into_iter().filter(|s| s.session.starts_at > now).collect())
    }

    pub async fn upcoming_generation(&self) -> Option<Generation> {
        self.generation(UPCOMING_KEY).await
    }

    pub async fn save_upcoming(&self, sessions: &[UpcomingSession], generation: &Generation) {
        self.set_json(UPCOMING_KEY, &sessions, self.sessions_ttl, generation)
            .await
    }

    pub async fn invalidate_upcoming(&self) {
        self.invalidate(&[UPCOMING_KEY.to_string()]).await
    }
}
