//! Кеш проекций для чтения поверх Redis.
//!
//! Кеш никогда не является источником истины: промах или ошибка Redis просто
//! ведут в хранилище. Без `REDIS_URL` сервис работает в выключенном режиме.
//!
//! У каждого ключа есть счетчик поколения `<key>:gen`. Инвалидация увеличивает
//! его и удаляет запись; заполнение после промаха снимает поколение до чтения
//! из хранилища и пишет запись только если поколение не сдвинулось. Так
//! медленный читатель не может положить в кеш карту, устаревшую относительно
//! уже прошедшей инвалидации.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::RedisConfig;
use crate::redis_client::RedisClient;

pub mod seats;
pub mod sessions;

// SET только при совпадении поколения, атомарно относительно INCR в инвалидации
const SET_IF_GENERATION: &str = r#"
    local current = redis.call('GET', KEYS[2]) or '0'
    if current == ARGV[1] then
        redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
        return 1
    end
    return 0
"#;

/// Поколение ключа, снятое до чтения из хранилища.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation(String);

fn generation_key(key: &str) -> String {
    format!("{}:gen", key)
}

#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    seat_map_ttl: u64,
    sessions_ttl: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, config: &RedisConfig) -> Self {
        Self {
            redis: Some(redis),
            seat_map_ttl: config.seat_map_ttl_seconds,
            sessions_ttl: config.sessions_ttl_seconds,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            seat_map_ttl: 0,
            sessions_ttl: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let data: Option<String> = match conn.get(key).await {
            Ok(data) => data,
            Err(e) => {
                warn!("cache get {} failed: {:?}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&data?) {
            Ok(value) => Some(value),
            Err(e) => {
                // Битую запись просто игнорируем, ее перезапишут
                warn!("cache entry {} is not valid JSON: {:?}", key, e);
                None
            }
        }
    }

    /// `None` при выключенном кеше или ошибке Redis: тогда заполнять нечего.
    async fn generation(&self, key: &str) -> Option<Generation> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let key = generation_key(key);
        let value: Option<String> = match conn.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("cache get {} failed: {:?}", key, e);
                return None;
            }
        };
        Some(Generation(value.unwrap_or_else(|| "0".to_string())))
    }

    async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
        generation: &Generation,
    ) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        if ttl_seconds == 0 {
            return;
        }
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!("cache serialize {} failed: {:?}", key, e);
                return;
            }
        };
        let script = redis::Script::new(SET_IF_GENERATION);
        let mut conn = redis.conn.clone();
        let result: Result<i32, _> = script
            .key(key)
            .key(generation_key(key))
            .arg(&generation.0)
            .arg(data)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await;
        match result {
            Ok(1) => {}
            Ok(_) => debug!("cache fill {} skipped: invalidated meanwhile", key),
            Err(e) => warn!("cache set {} failed: {:?}", key, e),
        }
    }

    async fn invalidate(&self, keys: &[String]) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        if keys.is_empty() {
            return;
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.incr(generation_key(key), 1).ignore();
        }
        pipe.del(keys.to_vec()).ignore();

        let mut conn = redis.conn.clone();
        let result: Result<(), _> = pipe.query_async(&mut conn).await;
        match result {
            Ok(()) => debug!("cache invalidated {:?}", keys),
            Err(e) => warn!("cache invalidate {:?} failed: {:?}", keys, e),
        }
    }
}
