pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod seed;
pub mod services;
pub mod store;

use std::sync::Arc;
use tracing::info;

use crate::cache::CacheService;
use crate::config::{Config, StorageBackend};
use crate::services::{AvailabilityIndex, BookingEngine, PricingResolver, SessionScheduler};
use crate::store::{CinemaStore, MemoryStore, PgStore};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CinemaStore>,
    pub scheduler: SessionScheduler,
    pub pricing: PricingResolver,
    pub engine: BookingEngine,
    pub availability: AvailabilityIndex,
    pub cache: CacheService,
    pub config: Config,
}

impl AppState {
    /// Поднимает хранилище и кеш согласно конфигурации.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn CinemaStore> = match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Postgres => {
                let url = config
                    .database
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not configured"))?;
                let db = database::Database::new(url, config.database.pool_size).await?;
                info!("Database connected");
                db.run_migrations().await?;
                Arc::new(PgStore::new(db))
            }
        };

        let cache = match config.redis.url.as_deref() {
            Some(url) => {
                let redis = redis_client::RedisClient::new(url).await?;
                info!("Redis connected");
                CacheService::new(redis, &config.redis)
            }
            None => {
                info!("REDIS_URL not set, read cache disabled");
                CacheService::disabled()
            }
        };

        Ok(Self::with_store(store, cache, config))
    }

    /// Собирает сервисы поверх готового хранилища.
    pub fn with_store(store: Arc<dyn CinemaStore>, cache: CacheService, config: Config) -> Arc<Self> {
        let scheduler = SessionScheduler::new(store.clone());
        let pricing = PricingResolver::new(store.clone());
        let engine = BookingEngine::new(store.clone(), scheduler.clone(), pricing.clone());
        let availability = AvailabilityIndex::new(store.clone(), scheduler.clone());

        Arc::new(Self {
            store,
            scheduler,
            pricing,
            engine,
            availability,
            cache,
            config,
        })
    }
}
