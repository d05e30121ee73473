use config::{ConfigError, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub maintenance: MaintenanceConfig,
}

// Настройки приложения
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

// Где живут данные и чем их засеять при старте
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub seed_file: Option<PathBuf>,
}

// Настройки базы данных
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки Redis; без url кеш выключен
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_map_ttl_seconds: u64,
    pub sessions_ttl_seconds: u64,
}

// Фоновая сверка счетчиков; 0 - выключено
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub reconcile_interval_seconds: u64,
}

// Плоское представление переменных окружения, как их задают в .env
#[derive(Debug, Deserialize)]
struct EnvSettings {
    host: String,
    port: u16,
    environment: String,
    rust_log: String,
    log_format: LogFormat,
    storage_backend: StorageBackend,
    seed_file: Option<PathBuf>,
    database_url: Option<String>,
    db_pool_size: u32,
    redis_url: Option<String>,
    seat_map_cache_ttl_seconds: u64,
    sessions_cache_ttl_seconds: u64,
    reconcile_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// То же, что `from_env`, но из явного набора переменных.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(env: Environment) -> Result<Self, ConfigError> {
        let settings: EnvSettings = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("environment", "development")?
            .set_default("rust_log", "cinema_booking=debug,tower_http=debug")?
            .set_default("log_format", "plain")?
            .set_default("storage_backend", "postgres")?
            .set_default("db_pool_size", 20)?
            .set_default("seat_map_cache_ttl_seconds", 30)?
            .set_default("sessions_cache_ttl_seconds", 60)?
            .set_default("reconcile_interval_seconds", 300)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if settings.storage_backend == StorageBackend::Postgres && settings.database_url.is_none() {
            return Err(ConfigError::Message(
                "DATABASE_URL must be set when STORAGE_BACKEND=postgres".to_string(),
            ));
        }

        Ok(Config {
            app: AppConfig {
                host: settings.host,
                port: settings.port,
                environment: settings.environment,
                rust_log: settings.rust_log,
                log_format: settings.log_format,
            },
            storage: StorageConfig {
                backend: settings.storage_backend,
                seed_file: settings.seed_file,
            },
            database: DatabaseConfig {
                url: settings.database_url,
                pool_size: settings.db_pool_size,
            },
            redis: RedisConfig {
                url: settings.redis_url.filter(|url| !url.is_empty()),
                seat_map_ttl_seconds: settings.seat_map_cache_ttl_seconds,
                sessions_ttl_seconds: settings.sessions_cache_ttl_seconds,
            },
            maintenance: MaintenanceConfig {
                reconcile_interval_seconds: settings.reconcile_interval_seconds,
            },
        })
    }

    /// Конфигурация для тестов и локального запуска без внешних сервисов.
    pub fn in_memory() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "cinema_booking=debug".to_string(),
                log_format: LogFormat::Plain,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                seed_file: None,
            },
            database: DatabaseConfig {
                url: None,
                pool_size: 1,
            },
            redis: RedisConfig {
                url: None,
                seat_map_ttl_seconds: 0,
                sessions_ttl_seconds: 0,
            },
            maintenance: MaintenanceConfig {
                reconcile_interval_seconds: 0,
            },
        }
    }
}
