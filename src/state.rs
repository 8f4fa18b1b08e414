use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use sqlx::PgPool;

use crate::{auth::Actor, config::AppConfig, db};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub actor_cache: Cache<i64, Actor>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = db::build_pool(&config)?;
        Ok(Self::with_pool(config, db_pool))
    }

    pub fn with_pool(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let actor_cache = Cache::builder()
            .max_capacity(config.actor_cache_max_entries)
            .time_to_live(Duration::from_secs(config.actor_cache_ttl_seconds.max(1)))
            .build();
        Self {
            config: Arc::new(config),
            db_pool,
            actor_cache,
        }
    }
}
