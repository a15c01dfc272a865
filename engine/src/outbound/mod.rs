//! Outbound adapters: PostgreSQL persistence and the Redis per-user cache.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::domain::ports::{MasterStore, UserCache, UserStore};
use crate::domain::{Error, GameEngine};

pub mod cache;
pub mod persistence;

use cache::RedisUserCache;
use persistence::{DbPool, DieselMasterStore, DieselUserStore, PoolConfig};

/// Build a fully-wired engine from configuration: one store per shard, the
/// master store, and the Redis cache. Loads the initial master snapshot
/// before returning; an empty master database is not an error.
pub async fn build_engine(config: Config) -> Result<GameEngine, Error> {
    let mut shards: Vec<Arc<dyn UserStore>> = Vec::with_capacity(config.shard_count());
    for url in &config.shard_urls {
        let pool = DbPool::new(
            PoolConfig::new(url)
                .with_max_size(config.max_pool_size)
                .with_connection_timeout(config.connection_timeout),
        )
        .await?;
        shards.push(Arc::new(DieselUserStore::new(pool)));
    }

    let master_pool = DbPool::new(
        PoolConfig::new(&config.master_url)
            .with_max_size(config.max_pool_size)
            .with_connection_timeout(config.connection_timeout),
    )
    .await?;
    let master_store: Arc<dyn MasterStore> = Arc::new(DieselMasterStore::new(master_pool));

    let user_cache: Arc<dyn UserCache> =
        Arc::new(RedisUserCache::connect(&config.redis_url, config.max_pool_size).await?);

    info!(shards = config.shard_count(), "engine adapters connected");
    let engine = GameEngine::new(config, master_store, shards, user_cache);
    engine.refresh_masters().await?;
    Ok(engine)
}
