//! Redis-backed per-user cache adapter.
//!
//! Layout, per user:
//! - `user:{id}:coins` — integer balance, incremented in place
//! - `user:{id}:cards` — hash of card id to JSON payload
//! - `user:{id}:receipts` — set of global-present definition ids
//! - `session:{session_id}` — JSON session, expiring at the session expiry
//!
//! Collection entries pair with a `:seeded` marker so an empty collection
//! is distinguishable from an absent one. Conditional writes go through a
//! small Lua guard (coins) or a marker check, so a write to an evicted
//! entry reports `false` instead of inventing state.

use async_trait::async_trait;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::{self, AsyncCommands};
use bb8_redis::RedisConnectionManager;

use crate::domain::model::{Session, UserCard};
use crate::domain::ports::{CacheError, UserCache};

/// Adds to a counter only when it already exists.
const GUARDED_INCR: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
  redis.call('INCRBY', KEYS[1], ARGV[1])
  return 1
else
  return 0
end";

fn coins_key(user_id: i64) -> String {
    format!("user:{user_id}:coins")
}

fn cards_key(user_id: i64) -> String {
    format!("user:{user_id}:cards")
}

fn receipts_key(user_id: i64) -> String {
    format!("user:{user_id}:receipts")
}

fn seeded_key(base: &str) -> String {
    format!("{base}:seeded")
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// The bundled redis client is built without the `script` feature, so the
/// coin guard is issued as a raw `EVAL`.
fn guarded_incr(key: String, delta: i64) -> redis::Cmd {
    let mut cmd = redis::cmd("EVAL");
    cmd.arg(GUARDED_INCR).arg(1).arg(key).arg(delta);
    cmd
}

fn map_pool_error(error: bb8_redis::bb8::RunError<redis::RedisError>) -> CacheError {
    CacheError::connection(error.to_string())
}

fn map_redis_error(error: redis::RedisError) -> CacheError {
    CacheError::command(error.to_string())
}

fn map_codec_error(error: serde_json::Error) -> CacheError {
    CacheError::codec(error.to_string())
}

/// Redis-backed implementation of the per-user cache port.
#[derive(Clone)]
pub struct RedisUserCache {
    pool: Pool<RedisConnectionManager>,
}

impl RedisUserCache {
    /// Connect a pooled client to the given Redis URL.
    pub async fn connect(redis_url: &str, max_size: u32) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|err| CacheError::connection(err.to_string()))?;
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .await
            .map_err(|err| CacheError::connection(err.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn coins(&self, user_id: i64) -> Result<Option<i64>, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.get(coins_key(user_id)).await.map_err(map_redis_error)
    }

    async fn seed_coins(&self, user_id: i64, coins: i64) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.set(coins_key(user_id), coins)
            .await
            .map_err(map_redis_error)
    }

    async fn add_coins(&self, user_id: i64, delta: i64) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let applied: i64 = guarded_incr(coins_key(user_id), delta)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(applied == 1)
    }

    async fn cards(&self, user_id: i64) -> Result<Option<Vec<UserCard>>, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = cards_key(user_id);
        let seeded: bool = conn
            .exists(seeded_key(&key))
            .await
            .map_err(map_redis_error)?;
        if !seeded {
            return Ok(None);
        }
        let fields: std::collections::HashMap<String, String> =
            conn.hgetall(&key).await.map_err(map_redis_error)?;
        let mut cards = fields
            .into_values()
            .map(|payload| serde_json::from_str(&payload).map_err(map_codec_error))
            .collect::<Result<Vec<UserCard>, _>>()?;
        cards.sort_by_key(|card| card.id);
        Ok(Some(cards))
    }

    async fn seed_cards(&self, user_id: i64, cards: &[UserCard]) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = cards_key(user_id);
        let mut fields = Vec::with_capacity(cards.len());
        for card in cards {
            fields.push((
                card.id.to_string(),
                serde_json::to_string(card).map_err(map_codec_error)?,
            ));
        }
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(&key, &fields).ignore();
        }
        pipe.set(seeded_key(&key), 1).ignore();
        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(map_redis_error)
    }

    async fn put_card(&self, card: &UserCard) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = cards_key(card.user_id);
        let seeded: bool = conn
            .exists(seeded_key(&key))
            .await
            .map_err(map_redis_error)?;
        if !seeded {
            return Ok(false);
        }
        let payload = serde_json::to_string(card).map_err(map_codec_error)?;
        let _: () = conn
            .hset(&key, card.id.to_string(), payload)
            .await
            .map_err(map_redis_error)?;
        Ok(true)
    }

    async fn receipts(&self, user_id: i64) -> Result<Option<Vec<i64>>, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = receipts_key(user_id);
        let seeded: bool = conn
            .exists(seeded_key(&key))
            .await
            .map_err(map_redis_error)?;
        if !seeded {
            return Ok(None);
        }
        let ids: Vec<i64> = conn.smembers(&key).await.map_err(map_redis_error)?;
        Ok(Some(ids))
    }

    async fn seed_receipts(&self, user_id: i64, ids: &[i64]) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = receipts_key(user_id);
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if !ids.is_empty() {
            pipe.sadd(&key, ids).ignore();
        }
        pipe.set(seeded_key(&key), 1).ignore();
        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(map_redis_error)
    }

    async fn add_receipt(
        &self,
        user_id: i64,
        global_present_id: i64,
    ) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = receipts_key(user_id);
        let seeded: bool = conn
            .exists(seeded_key(&key))
            .await
            .map_err(map_redis_error)?;
        if !seeded {
            return Ok(false);
        }
        let _: () = conn
            .sadd(&key, global_present_id)
            .await
            .map_err(map_redis_error)?;
        Ok(true)
    }

    async fn session(&self, session_id: &str) -> Result<Option<Session>, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let payload: Option<String> = conn
            .get(session_key(session_id))
            .await
            .map_err(map_redis_error)?;
        payload
            .map(|payload| serde_json::from_str(&payload).map_err(map_codec_error))
            .transpose()
    }

    async fn put_session(&self, session: &Session) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let payload = serde_json::to_string(session).map_err(map_codec_error)?;
        redis::pipe()
            .atomic()
            .set(session_key(&session.session_id), payload)
            .ignore()
            .expire_at(session_key(&session.session_id), session.expires_at)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(map_redis_error)
    }

    async fn remove_session(&self, session_id: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.del(session_key(session_id))
            .await
            .map_err(map_redis_error)
    }
}
