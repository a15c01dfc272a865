//! Per-user cache layer.
//!
//! Reads are cache-aside: hit the cache, on a miss take a per-key
//! population lock, re-check the cache, then load from the owning shard and
//! seed. The lock collapses a stampede of concurrent misses for the same
//! key into one shard read. Writers update the store first and only then
//! the cache, so a crash between the two leaves a stale-but-reseedable
//! entry, never an entry the store has not seen.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::error::Error;
use super::model::{Session, UserCard};
use super::ports::{UserCache, UserStore};
use super::shard::ShardRouter;

/// Cache slot a population lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Coins,
    Cards,
    Receipts,
}

/// Cache-aside access to per-user state.
pub struct UserCacheLayer {
    cache: Arc<dyn UserCache>,
    shards: ShardRouter<Arc<dyn UserStore>>,
    inflight: StdMutex<HashMap<(i64, Slot), Arc<AsyncMutex<()>>>>,
}

impl UserCacheLayer {
    pub fn new(cache: Arc<dyn UserCache>, shards: ShardRouter<Arc<dyn UserStore>>) -> Self {
        Self {
            cache,
            shards,
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    /// The shard owning `user_id`.
    pub fn shard_for(&self, user_id: i64) -> &Arc<dyn UserStore> {
        self.shards.shard_for(user_id)
    }

    /// All shards, in configuration order.
    pub fn shards(&self) -> &ShardRouter<Arc<dyn UserStore>> {
        &self.shards
    }

    fn population_lock(&self, user_id: i64, slot: Slot) -> Arc<AsyncMutex<()>> {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(inflight.entry((user_id, slot)).or_default())
    }

    fn release_population_lock(&self, user_id: i64, slot: Slot) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if inflight
            .get(&(user_id, slot))
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(&(user_id, slot));
        }
    }

    /// Cached currency balance, populated from the shard on a miss.
    pub async fn coins(&self, user_id: i64) -> Result<i64, Error> {
        if let Some(coins) = self.cache.coins(user_id).await? {
            return Ok(coins);
        }

        let lock = self.population_lock(user_id, Slot::Coins);
        let guard = lock.lock().await;
        let coins = match self.cache.coins(user_id).await? {
            Some(coins) => coins,
            None => {
                debug!(user_id, "populating coin balance from shard");
                let coins = self
                    .shard_for(user_id)
                    .coin_balance(user_id)
                    .await?
                    .ok_or(Error::UserNotFound(user_id))?;
                self.cache.seed_coins(user_id, coins).await?;
                coins
            }
        };
        drop(guard);
        self.release_population_lock(user_id, Slot::Coins);
        Ok(coins)
    }

    /// Cached card collection, populated from the shard on a miss.
    pub async fn cards(&self, user_id: i64) -> Result<Vec<UserCard>, Error> {
        if let Some(cards) = self.cache.cards(user_id).await? {
            return Ok(cards);
        }

        let lock = self.population_lock(user_id, Slot::Cards);
        let guard = lock.lock().await;
        let cards = match self.cache.cards(user_id).await? {
            Some(cards) => cards,
            None => {
                debug!(user_id, "populating card collection from shard");
                let cards = self.shard_for(user_id).cards(user_id).await?;
                self.cache.seed_cards(user_id, &cards).await?;
                cards
            }
        };
        drop(guard);
        self.release_population_lock(user_id, Slot::Cards);
        Ok(cards)
    }

    /// Cached global-present receipt set, populated from the shard on a
    /// miss.
    pub async fn receipts(&self, user_id: i64) -> Result<Vec<i64>, Error> {
        if let Some(receipts) = self.cache.receipts(user_id).await? {
            return Ok(receipts);
        }

        let lock = self.population_lock(user_id, Slot::Receipts);
        let guard = lock.lock().await;
        let receipts = match self.cache.receipts(user_id).await? {
            Some(receipts) => receipts,
            None => {
                debug!(user_id, "populating receipt set from shard");
                let receipts = self
                    .shard_for(user_id)
                    .receipt_definition_ids(user_id)
                    .await?;
                self.cache.seed_receipts(user_id, &receipts).await?;
                receipts
            }
        };
        drop(guard);
        self.release_population_lock(user_id, Slot::Receipts);
        Ok(receipts)
    }

    /// Apply a committed currency delta to the cached balance. A missing
    /// entry stays missing and reseeds from the store on the next read.
    pub async fn apply_coin_delta(&self, user_id: i64, delta: i64) -> Result<(), Error> {
        if delta != 0 {
            let _ = self.cache.add_coins(user_id, delta).await?;
        }
        Ok(())
    }

    /// Merge committed card rows into the cached collection.
    pub async fn put_cards(&self, cards: &[UserCard]) -> Result<(), Error> {
        for card in cards {
            let _ = self.cache.put_card(card).await?;
        }
        Ok(())
    }

    /// Record committed receipt identifiers.
    pub async fn add_receipts(&self, user_id: i64, ids: &[i64]) -> Result<(), Error> {
        for id in ids {
            let _ = self.cache.add_receipt(user_id, *id).await?;
        }
        Ok(())
    }

    /// Look up a session by identifier, falling back to the owning row in
    /// the store and re-caching it.
    pub async fn session(&self, session_id: &str) -> Result<Option<Session>, Error> {
        if let Some(session) = self.cache.session(session_id).await? {
            return Ok(Some(session));
        }
        // Session identifiers do not encode the shard, so walk them all.
        for shard in self.shards.shards() {
            if let Some(session) = shard.find_session(session_id).await? {
                if session.state.is_live() {
                    self.cache.put_session(&session).await?;
                    return Ok(Some(session));
                }
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Cache a freshly-committed session.
    pub async fn put_session(&self, session: &Session) -> Result<(), Error> {
        self.cache.put_session(session).await?;
        Ok(())
    }

    /// Drop a session from the cache.
    pub async fn remove_session(&self, session_id: &str) -> Result<(), Error> {
        self.cache.remove_session(session_id).await?;
        Ok(())
    }
}

impl std::fmt::Debug for UserCacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCacheLayer")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}
