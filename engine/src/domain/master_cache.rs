//! In-process master-data cache.
//!
//! The whole master-data set is held as one immutable snapshot behind a
//! read-write lock. Readers clone the `Arc` and query a consistent view
//! for the rest of their request; refresh builds a complete replacement
//! snapshot off to the side and swaps it in atomically, so a request never
//! observes a half-updated data set.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::error::Error;
use super::lottery::GachaPool;
use super::master::{
    CardStats, GachaDefinition, GachaItemDefinition, GlobalPresentDefinition, ItemDefinition,
    LoginBonusDefinition, LoginBonusRewardDefinition, MasterVersion,
};

/// Raw master rows as loaded from the master store in one read.
#[derive(Debug, Clone, Default)]
pub struct MasterBundle {
    pub version: Option<MasterVersion>,
    pub gachas: Vec<GachaDefinition>,
    pub gacha_items: Vec<GachaItemDefinition>,
    pub items: Vec<ItemDefinition>,
    pub login_bonuses: Vec<LoginBonusDefinition>,
    pub login_bonus_rewards: Vec<LoginBonusRewardDefinition>,
    pub global_presents: Vec<GlobalPresentDefinition>,
}

/// One immutable, internally-indexed view of the master data.
#[derive(Debug, Default)]
pub struct MasterSnapshot {
    version: String,
    gachas: Vec<GachaDefinition>,
    pools: HashMap<i64, GachaPool>,
    items: HashMap<i64, ItemDefinition>,
    login_bonuses: Vec<LoginBonusDefinition>,
    rewards: HashMap<(i64, i32), LoginBonusRewardDefinition>,
    global_presents: Vec<GlobalPresentDefinition>,
}

impl MasterSnapshot {
    fn build(bundle: MasterBundle) -> Self {
        let mut gachas = bundle.gachas;
        gachas.sort_by_key(|gacha| (gacha.display_order, gacha.id));

        let mut grouped: HashMap<i64, Vec<GachaItemDefinition>> = HashMap::new();
        for item in bundle.gacha_items {
            grouped.entry(item.gacha_id).or_default().push(item);
        }
        // Every gacha gets a pool, possibly empty, with its total weight
        // summed here rather than per draw.
        for gacha in &gachas {
            grouped.entry(gacha.id).or_default();
        }
        let pools = grouped
            .into_iter()
            .map(|(gacha_id, mut entries)| {
                entries.sort_by_key(|item| item.id);
                (gacha_id, GachaPool::new(entries))
            })
            .collect();

        let items = bundle
            .items
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        let rewards = bundle
            .login_bonus_rewards
            .into_iter()
            .map(|reward| ((reward.login_bonus_id, reward.sequence), reward))
            .collect();

        Self {
            version: bundle
                .version
                .map(|version| version.version)
                .unwrap_or_default(),
            gachas,
            pools,
            items,
            login_bonuses: bundle.login_bonuses,
            rewards,
            global_presents: bundle.global_presents,
        }
    }

    /// The active master version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether a client-presented version matches the active one.
    pub fn is_current(&self, presented: &str) -> bool {
        !self.version.is_empty() && self.version == presented
    }

    /// Gachas open at `now`, in display order, each with its item pool.
    pub fn open_gachas(&self, now: i64) -> Vec<(&GachaDefinition, &GachaPool)> {
        self.gachas
            .iter()
            .filter(|gacha| gacha.is_open(now))
            .filter_map(|gacha| self.pools.get(&gacha.id).map(|pool| (gacha, pool)))
            .collect()
    }

    /// The gacha with `gacha_id` and its pool, provided it is open at `now`
    /// and its pool is non-empty.
    pub fn open_gacha(
        &self,
        gacha_id: i64,
        now: i64,
    ) -> Result<(&GachaDefinition, &GachaPool), Error> {
        let gacha = self
            .gachas
            .iter()
            .find(|gacha| gacha.id == gacha_id && gacha.is_open(now))
            .ok_or(Error::GachaNotFound(gacha_id))?;
        let pool = self
            .pools
            .get(&gacha_id)
            .filter(|pool| !pool.is_empty())
            .ok_or(Error::GachaNotFound(gacha_id))?;
        Ok((gacha, pool))
    }

    /// The item definition with `item_id`.
    pub fn item(&self, item_id: i64) -> Result<&ItemDefinition, Error> {
        self.items.get(&item_id).ok_or(Error::ItemNotFound(item_id))
    }

    /// Levelling stats of the card definition `item_id`.
    pub fn card_stats(&self, item_id: i64) -> Result<CardStats, Error> {
        self.item(item_id)?
            .card_stats()
            .ok_or(Error::ItemNotFound(item_id))
    }

    /// Login bonuses whose window contains `now`, minus the operator
    /// exclusion list.
    pub fn active_login_bonuses(&self, now: i64, excluded: &[i64]) -> Vec<&LoginBonusDefinition> {
        self.login_bonuses
            .iter()
            .filter(|bonus| bonus.is_open(now) && !excluded.contains(&bonus.id))
            .collect()
    }

    /// The reward granted at `(login_bonus_id, sequence)`.
    pub fn login_bonus_reward(
        &self,
        login_bonus_id: i64,
        sequence: i32,
    ) -> Result<&LoginBonusRewardDefinition, Error> {
        self.rewards
            .get(&(login_bonus_id, sequence))
            .ok_or(Error::RewardNotFound {
                bonus_id: login_bonus_id,
                sequence,
            })
    }

    /// Global presents whose window contains `now`.
    pub fn active_global_presents(&self, now: i64) -> Vec<&GlobalPresentDefinition> {
        self.global_presents
            .iter()
            .filter(|present| present.is_open(now))
            .collect()
    }
}

/// Shared, atomically-refreshable master snapshot.
#[derive(Debug, Default)]
pub struct MasterDataCache {
    current: RwLock<Arc<MasterSnapshot>>,
}

impl MasterDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A consistent view of the master data for the caller to hold across
    /// a request.
    pub fn snapshot(&self) -> Arc<MasterSnapshot> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Build a fresh snapshot from `bundle` and swap it in. Readers that
    /// already hold a snapshot keep their old view.
    pub fn install(&self, bundle: MasterBundle) {
        let next = Arc::new(MasterSnapshot::build(bundle));
        debug!(version = %next.version(), "installing master snapshot");
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next;
    }
}
