//! PostgreSQL-backed master-data store adapter.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::AsyncConnection as _;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::master_cache::MasterBundle;
use crate::domain::ports::{MasterStore, StoreError};

use super::models::{
    GachaItemRow, GachaRow, GlobalPresentRow, ItemDefinitionRow, LoginBonusRewardRow,
    LoginBonusRow, VersionRow,
};
use super::pool::DbPool;
use super::schema::{
    gacha_definitions, gacha_item_definitions, global_present_definitions, item_definitions,
    login_bonus_definitions, login_bonus_reward_definitions, version,
};

/// Diesel-backed implementation of the master-data store port.
#[derive(Clone)]
pub struct DieselMasterStore {
    pool: DbPool,
}

impl DieselMasterStore {
    /// Create a store over the master-database pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> StoreError {
    let message = error.to_string();
    debug!(%message, "master data read failed");
    StoreError::query(message)
}

#[async_trait]
impl MasterStore for DieselMasterStore {
    async fn load(&self) -> Result<Option<MasterBundle>, StoreError> {
        let mut conn = self.pool.get().await?;

        // Read everything in one transaction so the bundle is a consistent
        // view across all master tables.
        let rows = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let active: Option<VersionRow> = version::table
                        .filter(version::is_active.eq(true))
                        .select(VersionRow::as_select())
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(active) = active else {
                        return Ok(None);
                    };

                    let gachas: Vec<GachaRow> = gacha_definitions::table
                        .select(GachaRow::as_select())
                        .load(conn)
                        .await?;
                    let gacha_items: Vec<GachaItemRow> = gacha_item_definitions::table
                        .select(GachaItemRow::as_select())
                        .load(conn)
                        .await?;
                    let items: Vec<ItemDefinitionRow> = item_definitions::table
                        .select(ItemDefinitionRow::as_select())
                        .load(conn)
                        .await?;
                    let bonuses: Vec<LoginBonusRow> = login_bonus_definitions::table
                        .select(LoginBonusRow::as_select())
                        .load(conn)
                        .await?;
                    let rewards: Vec<LoginBonusRewardRow> = login_bonus_reward_definitions::table
                        .select(LoginBonusRewardRow::as_select())
                        .load(conn)
                        .await?;
                    let presents: Vec<GlobalPresentRow> = global_present_definitions::table
                        .select(GlobalPresentRow::as_select())
                        .load(conn)
                        .await?;

                    Ok(Some((
                        active, gachas, gacha_items, items, bonuses, rewards, presents,
                    )))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        let Some((active, gachas, gacha_items, items, bonuses, rewards, presents)) = rows else {
            return Ok(None);
        };

        let bundle = MasterBundle {
            version: Some(active.into_domain()),
            gachas: gachas.into_iter().map(GachaRow::into_domain).collect(),
            gacha_items: gacha_items
                .into_iter()
                .map(GachaItemRow::into_domain)
                .collect::<Result<_, _>>()?,
            items: items
                .into_iter()
                .map(ItemDefinitionRow::into_domain)
                .collect::<Result<_, _>>()?,
            login_bonuses: bonuses.into_iter().map(LoginBonusRow::into_domain).collect(),
            login_bonus_rewards: rewards
                .into_iter()
                .map(LoginBonusRewardRow::into_domain)
                .collect::<Result<_, _>>()?,
            global_presents: presents
                .into_iter()
                .map(GlobalPresentRow::into_domain)
                .collect::<Result<_, _>>()?,
        };
        Ok(Some(bundle))
    }
}
