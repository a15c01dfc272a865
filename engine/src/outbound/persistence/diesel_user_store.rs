//! PostgreSQL-backed per-user store adapter.
//!
//! One instance exists per shard, each wrapping its own pool. Plan commits
//! run inside a single database transaction; any statement failure rolls
//! the whole plan back. Session and token replacement retire the previous
//! live row in the same transaction that inserts the new one.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::AsyncConnection as _;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ledger::{LedgerBatch, LedgerOutcome};
use crate::domain::model::{
    LoginBonusProgress, OneTimeToken, Present, Session, TokenKind, User, UserCard, UserDeck,
    UserItem,
};
use crate::domain::ports::{
    ClaimPlan, DeckSwapPlan, DrawPlan, LoginPlan, PresentPage, RegistrationPlan,
    RewardCollectionPlan, StoreError, UpgradePlan, UserStore,
};

use super::models::{
    LoginBonusProgressRow, ReceiptRow, SessionRow, TokenRow, UserCardRow, UserDeckRow,
    UserItemRow, UserPresentRow, UserRow,
};
use super::pool::DbPool;
use super::schema::{
    user_bans, user_cards, user_decks, user_global_present_receipts, user_items,
    user_login_bonus_progress, user_one_time_tokens, user_presents, user_sessions, users,
};

/// Diesel-backed implementation of the per-user store port.
#[derive(Clone)]
pub struct DieselUserStore {
    pool: DbPool,
}

impl DieselUserStore {
    /// Create a store over the given shard pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> StoreError {
    let message = error.to_string();
    debug!(%message, "diesel statement failed");
    StoreError::query(message)
}

/// Error type threaded through transaction closures so statement failures
/// and plan-level failures both abort the transaction.
#[derive(Debug)]
enum TxError {
    Store(StoreError),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl From<StoreError> for TxError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

fn unwrap_tx(error: TxError) -> StoreError {
    match error {
        TxError::Store(error) => error,
        TxError::Diesel(error) => map_diesel_error(error),
    }
}

async fn retire_live_sessions(
    conn: &mut AsyncPgConnection,
    user_id: i64,
    now: i64,
) -> Result<(), TxError> {
    diesel::update(
        user_sessions::table
            .filter(user_sessions::user_id.eq(user_id))
            .filter(user_sessions::deleted_at.is_null()),
    )
    .set((
        user_sessions::deleted_at.eq(Some(now)),
        user_sessions::updated_at.eq(now),
    ))
    .execute(conn)
    .await?;
    Ok(())
}

/// Commit one reward batch: currency first, then cards, then materials.
async fn apply_ledger(
    conn: &mut AsyncPgConnection,
    batch: &LedgerBatch,
) -> Result<LedgerOutcome, TxError> {
    if batch.coin_total != 0 {
        let updated = diesel::update(users::table.find(batch.user_id))
            .set((
                users::coins.eq(users::coins + batch.coin_total),
                users::updated_at.eq(batch.now),
            ))
            .execute(conn)
            .await?;
        if updated == 0 {
            return Err(StoreError::MissingUser(batch.user_id).into());
        }
    }

    if !batch.new_cards.is_empty() {
        let rows: Vec<UserCardRow> = batch.new_cards.iter().map(UserCardRow::from_domain).collect();
        diesel::insert_into(user_cards::table)
            .values(&rows)
            .execute(conn)
            .await?;
    }

    // One read resolves which stacks already exist; new stacks insert in a
    // single batch, existing ones are incremented in place. The batch holds
    // at most one grant per item, so the split is unambiguous.
    let mut items = Vec::with_capacity(batch.materials.len());
    if !batch.materials.is_empty() {
        let item_ids: Vec<i64> = batch.materials.iter().map(|grant| grant.item_id).collect();
        let owned: Vec<UserItemRow> = user_items::table
            .filter(user_items::user_id.eq(batch.user_id))
            .filter(user_items::item_id.eq_any(&item_ids))
            .select(UserItemRow::as_select())
            .load(conn)
            .await?;

        let mut inserts = Vec::new();
        for grant in &batch.materials {
            if owned.iter().any(|row| row.item_id == grant.item_id) {
                let row: UserItemRow = diesel::update(
                    user_items::table
                        .filter(user_items::user_id.eq(batch.user_id))
                        .filter(user_items::item_id.eq(grant.item_id)),
                )
                .set((
                    user_items::amount.eq(user_items::amount + grant.amount),
                    user_items::updated_at.eq(batch.now),
                ))
                .returning(UserItemRow::as_returning())
                .get_result(conn)
                .await?;
                items.push(row.into_domain()?);
            } else {
                inserts.push(UserItemRow {
                    id: grant.row_id,
                    user_id: batch.user_id,
                    item_id: grant.item_id,
                    item_kind: grant.kind.code(),
                    amount: grant.amount,
                    created_at: batch.now,
                    updated_at: batch.now,
                });
            }
        }

        if !inserts.is_empty() {
            diesel::insert_into(user_items::table)
                .values(&inserts)
                .execute(conn)
                .await?;
            for row in inserts {
                items.push(row.into_domain()?);
            }
        }
    }

    Ok(LedgerOutcome {
        coins_granted: batch.coin_total,
        cards: batch.new_cards.clone(),
        items,
    })
}

/// Apply a login plan: touch the user, rotate the session, upsert bonus
/// progress, deliver presents with receipts, and commit the ledger.
async fn apply_login(
    conn: &mut AsyncPgConnection,
    plan: &LoginPlan,
) -> Result<LedgerOutcome, TxError> {
    let updated = diesel::update(users::table.find(plan.user_id))
        .set((
            users::last_active_at.eq(plan.now),
            users::updated_at.eq(plan.now),
        ))
        .execute(conn)
        .await?;
    if updated == 0 {
        return Err(StoreError::MissingUser(plan.user_id).into());
    }

    retire_live_sessions(conn, plan.user_id, plan.now).await?;
    diesel::insert_into(user_sessions::table)
        .values(SessionRow::from_domain(&plan.session))
        .execute(conn)
        .await?;

    for upsert in &plan.bonus_upserts {
        let row = LoginBonusProgressRow::from_domain(&upsert.progress);
        if upsert.is_new {
            diesel::insert_into(user_login_bonus_progress::table)
                .values(&row)
                .execute(conn)
                .await?;
        } else {
            diesel::update(user_login_bonus_progress::table.find(row.id))
                .set((
                    user_login_bonus_progress::sequence.eq(row.sequence),
                    user_login_bonus_progress::loop_count.eq(row.loop_count),
                    user_login_bonus_progress::updated_at.eq(row.updated_at),
                ))
                .execute(conn)
                .await?;
        }
    }

    if !plan.presents.is_empty() {
        let rows: Vec<UserPresentRow> =
            plan.presents.iter().map(UserPresentRow::from_domain).collect();
        diesel::insert_into(user_presents::table)
            .values(&rows)
            .execute(conn)
            .await?;
        let receipts: Vec<ReceiptRow> = plan.receipts.iter().map(ReceiptRow::from_domain).collect();
        diesel::insert_into(user_global_present_receipts::table)
            .values(&receipts)
            .execute(conn)
            .await?;
    }

    apply_ledger(conn, &plan.ledger).await
}

#[async_trait]
impl UserStore for DieselUserStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row: Option<UserRow> = users::table
            .find(user_id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(UserRow::into_domain))
    }

    async fn is_banned(&self, user_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let ban: Option<i64> = user_bans::table
            .filter(user_bans::user_id.eq(user_id))
            .select(user_bans::id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(ban.is_some())
    }

    async fn coin_balance(&self, user_id: i64) -> Result<Option<i64>, StoreError> {
        let mut conn = self.pool.get().await?;
        users::table
            .find(user_id)
            .select(users::coins)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn cards(&self, user_id: i64) -> Result<Vec<UserCard>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<UserCardRow> = user_cards::table
            .filter(user_cards::user_id.eq(user_id))
            .order(user_cards::id.asc())
            .select(UserCardRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(UserCardRow::into_domain).collect())
    }

    async fn cards_by_ids(&self, user_id: i64, ids: &[i64]) -> Result<Vec<UserCard>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<UserCardRow> = user_cards::table
            .filter(user_cards::user_id.eq(user_id))
            .filter(user_cards::id.eq_any(ids))
            .select(UserCardRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(UserCardRow::into_domain).collect())
    }

    async fn items(&self, user_id: i64) -> Result<Vec<UserItem>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<UserItemRow> = user_items::table
            .filter(user_items::user_id.eq(user_id))
            .order(user_items::item_id.asc())
            .select(UserItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(UserItemRow::into_domain).collect()
    }

    async fn items_by_ids(
        &self,
        user_id: i64,
        item_ids: &[i64],
    ) -> Result<Vec<UserItem>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<UserItemRow> = user_items::table
            .filter(user_items::user_id.eq(user_id))
            .filter(user_items::item_id.eq_any(item_ids))
            .select(UserItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(UserItemRow::into_domain).collect()
    }

    async fn active_deck(&self, user_id: i64) -> Result<Option<UserDeck>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row: Option<UserDeckRow> = user_decks::table
            .filter(user_decks::user_id.eq(user_id))
            .filter(user_decks::deleted_at.is_null())
            .select(UserDeckRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(UserDeckRow::into_domain))
    }

    async fn login_bonus_progress(
        &self,
        user_id: i64,
        bonus_ids: &[i64],
    ) -> Result<Vec<LoginBonusProgress>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<LoginBonusProgressRow> = user_login_bonus_progress::table
            .filter(user_login_bonus_progress::user_id.eq(user_id))
            .filter(user_login_bonus_progress::login_bonus_id.eq_any(bonus_ids))
            .select(LoginBonusProgressRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(LoginBonusProgressRow::into_domain)
            .collect())
    }

    async fn receipt_definition_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.pool.get().await?;
        user_global_present_receipts::table
            .filter(user_global_present_receipts::user_id.eq(user_id))
            .select(user_global_present_receipts::global_present_id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn presents_page(
        &self,
        user_id: i64,
        page: PresentPage,
    ) -> Result<Vec<Present>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<UserPresentRow> = user_presents::table
            .filter(user_presents::user_id.eq(user_id))
            .filter(user_presents::deleted_at.is_null())
            .order((user_presents::created_at.desc(), user_presents::id.desc()))
            .offset(page.offset)
            .limit(page.limit)
            .select(UserPresentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(UserPresentRow::into_domain).collect()
    }

    async fn live_presents_by_ids(
        &self,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Present>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<UserPresentRow> = user_presents::table
            .filter(user_presents::user_id.eq(user_id))
            .filter(user_presents::id.eq_any(ids))
            .filter(user_presents::deleted_at.is_null())
            .select(UserPresentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(UserPresentRow::into_domain).collect()
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row: Option<SessionRow> = user_sessions::table
            .filter(user_sessions::session_id.eq(session_id))
            .order(user_sessions::id.desc())
            .select(SessionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(SessionRow::into_domain))
    }

    async fn find_live_token(
        &self,
        user_id: i64,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<OneTimeToken>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row: Option<TokenRow> = user_one_time_tokens::table
            .filter(user_one_time_tokens::user_id.eq(user_id))
            .filter(user_one_time_tokens::token.eq(token))
            .filter(user_one_time_tokens::token_kind.eq(kind.code()))
            .filter(user_one_time_tokens::deleted_at.is_null())
            .select(TokenRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(TokenRow::into_domain).transpose()
    }

    async fn replace_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let row = SessionRow::from_domain(session);
        conn.transaction::<(), TxError, _>(|conn| {
            async move {
                retire_live_sessions(conn, row.user_id, row.created_at).await?;
                diesel::insert_into(user_sessions::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn retire_session(&self, session_id: &str, now: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::update(
            user_sessions::table
                .filter(user_sessions::session_id.eq(session_id))
                .filter(user_sessions::deleted_at.is_null()),
        )
        .set((
            user_sessions::deleted_at.eq(Some(now)),
            user_sessions::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn replace_token(&self, token: &OneTimeToken) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let row = TokenRow::from_domain(token);
        conn.transaction::<(), TxError, _>(|conn| {
            async move {
                diesel::update(
                    user_one_time_tokens::table
                        .filter(user_one_time_tokens::user_id.eq(row.user_id))
                        .filter(user_one_time_tokens::token_kind.eq(row.token_kind))
                        .filter(user_one_time_tokens::deleted_at.is_null()),
                )
                .set((
                    user_one_time_tokens::deleted_at.eq(Some(row.created_at)),
                    user_one_time_tokens::updated_at.eq(row.created_at),
                ))
                .execute(conn)
                .await?;
                diesel::insert_into(user_one_time_tokens::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn retire_token(&self, token_id: i64, now: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        // The live-row filter makes retirement conditional: of two racing
        // consumers only one sees an affected row.
        let retired = diesel::update(
            user_one_time_tokens::table
                .find(token_id)
                .filter(user_one_time_tokens::deleted_at.is_null()),
        )
        .set((
            user_one_time_tokens::deleted_at.eq(Some(now)),
            user_one_time_tokens::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(retired > 0)
    }

    async fn create_user(&self, plan: RegistrationPlan) -> Result<LedgerOutcome, StoreError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<LedgerOutcome, TxError, _>(|conn| {
            async move {
                diesel::insert_into(users::table)
                    .values(UserRow::from_domain(&plan.user))
                    .execute(conn)
                    .await?;
                let cards: Vec<UserCardRow> = plan
                    .initial_cards
                    .iter()
                    .map(UserCardRow::from_domain)
                    .collect();
                diesel::insert_into(user_cards::table)
                    .values(&cards)
                    .execute(conn)
                    .await?;
                diesel::insert_into(user_decks::table)
                    .values(UserDeckRow::from_domain(&plan.deck))
                    .execute(conn)
                    .await?;
                apply_login(conn, &plan.login).await
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn commit_login(&self, plan: LoginPlan) -> Result<LedgerOutcome, StoreError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<LedgerOutcome, TxError, _>(|conn| {
            async move { apply_login(conn, &plan).await }.scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn commit_draw(&self, plan: DrawPlan) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<(), TxError, _>(|conn| {
            async move {
                let updated = diesel::update(users::table.find(plan.user_id))
                    .set((
                        users::coins.eq(users::coins - plan.cost),
                        users::updated_at.eq(plan.now),
                    ))
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Err(StoreError::MissingUser(plan.user_id).into());
                }
                let rows: Vec<UserPresentRow> =
                    plan.presents.iter().map(UserPresentRow::from_domain).collect();
                diesel::insert_into(user_presents::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn commit_claim(&self, plan: ClaimPlan) -> Result<LedgerOutcome, StoreError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<LedgerOutcome, TxError, _>(|conn| {
            async move {
                diesel::update(
                    user_presents::table
                        .filter(user_presents::user_id.eq(plan.user_id))
                        .filter(user_presents::id.eq_any(&plan.present_ids))
                        .filter(user_presents::deleted_at.is_null()),
                )
                .set((
                    user_presents::deleted_at.eq(Some(plan.now)),
                    user_presents::updated_at.eq(plan.now),
                ))
                .execute(conn)
                .await?;
                apply_ledger(conn, &plan.ledger).await
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn commit_upgrade(&self, plan: UpgradePlan) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<(), TxError, _>(|conn| {
            async move {
                diesel::update(user_cards::table.find(plan.card.id))
                    .set((
                        user_cards::level.eq(plan.card.level),
                        user_cards::total_exp.eq(plan.card.total_exp),
                        user_cards::production_rate.eq(plan.card.production_rate),
                        user_cards::updated_at.eq(plan.now),
                    ))
                    .execute(conn)
                    .await?;
                for spend in &plan.consumed {
                    diesel::update(
                        user_items::table
                            .filter(user_items::user_id.eq(plan.user_id))
                            .filter(user_items::item_id.eq(spend.item_id)),
                    )
                    .set((
                        user_items::amount.eq(user_items::amount - spend.amount),
                        user_items::updated_at.eq(plan.now),
                    ))
                    .execute(conn)
                    .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn commit_deck_swap(&self, plan: DeckSwapPlan) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<(), TxError, _>(|conn| {
            async move {
                if let Some(old_id) = plan.retire_deck_id {
                    diesel::update(
                        user_decks::table
                            .find(old_id)
                            .filter(user_decks::deleted_at.is_null()),
                    )
                    .set((
                        user_decks::deleted_at.eq(Some(plan.now)),
                        user_decks::updated_at.eq(plan.now),
                    ))
                    .execute(conn)
                    .await?;
                }
                diesel::insert_into(user_decks::table)
                    .values(UserDeckRow::from_domain(&plan.new_deck))
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(unwrap_tx)
    }

    async fn commit_reward_collection(
        &self,
        plan: RewardCollectionPlan,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(users::table.find(plan.user_id))
            .set((
                users::coins.eq(users::coins + plan.coins_delta),
                users::last_reward_at.eq(plan.now),
                users::updated_at.eq(plan.now),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if updated == 0 {
            return Err(StoreError::MissingUser(plan.user_id));
        }
        Ok(())
    }
}
