//! Hand-written in-memory doubles for the store and cache ports, plus a
//! shared master-data fixture. Commits clone the whole state, mutate the
//! clone, and swap it back only on success, mirroring the transactional
//! all-or-nothing the real adapters get from the database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::ledger::{LedgerBatch, LedgerOutcome};
use crate::domain::master_cache::MasterBundle;
use crate::domain::model::{
    GlobalPresentReceipt, Lifecycle, LoginBonusProgress, OneTimeToken, Present, Session,
    TokenKind, User, UserCard, UserDeck, UserItem,
};
use crate::domain::ports::{
    CacheError, ClaimPlan, DeckSwapPlan, DrawPlan, LoginPlan, MasterStore, PresentPage,
    RegistrationPlan, RewardCollectionPlan, StoreError, UpgradePlan, UserCache, UserStore,
};

/// Master-data fixture shared across the test suites.
pub mod masters {
    use crate::domain::master::{
        GachaDefinition, GachaItemDefinition, GlobalPresentDefinition, ItemDefinition, ItemKind,
        LoginBonusDefinition, LoginBonusRewardDefinition, MasterVersion,
    };
    use crate::domain::master_cache::MasterBundle;

    pub const VERSION: &str = "v1";
    /// Reference "now" inside every fixture window.
    pub const NOW: i64 = 1_700_000_000;
    /// A time past every fixture window.
    pub const CLOSED_AT: i64 = NOW + 10_000;

    pub const GACHA_ID: i64 = 1;
    pub const BONUS_ID: i64 = 1;
    pub const GLOBAL_PRESENT_ID: i64 = 11;
    /// Card definition with full levelling stats.
    pub const CARD_ITEM_ID: i64 = 2;
    /// Second card definition, for decks of mixed cards.
    pub const OTHER_CARD_ITEM_ID: i64 = 3;
    /// Experience material worth 27 exp per unit.
    pub const MATERIAL_ITEM_ID: i64 = 31;
    pub const MATERIAL_EXP: i64 = 27;

    fn card_item(id: i64, name: &str) -> ItemDefinition {
        ItemDefinition {
            id,
            kind: ItemKind::Card,
            name: name.into(),
            production_rate: Some(5),
            max_level: Some(10),
            max_production_rate: Some(50),
            base_exp_per_level: Some(10),
            gained_exp: None,
        }
    }

    /// A complete, internally-consistent master-data set.
    pub fn bundle() -> MasterBundle {
        MasterBundle {
            version: Some(MasterVersion {
                id: 1,
                version: VERSION.into(),
            }),
            gachas: vec![GachaDefinition {
                id: GACHA_ID,
                name: "standard".into(),
                start_at: NOW - 1_000,
                end_at: NOW + 1_000,
                display_order: 1,
            }],
            gacha_items: vec![
                GachaItemDefinition {
                    id: 1,
                    gacha_id: GACHA_ID,
                    kind: ItemKind::Card,
                    item_id: CARD_ITEM_ID,
                    amount: 1,
                    weight: 1,
                },
                GachaItemDefinition {
                    id: 2,
                    gacha_id: GACHA_ID,
                    kind: ItemKind::ExpMaterial,
                    item_id: MATERIAL_ITEM_ID,
                    amount: 3,
                    weight: 3,
                },
            ],
            items: vec![
                card_item(CARD_ITEM_ID, "apprentice"),
                card_item(OTHER_CARD_ITEM_ID, "journeyman"),
                ItemDefinition {
                    id: MATERIAL_ITEM_ID,
                    kind: ItemKind::ExpMaterial,
                    name: "tome".into(),
                    production_rate: None,
                    max_level: None,
                    max_production_rate: None,
                    base_exp_per_level: None,
                    gained_exp: Some(MATERIAL_EXP),
                },
            ],
            login_bonuses: vec![LoginBonusDefinition {
                id: BONUS_ID,
                start_at: NOW - 1_000,
                end_at: NOW + 1_000,
                column_count: 3,
                looped: true,
            }],
            login_bonus_rewards: vec![
                LoginBonusRewardDefinition {
                    id: 1,
                    login_bonus_id: BONUS_ID,
                    sequence: 1,
                    kind: ItemKind::Currency,
                    item_id: 0,
                    amount: 100,
                },
                LoginBonusRewardDefinition {
                    id: 2,
                    login_bonus_id: BONUS_ID,
                    sequence: 2,
                    kind: ItemKind::ExpMaterial,
                    item_id: MATERIAL_ITEM_ID,
                    amount: 1,
                },
                LoginBonusRewardDefinition {
                    id: 3,
                    login_bonus_id: BONUS_ID,
                    sequence: 3,
                    kind: ItemKind::Card,
                    item_id: CARD_ITEM_ID,
                    amount: 1,
                },
            ],
            global_presents: vec![GlobalPresentDefinition {
                id: GLOBAL_PRESENT_ID,
                open_at: NOW - 1_000,
                close_at: NOW + 1_000,
                kind: ItemKind::Currency,
                item_id: 0,
                amount: 500,
                message: "launch celebration".into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: HashMap<i64, User>,
    banned: HashSet<i64>,
    cards: Vec<UserCard>,
    items: Vec<UserItem>,
    decks: Vec<UserDeck>,
    progress: Vec<LoginBonusProgress>,
    presents: Vec<Present>,
    receipts: Vec<GlobalPresentReceipt>,
    sessions: Vec<Session>,
    tokens: Vec<OneTimeToken>,
}

/// In-memory shard (and master store) double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    bundle: Mutex<Option<MasterBundle>>,
    coin_reads: AtomicUsize,
    card_reads: AtomicUsize,
    fail_next_ledger: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seed_user(&self, user_id: i64, coins: i64, last_active_at: i64) {
        self.lock().users.insert(
            user_id,
            User {
                id: user_id,
                coins,
                last_reward_at: last_active_at,
                last_active_at,
                registered_at: last_active_at,
                created_at: last_active_at,
                updated_at: last_active_at,
            },
        );
    }

    pub fn seed_card(&self, card: UserCard) {
        self.lock().cards.push(card);
    }

    pub fn seed_item(&self, item: UserItem) {
        self.lock().items.push(item);
    }

    pub fn seed_deck(&self, deck: UserDeck) {
        self.lock().decks.push(deck);
    }

    pub fn seed_present(&self, present: Present) {
        self.lock().presents.push(present);
    }

    pub fn ban(&self, user_id: i64) {
        self.lock().banned.insert(user_id);
    }

    pub fn set_bundle(&self, bundle: MasterBundle) {
        *self.bundle.lock().unwrap_or_else(PoisonError::into_inner) = Some(bundle);
    }

    /// Make the next committed ledger batch fail before its materials are
    /// merged, leaving the state untouched.
    pub fn fail_next_ledger(&self) {
        self.fail_next_ledger.store(true, Ordering::SeqCst);
    }

    pub fn coin_reads(&self) -> usize {
        self.coin_reads.load(Ordering::SeqCst)
    }

    pub fn card_reads(&self) -> usize {
        self.card_reads.load(Ordering::SeqCst)
    }

    pub fn user(&self, user_id: i64) -> Option<User> {
        self.lock().users.get(&user_id).cloned()
    }

    pub fn items_for(&self, user_id: i64) -> Vec<UserItem> {
        self.lock()
            .items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn cards_for(&self, user_id: i64) -> Vec<UserCard> {
        self.lock()
            .cards
            .iter()
            .filter(|card| card.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn presents_for(&self, user_id: i64) -> Vec<Present> {
        self.lock()
            .presents
            .iter()
            .filter(|present| present.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn receipts_for(&self, user_id: i64) -> Vec<GlobalPresentReceipt> {
        self.lock()
            .receipts
            .iter()
            .filter(|receipt| receipt.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn progress_for(&self, user_id: i64) -> Vec<LoginBonusProgress> {
        self.lock()
            .progress
            .iter()
            .filter(|progress| progress.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn live_deck_count(&self, user_id: i64) -> usize {
        self.lock()
            .decks
            .iter()
            .filter(|deck| deck.user_id == user_id && deck.state.is_live())
            .count()
    }

    pub fn live_sessions(&self, user_id: i64) -> usize {
        self.lock()
            .sessions
            .iter()
            .filter(|session| session.user_id == user_id && session.state.is_live())
            .count()
    }

    pub fn live_tokens(&self, user_id: i64) -> Vec<OneTimeToken> {
        self.lock()
            .tokens
            .iter()
            .filter(|token| token.user_id == user_id && token.state.is_live())
            .cloned()
            .collect()
    }

    fn apply_ledger(
        &self,
        state: &mut StoreState,
        batch: &LedgerBatch,
    ) -> Result<LedgerOutcome, StoreError> {
        if batch.coin_total != 0 {
            let user = state
                .users
                .get_mut(&batch.user_id)
                .ok_or(StoreError::MissingUser(batch.user_id))?;
            user.coins += batch.coin_total;
            user.updated_at = batch.now;
        }
        state.cards.extend(batch.new_cards.iter().cloned());

        if self.fail_next_ledger.swap(false, Ordering::SeqCst) {
            return Err(StoreError::query("injected ledger failure"));
        }

        let mut items = Vec::new();
        for grant in &batch.materials {
            let row = state
                .items
                .iter_mut()
                .find(|item| item.user_id == batch.user_id && item.item_id == grant.item_id);
            let merged = match row {
                Some(item) => {
                    item.amount += grant.amount;
                    item.updated_at = batch.now;
                    item.clone()
                }
                None => {
                    let item = UserItem {
                        id: grant.row_id,
                        user_id: batch.user_id,
                        item_id: grant.item_id,
                        kind: grant.kind,
                        amount: grant.amount,
                        created_at: batch.now,
                        updated_at: batch.now,
                    };
                    state.items.push(item.clone());
                    item
                }
            };
            items.push(merged);
        }

        Ok(LedgerOutcome {
            coins_granted: batch.coin_total,
            cards: batch.new_cards.clone(),
            items,
        })
    }

    fn apply_login(
        &self,
        state: &mut StoreState,
        plan: &LoginPlan,
    ) -> Result<LedgerOutcome, StoreError> {
        let user = state
            .users
            .get_mut(&plan.user_id)
            .ok_or(StoreError::MissingUser(plan.user_id))?;
        user.last_active_at = plan.now;
        user.updated_at = plan.now;

        retire_live_sessions(state, plan.user_id, plan.now);
        state.sessions.push(plan.session.clone());

        for upsert in &plan.bonus_upserts {
            if upsert.is_new {
                state.progress.push(upsert.progress.clone());
            } else if let Some(row) = state
                .progress
                .iter_mut()
                .find(|row| row.id == upsert.progress.id)
            {
                *row = upsert.progress.clone();
            }
        }
        state.presents.extend(plan.presents.iter().cloned());
        state.receipts.extend(plan.receipts.iter().cloned());

        self.apply_ledger(state, &plan.ledger)
    }
}

fn retire_live_sessions(state: &mut StoreState, user_id: i64, now: i64) {
    for session in &mut state.sessions {
        if session.user_id == user_id && session.state.is_live() {
            session.state = Lifecycle::Retired { at: now };
            session.updated_at = now;
        }
    }
}

#[async_trait]
impl MasterStore for MemoryStore {
    async fn load(&self) -> Result<Option<MasterBundle>, StoreError> {
        Ok(self
            .bundle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn is_banned(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.lock().banned.contains(&user_id))
    }

    async fn coin_balance(&self, user_id: i64) -> Result<Option<i64>, StoreError> {
        self.coin_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().users.get(&user_id).map(|user| user.coins))
    }

    async fn cards(&self, user_id: i64) -> Result<Vec<UserCard>, StoreError> {
        self.card_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.cards_for(user_id))
    }

    async fn cards_by_ids(&self, user_id: i64, ids: &[i64]) -> Result<Vec<UserCard>, StoreError> {
        Ok(self
            .lock()
            .cards
            .iter()
            .filter(|card| card.user_id == user_id && ids.contains(&card.id))
            .cloned()
            .collect())
    }

    async fn items(&self, user_id: i64) -> Result<Vec<UserItem>, StoreError> {
        Ok(self.items_for(user_id))
    }

    async fn items_by_ids(
        &self,
        user_id: i64,
        item_ids: &[i64],
    ) -> Result<Vec<UserItem>, StoreError> {
        Ok(self
            .lock()
            .items
            .iter()
            .filter(|item| item.user_id == user_id && item_ids.contains(&item.item_id))
            .cloned()
            .collect())
    }

    async fn active_deck(&self, user_id: i64) -> Result<Option<UserDeck>, StoreError> {
        Ok(self
            .lock()
            .decks
            .iter()
            .find(|deck| deck.user_id == user_id && deck.state.is_live())
            .cloned())
    }

    async fn login_bonus_progress(
        &self,
        user_id: i64,
        bonus_ids: &[i64],
    ) -> Result<Vec<LoginBonusProgress>, StoreError> {
        Ok(self
            .lock()
            .progress
            .iter()
            .filter(|row| row.user_id == user_id && bonus_ids.contains(&row.login_bonus_id))
            .cloned()
            .collect())
    }

    async fn receipt_definition_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .lock()
            .receipts
            .iter()
            .filter(|receipt| receipt.user_id == user_id)
            .map(|receipt| receipt.global_present_id)
            .collect())
    }

    async fn presents_page(
        &self,
        user_id: i64,
        page: PresentPage,
    ) -> Result<Vec<Present>, StoreError> {
        let mut rows: Vec<Present> = self
            .lock()
            .presents
            .iter()
            .filter(|present| present.user_id == user_id && present.state.is_live())
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn live_presents_by_ids(
        &self,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Present>, StoreError> {
        Ok(self
            .lock()
            .presents
            .iter()
            .filter(|present| {
                present.user_id == user_id
                    && present.state.is_live()
                    && ids.contains(&present.id)
            })
            .cloned()
            .collect())
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .rev()
            .find(|session| session.session_id == session_id)
            .cloned())
    }

    async fn find_live_token(
        &self,
        user_id: i64,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<OneTimeToken>, StoreError> {
        Ok(self
            .lock()
            .tokens
            .iter()
            .find(|row| {
                row.user_id == user_id
                    && row.token == token
                    && row.kind == kind
                    && row.state.is_live()
            })
            .cloned())
    }

    async fn replace_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut state = self.lock();
        retire_live_sessions(&mut state, session.user_id, session.created_at);
        state.sessions.push(session.clone());
        Ok(())
    }

    async fn retire_session(&self, session_id: &str, now: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        for session in &mut state.sessions {
            if session.session_id == session_id && session.state.is_live() {
                session.state = Lifecycle::Retired { at: now };
                session.updated_at = now;
            }
        }
        Ok(())
    }

    async fn replace_token(&self, token: &OneTimeToken) -> Result<(), StoreError> {
        let mut state = self.lock();
        for row in &mut state.tokens {
            if row.user_id == token.user_id && row.kind == token.kind && row.state.is_live() {
                row.state = Lifecycle::Retired {
                    at: token.created_at,
                };
                row.updated_at = token.created_at;
            }
        }
        state.tokens.push(token.clone());
        Ok(())
    }

    async fn retire_token(&self, token_id: i64, now: i64) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let mut retired = false;
        for row in &mut state.tokens {
            if row.id == token_id && row.state.is_live() {
                row.state = Lifecycle::Retired { at: now };
                row.updated_at = now;
                retired = true;
            }
        }
        Ok(retired)
    }

    async fn create_user(&self, plan: RegistrationPlan) -> Result<LedgerOutcome, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        next.users.insert(plan.user.id, plan.user.clone());
        next.cards.extend(plan.initial_cards.iter().cloned());
        next.decks.push(plan.deck.clone());
        let outcome = self.apply_login(&mut next, &plan.login)?;
        *state = next;
        Ok(outcome)
    }

    async fn commit_login(&self, plan: LoginPlan) -> Result<LedgerOutcome, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let outcome = self.apply_login(&mut next, &plan)?;
        *state = next;
        Ok(outcome)
    }

    async fn commit_draw(&self, plan: DrawPlan) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let user = next
            .users
            .get_mut(&plan.user_id)
            .ok_or(StoreError::MissingUser(plan.user_id))?;
        user.coins -= plan.cost;
        user.updated_at = plan.now;
        next.presents.extend(plan.presents.iter().cloned());
        *state = next;
        Ok(())
    }

    async fn commit_claim(&self, plan: ClaimPlan) -> Result<LedgerOutcome, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        for present in &mut next.presents {
            if plan.present_ids.contains(&present.id) && present.state.is_live() {
                present.state = Lifecycle::Retired { at: plan.now };
                present.updated_at = plan.now;
            }
        }
        let outcome = self.apply_ledger(&mut next, &plan.ledger)?;
        *state = next;
        Ok(outcome)
    }

    async fn commit_upgrade(&self, plan: UpgradePlan) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let row = next
            .cards
            .iter_mut()
            .find(|card| card.id == plan.card.id)
            .ok_or_else(|| StoreError::query("card row vanished"))?;
        *row = plan.card.clone();
        for spend in &plan.consumed {
            let item = next
                .items
                .iter_mut()
                .find(|item| item.user_id == plan.user_id && item.item_id == spend.item_id)
                .ok_or_else(|| StoreError::query("item row vanished"))?;
            item.amount -= spend.amount;
            item.updated_at = plan.now;
        }
        *state = next;
        Ok(())
    }

    async fn commit_deck_swap(&self, plan: DeckSwapPlan) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        if let Some(old_id) = plan.retire_deck_id {
            for deck in &mut next.decks {
                if deck.id == old_id && deck.state.is_live() {
                    deck.state = Lifecycle::Retired { at: plan.now };
                    deck.updated_at = plan.now;
                }
            }
        }
        next.decks.push(plan.new_deck.clone());
        *state = next;
        Ok(())
    }

    async fn commit_reward_collection(
        &self,
        plan: RewardCollectionPlan,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let user = state
            .users
            .get_mut(&plan.user_id)
            .ok_or(StoreError::MissingUser(plan.user_id))?;
        user.coins += plan.coins_delta;
        user.last_reward_at = plan.now;
        user.updated_at = plan.now;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    coins: HashMap<i64, i64>,
    cards: HashMap<i64, HashMap<i64, UserCard>>,
    receipts: HashMap<i64, Vec<i64>>,
    sessions: HashMap<String, Session>,
}

/// In-memory cache double with the same absent/seeded semantics as the
/// real tier.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop every entry, simulating an eviction.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.coins.clear();
        state.cards.clear();
        state.receipts.clear();
        state.sessions.clear();
    }
}

#[async_trait]
impl UserCache for MemoryCache {
    async fn coins(&self, user_id: i64) -> Result<Option<i64>, CacheError> {
        Ok(self.lock().coins.get(&user_id).copied())
    }

    async fn seed_coins(&self, user_id: i64, coins: i64) -> Result<(), CacheError> {
        self.lock().coins.insert(user_id, coins);
        Ok(())
    }

    async fn add_coins(&self, user_id: i64, delta: i64) -> Result<bool, CacheError> {
        let mut state = self.lock();
        match state.coins.get_mut(&user_id) {
            Some(coins) => {
                *coins += delta;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cards(&self, user_id: i64) -> Result<Option<Vec<UserCard>>, CacheError> {
        Ok(self.lock().cards.get(&user_id).map(|cards| {
            let mut rows: Vec<UserCard> = cards.values().cloned().collect();
            rows.sort_by_key(|card| card.id);
            rows
        }))
    }

    async fn seed_cards(&self, user_id: i64, cards: &[UserCard]) -> Result<(), CacheError> {
        self.lock().cards.insert(
            user_id,
            cards.iter().map(|card| (card.id, card.clone())).collect(),
        );
        Ok(())
    }

    async fn put_card(&self, card: &UserCard) -> Result<bool, CacheError> {
        let mut state = self.lock();
        match state.cards.get_mut(&card.user_id) {
            Some(cards) => {
                cards.insert(card.id, card.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn receipts(&self, user_id: i64) -> Result<Option<Vec<i64>>, CacheError> {
        Ok(self.lock().receipts.get(&user_id).cloned())
    }

    async fn seed_receipts(&self, user_id: i64, ids: &[i64]) -> Result<(), CacheError> {
        self.lock().receipts.insert(user_id, ids.to_vec());
        Ok(())
    }

    async fn add_receipt(
        &self,
        user_id: i64,
        global_present_id: i64,
    ) -> Result<bool, CacheError> {
        let mut state = self.lock();
        match state.receipts.get_mut(&user_id) {
            Some(ids) => {
                if !ids.contains(&global_present_id) {
                    ids.push(global_present_id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn session(&self, session_id: &str) -> Result<Option<Session>, CacheError> {
        Ok(self.lock().sessions.get(session_id).cloned())
    }

    async fn put_session(&self, session: &Session) -> Result<(), CacheError> {
        self.lock()
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn remove_session(&self, session_id: &str) -> Result<(), CacheError> {
        self.lock().sessions.remove(session_id);
        Ok(())
    }
}
