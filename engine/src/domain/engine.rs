//! The game engine.
//!
//! One [`GameEngine`] instance owns the master snapshot, the shard router,
//! and the per-user cache layer, and exposes every game operation as an
//! async method. Each mutating operation composes a plan value, hands it to
//! the owning shard for a single-transaction commit, and only then folds the
//! committed deltas into the cache.

use std::sync::Arc;

use chrono::DateTime;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;

use super::cache_layer::UserCacheLayer;
use super::error::Error;
use super::grant::Grant;
use super::ids::IdGenerator;
use super::ledger::{LedgerBatch, LedgerOutcome, Obtainer};
use super::login_bonus::{self, Advance};
use super::lottery;
use super::master::{GachaDefinition, GachaItemDefinition};
use super::master_cache::{MasterDataCache, MasterSnapshot};
use super::model::{
    Lifecycle, LoginBonusProgress, OneTimeToken, Present, Session, TokenKind, User, UserCard,
    UserDeck, UserItem, DECK_SIZE,
};
use super::ports::{
    ClaimPlan, DeckSwapPlan, DrawPlan, LoginPlan, MasterStore, MaterialSpend, PresentPage,
    ProgressUpsert, RegistrationPlan, RewardCollectionPlan, UpgradePlan, UserCache, UserStore,
};
use super::presents;
use super::shard::ShardRouter;

/// Presents returned per inbox page.
const PRESENTS_PER_PAGE: i64 = 100;
/// Multi-draw size.
const MULTI_DRAW: usize = 10;
/// Card level-up threshold growth per level.
const EXP_GROWTH: f64 = 1.2;

/// Outcome of a rewarded login (or of the login embedded in registration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub user: User,
    pub session: Session,
    /// Presents newly materialised into the inbox.
    pub delivered_presents: Vec<Present>,
    /// Rewards granted directly by login bonuses.
    pub granted: LedgerOutcome,
}

/// Outcome of registering a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    pub login: LoginResult,
    pub initial_cards: Vec<UserCard>,
    pub deck: UserDeck,
}

/// One open gacha with its pool, for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GachaListing {
    pub gacha: GachaDefinition,
    pub pool: Vec<GachaItemDefinition>,
}

/// Open gachas plus the token that authorises one draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GachaList {
    pub gachas: Vec<GachaListing>,
    pub token: OneTimeToken,
}

/// One inbox page plus whether a following page exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentsPageView {
    pub presents: Vec<Present>,
    pub is_next: bool,
}

/// The user's full collection plus the token authorising one upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemList {
    pub user: User,
    pub cards: Vec<UserCard>,
    pub items: Vec<UserItem>,
    pub token: OneTimeToken,
}

/// Outcome of an idle-reward collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardResult {
    pub coins_granted: i64,
    pub balance: i64,
}

/// The home view: deck, production rate, and idle time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeView {
    pub user: User,
    pub deck: Option<UserDeck>,
    pub total_production_rate: i64,
    /// Seconds since the last idle-reward collection.
    pub idle_seconds: i64,
}

/// The consistency engine: master snapshot, shard routing, caching, and
/// every game operation.
pub struct GameEngine {
    config: Config,
    masters: MasterDataCache,
    master_store: Arc<dyn MasterStore>,
    cache: UserCacheLayer,
    ids: IdGenerator,
}

impl GameEngine {
    pub fn new(
        config: Config,
        master_store: Arc<dyn MasterStore>,
        shards: Vec<Arc<dyn UserStore>>,
        cache: Arc<dyn UserCache>,
    ) -> Self {
        let ids = IdGenerator::new(config.process_salt);
        Self {
            config,
            masters: MasterDataCache::new(),
            master_store,
            cache: UserCacheLayer::new(cache, ShardRouter::new(shards)),
            ids,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reload the master snapshot from the master store. A store with no
    /// version row yet leaves the current snapshot in place.
    pub async fn refresh_masters(&self) -> Result<bool, Error> {
        match self.master_store.load().await? {
            Some(bundle) if bundle.version.is_some() => {
                self.masters.install(bundle);
                info!(version = %self.masters.snapshot().version(), "master snapshot refreshed");
                Ok(true)
            }
            _ => {
                debug!("master store has no active version; keeping current snapshot");
                Ok(false)
            }
        }
    }

    /// The currently-installed master snapshot.
    pub fn masters(&self) -> Arc<MasterSnapshot> {
        self.masters.snapshot()
    }

    /// Reject requests pinned to anything but the active master version.
    pub fn ensure_version(&self, presented: &str) -> Result<(), Error> {
        if self.masters.snapshot().is_current(presented) {
            Ok(())
        } else {
            Err(Error::StaleMasterVersion)
        }
    }

    /// Resolve a session identifier to its user, enforcing expiry and bans.
    pub async fn authenticate(&self, session_id: &str, now: i64) -> Result<i64, Error> {
        let session = self
            .cache
            .session(session_id)
            .await?
            .ok_or(Error::Unauthorized)?;
        if session.expires_at < now {
            self.cache
                .shard_for(session.user_id)
                .retire_session(session_id, now)
                .await?;
            self.cache.remove_session(session_id).await?;
            return Err(Error::ExpiredSession);
        }
        if self.cache.shard_for(session.user_id).is_banned(session.user_id).await? {
            return Err(Error::Forbidden(session.user_id));
        }
        Ok(session.user_id)
    }

    /// Register a new user: initial cards, an initial deck, and a first
    /// login, all committed in one transaction on the owning shard.
    pub async fn register_user(&self, now: i64) -> Result<RegistrationResult, Error> {
        let snapshot = self.masters.snapshot();
        let user_id = self.ids.generate();
        let user = User {
            id: user_id,
            coins: 0,
            last_reward_at: now,
            last_active_at: now,
            registered_at: now,
            created_at: now,
            updated_at: now,
        };

        let stats = snapshot.card_stats(self.config.initial_card_id)?;
        let initial_cards: Vec<UserCard> = (0..DECK_SIZE)
            .map(|_| UserCard {
                id: self.ids.generate(),
                user_id,
                card_id: self.config.initial_card_id,
                production_rate: stats.base_production_rate,
                level: 1,
                total_exp: 0,
                created_at: now,
                updated_at: now,
            })
            .collect();
        let mut card_ids = [0i64; DECK_SIZE];
        for (slot, card) in card_ids.iter_mut().zip(&initial_cards) {
            *slot = card.id;
        }
        let deck = UserDeck {
            id: self.ids.generate(),
            user_id,
            card_ids,
            created_at: now,
            updated_at: now,
            state: Lifecycle::Live,
        };

        let login = self.build_login_plan(&snapshot, user_id, now, &[], &[])?;
        let plan = RegistrationPlan {
            user: user.clone(),
            initial_cards: initial_cards.clone(),
            deck: deck.clone(),
            login: login.clone(),
        };
        let outcome = self.cache.shard_for(user_id).create_user(plan).await?;

        self.cache.put_session(&login.session).await?;
        self.apply_outcome(user_id, &login, &outcome).await?;
        info!(user_id, "registered user");

        Ok(RegistrationResult {
            login: LoginResult {
                user,
                session: login.session,
                delivered_presents: login.presents,
                granted: outcome,
            },
            initial_cards,
            deck,
        })
    }

    /// Log a user in. The first login of a calendar day runs the full
    /// reward pipeline; later logins the same day only rotate the session.
    pub async fn login(&self, user_id: i64, now: i64) -> Result<LoginResult, Error> {
        let shard = self.cache.shard_for(user_id);
        let mut user = shard
            .find_user(user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;
        if shard.is_banned(user_id).await? {
            return Err(Error::Forbidden(user_id));
        }

        let session = self.new_session(user_id, now);
        let already_rewarded = same_day(user.last_active_at, now);
        user.last_active_at = now;
        user.updated_at = now;

        let login = if already_rewarded {
            LoginPlan {
                user_id,
                now,
                session: session.clone(),
                bonus_upserts: Vec::new(),
                presents: Vec::new(),
                receipts: Vec::new(),
                ledger: LedgerBatch {
                    user_id,
                    now,
                    ..LedgerBatch::default()
                },
            }
        } else {
            let snapshot = self.masters.snapshot();
            let active_ids: Vec<i64> = snapshot
                .active_login_bonuses(now, &self.config.excluded_login_bonus_ids)
                .iter()
                .map(|bonus| bonus.id)
                .collect();
            let progress = shard.login_bonus_progress(user_id, &active_ids).await?;
            let received = self.cache.receipts(user_id).await?;
            self.build_login_plan(&snapshot, user_id, now, &progress, &received)?
        };

        let outcome = shard.commit_login(login.clone()).await?;
        self.cache.put_session(&session).await?;
        self.apply_outcome(user_id, &login, &outcome).await?;
        debug!(user_id, rewarded = !already_rewarded, "login committed");

        Ok(LoginResult {
            user,
            session,
            delivered_presents: login.presents,
            granted: outcome,
        })
    }

    /// Open gachas in display order plus a fresh draw token.
    pub async fn list_gachas(&self, user_id: i64, now: i64) -> Result<GachaList, Error> {
        let snapshot = self.masters.snapshot();
        let gachas = snapshot
            .open_gachas(now)
            .into_iter()
            .map(|(gacha, pool)| GachaListing {
                gacha: gacha.clone(),
                pool: pool.entries().to_vec(),
            })
            .collect();
        let token = self.issue_token(user_id, TokenKind::GachaDraw, now).await?;
        Ok(GachaList { gachas, token })
    }

    /// Draw from a gacha. Results are delivered through the inbox; the
    /// currency cost and the inserted presents commit together.
    pub async fn draw_gacha(
        &self,
        user_id: i64,
        gacha_id: i64,
        count: usize,
        token: &str,
        now: i64,
    ) -> Result<Vec<Present>, Error> {
        if count != 1 && count != MULTI_DRAW {
            return Err(Error::invalid_request(format!(
                "draw count must be 1 or {MULTI_DRAW}, got {count}"
            )));
        }
        self.consume_token(user_id, token, TokenKind::GachaDraw, now)
            .await?;

        let cost = self.config.draw_cost * count as i64;
        let balance = self.cache.coins(user_id).await?;
        if balance < cost {
            return Err(Error::InsufficientCurrency {
                have: balance,
                need: cost,
            });
        }

        let snapshot = self.masters.snapshot();
        let (gacha, pool) = snapshot.open_gacha(gacha_id, now)?;
        let mut rng = SmallRng::from_entropy();
        let drawn = lottery::draw_many(&mut rng, gacha_id, pool, count)?;

        let presents: Vec<Present> = drawn
            .iter()
            .map(|entry| Present {
                id: self.ids.generate(),
                user_id,
                kind: entry.kind,
                item_id: entry.item_id,
                amount: entry.amount,
                message: format!("result of drawing {}", gacha.name),
                sent_at: now,
                created_at: now,
                updated_at: now,
                state: Lifecycle::Live,
            })
            .collect();

        let plan = DrawPlan {
            user_id,
            now,
            cost,
            presents: presents.clone(),
        };
        self.cache.shard_for(user_id).commit_draw(plan).await?;
        self.cache.apply_coin_delta(user_id, -cost).await?;
        debug!(user_id, gacha_id, count, cost, "gacha drawn");

        Ok(presents)
    }

    /// One page of the live inbox, newest first. Pages are 1-based.
    pub async fn list_presents(
        &self,
        user_id: i64,
        page: i64,
    ) -> Result<PresentsPageView, Error> {
        if page < 1 {
            return Err(Error::invalid_request(format!("page must be >= 1, got {page}")));
        }
        // Fetch one row past the page to learn whether more follow.
        let rows = self
            .cache
            .shard_for(user_id)
            .presents_page(
                user_id,
                PresentPage {
                    offset: (page - 1) * PRESENTS_PER_PAGE,
                    limit: PRESENTS_PER_PAGE + 1,
                },
            )
            .await?;
        let is_next = rows.len() as i64 > PRESENTS_PER_PAGE;
        let mut presents = rows;
        presents.truncate(PRESENTS_PER_PAGE as usize);
        Ok(PresentsPageView { presents, is_next })
    }

    /// Claim inbox presents: retire the rows and grant their payloads in
    /// one transaction. Already-claimed identifiers are skipped, so the
    /// operation is idempotent.
    pub async fn receive_presents(
        &self,
        user_id: i64,
        present_ids: &[i64],
        now: i64,
    ) -> Result<LedgerOutcome, Error> {
        if present_ids.is_empty() {
            return Err(Error::invalid_request("no presents requested"));
        }
        let shard = self.cache.shard_for(user_id);
        let live = shard.live_presents_by_ids(user_id, present_ids).await?;
        if live.is_empty() {
            return Ok(LedgerOutcome::default());
        }

        let snapshot = self.masters.snapshot();
        let mut obtainer = Obtainer::new(&snapshot, &self.ids, user_id, now);
        for present in &live {
            obtainer.add(Grant::from_parts(present.kind, present.item_id, present.amount)?)?;
        }
        let plan = ClaimPlan {
            user_id,
            now,
            present_ids: live.iter().map(|present| present.id).collect(),
            ledger: obtainer.finish(),
        };
        let outcome = shard.commit_claim(plan).await?;

        self.cache
            .apply_coin_delta(user_id, outcome.coins_granted)
            .await?;
        self.cache.put_cards(&outcome.cards).await?;
        debug!(user_id, claimed = live.len(), "presents claimed");
        Ok(outcome)
    }

    /// The user's cards and item stacks, plus a fresh upgrade token.
    pub async fn list_items(&self, user_id: i64, now: i64) -> Result<ItemList, Error> {
        let shard = self.cache.shard_for(user_id);
        let user = shard
            .find_user(user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;
        let cards = self.cache.cards(user_id).await?;
        let items = shard.items(user_id).await?;
        let token = self
            .issue_token(user_id, TokenKind::CardUpgrade, now)
            .await?;
        Ok(ItemList {
            user,
            cards,
            items,
            token,
        })
    }

    /// Feed experience materials to a card, levelling it up as thresholds
    /// are crossed. Consumed stacks and the card row commit together.
    pub async fn add_card_exp(
        &self,
        user_id: i64,
        card_id: i64,
        spends: &[MaterialSpend],
        token: &str,
        now: i64,
    ) -> Result<UserCard, Error> {
        self.consume_token(user_id, token, TokenKind::CardUpgrade, now)
            .await?;
        if spends.is_empty() {
            return Err(Error::invalid_request("no materials supplied"));
        }

        let shard = self.cache.shard_for(user_id);
        let mut card = shard
            .cards_by_ids(user_id, &[card_id])
            .await?
            .into_iter()
            .next()
            .ok_or(Error::CardNotFound(card_id))?;

        let snapshot = self.masters.snapshot();
        let stats = snapshot.card_stats(card.card_id)?;
        if card.level >= stats.max_level {
            return Err(Error::invalid_request(format!(
                "card {card_id} is already at max level"
            )));
        }

        // Requests may name the same material more than once; merge them so
        // the shortage check sees the combined quantity.
        let mut merged: Vec<MaterialSpend> = Vec::new();
        for spend in spends {
            match merged.iter_mut().find(|m| m.item_id == spend.item_id) {
                Some(existing) => existing.amount += spend.amount,
                None => merged.push(*spend),
            }
        }

        let spend_ids: Vec<i64> = merged.iter().map(|spend| spend.item_id).collect();
        let owned = shard.items_by_ids(user_id, &spend_ids).await?;

        let mut gained = 0i64;
        for spend in &merged {
            let definition = snapshot.item(spend.item_id)?;
            let per_unit = definition
                .gained_exp
                .filter(|_| definition.kind.is_material())
                .ok_or(Error::InvalidItemType {
                    item_id: spend.item_id,
                    actual: definition.kind,
                    expected: "experience material",
                })?;
            let held = owned
                .iter()
                .find(|item| item.item_id == spend.item_id)
                .map_or(0, |item| item.amount);
            if held < spend.amount {
                return Err(Error::invalid_request(format!(
                    "material {} short: have {held}, need {}",
                    spend.item_id, spend.amount
                )));
            }
            gained += per_unit * spend.amount;
        }

        card.total_exp += gained;
        level_up(&mut card, stats);
        card.updated_at = now;

        let plan = UpgradePlan {
            user_id,
            now,
            card: card.clone(),
            consumed: merged,
        };
        shard.commit_upgrade(plan).await?;
        self.cache.put_cards(std::slice::from_ref(&card)).await?;
        debug!(user_id, card_id, gained, level = card.level, "card upgraded");
        Ok(card)
    }

    /// Replace the equipped deck. The old row retires and exactly one live
    /// deck row remains.
    pub async fn update_deck(
        &self,
        user_id: i64,
        card_ids: &[i64],
        now: i64,
    ) -> Result<UserDeck, Error> {
        if card_ids.len() != DECK_SIZE {
            return Err(Error::invalid_request(format!(
                "a deck holds exactly {DECK_SIZE} cards"
            )));
        }
        let shard = self.cache.shard_for(user_id);
        let owned = shard.cards_by_ids(user_id, card_ids).await?;
        for id in card_ids {
            if !owned.iter().any(|card| card.id == *id) {
                return Err(Error::CardNotFound(*id));
            }
        }

        let previous = shard.active_deck(user_id).await?;
        let mut slots = [0i64; DECK_SIZE];
        slots.copy_from_slice(card_ids);
        let deck = UserDeck {
            id: self.ids.generate(),
            user_id,
            card_ids: slots,
            created_at: now,
            updated_at: now,
            state: Lifecycle::Live,
        };
        let plan = DeckSwapPlan {
            user_id,
            now,
            retire_deck_id: previous.map(|deck| deck.id),
            new_deck: deck.clone(),
        };
        shard.commit_deck_swap(plan).await?;
        Ok(deck)
    }

    /// Collect the idle reward: elapsed seconds times the deck's total
    /// production rate, added to the balance.
    pub async fn collect_reward(&self, user_id: i64, now: i64) -> Result<RewardResult, Error> {
        let shard = self.cache.shard_for(user_id);
        let deck = shard
            .active_deck(user_id)
            .await?
            .ok_or(Error::DeckNotFound(user_id))?;
        let cards = shard.cards_by_ids(user_id, &deck.card_ids).await?;
        let user = shard
            .find_user(user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        let rate = UserDeck::total_production_rate(&cards);
        let elapsed = (now - user.last_reward_at).max(0);
        let gain = rate * elapsed;

        shard
            .commit_reward_collection(RewardCollectionPlan {
                user_id,
                now,
                coins_delta: gain,
            })
            .await?;
        self.cache.apply_coin_delta(user_id, gain).await?;

        Ok(RewardResult {
            coins_granted: gain,
            balance: user.coins + gain,
        })
    }

    /// The home view: equipped deck, production rate, and idle time.
    pub async fn home(&self, user_id: i64, now: i64) -> Result<HomeView, Error> {
        let shard = self.cache.shard_for(user_id);
        let user = shard
            .find_user(user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;
        let deck = shard.active_deck(user_id).await?;
        let total_production_rate = match &deck {
            Some(deck) => {
                let cards = shard.cards_by_ids(user_id, &deck.card_ids).await?;
                UserDeck::total_production_rate(&cards)
            }
            None => 0,
        };
        Ok(HomeView {
            idle_seconds: (now - user.last_reward_at).max(0),
            user,
            deck,
            total_production_rate,
        })
    }

    fn new_session(&self, user_id: i64, now: i64) -> Session {
        Session {
            id: self.ids.generate(),
            user_id,
            session_id: Uuid::new_v4().to_string(),
            expires_at: now + self.config.session_ttl,
            created_at: now,
            updated_at: now,
            state: Lifecycle::Live,
        }
    }

    /// Issue a fresh one-time token, retiring any live token of the same
    /// kind.
    async fn issue_token(
        &self,
        user_id: i64,
        kind: TokenKind,
        now: i64,
    ) -> Result<OneTimeToken, Error> {
        let token = OneTimeToken {
            id: self.ids.generate(),
            user_id,
            token: Uuid::new_v4().to_string(),
            kind,
            expires_at: now + self.config.token_ttl,
            created_at: now,
            updated_at: now,
            state: Lifecycle::Live,
        };
        self.cache.shard_for(user_id).replace_token(&token).await?;
        Ok(token)
    }

    /// Spend a one-time token. Retirement is conditional on the row still
    /// being live, so of two racing consumers exactly one wins; the token
    /// retires even when the expiry check then fails, so no token is ever
    /// spendable twice.
    async fn consume_token(
        &self,
        user_id: i64,
        token: &str,
        kind: TokenKind,
        now: i64,
    ) -> Result<(), Error> {
        let shard = self.cache.shard_for(user_id);
        let row = shard
            .find_live_token(user_id, token, kind)
            .await?
            .ok_or(Error::InvalidToken)?;
        if !shard.retire_token(row.id, now).await? {
            return Err(Error::InvalidToken);
        }
        if row.expires_at < now {
            return Err(Error::InvalidToken);
        }
        Ok(())
    }

    /// Compose the full once-per-day login pipeline into one plan.
    fn build_login_plan(
        &self,
        snapshot: &MasterSnapshot,
        user_id: i64,
        now: i64,
        progress_rows: &[LoginBonusProgress],
        received_ids: &[i64],
    ) -> Result<LoginPlan, Error> {
        let mut obtainer = Obtainer::new(snapshot, &self.ids, user_id, now);
        let mut bonus_upserts = Vec::new();

        for bonus in snapshot.active_login_bonuses(now, &self.config.excluded_login_bonus_ids) {
            let existing = progress_rows
                .iter()
                .find(|progress| progress.login_bonus_id == bonus.id);
            let (sequence, loop_count) = match login_bonus::advance(bonus, existing) {
                Advance::Progressed {
                    sequence,
                    loop_count,
                } => (sequence, loop_count),
                Advance::Completed => continue,
            };
            let progress = match existing {
                Some(existing) => LoginBonusProgress {
                    sequence,
                    loop_count,
                    updated_at: now,
                    ..existing.clone()
                },
                None => LoginBonusProgress {
                    id: self.ids.generate(),
                    user_id,
                    login_bonus_id: bonus.id,
                    sequence,
                    loop_count,
                    created_at: now,
                    updated_at: now,
                },
            };
            bonus_upserts.push(ProgressUpsert {
                progress,
                is_new: existing.is_none(),
            });

            let reward = snapshot.login_bonus_reward(bonus.id, sequence)?;
            obtainer.add(Grant::from_parts(reward.kind, reward.item_id, reward.amount)?)?;
        }

        let distribution = presents::distribute(
            &snapshot.active_global_presents(now),
            received_ids,
            &self.ids,
            user_id,
            now,
        );

        Ok(LoginPlan {
            user_id,
            now,
            session: self.new_session(user_id, now),
            bonus_upserts,
            presents: distribution.presents,
            receipts: distribution.receipts,
            ledger: obtainer.finish(),
        })
    }

    /// Fold a committed login's deltas into the cache.
    async fn apply_outcome(
        &self,
        user_id: i64,
        login: &LoginPlan,
        outcome: &LedgerOutcome,
    ) -> Result<(), Error> {
        self.cache
            .apply_coin_delta(user_id, outcome.coins_granted)
            .await?;
        self.cache.put_cards(&outcome.cards).await?;
        let receipt_ids: Vec<i64> = login
            .receipts
            .iter()
            .map(|receipt| receipt.global_present_id)
            .collect();
        self.cache.add_receipts(user_id, &receipt_ids).await?;
        Ok(())
    }
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("shards", &self.config.shard_count())
            .finish_non_exhaustive()
    }
}

/// Whether two unix timestamps fall on the same UTC calendar day.
fn same_day(a: i64, b: i64) -> bool {
    match (DateTime::from_timestamp(a, 0), DateTime::from_timestamp(b, 0)) {
        (Some(a), Some(b)) => a.date_naive() == b.date_naive(),
        _ => false,
    }
}

/// Apply every level-up threshold the accumulated experience crosses.
fn level_up(card: &mut UserCard, stats: super::master::CardStats) {
    while card.level < stats.max_level {
        let threshold =
            (stats.base_exp_per_level as f64 * EXP_GROWTH.powi(card.level - 1)) as i64;
        if card.total_exp < threshold {
            break;
        }
        card.level += 1;
        card.production_rate +=
            (stats.max_production_rate - stats.base_production_rate) / i64::from(stats.max_level - 1);
    }
}
