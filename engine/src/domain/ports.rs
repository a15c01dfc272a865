//! Ports to the relational shards and the per-user cache.
//!
//! The engine composes each mutation into a plan value up front and hands
//! it to the store, which commits the whole plan in one transaction. Reads
//! are individual methods. Adapters translate their driver errors into
//! [`StoreError`] / [`CacheError`]; everything else is the engine's
//! business.

use async_trait::async_trait;
use thiserror::Error;

use super::ledger::{LedgerBatch, LedgerOutcome};
use super::master_cache::MasterBundle;
use super::model::{
    GlobalPresentReceipt, LoginBonusProgress, OneTimeToken, Present, Session, TokenKind, User,
    UserCard, UserDeck, UserItem,
};

/// Relational-store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Could not obtain a connection.
    #[error("store connection failed: {message}")]
    Connection { message: String },
    /// A statement failed.
    #[error("store query failed: {message}")]
    Query { message: String },
    /// A plan expected a user row that was not there.
    #[error("user {0} missing from its shard")]
    MissingUser(i64),
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Per-user cache failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Could not obtain a connection.
    #[error("cache connection failed: {message}")]
    Connection { message: String },
    /// A command failed.
    #[error("cache command failed: {message}")]
    Command { message: String },
    /// A cached payload failed to encode or decode.
    #[error("cache payload codec failed: {message}")]
    Codec { message: String },
}

impl CacheError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}

/// Source of the master-data set.
#[async_trait]
pub trait MasterStore: Send + Sync {
    /// Load the complete master-data set. `None` when no version row
    /// exists yet, in which case a refresh is a no-op.
    async fn load(&self) -> Result<Option<MasterBundle>, StoreError>;
}

/// One login-bonus progression write: the row and whether it is new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpsert {
    pub progress: LoginBonusProgress,
    pub is_new: bool,
}

/// Everything a rewarded login writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPlan {
    pub user_id: i64,
    pub now: i64,
    /// Fresh session replacing any live one.
    pub session: Session,
    pub bonus_upserts: Vec<ProgressUpsert>,
    /// Newly-materialised global presents.
    pub presents: Vec<Present>,
    /// Receipts recording the materialisation above.
    pub receipts: Vec<GlobalPresentReceipt>,
    pub ledger: LedgerBatch,
}

/// Everything user registration writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPlan {
    pub user: User,
    pub initial_cards: Vec<UserCard>,
    pub deck: UserDeck,
    pub login: LoginPlan,
}

/// Everything a gacha draw writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawPlan {
    pub user_id: i64,
    pub now: i64,
    /// Currency deducted up front; the store fails the plan when the
    /// balance row is missing.
    pub cost: i64,
    /// Drawn results, delivered through the inbox.
    pub presents: Vec<Present>,
}

/// Everything a present claim writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPlan {
    pub user_id: i64,
    pub now: i64,
    /// Presents to retire; already verified live.
    pub present_ids: Vec<i64>,
    pub ledger: LedgerBatch,
}

/// One material stack decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSpend {
    pub item_id: i64,
    pub amount: i64,
}

/// Everything a card level-up writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub user_id: i64,
    pub now: i64,
    /// The card row with its post-upgrade level, experience, and rate.
    pub card: UserCard,
    pub consumed: Vec<MaterialSpend>,
}

/// Everything a deck replacement writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSwapPlan {
    pub user_id: i64,
    pub now: i64,
    /// Previous live deck to retire, when one exists.
    pub retire_deck_id: Option<i64>,
    pub new_deck: UserDeck,
}

/// Everything an idle-reward collection writes in one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardCollectionPlan {
    pub user_id: i64,
    pub now: i64,
    pub coins_delta: i64,
}

/// A page request for the present inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentPage {
    pub offset: i64,
    /// Upper bound on rows returned; callers over-fetch by one to detect a
    /// following page.
    pub limit: i64,
}

/// Per-user relational state on one shard.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;
    async fn is_banned(&self, user_id: i64) -> Result<bool, StoreError>;
    async fn coin_balance(&self, user_id: i64) -> Result<Option<i64>, StoreError>;
    async fn cards(&self, user_id: i64) -> Result<Vec<UserCard>, StoreError>;
    async fn cards_by_ids(&self, user_id: i64, ids: &[i64]) -> Result<Vec<UserCard>, StoreError>;
    async fn items(&self, user_id: i64) -> Result<Vec<UserItem>, StoreError>;
    async fn items_by_ids(
        &self,
        user_id: i64,
        item_ids: &[i64],
    ) -> Result<Vec<UserItem>, StoreError>;
    async fn active_deck(&self, user_id: i64) -> Result<Option<UserDeck>, StoreError>;
    async fn login_bonus_progress(
        &self,
        user_id: i64,
        bonus_ids: &[i64],
    ) -> Result<Vec<LoginBonusProgress>, StoreError>;
    /// Identifiers of the global presents already materialised for the
    /// user.
    async fn receipt_definition_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError>;
    /// Live presents ordered newest first.
    async fn presents_page(
        &self,
        user_id: i64,
        page: PresentPage,
    ) -> Result<Vec<Present>, StoreError>;
    async fn live_presents_by_ids(
        &self,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Present>, StoreError>;
    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;
    async fn find_live_token(
        &self,
        user_id: i64,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<OneTimeToken>, StoreError>;

    /// Retire any live session for the user and insert `session`.
    async fn replace_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn retire_session(&self, session_id: &str, now: i64) -> Result<(), StoreError>;
    /// Retire any live token of the same kind and insert `token`.
    async fn replace_token(&self, token: &OneTimeToken) -> Result<(), StoreError>;
    /// Retire the token if it is still live. Returns `false` when no live
    /// row remained, so racing consumers cannot both spend it.
    async fn retire_token(&self, token_id: i64, now: i64) -> Result<bool, StoreError>;

    async fn create_user(&self, plan: RegistrationPlan) -> Result<LedgerOutcome, StoreError>;
    async fn commit_login(&self, plan: LoginPlan) -> Result<LedgerOutcome, StoreError>;
    async fn commit_draw(&self, plan: DrawPlan) -> Result<(), StoreError>;
    async fn commit_claim(&self, plan: ClaimPlan) -> Result<LedgerOutcome, StoreError>;
    async fn commit_upgrade(&self, plan: UpgradePlan) -> Result<(), StoreError>;
    async fn commit_deck_swap(&self, plan: DeckSwapPlan) -> Result<(), StoreError>;
    async fn commit_reward_collection(
        &self,
        plan: RewardCollectionPlan,
    ) -> Result<(), StoreError>;
}

/// Per-user cache on the shared cache tier.
///
/// Collection entries distinguish "absent" from "present but empty" with a
/// seeded marker; write-through helpers return `false` when the entry is
/// absent so callers fall back to seeding from the store.
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn coins(&self, user_id: i64) -> Result<Option<i64>, CacheError>;
    async fn seed_coins(&self, user_id: i64, coins: i64) -> Result<(), CacheError>;
    /// Atomically add `delta` to a cached balance. `false` when no balance
    /// is cached.
    async fn add_coins(&self, user_id: i64, delta: i64) -> Result<bool, CacheError>;

    async fn cards(&self, user_id: i64) -> Result<Option<Vec<UserCard>>, CacheError>;
    async fn seed_cards(&self, user_id: i64, cards: &[UserCard]) -> Result<(), CacheError>;
    /// Insert or overwrite one card in a seeded entry. `false` when the
    /// entry is absent.
    async fn put_card(&self, card: &UserCard) -> Result<bool, CacheError>;

    async fn receipts(&self, user_id: i64) -> Result<Option<Vec<i64>>, CacheError>;
    async fn seed_receipts(&self, user_id: i64, ids: &[i64]) -> Result<(), CacheError>;
    /// Record one receipt in a seeded entry. `false` when the entry is
    /// absent.
    async fn add_receipt(&self, user_id: i64, global_present_id: i64)
        -> Result<bool, CacheError>;

    async fn session(&self, session_id: &str) -> Result<Option<Session>, CacheError>;
    async fn put_session(&self, session: &Session) -> Result<(), CacheError>;
    async fn remove_session(&self, session_id: &str) -> Result<(), CacheError>;
}
