//! Per-user mutable entities.
//!
//! Every entity carries unix-second timestamps supplied by the caller (the
//! request time), never read from a system clock inside the engine. Rows
//! that retire rather than delete carry a [`Lifecycle`] state mapped onto
//! the store's nullable soft-delete column.

use serde::{Deserialize, Serialize};

use super::master::ItemKind;

/// Soft-delete lifecycle shared by sessions, decks, presents, and tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// The row is active.
    Live,
    /// The row was retired at the given unix time and no longer
    /// participates in reads.
    Retired { at: i64 },
}

impl Lifecycle {
    /// Whether the row is still active.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Map from the store's nullable soft-delete column.
    pub fn from_deleted_at(deleted_at: Option<i64>) -> Self {
        match deleted_at {
            None => Self::Live,
            Some(at) => Self::Retired { at },
        }
    }

    /// Map onto the store's nullable soft-delete column.
    pub fn deleted_at(self) -> Option<i64> {
        match self {
            Self::Live => None,
            Self::Retired { at } => Some(at),
        }
    }
}

/// A registered player. Owned by exactly one shard, determined by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Currency balance; the cached copy of this counter is kept in sync
    /// by the ledger via matching atomic increments.
    pub coins: i64,
    /// Last idle-reward collection time.
    pub last_reward_at: i64,
    /// Last completed login time; gates the once-per-day login pipeline.
    pub last_active_at: i64,
    pub registered_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An owned card. Created on acquisition, mutated only by level-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCard {
    pub id: i64,
    pub user_id: i64,
    /// Card item definition this card instantiates.
    pub card_id: i64,
    /// Current idle production rate (currency per second).
    pub production_rate: i64,
    pub level: i32,
    pub total_exp: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An owned consumable stack. One row per (user, item definition); the
/// quantity is incremented in place, never duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserItem {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub kind: ItemKind,
    pub amount: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Number of cards in every deck.
pub const DECK_SIZE: usize = 3;

/// An equipped deck of exactly three cards. Decks are append-only:
/// replacing one retires the previous row and inserts a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDeck {
    pub id: i64,
    pub user_id: i64,
    pub card_ids: [i64; DECK_SIZE],
    pub created_at: i64,
    pub updated_at: i64,
    pub state: Lifecycle,
}

impl UserDeck {
    /// Sum of the production rates of the given cards.
    pub fn total_production_rate(cards: &[UserCard]) -> i64 {
        cards.iter().map(|card| card.production_rate).sum()
    }
}

/// Per-(user, bonus) progression through a login-bonus schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginBonusProgress {
    pub id: i64,
    pub user_id: i64,
    pub login_bonus_id: i64,
    /// Last rewarded sequence index; never exceeds the bonus column count
    /// unless the bonus loops, in which case it wraps to 1.
    pub sequence: i32,
    pub loop_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A pending reward in the user's inbox. Claiming sets the retirement
/// timestamp and feeds the payload into the reward ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Present {
    pub id: i64,
    pub user_id: i64,
    pub kind: ItemKind,
    pub item_id: i64,
    pub amount: i64,
    pub message: String,
    pub sent_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub state: Lifecycle,
}

/// Durable record that a scheduled global present was already materialised
/// into the user's inbox; the de-duplication key for the distributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPresentReceipt {
    pub id: i64,
    pub user_id: i64,
    pub global_present_id: i64,
    pub received_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An authenticated session. At most one live row per user; logging in
/// retires the previous one in the same write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub state: Lifecycle,
}

/// Purpose tag of a one-time token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Authorises one gacha draw request.
    GachaDraw,
    /// Authorises one card level-up request.
    CardUpgrade,
}

impl TokenKind {
    /// Wire code stored in the relational store.
    pub fn code(self) -> i16 {
        match self {
            Self::GachaDraw => 1,
            Self::CardUpgrade => 2,
        }
    }

    /// Parse the stored wire code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::GachaDraw),
            2 => Some(Self::CardUpgrade),
            _ => None,
        }
    }
}

/// A single-use token. Issuing a new token of a kind retires all prior
/// live tokens of that kind; consumption retires the token even when the
/// expiry check then fails, so a token can never be spent twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub kind: TokenKind,
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub state: Lifecycle,
}
