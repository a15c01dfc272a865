//! Domain error taxonomy.
//!
//! Errors are transport agnostic; the embedding layer maps them onto its
//! own envelope (HTTP status, RPC code). Store and cache failures abort the
//! enclosing operation and surface unchanged — the engine never retries.

use thiserror::Error;

use super::master::ItemKind;
use super::ports::{CacheError, StoreError};

/// Failure categories surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// No user row exists for the identifier.
    #[error("user {0} not found")]
    UserNotFound(i64),
    /// No item definition exists for the identifier, or the definition is
    /// unusable for the requested pipeline.
    #[error("item definition {0} not found")]
    ItemNotFound(i64),
    /// The gacha is unknown, outside its active window, or has an empty or
    /// zero-weight item pool.
    #[error("gacha {0} not found")]
    GachaNotFound(i64),
    /// The user does not own a card with this identifier.
    #[error("card {0} not found")]
    CardNotFound(i64),
    /// The user has no active deck.
    #[error("user {0} has no active deck")]
    DeckNotFound(i64),
    /// A scheduled login-bonus sequence has no matching reward row.
    /// Data-integrity failure: fatal, never retried.
    #[error("login bonus {bonus_id} has no reward at sequence {sequence}")]
    RewardNotFound { bonus_id: i64, sequence: i32 },
    /// A grant references an item definition of the wrong kind for its
    /// pipeline.
    #[error("item {item_id} has kind {actual:?}, expected {expected}")]
    InvalidItemType {
        item_id: i64,
        actual: ItemKind,
        expected: &'static str,
    },
    /// One-time token missing, of the wrong kind, or expired. Expired
    /// tokens are consumed before this error is raised.
    #[error("one-time token is invalid")]
    InvalidToken,
    /// No live session matches the presented identifier.
    #[error("unauthorized")]
    Unauthorized,
    /// The session exists but its expiry has passed; it has been retired.
    #[error("session expired")]
    ExpiredSession,
    /// The user is banned.
    #[error("user {0} is forbidden")]
    Forbidden(i64),
    /// Not enough currency to cover the requested draws.
    #[error("insufficient currency: have {have}, need {need}")]
    InsufficientCurrency { have: i64, need: i64 },
    /// The client presented a master version other than the active one.
    #[error("stale master version")]
    StaleMasterVersion,
    /// The request is malformed (bad draw count, wrong deck size, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Relational-store failure.
    #[error(transparent)]
    Store(StoreError),
    /// Per-user cache failure.
    #[error(transparent)]
    Cache(CacheError),
}

impl Error {
    /// Convenience constructor for [`Error::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether the failure indicates corrupt master data rather than a
    /// recoverable request-level condition.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::RewardNotFound { .. })
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::MissingUser(user_id) => Self::UserNotFound(user_id),
            other => Self::Store(other),
        }
    }
}

impl From<CacheError> for Error {
    fn from(error: CacheError) -> Self {
        Self::Cache(error)
    }
}
