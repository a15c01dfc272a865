//! Game-state consistency engine for a collectible card game.
//!
//! The engine owns the sharded per-user ledger (currency, cards, items,
//! decks), the transactional reward pipeline, the weighted gacha lottery,
//! the login-bonus progression state machine, and the two-tier caching
//! discipline that keeps a read-mostly master-data snapshot and a
//! write-heavy per-user cache consistent with the authoritative sharded
//! relational store.
//!
//! HTTP routing, authentication transport, and process bootstrap live
//! outside this crate; they translate externally visible fields (user id,
//! session id, one-time token, draw count) into calls on
//! [`GameEngine`](domain::GameEngine).

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(test)]
pub mod test_support;

pub use config::Config;
pub use domain::{Error, GameEngine};
