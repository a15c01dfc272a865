//! Reward grants.
//!
//! Every pipeline that awards anything (lottery, login bonus, present
//! claim) reduces its output to a list of [`Grant`]s before the ledger
//! commits them. The tag decides which ledger bucket the grant lands in;
//! the kind code stored alongside legacy rows is parsed exactly once, at
//! the boundary.

use super::error::Error;
use super::master::ItemKind;

/// One thing to award to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Add `amount` to the currency balance.
    Currency { amount: i64 },
    /// Create one owned card instantiating `card_id`.
    Card { card_id: i64 },
    /// Add `amount` to the stack of `item_id` (experience material or
    /// booster).
    Material {
        item_id: i64,
        kind: ItemKind,
        amount: i64,
    },
}

impl Grant {
    /// Build a grant from a `(kind, item_id, amount)` triple as stored in
    /// reward rows and present rows.
    pub fn from_parts(kind: ItemKind, item_id: i64, amount: i64) -> Result<Self, Error> {
        match kind {
            ItemKind::Currency => Ok(Self::Currency { amount }),
            ItemKind::Card => Ok(Self::Card { card_id: item_id }),
            ItemKind::ExpMaterial | ItemKind::Booster => Ok(Self::Material {
                item_id,
                kind,
                amount,
            }),
        }
    }

    /// The kind tag for persisting the grant back into a row.
    pub fn kind(self) -> ItemKind {
        match self {
            Self::Currency { .. } => ItemKind::Currency,
            Self::Card { .. } => ItemKind::Card,
            Self::Material { kind, .. } => kind,
        }
    }
}
