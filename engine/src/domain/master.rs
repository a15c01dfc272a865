//! Master-data entities: read-only game-design constants.
//!
//! These rows are refreshed wholesale into the [`MasterDataCache`]
//! (`super::master_cache`) and never read from the store on a request path.

use super::error::Error;

/// Kind tag shared by item definitions, grants, and presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ItemKind {
    /// Grants add directly to the user's currency balance.
    Currency,
    /// Grants create a new owned-card row.
    Card,
    /// Level-up material consumed by card upgrades.
    ExpMaterial,
    /// Production booster; stacks like a material.
    Booster,
}

impl ItemKind {
    /// Wire code stored in the relational store.
    pub fn code(self) -> i16 {
        match self {
            Self::Currency => 1,
            Self::Card => 2,
            Self::ExpMaterial => 3,
            Self::Booster => 4,
        }
    }

    /// Parse the stored wire code.
    pub fn from_code(code: i16) -> Result<Self, Error> {
        match code {
            1 => Ok(Self::Currency),
            2 => Ok(Self::Card),
            3 => Ok(Self::ExpMaterial),
            4 => Ok(Self::Booster),
            other => Err(Error::invalid_request(format!(
                "unknown item kind code {other}"
            ))),
        }
    }

    /// Whether grants of this kind flow through the material pipeline
    /// (stacked in place rather than inserted per grant).
    pub fn is_material(self) -> bool {
        matches!(self, Self::ExpMaterial | Self::Booster)
    }
}

/// The single currently-active master version; request validation rejects
/// clients presenting any other version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterVersion {
    pub id: i64,
    pub version: String,
}

/// A weighted lottery over a pool of item grants, open inside
/// `[start_at, end_at]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GachaDefinition {
    pub id: i64,
    pub name: String,
    pub start_at: i64,
    pub end_at: i64,
    pub display_order: i32,
}

impl GachaDefinition {
    /// Whether the gacha's window contains `now` (closed interval).
    pub fn is_open(&self, now: i64) -> bool {
        self.start_at <= now && now <= self.end_at
    }
}

/// One entry of a gacha's item pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GachaItemDefinition {
    pub id: i64,
    pub gacha_id: i64,
    pub kind: ItemKind,
    pub item_id: i64,
    pub amount: i64,
    /// Non-negative selection weight; zero means the entry can never be
    /// drawn.
    pub weight: i64,
}

/// Statistics a card-kind definition must carry to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardStats {
    pub base_production_rate: i64,
    pub max_production_rate: i64,
    pub max_level: i32,
    pub base_exp_per_level: i64,
}

/// An item definition: cards carry levelling stats, materials carry the
/// experience they grant when consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDefinition {
    pub id: i64,
    pub kind: ItemKind,
    pub name: String,
    pub production_rate: Option<i64>,
    pub max_level: Option<i32>,
    pub max_production_rate: Option<i64>,
    pub base_exp_per_level: Option<i64>,
    pub gained_exp: Option<i64>,
}

impl ItemDefinition {
    /// Levelling stats, present only on well-formed card definitions.
    pub fn card_stats(&self) -> Option<CardStats> {
        Some(CardStats {
            base_production_rate: self.production_rate?,
            max_production_rate: self.max_production_rate?,
            max_level: self.max_level?,
            base_exp_per_level: self.base_exp_per_level?,
        })
    }
}

/// A multi-day login-bonus schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginBonusDefinition {
    pub id: i64,
    pub start_at: i64,
    pub end_at: i64,
    /// Number of reward columns before the schedule completes or wraps.
    pub column_count: i32,
    /// Whether the schedule wraps back to sequence 1 after completing.
    pub looped: bool,
}

impl LoginBonusDefinition {
    /// Whether the bonus window contains `now` (closed interval).
    pub fn is_open(&self, now: i64) -> bool {
        self.start_at <= now && now <= self.end_at
    }
}

/// The reward granted for reaching `(login_bonus_id, sequence)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginBonusRewardDefinition {
    pub id: i64,
    pub login_bonus_id: i64,
    pub sequence: i32,
    pub kind: ItemKind,
    pub item_id: i64,
    pub amount: i64,
}

/// A reward scheduled for all users inside a registration window, granted
/// at most once per user per definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPresentDefinition {
    pub id: i64,
    pub open_at: i64,
    pub close_at: i64,
    pub kind: ItemKind,
    pub item_id: i64,
    pub amount: i64,
    pub message: String,
}

impl GlobalPresentDefinition {
    /// Whether the registration window contains `now` (closed interval).
    pub fn is_open(&self, now: i64) -> bool {
        self.open_at <= now && now <= self.close_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn item_kind_codes_round_trip() {
        for kind in [
            ItemKind::Currency,
            ItemKind::Card,
            ItemKind::ExpMaterial,
            ItemKind::Booster,
        ] {
            assert_eq!(ItemKind::from_code(kind.code()).ok(), Some(kind));
        }
        assert!(ItemKind::from_code(0).is_err());
    }

    #[rstest]
    #[case(ItemKind::Currency, false)]
    #[case(ItemKind::Card, false)]
    #[case(ItemKind::ExpMaterial, true)]
    #[case(ItemKind::Booster, true)]
    fn material_kinds(#[case] kind: ItemKind, #[case] expected: bool) {
        assert_eq!(kind.is_material(), expected);
    }

    #[rstest]
    fn card_stats_require_every_field() {
        let mut definition = ItemDefinition {
            id: 1,
            kind: ItemKind::Card,
            name: "Apprentice".into(),
            production_rate: Some(2),
            max_level: Some(10),
            max_production_rate: Some(20),
            base_exp_per_level: Some(10),
            gained_exp: None,
        };
        assert!(definition.card_stats().is_some());

        definition.max_level = None;
        assert!(definition.card_stats().is_none());
    }

    #[rstest]
    #[case(99, false)]
    #[case(100, true)]
    #[case(150, true)]
    #[case(200, true)]
    #[case(201, false)]
    fn windows_are_closed_intervals(#[case] now: i64, #[case] open: bool) {
        let bonus = LoginBonusDefinition {
            id: 1,
            start_at: 100,
            end_at: 200,
            column_count: 7,
            looped: false,
        };
        assert_eq!(bonus.is_open(now), open);
    }
}
