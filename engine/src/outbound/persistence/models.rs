//! Internal Diesel row structs and their domain conversions.
//!
//! These types are implementation details of the persistence layer and are
//! never exposed to the domain. Kind codes are parsed exactly once, here,
//! so the domain only ever sees typed tags.

use diesel::prelude::*;

use crate::domain::master::{
    GachaDefinition, GachaItemDefinition, GlobalPresentDefinition, ItemDefinition, ItemKind,
    LoginBonusDefinition, LoginBonusRewardDefinition, MasterVersion,
};
use crate::domain::model::{
    GlobalPresentReceipt, Lifecycle, LoginBonusProgress, OneTimeToken, Present, Session,
    TokenKind, User, UserCard, UserDeck, UserItem, DECK_SIZE,
};
use crate::domain::ports::StoreError;

use super::schema::{
    gacha_definitions, gacha_item_definitions, global_present_definitions, item_definitions,
    login_bonus_definitions, login_bonus_reward_definitions, user_cards, user_decks,
    user_global_present_receipts, user_items, user_login_bonus_progress, user_one_time_tokens,
    user_presents, user_sessions, users, version,
};

pub(crate) fn kind_from_code(code: i16) -> Result<ItemKind, StoreError> {
    ItemKind::from_code(code).map_err(|_| StoreError::query(format!("unknown item kind {code}")))
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: i64,
    pub coins: i64,
    pub last_reward_at: i64,
    pub last_active_at: i64,
    pub registered_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserRow {
    pub fn into_domain(self) -> User {
        User {
            id: self.id,
            coins: self.coins,
            last_reward_at: self.last_reward_at,
            last_active_at: self.last_active_at,
            registered_at: self.registered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn from_domain(user: &User) -> Self {
        Self {
            id: user.id,
            coins: user.coins,
            last_reward_at: user.last_reward_at,
            last_active_at: user.last_active_at,
            registered_at: user.registered_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_cards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserCardRow {
    pub id: i64,
    pub user_id: i64,
    pub card_id: i64,
    pub production_rate: i64,
    pub level: i32,
    pub total_exp: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserCardRow {
    pub fn into_domain(self) -> UserCard {
        UserCard {
            id: self.id,
            user_id: self.user_id,
            card_id: self.card_id,
            production_rate: self.production_rate,
            level: self.level,
            total_exp: self.total_exp,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn from_domain(card: &UserCard) -> Self {
        Self {
            id: card.id,
            user_id: card.user_id,
            card_id: card.card_id,
            production_rate: card.production_rate,
            level: card.level,
            total_exp: card.total_exp,
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserItemRow {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub item_kind: i16,
    pub amount: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserItemRow {
    pub fn into_domain(self) -> Result<UserItem, StoreError> {
        Ok(UserItem {
            id: self.id,
            user_id: self.user_id,
            item_id: self.item_id,
            kind: kind_from_code(self.item_kind)?,
            amount: self.amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_decks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserDeckRow {
    pub id: i64,
    pub user_id: i64,
    pub card_id_1: i64,
    pub card_id_2: i64,
    pub card_id_3: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl UserDeckRow {
    pub fn into_domain(self) -> UserDeck {
        UserDeck {
            id: self.id,
            user_id: self.user_id,
            card_ids: [self.card_id_1, self.card_id_2, self.card_id_3],
            created_at: self.created_at,
            updated_at: self.updated_at,
            state: Lifecycle::from_deleted_at(self.deleted_at),
        }
    }

    pub fn from_domain(deck: &UserDeck) -> Self {
        // The deck type fixes the slot count at compile time.
        debug_assert_eq!(deck.card_ids.len(), DECK_SIZE);
        Self {
            id: deck.id,
            user_id: deck.user_id,
            card_id_1: deck.card_ids[0],
            card_id_2: deck.card_ids[1],
            card_id_3: deck.card_ids[2],
            created_at: deck.created_at,
            updated_at: deck.updated_at,
            deleted_at: deck.state.deleted_at(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_presents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserPresentRow {
    pub id: i64,
    pub user_id: i64,
    pub item_kind: i16,
    pub item_id: i64,
    pub amount: i64,
    pub message: String,
    pub sent_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl UserPresentRow {
    pub fn into_domain(self) -> Result<Present, StoreError> {
        Ok(Present {
            id: self.id,
            user_id: self.user_id,
            kind: kind_from_code(self.item_kind)?,
            item_id: self.item_id,
            amount: self.amount,
            message: self.message,
            sent_at: self.sent_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            state: Lifecycle::from_deleted_at(self.deleted_at),
        })
    }

    pub fn from_domain(present: &Present) -> Self {
        Self {
            id: present.id,
            user_id: present.user_id,
            item_kind: present.kind.code(),
            item_id: present.item_id,
            amount: present.amount,
            message: present.message.clone(),
            sent_at: present.sent_at,
            created_at: present.created_at,
            updated_at: present.updated_at,
            deleted_at: present.state.deleted_at(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_login_bonus_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LoginBonusProgressRow {
    pub id: i64,
    pub user_id: i64,
    pub login_bonus_id: i64,
    pub sequence: i32,
    pub loop_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LoginBonusProgressRow {
    pub fn into_domain(self) -> LoginBonusProgress {
        LoginBonusProgress {
            id: self.id,
            user_id: self.user_id,
            login_bonus_id: self.login_bonus_id,
            sequence: self.sequence,
            loop_count: self.loop_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn from_domain(progress: &LoginBonusProgress) -> Self {
        Self {
            id: progress.id,
            user_id: progress.user_id,
            login_bonus_id: progress.login_bonus_id,
            sequence: progress.sequence,
            loop_count: progress.loop_count,
            created_at: progress.created_at,
            updated_at: progress.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_global_present_receipts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ReceiptRow {
    pub id: i64,
    pub user_id: i64,
    pub global_present_id: i64,
    pub received_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ReceiptRow {
    pub fn from_domain(receipt: &GlobalPresentReceipt) -> Self {
        Self {
            id: receipt.id,
            user_id: receipt.user_id,
            global_present_id: receipt.global_present_id,
            received_at: receipt.received_at,
            created_at: receipt.created_at,
            updated_at: receipt.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SessionRow {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl SessionRow {
    pub fn into_domain(self) -> Session {
        Session {
            id: self.id,
            user_id: self.user_id,
            session_id: self.session_id,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            state: Lifecycle::from_deleted_at(self.deleted_at),
        }
    }

    pub fn from_domain(session: &Session) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            session_id: session.session_id.clone(),
            expires_at: session.expires_at,
            created_at: session.created_at,
            updated_at: session.updated_at,
            deleted_at: session.state.deleted_at(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_one_time_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TokenRow {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub token_kind: i16,
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl TokenRow {
    pub fn into_domain(self) -> Result<OneTimeToken, StoreError> {
        let kind = TokenKind::from_code(self.token_kind)
            .ok_or_else(|| StoreError::query(format!("unknown token kind {}", self.token_kind)))?;
        Ok(OneTimeToken {
            id: self.id,
            user_id: self.user_id,
            token: self.token,
            kind,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            state: Lifecycle::from_deleted_at(self.deleted_at),
        })
    }

    pub fn from_domain(token: &OneTimeToken) -> Self {
        Self {
            id: token.id,
            user_id: token.user_id,
            token: token.token.clone(),
            token_kind: token.kind.code(),
            expires_at: token.expires_at,
            created_at: token.created_at,
            updated_at: token.updated_at,
            deleted_at: token.state.deleted_at(),
        }
    }
}

// ---------------------------------------------------------------------------
// Master rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = version)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VersionRow {
    pub id: i64,
    #[expect(dead_code, reason = "only active rows are ever selected")]
    pub is_active: bool,
    #[diesel(column_name = version_name)]
    pub version: String,
}

impl VersionRow {
    pub fn into_domain(self) -> MasterVersion {
        MasterVersion {
            id: self.id,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = gacha_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GachaRow {
    pub id: i64,
    pub name: String,
    pub start_at: i64,
    pub end_at: i64,
    pub display_order: i32,
}

impl GachaRow {
    pub fn into_domain(self) -> GachaDefinition {
        GachaDefinition {
            id: self.id,
            name: self.name,
            start_at: self.start_at,
            end_at: self.end_at,
            display_order: self.display_order,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = gacha_item_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GachaItemRow {
    pub id: i64,
    pub gacha_id: i64,
    pub item_kind: i16,
    pub item_id: i64,
    pub amount: i64,
    pub weight: i64,
}

impl GachaItemRow {
    pub fn into_domain(self) -> Result<GachaItemDefinition, StoreError> {
        Ok(GachaItemDefinition {
            id: self.id,
            gacha_id: self.gacha_id,
            kind: kind_from_code(self.item_kind)?,
            item_id: self.item_id,
            amount: self.amount,
            weight: self.weight,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = item_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ItemDefinitionRow {
    pub id: i64,
    pub item_kind: i16,
    pub name: String,
    pub production_rate: Option<i64>,
    pub max_level: Option<i32>,
    pub max_production_rate: Option<i64>,
    pub base_exp_per_level: Option<i64>,
    pub gained_exp: Option<i64>,
}

impl ItemDefinitionRow {
    pub fn into_domain(self) -> Result<ItemDefinition, StoreError> {
        Ok(ItemDefinition {
            id: self.id,
            kind: kind_from_code(self.item_kind)?,
            name: self.name,
            production_rate: self.production_rate,
            max_level: self.max_level,
            max_production_rate: self.max_production_rate,
            base_exp_per_level: self.base_exp_per_level,
            gained_exp: self.gained_exp,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = login_bonus_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LoginBonusRow {
    pub id: i64,
    pub start_at: i64,
    pub end_at: i64,
    pub column_count: i32,
    pub looped: bool,
}

impl LoginBonusRow {
    pub fn into_domain(self) -> LoginBonusDefinition {
        LoginBonusDefinition {
            id: self.id,
            start_at: self.start_at,
            end_at: self.end_at,
            column_count: self.column_count,
            looped: self.looped,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = login_bonus_reward_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LoginBonusRewardRow {
    pub id: i64,
    pub login_bonus_id: i64,
    pub sequence: i32,
    pub item_kind: i16,
    pub item_id: i64,
    pub amount: i64,
}

impl LoginBonusRewardRow {
    pub fn into_domain(self) -> Result<LoginBonusRewardDefinition, StoreError> {
        Ok(LoginBonusRewardDefinition {
            id: self.id,
            login_bonus_id: self.login_bonus_id,
            sequence: self.sequence,
            kind: kind_from_code(self.item_kind)?,
            item_id: self.item_id,
            amount: self.amount,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = global_present_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GlobalPresentRow {
    pub id: i64,
    pub open_at: i64,
    pub close_at: i64,
    pub item_kind: i16,
    pub item_id: i64,
    pub amount: i64,
    pub message: String,
}

impl GlobalPresentRow {
    pub fn into_domain(self) -> Result<GlobalPresentDefinition, StoreError> {
        Ok(GlobalPresentDefinition {
            id: self.id,
            open_at: self.open_at,
            close_at: self.close_at,
            kind: kind_from_code(self.item_kind)?,
            item_id: self.item_id,
            amount: self.amount,
            message: self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn deck_rows_round_trip_through_the_slot_columns() {
        let deck = UserDeck {
            id: 1,
            user_id: 42,
            card_ids: [10, 20, 30],
            created_at: 5,
            updated_at: 5,
            state: Lifecycle::Live,
        };
        let row = UserDeckRow::from_domain(&deck);
        assert_eq!(row.deleted_at, None);
        assert_eq!(row.into_domain(), deck);
    }

    #[rstest]
    fn version_rows_map_onto_the_domain_version() {
        let row = VersionRow {
            id: 7,
            is_active: true,
            version: "v3".into(),
        };
        let domain = row.into_domain();
        assert_eq!(domain.id, 7);
        assert_eq!(domain.version, "v3");
    }

    #[rstest]
    fn unknown_kind_codes_fail_conversion() {
        let row = UserItemRow {
            id: 1,
            user_id: 42,
            item_id: 31,
            item_kind: 9,
            amount: 1,
            created_at: 0,
            updated_at: 0,
        };
        assert!(matches!(
            row.into_domain(),
            Err(StoreError::Query { .. })
        ));
    }

    #[rstest]
    fn soft_delete_columns_map_onto_lifecycle() {
        let session = Session {
            id: 1,
            user_id: 42,
            session_id: "abc".into(),
            expires_at: 100,
            created_at: 0,
            updated_at: 7,
            state: Lifecycle::Retired { at: 7 },
        };
        let row = SessionRow::from_domain(&session);
        assert_eq!(row.deleted_at, Some(7));
        assert_eq!(row.into_domain(), session);
    }
}
