//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the deployed schema exactly. The per-user
//! tables
//! exist identically on every shard; the definition tables and `version`
//! live only in the master database. All timestamps are unix seconds.

diesel::table! {
    /// Registered players. One row per user, on the user's owning shard.
    users (id) {
        id -> Int8,
        /// Currency balance, kept in lockstep with the cached copy.
        coins -> Int8,
        /// Last idle-reward collection time.
        last_reward_at -> Int8,
        /// Last completed login time.
        last_active_at -> Int8,
        registered_at -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
    }
}

diesel::table! {
    /// Banned users. Presence of a row blocks authentication.
    user_bans (id) {
        id -> Int8,
        user_id -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
    }
}

diesel::table! {
    /// Owned cards.
    user_cards (id) {
        id -> Int8,
        user_id -> Int8,
        /// Card item definition this card instantiates.
        card_id -> Int8,
        production_rate -> Int8,
        level -> Int4,
        total_exp -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
    }
}

diesel::table! {
    /// Owned consumable stacks, one row per (user, item definition).
    user_items (id) {
        id -> Int8,
        user_id -> Int8,
        item_id -> Int8,
        item_kind -> Int2,
        amount -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
    }
}

diesel::table! {
    /// Equipped decks. Append-only with soft delete; at most one live row
    /// per user.
    user_decks (id) {
        id -> Int8,
        user_id -> Int8,
        card_id_1 -> Int8,
        card_id_2 -> Int8,
        card_id_3 -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
        deleted_at -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Inbox rows. Claiming sets `deleted_at`.
    user_presents (id) {
        id -> Int8,
        user_id -> Int8,
        item_kind -> Int2,
        item_id -> Int8,
        amount -> Int8,
        message -> Text,
        sent_at -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
        deleted_at -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Per-(user, bonus) login-bonus progression.
    user_login_bonus_progress (id) {
        id -> Int8,
        user_id -> Int8,
        login_bonus_id -> Int8,
        sequence -> Int4,
        loop_count -> Int4,
        created_at -> Int8,
        updated_at -> Int8,
    }
}

diesel::table! {
    /// De-duplication receipts for global present distribution.
    user_global_present_receipts (id) {
        id -> Int8,
        user_id -> Int8,
        global_present_id -> Int8,
        received_at -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
    }
}

diesel::table! {
    /// Authenticated sessions. At most one live row per user.
    user_sessions (id) {
        id -> Int8,
        user_id -> Int8,
        session_id -> Text,
        expires_at -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
        deleted_at -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Single-use tokens. At most one live row per (user, kind).
    user_one_time_tokens (id) {
        id -> Int8,
        user_id -> Int8,
        token -> Text,
        token_kind -> Int2,
        expires_at -> Int8,
        created_at -> Int8,
        updated_at -> Int8,
        deleted_at -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Master versions; exactly one row is active at a time. The version
    /// column shares the table's name, so it is aliased on the Rust side.
    version (id) {
        id -> Int8,
        is_active -> Bool,
        #[sql_name = "version"]
        version_name -> Text,
    }
}

diesel::table! {
    /// Gacha definitions.
    gacha_definitions (id) {
        id -> Int8,
        name -> Text,
        start_at -> Int8,
        end_at -> Int8,
        display_order -> Int4,
    }
}

diesel::table! {
    /// Weighted gacha pool entries.
    gacha_item_definitions (id) {
        id -> Int8,
        gacha_id -> Int8,
        item_kind -> Int2,
        item_id -> Int8,
        amount -> Int8,
        weight -> Int8,
    }
}

diesel::table! {
    /// Item definitions; cards carry levelling stats, materials carry
    /// gained experience.
    item_definitions (id) {
        id -> Int8,
        item_kind -> Int2,
        name -> Text,
        production_rate -> Nullable<Int8>,
        max_level -> Nullable<Int4>,
        max_production_rate -> Nullable<Int8>,
        base_exp_per_level -> Nullable<Int8>,
        gained_exp -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Login-bonus schedules.
    login_bonus_definitions (id) {
        id -> Int8,
        start_at -> Int8,
        end_at -> Int8,
        column_count -> Int4,
        looped -> Bool,
    }
}

diesel::table! {
    /// Rewards keyed by (login bonus, sequence).
    login_bonus_reward_definitions (id) {
        id -> Int8,
        login_bonus_id -> Int8,
        sequence -> Int4,
        item_kind -> Int2,
        item_id -> Int8,
        amount -> Int8,
    }
}

diesel::table! {
    /// Globally-scheduled presents.
    global_present_definitions (id) {
        id -> Int8,
        open_at -> Int8,
        close_at -> Int8,
        item_kind -> Int2,
        item_id -> Int8,
        amount -> Int8,
        message -> Text,
    }
}
