//! Global-present distribution.
//!
//! Scheduled rewards are materialised lazily into a user's inbox on login.
//! Each materialisation writes a receipt row in the same transaction, and
//! the receipt set is the only de-duplication key, so re-running the
//! distributor for a user is idempotent.

use super::ids::IdGenerator;
use super::master::GlobalPresentDefinition;
use super::model::{GlobalPresentReceipt, Lifecycle, Present};

/// Inbox rows and receipts to write for one distribution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    pub presents: Vec<Present>,
    pub receipts: Vec<GlobalPresentReceipt>,
}

/// Materialise every active definition the user has no receipt for.
pub fn distribute(
    active: &[&GlobalPresentDefinition],
    received_ids: &[i64],
    ids: &IdGenerator,
    user_id: i64,
    now: i64,
) -> Distribution {
    let mut distribution = Distribution::default();
    for definition in active {
        if received_ids.contains(&definition.id) {
            continue;
        }
        distribution.presents.push(Present {
            id: ids.generate(),
            user_id,
            kind: definition.kind,
            item_id: definition.item_id,
            amount: definition.amount,
            message: definition.message.clone(),
            sent_at: now,
            created_at: now,
            updated_at: now,
            state: Lifecycle::Live,
        });
        distribution.receipts.push(GlobalPresentReceipt {
            id: ids.generate(),
            user_id,
            global_present_id: definition.id,
            received_at: now,
            created_at: now,
            updated_at: now,
        });
    }
    distribution
}
