//! Reward ledger.
//!
//! Every reward-granting pipeline funnels its grants through an
//! [`Obtainer`], which validates each grant against the master snapshot and
//! accumulates a single [`LedgerBatch`]. The batch commits atomically in a
//! fixed order (currency, then cards, then materials) inside the same store
//! transaction as the pipeline's own writes, so a failure anywhere leaves
//! no partial reward behind.

use super::error::Error;
use super::grant::Grant;
use super::ids::IdGenerator;
use super::master::ItemKind;
use super::master_cache::MasterSnapshot;
use super::model::{UserCard, UserItem};

/// One material (or booster) quantity to merge into the user's stacks.
///
/// `row_id` is used only when no stack for `item_id` exists yet and a new
/// row must be inserted; otherwise the existing stack is incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialGrant {
    pub row_id: i64,
    pub item_id: i64,
    pub kind: ItemKind,
    pub amount: i64,
}

/// Everything one pipeline awards, committed atomically.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerBatch {
    pub user_id: i64,
    pub now: i64,
    /// Net currency delta across the batch.
    pub coin_total: i64,
    /// Fully-formed card rows to insert.
    pub new_cards: Vec<UserCard>,
    /// Stack increments, in grant order, at most one per item.
    pub materials: Vec<MaterialGrant>,
}

impl LedgerBatch {
    /// Whether the batch awards anything at all.
    pub fn is_empty(&self) -> bool {
        self.coin_total == 0 && self.new_cards.is_empty() && self.materials.is_empty()
    }
}

/// What the store actually wrote when committing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerOutcome {
    pub coins_granted: i64,
    pub cards: Vec<UserCard>,
    /// Material stacks after the merge, with final quantities.
    pub items: Vec<UserItem>,
}

/// Accumulates validated grants into a [`LedgerBatch`].
#[derive(Debug)]
pub struct Obtainer<'a> {
    snapshot: &'a MasterSnapshot,
    ids: &'a IdGenerator,
    batch: LedgerBatch,
}

impl<'a> Obtainer<'a> {
    pub fn new(snapshot: &'a MasterSnapshot, ids: &'a IdGenerator, user_id: i64, now: i64) -> Self {
        Self {
            snapshot,
            ids,
            batch: LedgerBatch {
                user_id,
                now,
                ..LedgerBatch::default()
            },
        }
    }

    /// Validate and stage one grant.
    pub fn add(&mut self, grant: Grant) -> Result<(), Error> {
        match grant {
            Grant::Currency { amount } => {
                self.batch.coin_total += amount;
            }
            Grant::Card { card_id } => {
                let definition = self.snapshot.item(card_id)?;
                if definition.kind != ItemKind::Card {
                    return Err(Error::InvalidItemType {
                        item_id: card_id,
                        actual: definition.kind,
                        expected: "card",
                    });
                }
                let stats = self.snapshot.card_stats(card_id)?;
                self.batch.new_cards.push(UserCard {
                    id: self.ids.generate(),
                    user_id: self.batch.user_id,
                    card_id,
                    production_rate: stats.base_production_rate,
                    level: 1,
                    total_exp: 0,
                    created_at: self.batch.now,
                    updated_at: self.batch.now,
                });
            }
            Grant::Material {
                item_id,
                kind,
                amount,
            } => {
                let definition = self.snapshot.item(item_id)?;
                if definition.kind != kind || !kind.is_material() {
                    return Err(Error::InvalidItemType {
                        item_id,
                        actual: definition.kind,
                        expected: "material",
                    });
                }
                // One staged grant per item: repeated grants of the same
                // material fold into a single stack increment.
                match self
                    .batch
                    .materials
                    .iter_mut()
                    .find(|staged| staged.item_id == item_id)
                {
                    Some(staged) => staged.amount += amount,
                    None => self.batch.materials.push(MaterialGrant {
                        row_id: self.ids.generate(),
                        item_id,
                        kind,
                        amount,
                    }),
                }
            }
        }
        Ok(())
    }

    /// Validate and stage a sequence of grants.
    pub fn add_all(&mut self, grants: impl IntoIterator<Item = Grant>) -> Result<(), Error> {
        for grant in grants {
            self.add(grant)?;
        }
        Ok(())
    }

    /// The accumulated batch, ready to commit.
    pub fn finish(self) -> LedgerBatch {
        self.batch
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::master_cache::MasterDataCache;
    use crate::test_support::masters;

    fn snapshot() -> std::sync::Arc<MasterSnapshot> {
        let cache = MasterDataCache::new();
        cache.install(masters::bundle());
        cache.snapshot()
    }

    #[rstest]
    fn grants_accumulate_into_one_batch() {
        let snapshot = snapshot();
        let ids = IdGenerator::new(1);
        let mut obtainer = Obtainer::new(&snapshot, &ids, 42, masters::NOW);

        obtainer
            .add_all([
                Grant::Currency { amount: 300 },
                Grant::Currency { amount: 200 },
                Grant::Card {
                    card_id: masters::CARD_ITEM_ID,
                },
                Grant::Material {
                    item_id: masters::MATERIAL_ITEM_ID,
                    kind: ItemKind::ExpMaterial,
                    amount: 3,
                },
            ])
            .unwrap();
        let batch = obtainer.finish();

        assert_eq!(batch.coin_total, 500);
        assert_eq!(batch.new_cards.len(), 1);
        assert_eq!(batch.materials.len(), 1);
        assert!(!batch.is_empty());

        let card = &batch.new_cards[0];
        assert_eq!(card.user_id, 42);
        assert_eq!(card.level, 1);
        assert_eq!(card.total_exp, 0);
        assert_eq!(
            card.production_rate,
            snapshot
                .card_stats(masters::CARD_ITEM_ID)
                .unwrap()
                .base_production_rate
        );
    }

    #[rstest]
    fn repeated_material_grants_merge_into_one_stack_increment() {
        let snapshot = snapshot();
        let ids = IdGenerator::new(1);
        let mut obtainer = Obtainer::new(&snapshot, &ids, 42, masters::NOW);

        obtainer
            .add_all([
                Grant::Material {
                    item_id: masters::MATERIAL_ITEM_ID,
                    kind: ItemKind::ExpMaterial,
                    amount: 2,
                },
                Grant::Material {
                    item_id: masters::MATERIAL_ITEM_ID,
                    kind: ItemKind::ExpMaterial,
                    amount: 3,
                },
            ])
            .unwrap();
        let batch = obtainer.finish();

        assert_eq!(batch.materials.len(), 1);
        assert_eq!(batch.materials[0].item_id, masters::MATERIAL_ITEM_ID);
        assert_eq!(batch.materials[0].amount, 5);
    }

    #[rstest]
    fn card_grants_reject_non_card_definitions() {
        let snapshot = snapshot();
        let ids = IdGenerator::new(1);
        let mut obtainer = Obtainer::new(&snapshot, &ids, 42, masters::NOW);

        let error = obtainer
            .add(Grant::Card {
                card_id: masters::MATERIAL_ITEM_ID,
            })
            .unwrap_err();
        assert!(matches!(error, Error::InvalidItemType { .. }));
    }

    #[rstest]
    fn material_grants_reject_mismatched_kinds() {
        let snapshot = snapshot();
        let ids = IdGenerator::new(1);
        let mut obtainer = Obtainer::new(&snapshot, &ids, 42, masters::NOW);

        let error = obtainer
            .add(Grant::Material {
                item_id: masters::CARD_ITEM_ID,
                kind: ItemKind::ExpMaterial,
                amount: 1,
            })
            .unwrap_err();
        assert!(matches!(error, Error::InvalidItemType { .. }));
    }

    #[rstest]
    fn unknown_definitions_fail_the_whole_grant() {
        let snapshot = snapshot();
        let ids = IdGenerator::new(1);
        let mut obtainer = Obtainer::new(&snapshot, &ids, 42, masters::NOW);

        assert!(matches!(
            obtainer.add(Grant::Card { card_id: 9999 }),
            Err(Error::ItemNotFound(9999))
        ));
    }
}
