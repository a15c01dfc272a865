//! Weighted lottery.
//!
//! Each draw picks one pool entry with probability proportional to its
//! weight. A [`GachaPool`] pairs the entries with their total weight,
//! summed once at construction, so drawing never re-walks the pool to
//! find the roll range. Selection is split into a pure bucket walk over
//! a pre-summed roll, so the distribution is testable without a random
//! source, and a thin sampling wrapper generic over [`rand::Rng`].

use rand::Rng;

use super::error::Error;
use super::master::GachaItemDefinition;

/// A gacha's item pool with its total selection weight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GachaPool {
    entries: Vec<GachaItemDefinition>,
    total_weight: i64,
}

impl GachaPool {
    /// Build a pool, summing the entry weights once.
    pub fn new(entries: Vec<GachaItemDefinition>) -> Self {
        let total_weight = entries.iter().map(|entry| entry.weight).sum();
        Self {
            entries,
            total_weight,
        }
    }

    pub fn entries(&self) -> &[GachaItemDefinition] {
        &self.entries
    }

    /// Sum of the pool's selection weights, fixed at construction.
    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index of the pool entry whose cumulative-weight bucket contains `roll`.
///
/// `roll` must lie in `[0, total_weight)`. Entries with zero weight own an
/// empty bucket and can never be selected.
pub fn select_index(pool: &[GachaItemDefinition], roll: i64) -> Option<usize> {
    let mut boundary = 0i64;
    for (index, entry) in pool.iter().enumerate() {
        boundary += entry.weight;
        if roll < boundary {
            return Some(index);
        }
    }
    None
}

/// Draw `count` entries independently (with replacement) from `pool`.
///
/// Fails with [`Error::GachaNotFound`] when the pool is empty or carries no
/// positive weight, since such a gacha can never produce a result.
pub fn draw_many<'a, R: Rng>(
    rng: &mut R,
    gacha_id: i64,
    pool: &'a GachaPool,
    count: usize,
) -> Result<Vec<&'a GachaItemDefinition>, Error> {
    let total = pool.total_weight();
    if total <= 0 {
        return Err(Error::GachaNotFound(gacha_id));
    }

    let entries = pool.entries();
    let mut drawn = Vec::with_capacity(count);
    for _ in 0..count {
        let roll = rng.gen_range(0..total);
        // The roll is below the total, so a bucket always matches.
        let index = select_index(entries, roll).unwrap_or(entries.len() - 1);
        drawn.push(&entries[index]);
    }
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rstest::rstest;

    use super::*;
    use crate::domain::master::ItemKind;

    fn entry(id: i64, weight: i64) -> GachaItemDefinition {
        GachaItemDefinition {
            id,
            gacha_id: 1,
            kind: ItemKind::Card,
            item_id: id * 10,
            amount: 1,
            weight,
        }
    }

    #[rstest]
    #[case(0, Some(0))]
    #[case(1, Some(1))]
    #[case(2, Some(1))]
    #[case(3, Some(1))]
    #[case(4, None)]
    fn buckets_partition_the_weight_range(#[case] roll: i64, #[case] expected: Option<usize>) {
        // A weighs 1, B weighs 3: rolls 0 => A, 1..=3 => B.
        let pool = vec![entry(1, 1), entry(2, 3)];
        assert_eq!(select_index(&pool, roll), expected);
    }

    #[rstest]
    fn total_weight_is_summed_at_construction() {
        let pool = GachaPool::new(vec![entry(1, 1), entry(2, 3)]);
        assert_eq!(pool.total_weight(), 4);
        assert_eq!(pool.entries().len(), 2);

        let empty = GachaPool::new(Vec::new());
        assert_eq!(empty.total_weight(), 0);
        assert!(empty.is_empty());
    }

    #[rstest]
    fn zero_weight_entries_are_never_selected() {
        let pool = GachaPool::new(vec![entry(1, 0), entry(2, 5), entry(3, 0)]);
        for roll in 0..pool.total_weight() {
            assert_eq!(select_index(pool.entries(), roll), Some(1));
        }
    }

    #[rstest]
    fn empty_or_weightless_pools_cannot_be_drawn() {
        let mut rng = SmallRng::seed_from_u64(7);

        let empty = GachaPool::new(Vec::new());
        assert!(matches!(
            draw_many(&mut rng, 9, &empty, 1),
            Err(Error::GachaNotFound(9))
        ));

        let weightless = GachaPool::new(vec![entry(1, 0), entry(2, 0)]);
        assert!(matches!(
            draw_many(&mut rng, 9, &weightless, 1),
            Err(Error::GachaNotFound(9))
        ));
    }

    #[rstest]
    fn draws_roughly_follow_the_weights() {
        let pool = GachaPool::new(vec![entry(1, 1), entry(2, 3)]);
        let mut rng = SmallRng::seed_from_u64(42);
        let drawn = draw_many(&mut rng, 1, &pool, 4000).unwrap();

        let heavy = drawn.iter().filter(|e| e.id == 2).count();
        // Expected 3000 of 4000; allow generous slack for the fixed seed.
        assert!((2700..=3300).contains(&heavy), "heavy draws: {heavy}");
    }
}
