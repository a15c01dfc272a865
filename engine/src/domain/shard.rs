//! User-shard routing.
//!
//! Per-user state is horizontally partitioned by `user_id mod N`, where `N`
//! is the number of configured shards. The router owns one handle per shard
//! and resolves the owner for a user; the mapping is stable for the life of
//! the deployment, so the shard list must never be reordered.

/// Routes user identifiers onto a fixed, ordered set of shard handles.
#[derive(Debug, Clone)]
pub struct ShardRouter<S> {
    shards: Vec<S>,
}

impl<S> ShardRouter<S> {
    /// Build a router over an ordered, non-empty shard list.
    ///
    /// # Panics
    /// Panics if `shards` is empty; a deployment without shards cannot
    /// serve any user.
    pub fn new(shards: Vec<S>) -> Self {
        assert!(!shards.is_empty(), "shard list must not be empty");
        Self { shards }
    }

    /// Index of the shard owning `user_id`.
    pub fn shard_index(&self, user_id: i64) -> usize {
        (user_id.rem_euclid(self.shards.len() as i64)) as usize
    }

    /// Handle of the shard owning `user_id`.
    pub fn shard_for(&self, user_id: i64) -> &S {
        &self.shards[self.shard_index(user_id)]
    }

    /// All shard handles, in configuration order.
    pub fn shards(&self) -> &[S] {
        &self.shards
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Whether the router has no shards. Always false by construction.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
