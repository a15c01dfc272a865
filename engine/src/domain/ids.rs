//! Process-local identifier generation.
//!
//! Identifiers are globally unique, monotonically non-decreasing within a
//! process, and derived from wall-clock time plus a per-process salt plus a
//! fixed stride. The salt keeps concurrent processes from colliding; the
//! stride keeps the sequence strictly increasing without coordination.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Increment applied per generated identifier.
const ID_STRIDE: i64 = 7;

/// Generator of row identifiers for every per-user table.
#[derive(Debug)]
pub struct IdGenerator {
    salt: i64,
    next: AtomicI64,
}

impl IdGenerator {
    /// Create a generator seeded lazily from the wall clock on first use.
    pub fn new(salt: i64) -> Self {
        Self {
            salt,
            next: AtomicI64::new(0),
        }
    }

    /// Produce the next identifier.
    pub fn generate(&self) -> i64 {
        if self.next.load(Ordering::Relaxed) == 0 {
            let base = unix_seconds() * 1000 + self.salt;
            // Another thread may win the seed race; both outcomes are valid.
            let _ = self
                .next
                .compare_exchange(0, base, Ordering::Relaxed, Ordering::Relaxed);
        }
        self.next.fetch_add(ID_STRIDE, Ordering::Relaxed) + ID_STRIDE
    }
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
