//! Login-bonus progression.
//!
//! A bonus schedule is a column of sequenced rewards. One advance happens
//! per bonus per rewarded login: first-time users start at sequence 1, a
//! finished looping schedule wraps to sequence 1 and bumps the loop count,
//! and a finished non-looping schedule stops granting entirely.

use super::master::LoginBonusDefinition;
use super::model::LoginBonusProgress;

/// Outcome of advancing one bonus schedule by one login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The schedule moved to `sequence`; the reward at that sequence is
    /// due.
    Progressed { sequence: i32, loop_count: i32 },
    /// A non-looping schedule has already handed out its last column.
    Completed,
}

/// Advance `progress` through `bonus` by one rewarded login.
///
/// `progress` is the stored state before this login, or `None` for a user
/// seeing this bonus for the first time.
pub fn advance(bonus: &LoginBonusDefinition, progress: Option<&LoginBonusProgress>) -> Advance {
    let Some(progress) = progress else {
        return Advance::Progressed {
            sequence: 1,
            loop_count: 1,
        };
    };

    if progress.sequence < bonus.column_count {
        return Advance::Progressed {
            sequence: progress.sequence + 1,
            loop_count: progress.loop_count,
        };
    }

    if bonus.looped {
        Advance::Progressed {
            sequence: 1,
            loop_count: progress.loop_count + 1,
        }
    } else {
        Advance::Completed
    }
}
