//! Lease lifecycle.
//!
//! ```text
//! Unacquired -> Acquiring -> Healthy -> InUse -> Released
//!                   |   ^                  |
//!                   v   |                  +-> RolledBack -> Released
//!                  Retry
//!                   |
//!                   v
//!                 Failed
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    Unacquired,
    Acquiring,
    /// The last checked-out connection failed its probe; another attempt follows.
    Retry,
    Healthy,
    InUse,
    RolledBack,
    Released,
    /// The retry budget was spent without a healthy connection.
    Failed,
}

impl LeaseState {
    pub fn can_transition_to(self, next: LeaseState) -> bool {
        use LeaseState::*;

        matches!(
            (self, next),
            (Unacquired, Acquiring)
                | (Acquiring, Healthy)
                | (Acquiring, Retry)
                | (Acquiring, Failed)
                | (Retry, Acquiring)
                | (Healthy, InUse)
                | (InUse, Released)
                | (InUse, RolledBack)
                | (RolledBack, Released)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LeaseState::Released | LeaseState::Failed)
    }

    /// A connection released from this state may hold an open transaction
    /// and must be rolled back before it is handed out again.
    pub fn needs_rollback_on_release(self) -> bool {
        self == LeaseState::InUse
    }
}
