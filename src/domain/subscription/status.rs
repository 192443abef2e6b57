//! Subscription status state machine.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Subscription lifecycle status.
///
/// # State Diagram
///
/// ```text
/// Trial ──────────┬──> Active <──────┐
///   │             │      │           │
///   │             │      v           │
///   │             │  GracePeriod ────┤
///   │             │      │           │
///   v             v      v           │
/// Expired <── Cancelled <┴───────────┘
/// ```
///
/// `Cancelled` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Trying the product before the first charge.
    ///
    /// Converts to Active at trial end if the conversion charge succeeds;
    /// expires otherwise. Trials have no grace period.
    Trial,

    /// Paid and current.
    Active,

    /// A renewal charge failed; service continues while retries run.
    GracePeriod,

    /// Ended by customer request. Terminal.
    Cancelled,

    /// Ended by the engine (trial lapse or grace lapse). Terminal.
    Expired,
}

impl SubscriptionStatus {
    /// Returns true if this status grants access to paid features.
    ///
    /// Grace period retains access so a single failed charge does not
    /// interrupt service.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Trial
                | SubscriptionStatus::Active
                | SubscriptionStatus::GracePeriod
        )
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From TRIAL
            (Trial, Active) | (Trial, Cancelled) | (Trial, Expired)
            // From ACTIVE
            | (Active, GracePeriod) | (Active, Cancelled)
            // From GRACE_PERIOD
            | (GracePeriod, Active) | (GracePeriod, Cancelled) | (GracePeriod, Expired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Trial => vec![Active, Cancelled, Expired],
            Active => vec![GracePeriod, Cancelled],
            GracePeriod => vec![Active, Cancelled, Expired],
            Cancelled => vec![],
            Expired => vec![],
        }
    }
}
