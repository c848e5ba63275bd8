//! Per-intent confirmation state machine.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Confirmation progress for one intent.
///
/// ```text
/// Created ──► Confirming ──► Succeeded
///    │           │  ▲
///    │           ▼  │
///    │         Failed ──► Canceled
///    └──────────────────► Canceled
/// ```
///
/// A failed confirmation may be retried on the same intent. Abandonment at
/// any non-terminal point is `Canceled`, never `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    #[default]
    Created,
    Confirming,
    Succeeded,
    Failed,
    Canceled,
}

impl StateMachine for ConfirmationState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConfirmationState::*;
        matches!(
            (self, target),
            (Created, Confirming)
                | (Created, Canceled)
                | (Confirming, Succeeded)
                | (Confirming, Failed)
                | (Confirming, Canceled)
                | (Failed, Confirming)
                | (Failed, Canceled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConfirmationState::*;
        match self {
            Created => vec![Confirming, Canceled],
            Confirming => vec![Succeeded, Failed, Canceled],
            Failed => vec![Confirming, Canceled],
            Succeeded | Canceled => vec![],
        }
    }
}

impl ConfirmationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationState::Created => "created",
            ConfirmationState::Confirming => "confirming",
            ConfirmationState::Succeeded => "succeeded",
            ConfirmationState::Failed => "failed",
            ConfirmationState::Canceled => "canceled",
        }
    }
}
