//! Helpfulness vote toggle state machine.
//!
//! Transition planning is pure; the database layer executes a plan inside a
//! single transaction so counters never drift from vote-row existence.

use serde::{Deserialize, Serialize};

use crate::models::VoteType;

/// A voter's current standing on one review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    #[default]
    None,
    Helpful,
    NotHelpful,
}

impl From<VoteType> for VoteState {
    fn from(v: VoteType) -> Self {
        match v {
            VoteType::Helpful => VoteState::Helpful,
            VoteType::NotHelpful => VoteState::NotHelpful,
        }
    }
}

/// Row-level action the store must take for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRowAction {
    Insert,
    Delete,
    /// Update the row's vote type in place.
    Switch,
}

/// The effect of one toggle: a row action plus counter deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePlan {
    pub action: VoteRowAction,
    pub helpful_delta: i32,
    pub not_helpful_delta: i32,
    pub new_state: VoteState,
}

/// Plan the transition from `current` when the voter clicks `requested`.
///
/// - `none -> X`: insert, increment X.
/// - `X -> X`: delete, decrement X (toggle off).
/// - `X -> Y`: switch, decrement X, increment Y.
pub fn plan_transition(current: VoteState, requested: VoteType) -> VotePlan {
    let requested_state = VoteState::from(requested);
    if current == VoteState::None {
        let (h, n) = match requested {
            VoteType::Helpful => (1, 0),
            VoteType::NotHelpful => (0, 1),
        };
        return VotePlan {
            action: VoteRowAction::Insert,
            helpful_delta: h,
            not_helpful_delta: n,
            new_state: requested_state,
        };
    }
    if current == requested_state {
        let (h, n) = match requested {
            VoteType::Helpful => (-1, 0),
            VoteType::NotHelpful => (0, -1),
        };
        return VotePlan {
            action: VoteRowAction::Delete,
            helpful_delta: h,
            not_helpful_delta: n,
            new_state: VoteState::None,
        };
    }
    let (h, n) = match requested {
        VoteType::Helpful => (1, -1),
        VoteType::NotHelpful => (-1, 1),
    };
    VotePlan {
        action: VoteRowAction::Switch,
        helpful_delta: h,
        not_helpful_delta: n,
        new_state: requested_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_to_helpful_inserts() {
        let plan = plan_transition(VoteState::None, VoteType::Helpful);
        assert_eq!(plan.action, VoteRowAction::Insert);
        assert_eq!(plan.helpful_delta, 1);
        assert_eq!(plan.not_helpful_delta, 0);
        assert_eq!(plan.new_state, VoteState::Helpful);
    }

    #[test]
    fn test_double_toggle_returns_to_none() {
        // helpful then helpful again: net counter change is zero.
        let first = plan_transition(VoteState::None, VoteType::Helpful);
        let second = plan_transition(first.new_state, VoteType::Helpful);
        assert_eq!(second.action, VoteRowAction::Delete);
        assert_eq!(second.new_state, VoteState::None);
        assert_eq!(first.helpful_delta + second.helpful_delta, 0);
        assert_eq!(first.not_helpful_delta + second.not_helpful_delta, 0);
    }

    #[test]
    fn test_switch_conserves_total() {
        // helpful then not_helpful: total votes stay at 1.
        let first = plan_transition(VoteState::None, VoteType::Helpful);
        let second = plan_transition(first.new_state, VoteType::NotHelpful);
        assert_eq!(second.action, VoteRowAction::Switch);
        assert_eq!(second.helpful_delta, -1);
        assert_eq!(second.not_helpful_delta, 1);
        let total = (first.helpful_delta + second.helpful_delta)
            + (first.not_helpful_delta + second.not_helpful_delta);
        assert_eq!(total, 1);
        assert_eq!(second.new_state, VoteState::NotHelpful);
    }

    #[test]
    fn test_all_transitions_exhaustively() {
        for current in [VoteState::None, VoteState::Helpful, VoteState::NotHelpful] {
            for requested in [VoteType::Helpful, VoteType::NotHelpful] {
                let plan = plan_transition(current, requested);
                // Deltas are each -1, 0, or 1 and never both nonzero in the
                // same direction.
                assert!(plan.helpful_delta.abs() <= 1);
                assert!(plan.not_helpful_delta.abs() <= 1);
                // New state matches the row action.
                match plan.action {
                    VoteRowAction::Delete => assert_eq!(plan.new_state, VoteState::None),
                    VoteRowAction::Insert | VoteRowAction::Switch => {
                        assert_eq!(plan.new_state, VoteState::from(requested))
                    }
                }
            }
        }
    }
}
