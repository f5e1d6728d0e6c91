//! # commend-core
//!
//! Core types, traits, and abstractions for the commend directory/review
//! platform.
//!
//! This crate provides the foundational data structures, the error taxonomy,
//! identity/permission predicates, and the trait definitions the store layer
//! implements.

pub mod error;
pub mod identity;
pub mod logging;
pub mod models;
pub mod ranking;
pub mod traits;
pub mod validation;
pub mod vote;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use identity::{
    can_mutate_entity, can_mutate_review, require_caller, Caller, RateLimitDecision, RateLimiter,
    Role, Unlimited,
};
pub use models::*;
pub use ranking::{round_rating, RankingWeights, RankingWindow};
pub use traits::*;
pub use validation::{
    validate_attribute_value, validate_entity_name, validate_review_fields, validate_slug,
    MAX_CONTENT_LEN, MAX_NAME_LEN, MAX_TITLE_LEN,
};
pub use vote::{plan_transition, VotePlan, VoteRowAction, VoteState};
