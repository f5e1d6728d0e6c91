//! Caller identity and permission predicates.
//!
//! The core has no ambient "current user": every operation receives an
//! explicit optional [`Caller`] resolved by the external identity provider.
//! Mutation gating is expressed as pure predicates consumed uniformly by the
//! entity-edit, review-edit, and status-change paths.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::EntityStatus;

/// Role assigned by the identity provider.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Maintainer,
    Admin,
}

impl Role {
    /// Elevated roles may mutate resources they do not own.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Maintainer | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Maintainer => write!(f, "maintainer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "maintainer" => Ok(Self::Maintainer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Reject anonymous access to an authenticated operation.
pub fn require_caller(caller: Option<&Caller>) -> Result<&Caller> {
    caller.ok_or_else(|| Error::Unauthenticated("caller identity required".to_string()))
}

/// Whether `caller` may mutate an entity owned by `owner_id` in `status`.
///
/// Owners may edit only while the entity is pending; elevated roles may edit
/// regardless of status.
pub fn can_mutate_entity(caller: &Caller, owner_id: Uuid, status: EntityStatus) -> bool {
    if caller.role.is_elevated() {
        return true;
    }
    caller.id == owner_id && status == EntityStatus::Pending
}

/// Whether `caller` may mutate a review authored by `author_id`.
pub fn can_mutate_review(caller: &Caller, author_id: Uuid) -> bool {
    caller.role.is_elevated() || caller.id == author_id
}

/// Outcome of the external rate-limit collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Seconds until retry when denied; 0 when allowed.
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs,
        }
    }
}

/// Pass/fail contract of the external rate limiter. Policy internals live
/// outside the core; only the decision is consumed.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, caller: &Caller, action: &str) -> RateLimitDecision;
}

/// Rate limiter that admits everything. Used in tests and for deployments
/// that enforce limits at the edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait::async_trait]
impl RateLimiter for Unlimited {
    async fn check(&self, _caller: &Caller, _action: &str) -> RateLimitDecision {
        RateLimitDecision::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Caller {
        Caller::new(Uuid::new_v4(), Role::User)
    }

    #[test]
    fn test_require_caller_rejects_anonymous() {
        assert!(matches!(
            require_caller(None),
            Err(Error::Unauthenticated(_))
        ));
        let c = user();
        assert!(require_caller(Some(&c)).is_ok());
    }

    #[test]
    fn test_owner_may_edit_only_while_pending() {
        let owner = user();
        assert!(can_mutate_entity(&owner, owner.id, EntityStatus::Pending));
        assert!(!can_mutate_entity(&owner, owner.id, EntityStatus::InReview));
        assert!(!can_mutate_entity(&owner, owner.id, EntityStatus::Published));
        assert!(!can_mutate_entity(&owner, owner.id, EntityStatus::Rejected));
    }

    #[test]
    fn test_non_owner_user_never_edits() {
        let caller = user();
        let other = Uuid::new_v4();
        assert!(!can_mutate_entity(&caller, other, EntityStatus::Pending));
    }

    #[test]
    fn test_elevated_roles_edit_regardless_of_status() {
        let other = Uuid::new_v4();
        for role in [Role::Maintainer, Role::Admin] {
            let caller = Caller::new(Uuid::new_v4(), role);
            for status in [
                EntityStatus::Pending,
                EntityStatus::InReview,
                EntityStatus::Published,
                EntityStatus::Rejected,
            ] {
                assert!(can_mutate_entity(&caller, other, status));
            }
        }
    }

    #[test]
    fn test_review_mutation_author_or_elevated() {
        let author = user();
        assert!(can_mutate_review(&author, author.id));
        assert!(!can_mutate_review(&author, Uuid::new_v4()));
        let admin = Caller::new(Uuid::new_v4(), Role::Admin);
        assert!(can_mutate_review(&admin, Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_unlimited_rate_limiter_allows() {
        let decision = Unlimited.check(&user(), "upvote").await;
        assert!(decision.allowed);
        assert_eq!(decision.retry_after_secs, 0);
    }
}
