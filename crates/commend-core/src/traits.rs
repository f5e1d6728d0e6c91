//! Repository traits for the commend platform core.
//!
//! These traits define the interfaces the durable relational store must
//! satisfy, enabling pluggable backends and synthetic-caller testing. Every
//! operation takes its caller identity explicitly; there is no ambient
//! session state.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::{Caller, RateLimiter};
use crate::models::*;
use crate::vote::VoteState;

// =============================================================================
// PAGINATION
// =============================================================================

/// Sort option for entity listings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    #[default]
    Recent,
    Upvotes,
    Alphabetical,
}

impl std::str::FromStr for SortOption {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "upvotes" => Ok(Self::Upvotes),
            "alphabetical" => Ok(Self::Alphabetical),
            _ => Err(format!("Invalid sort option: {}", s)),
        }
    }
}

/// Offset for 1-based `page` with `page_size` rows per page.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    (page.max(1) - 1) * page_size.max(1)
}

// =============================================================================
// ENTITY REPOSITORY
// =============================================================================

/// Request for creating an entity. The new entity starts `pending` and is
/// owned by the caller.
#[derive(Debug, Clone)]
pub struct CreateEntityRequest {
    pub name: String,
    pub slug: String,
    pub kind: EntityKind,
    pub keywords: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub category_ids: Vec<Uuid>,
}

/// Request for updating an entity. `None` fields are left untouched;
/// `category_ids`/`parent_ids` replace the full set atomically with the row
/// update.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntityRequest {
    pub name: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
    pub parent_ids: Option<Vec<Uuid>>,
}

/// Repository for entity lifecycle operations.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Create a new pending entity owned by the caller.
    async fn create(&self, caller: Option<&Caller>, req: CreateEntityRequest) -> Result<Uuid>;

    /// Fetch an entity by ID.
    async fn get(&self, id: Uuid) -> Result<Entity>;

    /// Fetch an entity by its globally unique slug.
    async fn get_by_slug(&self, slug: &str) -> Result<Entity>;

    /// Update an entity. Owner may edit while pending; elevated roles always.
    async fn update(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        req: UpdateEntityRequest,
    ) -> Result<()>;

    /// Change lifecycle status. Elevated roles only.
    async fn set_status(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        status: EntityStatus,
    ) -> Result<()>;

    /// Set or clear the featured flag. Elevated roles only.
    async fn set_featured(&self, caller: Option<&Caller>, id: Uuid, featured: bool) -> Result<()>;

    /// Check whether an entity exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

// =============================================================================
// RELATIONSHIP RESOLVER
// =============================================================================

/// Page of child entities with the filter-wide total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildrenPage {
    pub entities: Vec<Entity>,
    pub total: i64,
}

/// Caller-supplied location override for peer resolution. Fields fall back
/// to the entity's own stored city/state when absent.
#[derive(Debug, Clone, Default)]
pub struct LocationHint {
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Repository for the typed entity relationship graph.
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Link `child` under `parent`. The edge type is derived from the
    /// child's kind. Duplicate edges conflict; missing endpoints are errors.
    async fn link(&self, parent_id: Uuid, child_id: Uuid) -> Result<RelationshipEdge>;

    /// Remove the edge between `parent` and `child`.
    async fn unlink(&self, parent_id: Uuid, child_id: Uuid) -> Result<()>;

    /// All parents of an entity.
    async fn get_parents(&self, entity_id: Uuid) -> Result<Vec<Entity>>;

    /// Paginated children of a parent.
    async fn get_children(
        &self,
        parent_id: Uuid,
        page: i64,
        page_size: i64,
        sort: SortOption,
    ) -> Result<ChildrenPage>;

    /// Other published children of the entity's first parent, excluding the
    /// entity itself. Empty when the entity has no parent.
    async fn get_siblings(&self, entity_id: Uuid, limit: i64) -> Result<Vec<Entity>>;

    /// Other published entities sharing city (preferred) or state. The hint
    /// overrides the entity's stored location field by field.
    async fn get_location_peers(
        &self,
        entity_id: Uuid,
        hint: Option<&LocationHint>,
        limit: i64,
    ) -> Result<Vec<Entity>>;

    /// Up to 6 related entities: children, siblings, and location peers
    /// merged with child > sibling > location precedence.
    async fn get_related(
        &self,
        entity_id: Uuid,
        hint: Option<&LocationHint>,
    ) -> Result<Vec<RelatedEntity>>;
}

// =============================================================================
// ATTRIBUTE / TAG SCHEMA REGISTRY
// =============================================================================

/// Request for defining a review attribute.
#[derive(Debug, Clone)]
pub struct CreateAttributeRequest {
    pub entity_kind: EntityKind,
    pub name: String,
    pub label: String,
    pub category: String,
    pub display_order: i32,
    pub required: bool,
    pub metadata: AttributeMetadata,
}

/// Request for defining a review tag.
#[derive(Debug, Clone)]
pub struct CreateTagRequest {
    pub entity_kind: EntityKind,
    pub name: String,
    pub label: String,
    pub tag_type: TagType,
    pub category: String,
    pub color: String,
}

/// Per-entity-kind catalog of review attributes and tags.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Active attribute definitions for a kind, in display order.
    async fn attributes_for_kind(&self, kind: EntityKind) -> Result<Vec<ReviewAttribute>>;

    /// Active tag definitions for a kind.
    async fn tags_for_kind(&self, kind: EntityKind) -> Result<Vec<ReviewTag>>;

    /// Define a new attribute. Elevated roles only.
    async fn create_attribute(
        &self,
        caller: Option<&Caller>,
        req: CreateAttributeRequest,
    ) -> Result<Uuid>;

    /// Define a new tag. Elevated roles only.
    async fn create_tag(&self, caller: Option<&Caller>, req: CreateTagRequest) -> Result<Uuid>;

    /// Soft-retire an attribute definition. Elevated roles only.
    async fn deactivate_attribute(&self, caller: Option<&Caller>, id: Uuid) -> Result<()>;

    /// Soft-retire a tag definition. Elevated roles only.
    async fn deactivate_tag(&self, caller: Option<&Caller>, id: Uuid) -> Result<()>;
}

// =============================================================================
// REVIEW LEDGER
// =============================================================================

/// One submitted attribute answer.
#[derive(Debug, Clone)]
pub struct AttributeResponseInput {
    pub attribute_id: Uuid,
    pub value: AttributeValue,
}

/// Request for creating a review with its sub-records.
#[derive(Debug, Clone)]
pub struct CreateReviewRequest {
    pub entity_id: Uuid,
    pub rating: i16,
    pub title: String,
    pub content: String,
    pub anonymous: bool,
    pub has_evidence: bool,
    pub overall_satisfaction: Option<i16>,
    pub recommend_to_others: Option<bool>,
    pub experience_date: Option<NaiveDate>,
    pub attribute_responses: Vec<AttributeResponseInput>,
    pub tag_ids: Vec<Uuid>,
}

/// Request for updating a review. Attribute responses and tag selections are
/// replaced wholesale; the `edited` flag is set.
#[derive(Debug, Clone)]
pub struct UpdateReviewRequest {
    pub rating: i16,
    pub title: String,
    pub content: String,
    pub overall_satisfaction: Option<i16>,
    pub recommend_to_others: Option<bool>,
    pub experience_date: Option<NaiveDate>,
    pub attribute_responses: Vec<AttributeResponseInput>,
    pub tag_ids: Vec<Uuid>,
}

/// Page of reviews with the entity-wide total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub total: i64,
}

/// Repository for validated review CRUD. All multi-row writes are atomic.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Create a review plus its attribute responses and tag selections in
    /// one transaction. One review per (caller, entity).
    async fn create(&self, caller: Option<&Caller>, req: CreateReviewRequest) -> Result<Uuid>;

    /// Update a review, replacing its sub-records. Author or elevated only.
    async fn update(
        &self,
        caller: Option<&Caller>,
        review_id: Uuid,
        req: UpdateReviewRequest,
    ) -> Result<()>;

    /// Delete a review and its sub-records. Author or elevated only.
    async fn delete(&self, caller: Option<&Caller>, review_id: Uuid) -> Result<()>;

    /// Fetch a review by ID.
    async fn fetch(&self, review_id: Uuid) -> Result<Review>;

    /// List an entity's reviews, newest first.
    async fn list_for_entity(
        &self,
        entity_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> Result<ReviewPage>;

    /// Stored attribute responses for a review.
    async fn responses_for(&self, review_id: Uuid) -> Result<Vec<ReviewAttributeResponse>>;

    /// Selected tag IDs for a review.
    async fn tag_selections_for(&self, review_id: Uuid) -> Result<Vec<Uuid>>;
}

// =============================================================================
// VOTE LEDGERS
// =============================================================================

/// Result of a helpfulness vote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub new_state: VoteState,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
}

/// Repository for the per-(review, voter) helpfulness vote state machine.
#[async_trait]
pub trait ReviewVoteRepository: Send + Sync {
    /// Toggle the caller's vote on a review. One atomic read-check-write.
    async fn vote(
        &self,
        caller: Option<&Caller>,
        review_id: Uuid,
        vote_type: VoteType,
    ) -> Result<VoteOutcome>;

    /// The caller's current vote state on a review.
    async fn state_for(&self, review_id: Uuid, voter_id: Uuid) -> Result<VoteState>;
}

/// Result of an entity upvote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvoteOutcome {
    /// True when the upvote was applied, false when it was removed.
    pub applied: bool,
    pub upvote_count: i64,
}

/// Repository for per-(voter, entity) upvotes.
#[async_trait]
pub trait UpvoteRepository: Send + Sync {
    /// Toggle the caller's upvote, consulting the external rate limiter.
    async fn toggle(
        &self,
        caller: Option<&Caller>,
        entity_id: Uuid,
        limiter: &dyn RateLimiter,
    ) -> Result<UpvoteOutcome>;

    /// Total upvotes for an entity.
    async fn count_for(&self, entity_id: Uuid) -> Result<i64>;

    /// Which of `entity_ids` the voter has upvoted. Single batch query.
    async fn upvoted_set(&self, voter_id: Uuid, entity_ids: &[Uuid]) -> Result<HashSet<Uuid>>;
}

// =============================================================================
// AGGREGATION ENGINE
// =============================================================================

/// Read-side statistics over one entity's reviews.
#[async_trait]
pub trait AggregationRepository: Send + Sync {
    /// Star-rating distribution with total and rounded mean.
    async fn rating_distribution(&self, entity_id: Uuid) -> Result<RatingDistribution>;

    /// Per-attribute statistics; zero-response attributes are omitted.
    async fn attribute_stats(&self, entity_id: Uuid) -> Result<Vec<AttributeStat>>;

    /// Per-tag selection statistics against the total review count.
    async fn tag_stats(&self, entity_id: Uuid) -> Result<Vec<TagStat>>;
}

// =============================================================================
// RANKING ENGINE
// =============================================================================

/// Time-windowed ranking over published entities.
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// Today's upvotes, count descending.
    async fn rank_today(&self, limit: i64) -> Result<Vec<RankedEntity>>;

    /// Entities by stored daily ranking ordinal, rank 1 first.
    async fn rank_yesterday(&self, limit: i64) -> Result<Vec<RankedEntity>>;

    /// Month window: `upvotes + avg_rating * month weight`.
    async fn rank_this_month(&self, limit: i64) -> Result<Vec<RankedEntity>>;

    /// Trailing window over recently created entities:
    /// `upvotes + avg_rating * trending weight`.
    async fn rank_trending(&self, window_days: i64, limit: i64) -> Result<Vec<RankedEntity>>;

    /// Out-of-band batch: persist ordinals 1..=n from yesterday's upvotes.
    async fn assign_daily_rankings(&self, top_n: i64) -> Result<u64>;
}

// =============================================================================
// ENRICHMENT & PAGINATION FAÇADE
// =============================================================================

/// AND-combined directory filters. All optional.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFilter {
    /// Case-insensitive name substring.
    pub query: Option<String>,
    pub kind: Option<EntityKind>,
    pub state: Option<String>,
    pub city: Option<String>,
    /// Honored only for elevated callers; everyone else sees published.
    pub status: Option<EntityStatus>,
}

/// One page of enriched directory results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryPage {
    pub entities: Vec<EnrichedEntity>,
    pub total: i64,
    pub facets: DirectoryFacets,
}

/// Top-level directory listing consumed by the presentation layer.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Filtered, sorted, paginated listing with batch enrichment: one
    /// upvoted-set lookup and one category lookup per page, regardless of
    /// page size.
    async fn list(
        &self,
        filter: DirectoryFilter,
        sort: SortOption,
        page: i64,
        page_size: i64,
        caller: Option<&Caller>,
    ) -> Result<DirectoryPage>;
}
