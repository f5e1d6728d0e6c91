//! Data model types for the commend directory platform.
//!
//! Every enum stored in the database is persisted as lowercase/snake_case
//! TEXT; `Display`/`FromStr` round-trip the stored form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Kind of directory entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Department,
    Organization,
    Infrastructure,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Department => write!(f, "department"),
            Self::Organization => write!(f, "organization"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "person" => Ok(Self::Person),
            "department" => Ok(Self::Department),
            "organization" => Ok(Self::Organization),
            "infrastructure" => Ok(Self::Infrastructure),
            _ => Err(format!("Invalid entity kind: {}", s)),
        }
    }
}

/// Lifecycle status of an entity.
///
/// Entities are soft-retired by moving to `Rejected`, never hard-deleted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    #[default]
    Pending,
    InReview,
    Published,
    Rejected,
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InReview => write!(f, "in_review"),
            Self::Published => write!(f, "published"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_review" => Ok(Self::InReview),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid entity status: {}", s)),
        }
    }
}

/// A directory entity: a person, department, organization, or piece of
/// infrastructure that can be reviewed and upvoted.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    /// Globally unique URL-safe identifier.
    pub slug: String,
    pub kind: EntityKind,
    pub status: EntityStatus,
    /// Free-form keyword set attached by the owner.
    pub keywords: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Ordinal assigned by the out-of-band daily ranking batch (1 = best).
    pub daily_ranking: Option<i32>,
    pub featured: bool,
    pub owner_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// A shared category label attachable to entities.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub label: String,
}

// =============================================================================
// RELATIONSHIP TYPES
// =============================================================================

/// Type of a directed relationship edge between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// A person belongs to a department/organization.
    MemberOf,
    /// A non-person entity nests under another.
    SubOrgOf,
    /// Reserved for imported reporting-line data.
    ReportsTo,
}

impl RelationshipType {
    /// The edge type an entity of `kind` takes when linked under a parent.
    pub fn for_child_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Person => Self::MemberOf,
            _ => Self::SubOrgOf,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemberOf => write!(f, "member_of"),
            Self::SubOrgOf => write!(f, "sub_org_of"),
            Self::ReportsTo => write!(f, "reports_to"),
        }
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member_of" => Ok(Self::MemberOf),
            "sub_org_of" => Ok(Self::SubOrgOf),
            "reports_to" => Ok(Self::ReportsTo),
            _ => Err(format!("Invalid relationship type: {}", s)),
        }
    }
}

/// A typed directed edge in the entity graph.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RelationshipEdge {
    pub parent_entity_id: Uuid,
    pub child_entity_id: Uuid,
    pub relationship_type: RelationshipType,
    /// Optional validity interval start.
    pub valid_from: Option<DateTime<Utc>>,
    /// Optional validity interval end.
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at_utc: DateTime<Utc>,
}

/// How a related entity is connected to the one it was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Child,
    Sibling,
    Location,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Child => write!(f, "child"),
            Self::Sibling => write!(f, "sibling"),
            Self::Location => write!(f, "location"),
        }
    }
}

/// An entity tagged with the relation that surfaced it.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RelatedEntity {
    pub entity: Entity,
    pub relation: RelationKind,
}

// =============================================================================
// REVIEW TYPES
// =============================================================================

/// A structured review of an entity.
///
/// At most one review exists per (author, entity). The helpful/not-helpful
/// counters are derived state maintained by the vote ledger and always equal
/// the count of matching `ReviewVote` rows.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub author_id: Uuid,
    pub entity_id: Uuid,
    /// Overall star rating in [1,5].
    pub rating: i16,
    pub title: String,
    pub content: String,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
    pub verified: bool,
    pub edited: bool,
    pub anonymous: bool,
    pub has_evidence: bool,
    /// Optional satisfaction score in [1,10].
    pub overall_satisfaction: Option<i16>,
    pub recommend_to_others: Option<bool>,
    pub experience_date: Option<NaiveDate>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Direction of a helpfulness vote on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    Helpful,
    NotHelpful,
}

impl std::fmt::Display for VoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Helpful => write!(f, "helpful"),
            Self::NotHelpful => write!(f, "not_helpful"),
        }
    }
}

impl std::str::FromStr for VoteType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "helpful" => Ok(Self::Helpful),
            "not_helpful" => Ok(Self::NotHelpful),
            _ => Err(format!("Invalid vote type: {}", s)),
        }
    }
}

/// One voter's helpfulness vote on one review.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewVote {
    pub review_id: Uuid,
    pub voter_id: Uuid,
    pub vote_type: VoteType,
    pub created_at_utc: DateTime<Utc>,
}

/// An entity upvote, unique per (voter, entity).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Upvote {
    pub voter_id: Uuid,
    pub entity_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
}

// =============================================================================
// ATTRIBUTE SCHEMA TYPES
// =============================================================================

/// Shape discriminator for a review attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Scale,
    Boolean,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scale => write!(f, "scale"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

impl std::str::FromStr for AttributeType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scale" => Ok(Self::Scale),
            "boolean" => Ok(Self::Boolean),
            _ => Err(format!("Invalid attribute type: {}", s)),
        }
    }
}

/// Type-specific configuration stored alongside an attribute definition.
///
/// Stored as a tagged JSONB blob. Adding a new attribute shape means adding
/// a variant here (and to [`AttributeValue`]) plus the matching aggregation
/// arm; existing stored responses are untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeMetadata {
    Scale { min: f64, max: f64, step: f64 },
    Boolean { true_label: String, false_label: String },
}

impl AttributeMetadata {
    /// The shape discriminator this metadata configures.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Scale { .. } => AttributeType::Scale,
            Self::Boolean { .. } => AttributeType::Boolean,
        }
    }
}

/// A per-entity-kind review dimension definition.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewAttribute {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub name: String,
    pub label: String,
    pub attribute_type: AttributeType,
    pub category: String,
    pub display_order: i32,
    pub required: bool,
    pub active: bool,
    pub metadata: AttributeMetadata,
}

/// A reviewer's answer to one attribute, tagged by shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeValue {
    Scale { score: f64 },
    Boolean { value: bool },
}

impl AttributeValue {
    /// The shape discriminator this value satisfies.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Scale { .. } => AttributeType::Scale,
            Self::Boolean { .. } => AttributeType::Boolean,
        }
    }
}

/// One stored response, exactly one per (review, attribute).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewAttributeResponse {
    pub review_id: Uuid,
    pub attribute_id: Uuid,
    pub value: AttributeValue,
}

// =============================================================================
// TAG SCHEMA TYPES
// =============================================================================

/// Sentiment of a review tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Positive,
    Concern,
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Concern => write!(f, "concern"),
        }
    }
}

impl std::str::FromStr for TagType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "concern" => Ok(Self::Concern),
            _ => Err(format!("Invalid tag type: {}", s)),
        }
    }
}

/// A per-entity-kind labeled marker a reviewer can attach to a review.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReviewTag {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub name: String,
    pub label: String,
    pub tag_type: TagType,
    pub category: String,
    /// Display color hint for the presentation layer.
    pub color: String,
    pub active: bool,
}

// =============================================================================
// AGGREGATION TYPES
// =============================================================================

/// Distribution of star ratings across an entity's reviews.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingDistribution {
    /// Review counts indexed by rating; `counts[0]` is one star.
    pub counts: [i64; 5],
    pub total: i64,
    /// Mean rating rounded to 1 decimal, 0.0 when no reviews exist.
    pub average: f64,
}

/// Aggregated statistic for one attribute, shape-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeStatValue {
    /// Arithmetic mean of scale scores.
    Scale { average: f64 },
    /// Share of true answers, in percent.
    Boolean { positive_percentage: f64 },
}

/// Aggregated responses for one attribute across an entity's reviews.
///
/// Attributes with zero responses are omitted from stat lists entirely.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AttributeStat {
    pub attribute_id: Uuid,
    pub name: String,
    pub label: String,
    pub response_count: i64,
    pub value: AttributeStatValue,
}

/// Aggregated selections for one tag across an entity's reviews.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TagStat {
    pub tag_id: Uuid,
    pub name: String,
    pub label: String,
    pub tag_type: TagType,
    pub selection_count: i64,
    /// `100 * selection_count / total reviews for the entity`. Percentages
    /// across tags need not sum to 100.
    pub percentage: f64,
}

// =============================================================================
// RANKING TYPES
// =============================================================================

/// An entity annotated with its window score inputs.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RankedEntity {
    pub entity: Entity,
    pub upvote_count: i64,
    /// Mean rating rounded to 1 decimal; 0.0 for unreviewed entities.
    pub avg_rating: f64,
    pub review_count: i64,
    pub score: f64,
}

// =============================================================================
// DIRECTORY TYPES
// =============================================================================

/// An entity enriched with viewer-specific and shared page data.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EnrichedEntity {
    pub entity: Entity,
    /// Whether the requesting caller has upvoted this entity.
    pub upvoted_by_caller: bool,
    pub categories: Vec<Category>,
    pub upvote_count: i64,
}

/// A distinct (city, state) pair offered as a filter choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LocationFacet {
    pub city: String,
    pub state: String,
}

/// Filter facets derived from the visible entity set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DirectoryFacets {
    pub states: Vec<String>,
    pub cities: Vec<LocationFacet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entity_kind_round_trip() {
        for kind in [
            EntityKind::Person,
            EntityKind::Department,
            EntityKind::Organization,
            EntityKind::Infrastructure,
        ] {
            assert_eq!(EntityKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn test_entity_status_round_trip() {
        for status in [
            EntityStatus::Pending,
            EntityStatus::InReview,
            EntityStatus::Published,
            EntityStatus::Rejected,
        ] {
            assert_eq!(EntityStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn test_relationship_type_derived_from_child_kind() {
        assert_eq!(
            RelationshipType::for_child_kind(EntityKind::Person),
            RelationshipType::MemberOf
        );
        assert_eq!(
            RelationshipType::for_child_kind(EntityKind::Department),
            RelationshipType::SubOrgOf
        );
        assert_eq!(
            RelationshipType::for_child_kind(EntityKind::Infrastructure),
            RelationshipType::SubOrgOf
        );
    }

    #[test]
    fn test_attribute_value_tagged_serialization() {
        let scale = AttributeValue::Scale { score: 4.0 };
        let json = serde_json::to_value(&scale).unwrap();
        assert_eq!(json["type"], "scale");
        assert_eq!(json["score"], 4.0);

        let parsed: AttributeValue =
            serde_json::from_value(serde_json::json!({"type": "boolean", "value": true})).unwrap();
        assert_eq!(parsed, AttributeValue::Boolean { value: true });
    }

    #[test]
    fn test_attribute_value_reports_its_type() {
        assert_eq!(
            AttributeValue::Scale { score: 1.0 }.attribute_type(),
            AttributeType::Scale
        );
        assert_eq!(
            AttributeValue::Boolean { value: false }.attribute_type(),
            AttributeType::Boolean
        );
    }

    #[test]
    fn test_attribute_metadata_tagged_serialization() {
        let meta = AttributeMetadata::Scale {
            min: 1.0,
            max: 10.0,
            step: 1.0,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "scale");
        assert_eq!(json["max"], 10.0);
    }

    #[test]
    fn test_vote_type_stored_form() {
        assert_eq!(VoteType::NotHelpful.to_string(), "not_helpful");
        assert_eq!(
            VoteType::from_str("not_helpful").unwrap(),
            VoteType::NotHelpful
        );
    }

    #[test]
    fn test_invalid_enum_strings_rejected() {
        assert!(EntityKind::from_str("robot").is_err());
        assert!(EntityStatus::from_str("live").is_err());
        assert!(VoteType::from_str("upvote").is_err());
        assert!(TagType::from_str("neutral").is_err());
    }
}
