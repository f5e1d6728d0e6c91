//! Relationship resolver: typed edges and graph traversals.
//!
//! The entity graph is shallow (1-2 hops) by product design, so traversals
//! are explicit queries against the edge table rather than in-memory
//! recursive structures.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashSet;
use uuid::Uuid;

use commend_core::{
    page_offset, ChildrenPage, Entity, EntityKind, Error, LocationHint, RelatedEntity,
    RelationKind, RelationshipEdge, RelationshipRepository, RelationshipType, Result, SortOption,
};

use crate::entities::{entity_columns, map_entity_row};

/// Children contributed to the related set.
const RELATED_CHILD_LIMIT: i64 = 3;
/// Siblings contributed to the related set.
const RELATED_SIBLING_LIMIT: i64 = 3;
/// Location peers contributed to the related set.
const RELATED_LOCATION_LIMIT: i64 = 4;
/// Cap on the merged related set.
const RELATED_TOTAL_LIMIT: usize = 6;

/// Merge related candidates with child > sibling > location precedence.
///
/// Deduplicates by entity id, keeping the first relation kind encountered,
/// and truncates to [`RELATED_TOTAL_LIMIT`].
pub fn merge_related(
    children: Vec<Entity>,
    siblings: Vec<Entity>,
    location_peers: Vec<Entity>,
) -> Vec<RelatedEntity> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut merged = Vec::new();

    let groups = [
        (children, RelationKind::Child),
        (siblings, RelationKind::Sibling),
        (location_peers, RelationKind::Location),
    ];
    for (entities, relation) in groups {
        for entity in entities {
            if merged.len() >= RELATED_TOTAL_LIMIT {
                return merged;
            }
            if seen.insert(entity.id) {
                merged.push(RelatedEntity { entity, relation });
            }
        }
    }
    merged
}

/// Resolve the location used for peer matching: hint fields override the
/// entity's own city/state field by field.
fn effective_location(
    hint: Option<&LocationHint>,
    own_city: Option<String>,
    own_state: Option<String>,
) -> (Option<String>, Option<String>) {
    let city = hint.and_then(|h| h.city.clone()).or(own_city);
    let state = hint.and_then(|h| h.state.clone()).or(own_state);
    (city, state)
}

fn order_clause(sort: SortOption) -> &'static str {
    match sort {
        SortOption::Recent => "e.created_at_utc DESC",
        SortOption::Upvotes => {
            "(SELECT COUNT(*) FROM upvote u WHERE u.entity_id = e.id) DESC, e.created_at_utc DESC"
        }
        SortOption::Alphabetical => "LOWER(e.name) ASC",
    }
}

/// PostgreSQL implementation of RelationshipRepository.
pub struct PgRelationshipRepository {
    pool: Pool<Postgres>,
}

impl PgRelationshipRepository {
    /// Create a new PgRelationshipRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn entity_kind_and_location(
        &self,
        entity_id: Uuid,
    ) -> Result<(EntityKind, Option<String>, Option<String>)> {
        let row = sqlx::query("SELECT kind, city, state FROM entity WHERE id = $1")
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntityNotFound(entity_id))?;
        let kind: String = row.get("kind");
        Ok((
            kind.parse::<EntityKind>().map_err(Error::Internal)?,
            row.get("city"),
            row.get("state"),
        ))
    }
}

#[async_trait]
impl RelationshipRepository for PgRelationshipRepository {
    async fn link(&self, parent_id: Uuid, child_id: Uuid) -> Result<RelationshipEdge> {
        if parent_id == child_id {
            return Err(Error::Validation(
                "an entity cannot be its own parent".to_string(),
            ));
        }

        if !sqlx::query("SELECT EXISTS(SELECT 1 FROM entity WHERE id = $1)")
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get::<bool, _>(0)
        {
            return Err(Error::EntityNotFound(parent_id));
        }
        let (child_kind, _, _) = self.entity_kind_and_location(child_id).await?;

        // Edge type is fixed by the child's kind at creation time.
        let relationship_type = RelationshipType::for_child_kind(child_kind);
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO entity_relationship
                 (parent_entity_id, child_entity_id, relationship_type, created_at_utc)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT DO NOTHING",
        )
        .bind(parent_id)
        .bind(child_id)
        .bind(relationship_type.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "edge {} -> {} already exists",
                parent_id, child_id
            )));
        }

        Ok(RelationshipEdge {
            parent_entity_id: parent_id,
            child_entity_id: child_id,
            relationship_type,
            valid_from: None,
            valid_until: None,
            created_at_utc: now,
        })
    }

    async fn unlink(&self, parent_id: Uuid, child_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM entity_relationship
             WHERE parent_entity_id = $1 AND child_entity_id = $2",
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "edge {} -> {}",
                parent_id, child_id
            )));
        }
        Ok(())
    }

    async fn get_parents(&self, entity_id: Uuid) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entity e
             JOIN entity_relationship r ON r.parent_entity_id = e.id
             WHERE r.child_entity_id = $1
             ORDER BY r.created_at_utc ASC",
            entity_columns("e")
        ))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_entity_row).collect()
    }

    async fn get_children(
        &self,
        parent_id: Uuid,
        page: i64,
        page_size: i64,
        sort: SortOption,
    ) -> Result<ChildrenPage> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) FROM entity e
             JOIN entity_relationship r ON r.child_entity_id = e.id
             WHERE r.parent_entity_id = $1 AND e.status = 'published'",
        )
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?
        .get(0);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM entity e
             JOIN entity_relationship r ON r.child_entity_id = e.id
             WHERE r.parent_entity_id = $1 AND e.status = 'published'
             ORDER BY {}
             LIMIT $2 OFFSET $3",
            entity_columns("e"),
            order_clause(sort)
        ))
        .bind(parent_id)
        .bind(page_size)
        .bind(page_offset(page, page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ChildrenPage {
            entities: rows.iter().map(map_entity_row).collect::<Result<_>>()?,
            total,
        })
    }

    async fn get_siblings(&self, entity_id: Uuid, limit: i64) -> Result<Vec<Entity>> {
        // First parent by edge insertion order; no parent means no siblings.
        let parent: Option<Uuid> = sqlx::query(
            "SELECT parent_entity_id FROM entity_relationship
             WHERE child_entity_id = $1
             ORDER BY created_at_utc ASC
             LIMIT 1",
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .map(|row| row.get("parent_entity_id"));

        let Some(parent_id) = parent else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM entity e
             JOIN entity_relationship r ON r.child_entity_id = e.id
             WHERE r.parent_entity_id = $1
               AND e.id <> $2
               AND e.status = 'published'
             ORDER BY e.created_at_utc DESC
             LIMIT $3",
            entity_columns("e")
        ))
        .bind(parent_id)
        .bind(entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_entity_row).collect()
    }

    async fn get_location_peers(
        &self,
        entity_id: Uuid,
        hint: Option<&LocationHint>,
        limit: i64,
    ) -> Result<Vec<Entity>> {
        let (_, own_city, own_state) = self.entity_kind_and_location(entity_id).await?;
        let (city, state) = effective_location(hint, own_city, own_state);

        // City match preferred; fall back to state when no city is known.
        let (clause, value) = match (city, state) {
            (Some(city), _) => ("e.city = $2", city),
            (None, Some(state)) => ("e.state = $2", state),
            (None, None) => return Ok(Vec::new()),
        };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM entity e
             WHERE e.id <> $1 AND {} AND e.status = 'published'
             ORDER BY e.created_at_utc DESC
             LIMIT $3",
            entity_columns("e"),
            clause
        ))
        .bind(entity_id)
        .bind(value)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_entity_row).collect()
    }

    async fn get_related(
        &self,
        entity_id: Uuid,
        hint: Option<&LocationHint>,
    ) -> Result<Vec<RelatedEntity>> {
        let children = self
            .get_children(entity_id, 1, RELATED_CHILD_LIMIT, SortOption::Upvotes)
            .await?
            .entities;
        let siblings = self.get_siblings(entity_id, RELATED_SIBLING_LIMIT).await?;
        let peers = self
            .get_location_peers(entity_id, hint, RELATED_LOCATION_LIMIT)
            .await?;

        let related = merge_related(children, siblings, peers);
        tracing::debug!(
            subsystem = "db",
            component = "graph",
            op = "get_related",
            entity_id = %entity_id,
            result_count = related.len(),
            "Resolved related entities"
        );
        Ok(related)
    }
}
