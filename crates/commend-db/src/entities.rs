//! Entity repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use commend_core::{
    can_mutate_entity, require_caller, validate_entity_name, validate_slug, Caller,
    CreateEntityRequest, Entity, EntityKind, EntityRepository, EntityStatus, Error,
    RelationshipType, Result, UpdateEntityRequest,
};

const ENTITY_COLUMN_NAMES: [&str; 13] = [
    "id",
    "name",
    "slug",
    "kind",
    "status",
    "keywords",
    "city",
    "state",
    "daily_ranking",
    "featured",
    "owner_id",
    "created_at_utc",
    "updated_at_utc",
];

/// Columns selected whenever a full entity row is mapped.
pub(crate) const ENTITY_COLUMNS: &str = "id, name, slug, kind, status, keywords, city, state, \
     daily_ranking, featured, owner_id, created_at_utc, updated_at_utc";

/// The entity column list qualified with a table alias, for joined queries.
pub(crate) fn entity_columns(alias: &str) -> String {
    ENTITY_COLUMN_NAMES
        .iter()
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a database row to an Entity.
pub(crate) fn map_entity_row(row: &PgRow) -> Result<Entity> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    Ok(Entity {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        kind: kind.parse::<EntityKind>().map_err(Error::Internal)?,
        status: status.parse::<EntityStatus>().map_err(Error::Internal)?,
        keywords: row.get("keywords"),
        city: row.get("city"),
        state: row.get("state"),
        daily_ranking: row.get("daily_ranking"),
        featured: row.get("featured"),
        owner_id: row.get("owner_id"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    })
}

/// PostgreSQL implementation of EntityRepository.
pub struct PgEntityRepository {
    pool: Pool<Postgres>,
}

impl PgEntityRepository {
    /// Create a new PgEntityRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn replace_categories(
        tx: &mut Transaction<'_, Postgres>,
        entity_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM entity_category WHERE entity_id = $1")
            .bind(entity_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO entity_category (entity_id, category_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(entity_id)
            .bind(category_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    /// Replace the entity's parent edges. The edge type is derived from this
    /// entity's kind, matching the creation-time invariant.
    async fn replace_parents(
        tx: &mut Transaction<'_, Postgres>,
        entity_id: Uuid,
        kind: EntityKind,
        parent_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM entity_relationship WHERE child_entity_id = $1")
            .bind(entity_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let relationship_type = RelationshipType::for_child_kind(kind);
        let now = Utc::now();
        for parent_id in parent_ids {
            sqlx::query(
                "INSERT INTO entity_relationship
                     (parent_entity_id, child_entity_id, relationship_type, created_at_utc)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT DO NOTHING",
            )
            .bind(parent_id)
            .bind(entity_id)
            .bind(relationship_type.to_string())
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn create(&self, caller: Option<&Caller>, req: CreateEntityRequest) -> Result<Uuid> {
        let caller = require_caller(caller)?;
        validate_entity_name(&req.name)?;
        validate_slug(&req.slug)?;

        let id = Uuid::now_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let taken: bool = sqlx::query("SELECT EXISTS(SELECT 1 FROM entity WHERE slug = $1)")
            .bind(&req.slug)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?
            .get(0);
        if taken {
            return Err(Error::Conflict(format!(
                "slug '{}' is already in use",
                req.slug
            )));
        }

        sqlx::query(
            "INSERT INTO entity
                 (id, name, slug, kind, status, keywords, city, state, featured,
                  owner_id, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $10, $10)",
        )
        .bind(id)
        .bind(req.name.trim())
        .bind(&req.slug)
        .bind(req.kind.to_string())
        .bind(EntityStatus::Pending.to_string())
        .bind(&req.keywords)
        .bind(&req.city)
        .bind(&req.state)
        .bind(caller.id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            crate::unique_conflict(e, &format!("slug '{}' is already in use", req.slug))
        })?;

        Self::replace_categories(&mut tx, id, &req.category_ids).await?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "db",
            component = "entities",
            op = "create",
            entity_id = %id,
            caller_id = %caller.id,
            "Entity created"
        );
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Entity> {
        let row = sqlx::query(&format!("SELECT {} FROM entity WHERE id = $1", ENTITY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntityNotFound(id))?;
        map_entity_row(&row)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Entity> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entity WHERE slug = $1",
            ENTITY_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("entity with slug '{}'", slug)))?;
        map_entity_row(&row)
    }

    async fn update(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        req: UpdateEntityRequest,
    ) -> Result<()> {
        let caller = require_caller(caller)?;
        if let Some(name) = &req.name {
            validate_entity_name(name)?;
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the row so the permission check and the write are one unit.
        let row = sqlx::query("SELECT owner_id, status, kind FROM entity WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntityNotFound(id))?;

        let owner_id: Uuid = row.get("owner_id");
        let status: String = row.get("status");
        let status = status.parse::<EntityStatus>().map_err(Error::Internal)?;
        let kind: String = row.get("kind");
        let kind = kind.parse::<EntityKind>().map_err(Error::Internal)?;

        if !can_mutate_entity(caller, owner_id, status) {
            return Err(Error::Forbidden);
        }

        let mut updates: Vec<String> = vec!["updated_at_utc = $1".to_string()];
        let now = Utc::now();
        // $1 = now, $2 = id, then dynamic params start at $3
        let mut param_idx = 3;

        if req.name.is_some() {
            updates.push(format!("name = ${}", param_idx));
            param_idx += 1;
        }
        if req.keywords.is_some() {
            updates.push(format!("keywords = ${}", param_idx));
            param_idx += 1;
        }
        if req.city.is_some() {
            updates.push(format!("city = ${}", param_idx));
            param_idx += 1;
        }
        if req.state.is_some() {
            updates.push(format!("state = ${}", param_idx));
        }

        let query = format!("UPDATE entity SET {} WHERE id = $2", updates.join(", "));

        let mut q = sqlx::query(&query).bind(now).bind(id);
        if let Some(name) = &req.name {
            q = q.bind(name.trim());
        }
        if let Some(keywords) = &req.keywords {
            q = q.bind(keywords);
        }
        if let Some(city) = &req.city {
            q = q.bind(city);
        }
        if let Some(state) = &req.state {
            q = q.bind(state);
        }
        q.execute(&mut *tx).await.map_err(Error::Database)?;

        if let Some(category_ids) = &req.category_ids {
            Self::replace_categories(&mut tx, id, category_ids).await?;
        }
        if let Some(parent_ids) = &req.parent_ids {
            Self::replace_parents(&mut tx, id, kind, parent_ids).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn set_status(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        status: EntityStatus,
    ) -> Result<()> {
        let caller = require_caller(caller)?;
        if !caller.role.is_elevated() {
            return Err(Error::Forbidden);
        }

        let result = sqlx::query("UPDATE entity SET status = $1, updated_at_utc = $2 WHERE id = $3")
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::EntityNotFound(id));
        }

        tracing::info!(
            subsystem = "db",
            component = "entities",
            op = "set_status",
            entity_id = %id,
            caller_id = %caller.id,
            status = %status,
            "Entity status changed"
        );
        Ok(())
    }

    async fn set_featured(&self, caller: Option<&Caller>, id: Uuid, featured: bool) -> Result<()> {
        let caller = require_caller(caller)?;
        if !caller.role.is_elevated() {
            return Err(Error::Forbidden);
        }

        let result =
            sqlx::query("UPDATE entity SET featured = $1, updated_at_utc = $2 WHERE id = $3")
                .bind(featured)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::EntityNotFound(id));
        }
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM entity WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get(0))
    }
}
