//! Attribute/tag schema registry implementation.
//!
//! The catalog is polymorphic over attribute shape without changing the
//! storage contract: type-specific configuration lives in a tagged JSONB
//! blob deserialized into [`AttributeMetadata`].

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use commend_core::{
    require_caller, AttributeMetadata, Caller, CreateAttributeRequest, CreateTagRequest,
    EntityKind, Error, Result, ReviewAttribute, ReviewTag, SchemaRegistry, TagType,
};

/// Map a database row to a ReviewAttribute.
pub(crate) fn map_attribute_row(row: &PgRow) -> Result<ReviewAttribute> {
    let entity_kind: String = row.get("entity_kind");
    let attribute_type: String = row.get("attribute_type");
    let metadata: serde_json::Value = row.get("metadata");
    Ok(ReviewAttribute {
        id: row.get("id"),
        entity_kind: entity_kind.parse().map_err(Error::Internal)?,
        name: row.get("name"),
        label: row.get("label"),
        attribute_type: attribute_type.parse().map_err(Error::Internal)?,
        category: row.get("category"),
        display_order: row.get("display_order"),
        required: row.get("required"),
        active: row.get("active"),
        metadata: serde_json::from_value::<AttributeMetadata>(metadata)?,
    })
}

/// Map a database row to a ReviewTag.
pub(crate) fn map_tag_row(row: &PgRow) -> Result<ReviewTag> {
    let entity_kind: String = row.get("entity_kind");
    let tag_type: String = row.get("tag_type");
    Ok(ReviewTag {
        id: row.get("id"),
        entity_kind: entity_kind.parse().map_err(Error::Internal)?,
        name: row.get("name"),
        label: row.get("label"),
        tag_type: tag_type.parse::<TagType>().map_err(Error::Internal)?,
        category: row.get("category"),
        color: row.get("color"),
        active: row.get("active"),
    })
}

/// PostgreSQL implementation of SchemaRegistry.
pub struct PgSchemaRegistry {
    pool: Pool<Postgres>,
}

impl PgSchemaRegistry {
    /// Create a new PgSchemaRegistry with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn require_elevated(caller: Option<&Caller>) -> Result<&Caller> {
        let caller = require_caller(caller)?;
        if !caller.role.is_elevated() {
            return Err(Error::Forbidden);
        }
        Ok(caller)
    }

    fn check_metadata(req: &CreateAttributeRequest) -> Result<()> {
        if let AttributeMetadata::Scale { min, max, step } = &req.metadata {
            if min >= max || *step <= 0.0 {
                return Err(Error::Validation(
                    "scale metadata requires min < max and a positive step".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaRegistry for PgSchemaRegistry {
    async fn attributes_for_kind(&self, kind: EntityKind) -> Result<Vec<ReviewAttribute>> {
        let rows = sqlx::query(
            "SELECT id, entity_kind, name, label, attribute_type, category,
                    display_order, required, active, metadata
             FROM review_attribute
             WHERE entity_kind = $1 AND active = TRUE
             ORDER BY display_order ASC, name ASC",
        )
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_attribute_row).collect()
    }

    async fn tags_for_kind(&self, kind: EntityKind) -> Result<Vec<ReviewTag>> {
        let rows = sqlx::query(
            "SELECT id, entity_kind, name, label, tag_type, category, color, active
             FROM review_tag
             WHERE entity_kind = $1 AND active = TRUE
             ORDER BY label ASC",
        )
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_tag_row).collect()
    }

    async fn create_attribute(
        &self,
        caller: Option<&Caller>,
        req: CreateAttributeRequest,
    ) -> Result<Uuid> {
        Self::require_elevated(caller)?;
        Self::check_metadata(&req)?;

        let id = Uuid::now_v7();
        let metadata = serde_json::to_value(&req.metadata)?;

        let result = sqlx::query(
            "INSERT INTO review_attribute
                 (id, entity_kind, name, label, attribute_type, category,
                  display_order, required, active, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9)
             ON CONFLICT (entity_kind, name) DO NOTHING",
        )
        .bind(id)
        .bind(req.entity_kind.to_string())
        .bind(&req.name)
        .bind(&req.label)
        .bind(req.metadata.attribute_type().to_string())
        .bind(&req.category)
        .bind(req.display_order)
        .bind(req.required)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "attribute '{}' already exists for {} entities",
                req.name, req.entity_kind
            )));
        }
        Ok(id)
    }

    async fn create_tag(&self, caller: Option<&Caller>, req: CreateTagRequest) -> Result<Uuid> {
        Self::require_elevated(caller)?;

        let id = Uuid::now_v7();
        let result = sqlx::query(
            "INSERT INTO review_tag
                 (id, entity_kind, name, label, tag_type, category, color, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
             ON CONFLICT (entity_kind, name) DO NOTHING",
        )
        .bind(id)
        .bind(req.entity_kind.to_string())
        .bind(&req.name)
        .bind(&req.label)
        .bind(req.tag_type.to_string())
        .bind(&req.category)
        .bind(&req.color)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "tag '{}' already exists for {} entities",
                req.name, req.entity_kind
            )));
        }
        Ok(id)
    }

    async fn deactivate_attribute(&self, caller: Option<&Caller>, id: Uuid) -> Result<()> {
        Self::require_elevated(caller)?;
        let result = sqlx::query("UPDATE review_attribute SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("attribute {}", id)));
        }
        Ok(())
    }

    async fn deactivate_tag(&self, caller: Option<&Caller>, id: Uuid) -> Result<()> {
        Self::require_elevated(caller)?;
        let result = sqlx::query("UPDATE review_tag SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("tag {}", id)));
        }
        Ok(())
    }
}
