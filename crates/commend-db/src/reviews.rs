//! Review ledger implementation.
//!
//! A review and its attribute responses and tag selections form one atomic
//! unit: they are written, replaced, and removed together.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use commend_core::{
    can_mutate_review, page_offset, require_caller, validate_attribute_value,
    validate_review_fields, AttributeResponseInput, AttributeValue, Caller, CreateReviewRequest,
    EntityKind, Error, Result, Review, ReviewAttribute, ReviewAttributeResponse, ReviewPage,
    ReviewRepository, UpdateReviewRequest,
};

use crate::schema_registry::map_attribute_row;

/// Map a database row to a Review.
pub(crate) fn map_review_row(row: &PgRow) -> Review {
    Review {
        id: row.get("id"),
        author_id: row.get("author_id"),
        entity_id: row.get("entity_id"),
        rating: row.get("rating"),
        title: row.get("title"),
        content: row.get("content"),
        helpful_count: row.get("helpful_count"),
        not_helpful_count: row.get("not_helpful_count"),
        verified: row.get("verified"),
        edited: row.get("edited"),
        anonymous: row.get("anonymous"),
        has_evidence: row.get("has_evidence"),
        overall_satisfaction: row.get("overall_satisfaction"),
        recommend_to_others: row.get("recommend_to_others"),
        experience_date: row.get("experience_date"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    }
}

/// PostgreSQL implementation of ReviewRepository.
pub struct PgReviewRepository {
    pool: Pool<Postgres>,
}

impl PgReviewRepository {
    /// Create a new PgReviewRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Validate submitted responses against the entity kind's active
    /// attribute catalog. Unknown attributes, duplicate answers, and
    /// shape/bounds mismatches are all validation failures.
    async fn check_responses(
        tx: &mut Transaction<'_, Postgres>,
        kind: EntityKind,
        responses: &[AttributeResponseInput],
    ) -> Result<()> {
        if responses.is_empty() {
            return Ok(());
        }

        let rows = sqlx::query(
            "SELECT id, entity_kind, name, label, attribute_type, category,
                    display_order, required, active, metadata
             FROM review_attribute
             WHERE entity_kind = $1 AND active = TRUE",
        )
        .bind(kind.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let catalog: HashMap<Uuid, ReviewAttribute> = rows
            .iter()
            .map(map_attribute_row)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut seen = HashSet::new();
        for response in responses {
            let attribute = catalog.get(&response.attribute_id).ok_or_else(|| {
                Error::Validation(format!(
                    "attribute {} is not defined for {} entities",
                    response.attribute_id, kind
                ))
            })?;
            if !seen.insert(response.attribute_id) {
                return Err(Error::Validation(format!(
                    "duplicate response for attribute '{}'",
                    attribute.name
                )));
            }
            validate_attribute_value(attribute, &response.value)?;
        }
        Ok(())
    }

    /// Validate tag selections against the entity kind's active tag catalog.
    async fn check_tags(
        tx: &mut Transaction<'_, Postgres>,
        kind: EntityKind,
        tag_ids: &[Uuid],
    ) -> Result<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }

        let rows = sqlx::query(
            "SELECT id FROM review_tag WHERE entity_kind = $1 AND active = TRUE",
        )
        .bind(kind.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;
        let valid: HashSet<Uuid> = rows.iter().map(|row| row.get("id")).collect();

        for tag_id in tag_ids {
            if !valid.contains(tag_id) {
                return Err(Error::Validation(format!(
                    "tag {} is not defined for {} entities",
                    tag_id, kind
                )));
            }
        }
        Ok(())
    }

    async fn write_sub_records(
        tx: &mut Transaction<'_, Postgres>,
        review_id: Uuid,
        responses: &[AttributeResponseInput],
        tag_ids: &[Uuid],
    ) -> Result<()> {
        for response in responses {
            let value = serde_json::to_value(&response.value)?;
            sqlx::query(
                "INSERT INTO review_attribute_response (review_id, attribute_id, value)
                 VALUES ($1, $2, $3)",
            )
            .bind(review_id)
            .bind(response.attribute_id)
            .bind(value)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO review_tag_selection (review_id, tag_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(review_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn create(&self, caller: Option<&Caller>, req: CreateReviewRequest) -> Result<Uuid> {
        let caller = require_caller(caller)?;
        validate_review_fields(req.rating, &req.title, &req.content, req.overall_satisfaction)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let entity = sqlx::query("SELECT kind FROM entity WHERE id = $1")
            .bind(req.entity_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntityNotFound(req.entity_id))?;
        let kind: String = entity.get("kind");
        let kind = kind.parse::<EntityKind>().map_err(Error::Internal)?;

        let already: bool = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM review WHERE author_id = $1 AND entity_id = $2)",
        )
        .bind(caller.id)
        .bind(req.entity_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?
        .get(0);
        if already {
            return Err(Error::Conflict(
                "you have already reviewed this entity".to_string(),
            ));
        }

        Self::check_responses(&mut tx, kind, &req.attribute_responses).await?;
        Self::check_tags(&mut tx, kind, &req.tag_ids).await?;

        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO review
                 (id, author_id, entity_id, rating, title, content,
                  anonymous, has_evidence, overall_satisfaction, recommend_to_others,
                  experience_date, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)",
        )
        .bind(id)
        .bind(caller.id)
        .bind(req.entity_id)
        .bind(req.rating)
        .bind(req.title.trim())
        .bind(req.content.trim())
        .bind(req.anonymous)
        .bind(req.has_evidence)
        .bind(req.overall_satisfaction)
        .bind(req.recommend_to_others)
        .bind(req.experience_date)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| crate::unique_conflict(e, "you have already reviewed this entity"))?;

        Self::write_sub_records(&mut tx, id, &req.attribute_responses, &req.tag_ids).await?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "db",
            component = "reviews",
            op = "create",
            review_id = %id,
            entity_id = %req.entity_id,
            caller_id = %caller.id,
            "Review created"
        );
        Ok(id)
    }

    async fn update(
        &self,
        caller: Option<&Caller>,
        review_id: Uuid,
        req: UpdateReviewRequest,
    ) -> Result<()> {
        let caller = require_caller(caller)?;
        validate_review_fields(req.rating, &req.title, &req.content, req.overall_satisfaction)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            "SELECT r.author_id, e.kind
             FROM review r JOIN entity e ON e.id = r.entity_id
             WHERE r.id = $1
             FOR UPDATE OF r",
        )
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ReviewNotFound(review_id))?;

        let author_id: Uuid = row.get("author_id");
        if !can_mutate_review(caller, author_id) {
            return Err(Error::Forbidden);
        }
        let kind: String = row.get("kind");
        let kind = kind.parse::<EntityKind>().map_err(Error::Internal)?;

        Self::check_responses(&mut tx, kind, &req.attribute_responses).await?;
        Self::check_tags(&mut tx, kind, &req.tag_ids).await?;

        sqlx::query(
            "UPDATE review
             SET rating = $1, title = $2, content = $3, overall_satisfaction = $4,
                 recommend_to_others = $5, experience_date = $6, edited = TRUE,
                 updated_at_utc = $7
             WHERE id = $8",
        )
        .bind(req.rating)
        .bind(req.title.trim())
        .bind(req.content.trim())
        .bind(req.overall_satisfaction)
        .bind(req.recommend_to_others)
        .bind(req.experience_date)
        .bind(Utc::now())
        .bind(review_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Replace sub-records wholesale.
        sqlx::query("DELETE FROM review_attribute_response WHERE review_id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM review_tag_selection WHERE review_id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        Self::write_sub_records(&mut tx, review_id, &req.attribute_responses, &req.tag_ids)
            .await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, caller: Option<&Caller>, review_id: Uuid) -> Result<()> {
        let caller = require_caller(caller)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query("SELECT author_id FROM review WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::ReviewNotFound(review_id))?;

        let author_id: Uuid = row.get("author_id");
        if !can_mutate_review(caller, author_id) {
            return Err(Error::Forbidden);
        }

        // Cascades to responses, selections, and votes.
        sqlx::query("DELETE FROM review WHERE id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn fetch(&self, review_id: Uuid) -> Result<Review> {
        let row = sqlx::query("SELECT * FROM review WHERE id = $1")
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::ReviewNotFound(review_id))?;
        Ok(map_review_row(&row))
    }

    async fn list_for_entity(
        &self,
        entity_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> Result<ReviewPage> {
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM review WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get(0);

        let rows = sqlx::query(
            "SELECT * FROM review
             WHERE entity_id = $1
             ORDER BY created_at_utc DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(entity_id)
        .bind(page_size)
        .bind(page_offset(page, page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ReviewPage {
            reviews: rows.iter().map(map_review_row).collect(),
            total,
        })
    }

    async fn responses_for(&self, review_id: Uuid) -> Result<Vec<ReviewAttributeResponse>> {
        let rows = sqlx::query(
            "SELECT review_id, attribute_id, value
             FROM review_attribute_response
             WHERE review_id = $1",
        )
        .bind(review_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.get("value");
                Ok(ReviewAttributeResponse {
                    review_id: row.get("review_id"),
                    attribute_id: row.get("attribute_id"),
                    value: serde_json::from_value::<AttributeValue>(value)?,
                })
            })
            .collect()
    }

    async fn tag_selections_for(&self, review_id: Uuid) -> Result<Vec<Uuid>> {
        let rows =
            sqlx::query("SELECT tag_id FROM review_tag_selection WHERE review_id = $1")
                .bind(review_id)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|row| row.get("tag_id")).collect())
    }
}
