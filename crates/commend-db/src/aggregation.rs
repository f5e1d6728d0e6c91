//! Aggregation engine: rating, attribute, and tag statistics.
//!
//! Responses are grouped in Rust with an exhaustive match on the stored
//! value tag. A new attribute shape is a new [`AttributeValue`] variant and
//! a new arm here; stored blobs never change shape retroactively.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

use commend_core::{
    round_rating, AggregationRepository, AttributeStat, AttributeStatValue, AttributeValue, Error,
    RatingDistribution, Result, TagStat, TagType,
};

/// Running totals for one attribute while folding responses.
#[derive(Debug, Default)]
struct ResponseFold {
    name: String,
    label: String,
    count: i64,
    scale_sum: f64,
    true_count: i64,
}

/// Fold one decoded value into the totals, dispatching on the tag.
fn fold_value(fold: &mut ResponseFold, value: AttributeValue) {
    fold.count += 1;
    match value {
        AttributeValue::Scale { score } => fold.scale_sum += score,
        AttributeValue::Boolean { value: true } => fold.true_count += 1,
        AttributeValue::Boolean { value: false } => {}
    }
}

/// Finish a fold into the stat value for its declared shape.
fn finish_fold(attribute_type: &str, fold: &ResponseFold) -> Result<AttributeStatValue> {
    match attribute_type {
        "scale" => Ok(AttributeStatValue::Scale {
            average: fold.scale_sum / fold.count as f64,
        }),
        "boolean" => Ok(AttributeStatValue::Boolean {
            positive_percentage: 100.0 * fold.true_count as f64 / fold.count as f64,
        }),
        other => Err(Error::Internal(format!(
            "unknown attribute type '{}' in stats",
            other
        ))),
    }
}

/// PostgreSQL implementation of AggregationRepository.
pub struct PgAggregationRepository {
    pool: Pool<Postgres>,
}

impl PgAggregationRepository {
    /// Create a new PgAggregationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AggregationRepository for PgAggregationRepository {
    async fn rating_distribution(&self, entity_id: Uuid) -> Result<RatingDistribution> {
        let rows = sqlx::query(
            "SELECT rating, COUNT(*) AS n FROM review
             WHERE entity_id = $1
             GROUP BY rating",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut dist = RatingDistribution::default();
        let mut sum: i64 = 0;
        for row in rows {
            let rating: i16 = row.get("rating");
            let n: i64 = row.get("n");
            if (1..=5).contains(&rating) {
                dist.counts[(rating - 1) as usize] = n;
                dist.total += n;
                sum += rating as i64 * n;
            }
        }
        if dist.total > 0 {
            dist.average = round_rating(Some(sum as f64 / dist.total as f64));
        }
        Ok(dist)
    }

    async fn attribute_stats(&self, entity_id: Uuid) -> Result<Vec<AttributeStat>> {
        let rows = sqlx::query(
            "SELECT a.id, a.name, a.label, a.attribute_type, a.display_order, resp.value
             FROM review_attribute_response resp
             JOIN review r ON r.id = resp.review_id
             JOIN review_attribute a ON a.id = resp.attribute_id
             WHERE r.entity_id = $1
             ORDER BY a.display_order ASC, a.name ASC",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        // Group by attribute, preserving catalog display order.
        let mut order: Vec<Uuid> = Vec::new();
        let mut folds: HashMap<Uuid, (String, ResponseFold)> = HashMap::new();
        for row in rows {
            let attribute_id: Uuid = row.get("id");
            let value: serde_json::Value = row.get("value");
            let value = serde_json::from_value::<AttributeValue>(value)?;

            let entry = folds.entry(attribute_id).or_insert_with(|| {
                order.push(attribute_id);
                (
                    row.get::<String, _>("attribute_type"),
                    ResponseFold {
                        name: row.get("name"),
                        label: row.get("label"),
                        ..ResponseFold::default()
                    },
                )
            });
            fold_value(&mut entry.1, value);
        }

        // Attributes with zero responses never appear here at all.
        order
            .into_iter()
            .map(|attribute_id| {
                let (attribute_type, fold) = &folds[&attribute_id];
                Ok(AttributeStat {
                    attribute_id,
                    name: fold.name.clone(),
                    label: fold.label.clone(),
                    response_count: fold.count,
                    value: finish_fold(attribute_type, fold)?,
                })
            })
            .collect()
    }

    async fn tag_stats(&self, entity_id: Uuid) -> Result<Vec<TagStat>> {
        let total_reviews: i64 = sqlx::query("SELECT COUNT(*) FROM review WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get(0);
        if total_reviews == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT t.id, t.name, t.label, t.tag_type, COUNT(*) AS selection_count
             FROM review_tag_selection sel
             JOIN review r ON r.id = sel.review_id
             JOIN review_tag t ON t.id = sel.tag_id
             WHERE r.entity_id = $1
             GROUP BY t.id, t.name, t.label, t.tag_type
             ORDER BY selection_count DESC, t.label ASC",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter()
            .map(|row| {
                let tag_type: String = row.get("tag_type");
                let selection_count: i64 = row.get("selection_count");
                Ok(TagStat {
                    tag_id: row.get("id"),
                    name: row.get("name"),
                    label: row.get("label"),
                    tag_type: tag_type.parse::<TagType>().map_err(Error::Internal)?,
                    selection_count,
                    // Denominator is the entity's total review count, so
                    // percentages across tags need not sum to 100.
                    percentage: 100.0 * selection_count as f64 / total_reviews as f64,
                })
            })
            .collect()
    }
}
