//! Ranking/trending engine implementation.
//!
//! Each window gathers `(upvote_count, avg_rating, review_count)` per
//! published entity and orders by the window's formula. Weights come from
//! [`RankingWeights`]; the same bound weight drives the SQL ordering and the
//! score reported on each row. Daily-rank assignment is an out-of-band batch
//! entry point; per-request reads only consult the stored ordinal.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use commend_core::{
    round_rating, Error, RankedEntity, RankingRepository, RankingWeights, Result,
};

use crate::entities::{entity_columns, map_entity_row};

fn map_ranked_row(row: &PgRow, score: impl Fn(i64, f64) -> f64) -> Result<RankedEntity> {
    let upvote_count: i64 = row.get("upvote_count");
    let avg_rating = round_rating(row.get("avg_rating"));
    Ok(RankedEntity {
        entity: map_entity_row(row)?,
        upvote_count,
        avg_rating,
        review_count: row.get("review_count"),
        score: score(upvote_count, avg_rating),
    })
}

/// Subquery aggregating review stats per entity, rounded to 1 decimal.
const REVIEW_STATS: &str = "SELECT entity_id,
            ROUND(AVG(rating)::numeric, 1)::float8 AS avg_rating,
            COUNT(*) AS review_count
     FROM review GROUP BY entity_id";

/// PostgreSQL implementation of RankingRepository.
pub struct PgRankingRepository {
    pool: Pool<Postgres>,
    weights: RankingWeights,
}

impl PgRankingRepository {
    /// Create a new PgRankingRepository with default weights.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_weights(pool, RankingWeights::default())
    }

    /// Create a repository with explicit score weights.
    pub fn with_weights(pool: Pool<Postgres>, weights: RankingWeights) -> Self {
        Self { pool, weights }
    }

    /// The configured weights.
    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }
}

#[async_trait]
impl RankingRepository for PgRankingRepository {
    async fn rank_today(&self, limit: i64) -> Result<Vec<RankedEntity>> {
        let rows = sqlx::query(&format!(
            "SELECT {}, COALESCE(u.upvote_count, 0) AS upvote_count,
                    r.avg_rating, COALESCE(r.review_count, 0) AS review_count
             FROM entity e
             LEFT JOIN (SELECT entity_id, COUNT(*) AS upvote_count
                        FROM upvote
                        WHERE created_at_utc >= date_trunc('day', now())
                        GROUP BY entity_id) u ON u.entity_id = e.id
             LEFT JOIN ({}) r ON r.entity_id = e.id
             WHERE e.status = 'published'
             ORDER BY COALESCE(u.upvote_count, 0) DESC, e.created_at_utc DESC
             LIMIT $1",
            entity_columns("e"),
            REVIEW_STATS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| map_ranked_row(row, |upvotes, _| self.weights.today_score(upvotes)))
            .collect()
    }

    async fn rank_yesterday(&self, limit: i64) -> Result<Vec<RankedEntity>> {
        let rows = sqlx::query(&format!(
            "SELECT {}, COALESCE(u.upvote_count, 0) AS upvote_count,
                    r.avg_rating, COALESCE(r.review_count, 0) AS review_count
             FROM entity e
             LEFT JOIN (SELECT entity_id, COUNT(*) AS upvote_count
                        FROM upvote GROUP BY entity_id) u ON u.entity_id = e.id
             LEFT JOIN ({}) r ON r.entity_id = e.id
             WHERE e.status = 'published' AND e.daily_ranking IS NOT NULL
             ORDER BY e.daily_ranking ASC
             LIMIT $1",
            entity_columns("e"),
            REVIEW_STATS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        // Yesterday's ordering is the stored ordinal, not a live formula.
        rows.iter()
            .map(|row| map_ranked_row(row, |upvotes, _| upvotes as f64))
            .collect()
    }

    async fn rank_this_month(&self, limit: i64) -> Result<Vec<RankedEntity>> {
        let weight = self.weights.month_rating_weight;
        let rows = sqlx::query(&format!(
            "SELECT {}, COALESCE(u.upvote_count, 0) AS upvote_count,
                    r.avg_rating, COALESCE(r.review_count, 0) AS review_count
             FROM entity e
             LEFT JOIN (SELECT entity_id, COUNT(*) AS upvote_count
                        FROM upvote
                        WHERE created_at_utc >= date_trunc('month', now())
                        GROUP BY entity_id) u ON u.entity_id = e.id
             LEFT JOIN ({}) r ON r.entity_id = e.id
             WHERE e.status = 'published'
             ORDER BY COALESCE(u.upvote_count, 0) + COALESCE(r.avg_rating, 0) * $1 DESC,
                      e.created_at_utc DESC
             LIMIT $2",
            entity_columns("e"),
            REVIEW_STATS
        ))
        .bind(weight)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| map_ranked_row(row, |upvotes, avg| self.weights.month_score(upvotes, avg)))
            .collect()
    }

    async fn rank_trending(&self, window_days: i64, limit: i64) -> Result<Vec<RankedEntity>> {
        let weight = self.weights.trending_rating_weight;
        let rows = sqlx::query(&format!(
            "SELECT {}, COALESCE(u.upvote_count, 0) AS upvote_count,
                    r.avg_rating, COALESCE(r.review_count, 0) AS review_count
             FROM entity e
             LEFT JOIN (SELECT entity_id, COUNT(*) AS upvote_count
                        FROM upvote GROUP BY entity_id) u ON u.entity_id = e.id
             LEFT JOIN ({}) r ON r.entity_id = e.id
             WHERE e.status = 'published'
               AND e.created_at_utc >= now() - make_interval(days => $1::int)
             ORDER BY COALESCE(u.upvote_count, 0) + COALESCE(r.avg_rating, 0) * $2 DESC,
                      e.created_at_utc DESC
             LIMIT $3",
            entity_columns("e"),
            REVIEW_STATS
        ))
        .bind(window_days)
        .bind(weight)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                map_ranked_row(row, |upvotes, avg| self.weights.trending_score(upvotes, avg))
            })
            .collect()
    }

    async fn assign_daily_rankings(&self, top_n: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("UPDATE entity SET daily_ranking = NULL WHERE daily_ranking IS NOT NULL")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let result = sqlx::query(
            "WITH ranked AS (
                 SELECT u.entity_id,
                        ROW_NUMBER() OVER (ORDER BY COUNT(*) DESC) AS ordinal
                 FROM upvote u
                 JOIN entity e ON e.id = u.entity_id AND e.status = 'published'
                 WHERE u.created_at_utc >= date_trunc('day', now() - interval '1 day')
                   AND u.created_at_utc < date_trunc('day', now())
                 GROUP BY u.entity_id
                 ORDER BY COUNT(*) DESC
                 LIMIT $1
             )
             UPDATE entity
             SET daily_ranking = ranked.ordinal, updated_at_utc = now()
             FROM ranked
             WHERE entity.id = ranked.entity_id",
        )
        .bind(top_n)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "ranking",
            op = "assign_daily_rankings",
            result_count = result.rows_affected(),
            "Daily rankings assigned"
        );
        Ok(result.rows_affected())
    }
}
