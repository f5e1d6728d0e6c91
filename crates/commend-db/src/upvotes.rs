//! Entity upvote ledger implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashSet;
use uuid::Uuid;

use commend_core::{
    require_caller, Caller, Error, RateLimiter, Result, UpvoteOutcome, UpvoteRepository,
};

/// PostgreSQL implementation of UpvoteRepository.
pub struct PgUpvoteRepository {
    pool: Pool<Postgres>,
}

impl PgUpvoteRepository {
    /// Create a new PgUpvoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpvoteRepository for PgUpvoteRepository {
    async fn toggle(
        &self,
        caller: Option<&Caller>,
        entity_id: Uuid,
        limiter: &dyn RateLimiter,
    ) -> Result<UpvoteOutcome> {
        let caller = require_caller(caller)?;

        let decision = limiter.check(caller, "toggle_upvote").await;
        if !decision.allowed {
            return Err(Error::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if !sqlx::query("SELECT EXISTS(SELECT 1 FROM entity WHERE id = $1)")
            .bind(entity_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?
            .get::<bool, _>(0)
        {
            return Err(Error::EntityNotFound(entity_id));
        }

        // Insert wins the toggle when no row exists; otherwise remove it.
        let inserted = sqlx::query(
            "INSERT INTO upvote (voter_id, entity_id, created_at_utc)
             VALUES ($1, $2, $3)
             ON CONFLICT (voter_id, entity_id) DO NOTHING",
        )
        .bind(caller.id)
        .bind(entity_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected()
            > 0;

        if !inserted {
            sqlx::query("DELETE FROM upvote WHERE voter_id = $1 AND entity_id = $2")
                .bind(caller.id)
                .bind(entity_id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let upvote_count: i64 = sqlx::query("SELECT COUNT(*) FROM upvote WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?
            .get(0);

        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "db",
            component = "upvotes",
            op = "toggle",
            entity_id = %entity_id,
            caller_id = %caller.id,
            applied = inserted,
            "Upvote toggled"
        );

        Ok(UpvoteOutcome {
            applied: inserted,
            upvote_count,
        })
    }

    async fn count_for(&self, entity_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM upvote WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get(0);
        Ok(count)
    }

    async fn upvoted_set(&self, voter_id: Uuid, entity_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if entity_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query(
            "SELECT entity_id FROM upvote WHERE voter_id = $1 AND entity_id = ANY($2)",
        )
        .bind(voter_id)
        .bind(entity_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|row| row.get("entity_id")).collect())
    }
}
