//! Helpfulness vote ledger implementation.
//!
//! Each toggle is one atomic read-check-write: the review row is locked,
//! the transition is planned from the voter's current state, and the vote
//! row plus the review counters are written together. Counters therefore
//! always equal the count of matching vote rows.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use commend_core::{
    plan_transition, require_caller, Caller, Error, Result, ReviewVoteRepository, VoteOutcome,
    VoteRowAction, VoteState, VoteType,
};

/// PostgreSQL implementation of ReviewVoteRepository.
pub struct PgReviewVoteRepository {
    pool: Pool<Postgres>,
}

impl PgReviewVoteRepository {
    /// Create a new PgReviewVoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewVoteRepository for PgReviewVoteRepository {
    async fn vote(
        &self,
        caller: Option<&Caller>,
        review_id: Uuid,
        vote_type: VoteType,
    ) -> Result<VoteOutcome> {
        let caller = require_caller(caller)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the counter owner for the duration of the toggle.
        sqlx::query("SELECT id FROM review WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::ReviewNotFound(review_id))?;

        let current = sqlx::query(
            "SELECT vote_type FROM review_vote WHERE review_id = $1 AND voter_id = $2",
        )
        .bind(review_id)
        .bind(caller.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .map(|row| {
            row.get::<String, _>("vote_type")
                .parse::<VoteType>()
                .map_err(Error::Internal)
        })
        .transpose()?
        .map(VoteState::from)
        .unwrap_or(VoteState::None);

        let plan = plan_transition(current, vote_type);

        match plan.action {
            VoteRowAction::Insert => {
                sqlx::query(
                    "INSERT INTO review_vote (review_id, voter_id, vote_type, created_at_utc)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(review_id)
                .bind(caller.id)
                .bind(vote_type.to_string())
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            }
            VoteRowAction::Delete => {
                sqlx::query("DELETE FROM review_vote WHERE review_id = $1 AND voter_id = $2")
                    .bind(review_id)
                    .bind(caller.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(Error::Database)?;
            }
            VoteRowAction::Switch => {
                sqlx::query(
                    "UPDATE review_vote SET vote_type = $1
                     WHERE review_id = $2 AND voter_id = $3",
                )
                .bind(vote_type.to_string())
                .bind(review_id)
                .bind(caller.id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            }
        }

        let row = sqlx::query(
            "UPDATE review
             SET helpful_count = GREATEST(helpful_count + $1, 0),
                 not_helpful_count = GREATEST(not_helpful_count + $2, 0)
             WHERE id = $3
             RETURNING helpful_count, not_helpful_count",
        )
        .bind(plan.helpful_delta)
        .bind(plan.not_helpful_delta)
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "db",
            component = "vote_ledger",
            op = "vote",
            review_id = %review_id,
            caller_id = %caller.id,
            new_state = ?plan.new_state,
            "Review vote toggled"
        );

        Ok(VoteOutcome {
            new_state: plan.new_state,
            helpful_count: row.get("helpful_count"),
            not_helpful_count: row.get("not_helpful_count"),
        })
    }

    async fn state_for(&self, review_id: Uuid, voter_id: Uuid) -> Result<VoteState> {
        let current = sqlx::query(
            "SELECT vote_type FROM review_vote WHERE review_id = $1 AND voter_id = $2",
        )
        .bind(review_id)
        .bind(voter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .map(|row| {
            row.get::<String, _>("vote_type")
                .parse::<VoteType>()
                .map_err(Error::Internal)
        })
        .transpose()?
        .map(VoteState::from)
        .unwrap_or(VoteState::None);
        Ok(current)
    }
}
