//! # commend-db
//!
//! PostgreSQL database layer for commend.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for the entity graph, review ledger,
//!   vote and upvote ledgers, and the schema registry
//! - Aggregation queries for rating, attribute, and tag statistics
//! - Ranking windows and the directory listing façade
//!
//! ## Example
//!
//! ```rust,ignore
//! use commend_db::{Database, DirectoryFilter, DirectoryRepository, SortOption};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/commend").await?;
//!
//!     let page = db
//!         .directory
//!         .list(DirectoryFilter::default(), SortOption::Recent, 1, 20, None)
//!         .await?;
//!
//!     println!("{} entities listed", page.total);
//!     Ok(())
//! }
//! ```
pub mod aggregation;
pub mod directory;
pub mod entities;
pub mod pool;
pub mod ranking;
pub mod relationships;
pub mod review_votes;
pub mod reviews;
pub mod schema_registry;
pub mod upvotes;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use commend_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Map a unique-constraint violation to a typed conflict.
///
/// Duplicate checks are check-then-insert; a concurrent double-submit can
/// still trip the UNIQUE constraint, and that race must surface as the same
/// `Conflict` the pre-check raises. Other database errors pass through.
pub(crate) fn unique_conflict(e: sqlx::Error, message: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(message.to_string())
        }
        _ => Error::Database(e),
    }
}

// Re-export repository implementations
pub use aggregation::PgAggregationRepository;
pub use directory::PgDirectoryRepository;
pub use entities::PgEntityRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use ranking::PgRankingRepository;
pub use relationships::PgRelationshipRepository;
pub use review_votes::PgReviewVoteRepository;
pub use reviews::PgReviewRepository;
pub use schema_registry::PgSchemaRegistry;
pub use upvotes::PgUpvoteRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Entity repository for CRUD and moderation operations.
    pub entities: PgEntityRepository,
    /// Relationship repository for the entity graph.
    pub relationships: PgRelationshipRepository,
    /// Review repository for the review ledger.
    pub reviews: PgReviewRepository,
    /// Helpfulness vote ledger.
    pub review_votes: PgReviewVoteRepository,
    /// Entity upvote ledger.
    pub upvotes: PgUpvoteRepository,
    /// Attribute and tag schema registry.
    pub schema: PgSchemaRegistry,
    /// Rating, attribute, and tag aggregation queries.
    pub aggregation: PgAggregationRepository,
    /// Ranking and trending windows.
    pub ranking: PgRankingRepository,
    /// Directory listing façade.
    pub directory: PgDirectoryRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            entities: PgEntityRepository::new(pool.clone()),
            relationships: PgRelationshipRepository::new(pool.clone()),
            reviews: PgReviewRepository::new(pool.clone()),
            review_votes: PgReviewVoteRepository::new(pool.clone()),
            upvotes: PgUpvoteRepository::new(pool.clone()),
            schema: PgSchemaRegistry::new(pool.clone()),
            aggregation: PgAggregationRepository::new(pool.clone()),
            ranking: PgRankingRepository::new(pool.clone()),
            directory: PgDirectoryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_passes_plain_text() {
        assert_eq!(escape_like("finance"), "finance");
    }

    #[test]
    fn test_escape_like_escapes_wildcards() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
    }

    #[derive(Debug)]
    struct StubUniqueViolation;

    impl std::fmt::Display for StubUniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for StubUniqueViolation {}

    impl sqlx::error::DatabaseError for StubUniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn test_unique_violation_becomes_typed_conflict() {
        // A lost check-then-insert race surfaces as Conflict, not Database.
        let raced = sqlx::Error::Database(Box::new(StubUniqueViolation));
        match unique_conflict(raced, "already reviewed") {
            Error::Conflict(msg) => assert_eq!(msg, "already reviewed"),
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        match unique_conflict(sqlx::Error::RowNotFound, "already reviewed") {
            Error::Database(_) => {}
            other => panic!("expected Database, got {:?}", other),
        }
    }
}
