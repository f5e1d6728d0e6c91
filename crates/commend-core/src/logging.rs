//! Structured logging schema and field name constants.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, batch completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-row iteration, high-volume data |

/// Subsystem originating the log event.
/// Values: "db", "graph", "reviews", "ranking", "directory"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "vote_ledger", "facets"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_review", "toggle_upvote", "rank_trending"
pub const OPERATION: &str = "op";

/// Entity UUID being operated on.
pub const ENTITY_ID: &str = "entity_id";

/// Review UUID being operated on.
pub const REVIEW_ID: &str = "review_id";

/// Caller UUID performing the operation.
pub const CALLER_ID: &str = "caller_id";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
