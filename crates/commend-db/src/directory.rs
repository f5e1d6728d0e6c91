//! Enrichment & pagination façade: the top-level directory listing.
//!
//! Enrichment is batched: one upvoted-set lookup, one category lookup, and
//! one upvote-count lookup per page of N entities, so the round-trip cost
//! per page is constant regardless of page size.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

use commend_core::{
    page_offset, Caller, Category, DirectoryFacets, DirectoryFilter, DirectoryPage,
    DirectoryRepository, EnrichedEntity, Error, LocationFacet, Result, SortOption,
};

use crate::entities::{entity_columns, map_entity_row};
use crate::escape_like;

/// Build the AND-combined WHERE clause and its bind values.
///
/// Non-elevated callers are always pinned to published entities; the status
/// filter is honored only for elevated callers.
fn directory_where(filter: &DirectoryFilter, elevated: bool) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    match (&filter.status, elevated) {
        (Some(status), true) => {
            params.push(status.to_string());
            clauses.push(format!("e.status = ${}", params.len()));
        }
        (None, true) => {}
        (_, false) => {
            params.push("published".to_string());
            clauses.push(format!("e.status = ${}", params.len()));
        }
    }

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        params.push(format!("%{}%", escape_like(query)));
        clauses.push(format!("e.name ILIKE ${} ESCAPE '\\'", params.len()));
    }
    if let Some(kind) = &filter.kind {
        params.push(kind.to_string());
        clauses.push(format!("e.kind = ${}", params.len()));
    }
    if let Some(state) = &filter.state {
        params.push(state.clone());
        clauses.push(format!("e.state = ${}", params.len()));
    }
    if let Some(city) = &filter.city {
        params.push(city.clone());
        clauses.push(format!("e.city = ${}", params.len()));
    }

    let clause = if clauses.is_empty() {
        "TRUE".to_string()
    } else {
        clauses.join(" AND ")
    };
    (clause, params)
}

/// The filter facets are computed under. Location self-filters are dropped
/// so choosing a city never collapses the city choices to itself; the
/// status visibility rule still applies.
fn facet_filter(filter: &DirectoryFilter) -> DirectoryFilter {
    DirectoryFilter {
        city: None,
        state: None,
        ..filter.clone()
    }
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

/// PostgreSQL implementation of DirectoryRepository.
pub struct PgDirectoryRepository {
    pool: Pool<Postgres>,
}

impl PgDirectoryRepository {
    /// Create a new PgDirectoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Batch lookup: categories for a page of entity ids.
    async fn categories_for(&self, entity_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Category>>> {
        if entity_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT ec.entity_id, c.id, c.name, c.label
             FROM entity_category ec
             JOIN category c ON c.id = ec.category_id
             WHERE ec.entity_id = ANY($1)
             ORDER BY c.label ASC",
        )
        .bind(entity_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut map: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for row in rows {
            let entity_id: Uuid = row.get("entity_id");
            map.entry(entity_id).or_default().push(Category {
                id: row.get("id"),
                name: row.get("name"),
                label: row.get("label"),
            });
        }
        Ok(map)
    }

    /// Batch lookup: caller's upvoted ids within a page of entity ids.
    async fn upvoted_for(
        &self,
        caller: Option<&Caller>,
        entity_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>> {
        let Some(caller) = caller else {
            return Ok(HashSet::new());
        };
        if entity_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            "SELECT entity_id FROM upvote WHERE voter_id = $1 AND entity_id = ANY($2)",
        )
        .bind(caller.id)
        .bind(entity_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|row| row.get("entity_id")).collect())
    }

    /// Batch lookup: upvote totals within a page of entity ids.
    async fn upvote_counts_for(&self, entity_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        if entity_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT entity_id, COUNT(*) AS n FROM upvote
             WHERE entity_id = ANY($1)
             GROUP BY entity_id",
        )
        .bind(entity_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("entity_id"), row.get("n")))
            .collect())
    }

    async fn facets(&self, where_clause: &str, params: &[String]) -> Result<DirectoryFacets> {
        let states_sql = format!(
            "SELECT DISTINCT e.state FROM entity e
             WHERE {} AND e.state IS NOT NULL
             ORDER BY e.state ASC",
            where_clause
        );
        let mut states_query = sqlx::query(&states_sql);
        for param in params {
            states_query = states_query.bind(param);
        }
        let states = states_query
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?
            .into_iter()
            .map(|row| row.get("state"))
            .collect();

        let cities_sql = format!(
            "SELECT DISTINCT e.city, e.state FROM entity e
             WHERE {} AND e.city IS NOT NULL AND e.state IS NOT NULL
             ORDER BY e.state ASC, e.city ASC",
            where_clause
        );
        let mut cities_query = sqlx::query(&cities_sql);
        for param in params {
            cities_query = cities_query.bind(param);
        }
        let cities = cities_query
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?
            .into_iter()
            .map(|row| LocationFacet {
                city: row.get("city"),
                state: row.get("state"),
            })
            .collect();

        Ok(DirectoryFacets { states, cities })
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn list(
        &self,
        filter: DirectoryFilter,
        sort: SortOption,
        page: i64,
        page_size: i64,
        caller: Option<&Caller>,
    ) -> Result<DirectoryPage> {
        let start = Instant::now();
        let elevated = caller.map(|c| c.role.is_elevated()).unwrap_or(false);
        let (where_clause, params) = directory_where(&filter, elevated);

        let count_sql = format!("SELECT COUNT(*) FROM entity e WHERE {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let total: i64 = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get(0);

        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        let page_sql = format!(
            "SELECT {} FROM entity e
             WHERE {}
             ORDER BY {}
             LIMIT ${} OFFSET ${}",
            entity_columns("e"),
            where_clause,
            order_clause(sort),
            limit_idx,
            offset_idx
        );
        let mut page_query = sqlx::query(&page_sql);
        for param in &params {
            page_query = page_query.bind(param);
        }
        let rows = page_query
            .bind(page_size)
            .bind(page_offset(page, page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let entities = rows
            .iter()
            .map(map_entity_row)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();

        // One round trip per concern for the whole page.
        let upvoted = self.upvoted_for(caller, &ids).await?;
        let mut categories = self.categories_for(&ids).await?;
        let counts = self.upvote_counts_for(&ids).await?;

        let enriched = entities
            .into_iter()
            .map(|entity| {
                let id = entity.id;
                EnrichedEntity {
                    upvoted_by_caller: upvoted.contains(&id),
                    categories: categories.remove(&id).unwrap_or_default(),
                    upvote_count: counts.get(&id).copied().unwrap_or(0),
                    entity,
                }
            })
            .collect();

        // Facets ignore the caller's own location selections so the city and
        // state choices stay browsable after one is picked.
        let (facet_clause, facet_params) = directory_where(&facet_filter(&filter), elevated);
        let facets = self.facets(&facet_clause, &facet_params).await?;

        tracing::debug!(
            subsystem = "db",
            component = "directory",
            op = "list",
            result_count = ids.len(),
            total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Directory page served"
        );

        Ok(DirectoryPage {
            entities: enriched,
            total,
            facets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commend_core::{EntityKind, EntityStatus};

    #[test]
    fn test_where_pins_non_elevated_to_published() {
        let filter = DirectoryFilter {
            status: Some(EntityStatus::Pending),
            ..Default::default()
        };
        let (clause, params) = directory_where(&filter, false);
        assert_eq!(clause, "e.status = $1");
        assert_eq!(params, vec!["published".to_string()]);
    }

    #[test]
    fn test_where_honors_status_for_elevated() {
        let filter = DirectoryFilter {
            status: Some(EntityStatus::Pending),
            ..Default::default()
        };
        let (clause, params) = directory_where(&filter, true);
        assert_eq!(clause, "e.status = $1");
        assert_eq!(params, vec!["pending".to_string()]);
    }

    #[test]
    fn test_where_elevated_without_status_sees_all() {
        let (clause, params) = directory_where(&DirectoryFilter::default(), true);
        assert_eq!(clause, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_where_combines_filters_with_and() {
        let filter = DirectoryFilter {
            query: Some("finance".to_string()),
            kind: Some(EntityKind::Department),
            state: Some("CA".to_string()),
            city: Some("Oakland".to_string()),
            status: None,
        };
        let (clause, params) = directory_where(&filter, false);
        assert_eq!(
            clause,
            "e.status = $1 AND e.name ILIKE $2 ESCAPE '\\' AND e.kind = $3 \
             AND e.state = $4 AND e.city = $5"
        );
        assert_eq!(
            params,
            vec![
                "published".to_string(),
                "%finance%".to_string(),
                "department".to_string(),
                "CA".to_string(),
                "Oakland".to_string(),
            ]
        );
    }

    #[test]
    fn test_where_escapes_like_wildcards() {
        let filter = DirectoryFilter {
            query: Some("50%_ops".to_string()),
            ..Default::default()
        };
        let (_, params) = directory_where(&filter, false);
        assert_eq!(params[1], "%50\\%\\_ops%");
    }

    #[test]
    fn test_facet_filter_drops_location_but_keeps_visibility() {
        let filter = DirectoryFilter {
            query: Some("finance".to_string()),
            kind: Some(EntityKind::Department),
            state: Some("CA".to_string()),
            city: Some("Oakland".to_string()),
            status: None,
        };
        let (clause, params) = directory_where(&facet_filter(&filter), false);
        assert_eq!(
            clause,
            "e.status = $1 AND e.name ILIKE $2 ESCAPE '\\' AND e.kind = $3"
        );
        assert_eq!(
            params,
            vec![
                "published".to_string(),
                "%finance%".to_string(),
                "department".to_string(),
            ]
        );
    }

    #[test]
    fn test_facet_filter_keeps_elevated_status() {
        let filter = DirectoryFilter {
            status: Some(EntityStatus::Pending),
            city: Some("Oakland".to_string()),
            ..Default::default()
        };
        let (clause, params) = directory_where(&facet_filter(&filter), true);
        assert_eq!(clause, "e.status = $1");
        assert_eq!(params, vec!["pending".to_string()]);
    }

    #[test]
    fn test_where_ignores_blank_query() {
        let filter = DirectoryFilter {
            query: Some("   ".to_string()),
            ..Default::default()
        };
        let (clause, _) = directory_where(&filter, false);
        assert_eq!(clause, "e.status = $1");
    }
}
