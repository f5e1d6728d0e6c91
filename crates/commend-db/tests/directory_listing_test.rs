//! Integration tests for the directory listing façade.
//!
//! This test suite validates:
//! - Non-elevated callers only ever see published entities
//! - Elevated callers may filter by status
//! - Enrichment carries per-caller upvote flags and upvote counts
//! - Adjacent pages do not overlap and share one total
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL database.
//! Run migrations first: `sqlx migrate run`

use commend_db::{
    test_fixtures::{admin_caller, connect_test_db, create_published_entity, unique_slug, user_caller},
    CreateEntityRequest, DirectoryFilter, DirectoryRepository, EntityKind, EntityRepository,
    EntityStatus, SortOption, Unlimited, UpvoteRepository,
};
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn test_pending_entities_hidden_from_regular_callers() {
    let db = connect_test_db().await;
    let owner = user_caller();

    let marker = format!("Hidden Pending {}", Uuid::now_v7().simple());
    db.entities
        .create(
            Some(&owner),
            CreateEntityRequest {
                name: marker.clone(),
                slug: unique_slug("pending"),
                kind: EntityKind::Organization,
                keywords: vec![],
                city: None,
                state: None,
                category_ids: vec![],
            },
        )
        .await
        .expect("create pending entity");

    let filter = DirectoryFilter {
        query: Some(marker.clone()),
        ..Default::default()
    };

    let anonymous = db
        .directory
        .list(filter.clone(), SortOption::Recent, 1, 20, None)
        .await
        .expect("anonymous listing");
    assert_eq!(anonymous.total, 0);

    // An admin filtering for pending sees it.
    let admin = admin_caller();
    let elevated = db
        .directory
        .list(
            DirectoryFilter {
                status: Some(EntityStatus::Pending),
                ..filter
            },
            SortOption::Recent,
            1,
            20,
            Some(&admin),
        )
        .await
        .expect("elevated listing");
    assert_eq!(elevated.total, 1);
}

#[tokio::test]
#[ignore]
async fn test_enrichment_flags_caller_upvotes() {
    let db = connect_test_db().await;
    let owner = user_caller();
    let marker = format!("Enriched {}", Uuid::now_v7().simple());
    let entity_id =
        create_published_entity(&db, &owner, &marker, EntityKind::Organization).await;

    let voter = user_caller();
    db.upvotes
        .toggle(Some(&voter), entity_id, &Unlimited)
        .await
        .expect("upvote");

    let filter = DirectoryFilter {
        query: Some(marker),
        ..Default::default()
    };

    let page = db
        .directory
        .list(filter.clone(), SortOption::Recent, 1, 20, Some(&voter))
        .await
        .expect("voter listing");
    let row = page
        .entities
        .iter()
        .find(|e| e.entity.id == entity_id)
        .expect("entity should be listed");
    assert!(row.upvoted_by_caller);
    assert_eq!(row.upvote_count, 1);

    // A different caller sees the count but not the flag.
    let other = user_caller();
    let page = db
        .directory
        .list(filter, SortOption::Recent, 1, 20, Some(&other))
        .await
        .expect("other listing");
    let row = page
        .entities
        .iter()
        .find(|e| e.entity.id == entity_id)
        .expect("entity should be listed");
    assert!(!row.upvoted_by_caller);
    assert_eq!(row.upvote_count, 1);
}

#[tokio::test]
#[ignore]
async fn test_pages_do_not_overlap() {
    let db = connect_test_db().await;
    let owner = user_caller();
    let marker = format!("Paged {}", Uuid::now_v7().simple());
    for i in 0..5 {
        create_published_entity(
            &db,
            &owner,
            &format!("{} number {}", marker, i),
            EntityKind::Organization,
        )
        .await;
    }

    let filter = DirectoryFilter {
        query: Some(marker),
        ..Default::default()
    };

    let page1 = db
        .directory
        .list(filter.clone(), SortOption::Alphabetical, 1, 2, None)
        .await
        .expect("page 1");
    let page2 = db
        .directory
        .list(filter, SortOption::Alphabetical, 2, 2, None)
        .await
        .expect("page 2");

    assert_eq!(page1.total, 5);
    assert_eq!(page2.total, 5);
    let ids1: Vec<Uuid> = page1.entities.iter().map(|e| e.entity.id).collect();
    let ids2: Vec<Uuid> = page2.entities.iter().map(|e| e.entity.id).collect();
    assert!(ids1.iter().all(|id| !ids2.contains(id)));
}

#[tokio::test]
#[ignore]
async fn test_facets_reflect_visible_rows() {
    let db = connect_test_db().await;
    let owner = user_caller();
    let marker = format!("Faceted {}", Uuid::now_v7().simple());
    create_published_entity(&db, &owner, &marker, EntityKind::Organization).await;

    let page = db
        .directory
        .list(
            DirectoryFilter {
                query: Some(marker),
                ..Default::default()
            },
            SortOption::Recent,
            1,
            20,
            None,
        )
        .await
        .expect("listing");

    // The fixture entity carries Springfield, IL.
    assert!(page.facets.states.iter().any(|s| s == "IL"));
    assert!(page
        .facets
        .cities
        .iter()
        .any(|c| c.city == "Springfield" && c.state == "IL"));
}
