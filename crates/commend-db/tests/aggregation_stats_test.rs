//! Integration tests for the aggregation engine and schema registry.
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL database.
//! Run migrations first: `sqlx migrate run`

use commend_db::{
    test_fixtures::{admin_caller, connect_test_db, create_published_entity, user_caller},
    AggregationRepository, AttributeMetadata, AttributeResponseInput, AttributeValue,
    CreateAttributeRequest, CreateReviewRequest, CreateTagRequest, EntityKind, Error,
    ReviewRepository, SchemaRegistry, TagType,
};
use uuid::Uuid;

fn base_review(entity_id: Uuid, rating: i16) -> CreateReviewRequest {
    CreateReviewRequest {
        entity_id,
        rating,
        title: format!("Rated {} stars", rating),
        content: "Aggregation fixture review.".to_string(),
        anonymous: false,
        has_evidence: false,
        overall_satisfaction: None,
        recommend_to_others: None,
        experience_date: None,
        attribute_responses: vec![],
        tag_ids: vec![],
    }
}

#[tokio::test]
#[ignore]
async fn test_rating_distribution_counts_and_mean() {
    let db = connect_test_db().await;
    let owner = user_caller();
    let entity_id =
        create_published_entity(&db, &owner, "Distribution Org", EntityKind::Organization).await;

    for rating in [5, 5, 4, 2] {
        let author = user_caller();
        db.reviews
            .create(Some(&author), base_review(entity_id, rating))
            .await
            .expect("create review");
    }

    let dist = db
        .aggregation
        .rating_distribution(entity_id)
        .await
        .expect("distribution");
    assert_eq!(dist.total, 4);
    assert_eq!(dist.counts, [0, 1, 0, 1, 2]);
    assert!((dist.average - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
#[ignore]
async fn test_empty_entity_has_zero_average() {
    let db = connect_test_db().await;
    let owner = user_caller();
    let entity_id =
        create_published_entity(&db, &owner, "Unreviewed Org", EntityKind::Organization).await;

    let dist = db
        .aggregation
        .rating_distribution(entity_id)
        .await
        .expect("distribution");
    assert_eq!(dist.total, 0);
    assert_eq!(dist.average, 0.0);
    assert!(db
        .aggregation
        .tag_stats(entity_id)
        .await
        .expect("tag stats")
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn test_attribute_and_tag_stats_round_trip() {
    let db = connect_test_db().await;
    let admin = admin_caller();
    let owner = user_caller();
    let entity_id =
        create_published_entity(&db, &owner, "Scored Clinic", EntityKind::Department).await;

    let suffix = Uuid::now_v7().simple().to_string();
    let scale_id = db
        .schema
        .create_attribute(
            Some(&admin),
            CreateAttributeRequest {
                entity_kind: EntityKind::Department,
                name: format!("wait_time_{}", suffix),
                label: "Wait time".to_string(),
                category: "service".to_string(),
                display_order: 1,
                required: false,
                metadata: AttributeMetadata::Scale {
                    min: 1.0,
                    max: 5.0,
                    step: 1.0,
                },
            },
        )
        .await
        .expect("create scale attribute");

    // A second active attribute that no review will answer.
    let unanswered_id = db
        .schema
        .create_attribute(
            Some(&admin),
            CreateAttributeRequest {
                entity_kind: EntityKind::Department,
                name: format!("cleanliness_{}", suffix),
                label: "Cleanliness".to_string(),
                category: "service".to_string(),
                display_order: 2,
                required: false,
                metadata: AttributeMetadata::Scale {
                    min: 1.0,
                    max: 5.0,
                    step: 1.0,
                },
            },
        )
        .await
        .expect("create unanswered attribute");

    let tag_id = db
        .schema
        .create_tag(
            Some(&admin),
            CreateTagRequest {
                entity_kind: EntityKind::Department,
                name: format!("friendly_{}", suffix),
                label: "Friendly staff".to_string(),
                tag_type: TagType::Positive,
                category: "service".to_string(),
                color: "#2d9d78".to_string(),
            },
        )
        .await
        .expect("create tag");

    // Two reviews answer the attribute, one selects the tag, a third has
    // neither. Tag percentage divides by all three reviews.
    for (rating, score, tags) in [(5, Some(4.0), vec![tag_id]), (3, Some(2.0), vec![]), (4, None, vec![])] {
        let author = user_caller();
        let mut req = base_review(entity_id, rating);
        if let Some(score) = score {
            req.attribute_responses = vec![AttributeResponseInput {
                attribute_id: scale_id,
                value: AttributeValue::Scale { score },
            }];
        }
        req.tag_ids = tags;
        db.reviews
            .create(Some(&author), req)
            .await
            .expect("create review");
    }

    let stats = db
        .aggregation
        .attribute_stats(entity_id)
        .await
        .expect("attribute stats");
    let stat = stats
        .iter()
        .find(|s| s.attribute_id == scale_id)
        .expect("scale attribute present");
    assert_eq!(stat.response_count, 2);
    match stat.value {
        commend_db::AttributeStatValue::Scale { average } => {
            assert!((average - 3.0).abs() < f64::EPSILON)
        }
        _ => panic!("expected scale stat"),
    }

    // Attributes with no responses are absent, not reported as zero.
    assert!(stats.iter().all(|s| s.attribute_id != unanswered_id));

    let tags = db.aggregation.tag_stats(entity_id).await.expect("tag stats");
    let tag = tags
        .iter()
        .find(|t| t.tag_id == tag_id)
        .expect("tag present");
    assert_eq!(tag.selection_count, 1);
    assert!((tag.percentage - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
#[ignore]
async fn test_review_against_unknown_attribute_is_rejected() {
    let db = connect_test_db().await;
    let owner = user_caller();
    let entity_id =
        create_published_entity(&db, &owner, "Strict Org", EntityKind::Organization).await;
    let author = user_caller();

    let mut req = base_review(entity_id, 4);
    req.attribute_responses = vec![AttributeResponseInput {
        attribute_id: Uuid::now_v7(),
        value: AttributeValue::Boolean { value: true },
    }];

    let err = db
        .reviews
        .create(Some(&author), req)
        .await
        .expect_err("unknown attribute should be rejected");
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
#[ignore]
async fn test_deactivated_attribute_leaves_registry_listing() {
    let db = connect_test_db().await;
    let admin = admin_caller();
    let suffix = Uuid::now_v7().simple().to_string();

    let id = db
        .schema
        .create_attribute(
            Some(&admin),
            CreateAttributeRequest {
                entity_kind: EntityKind::Person,
                name: format!("punctuality_{}", suffix),
                label: "Punctuality".to_string(),
                category: "conduct".to_string(),
                display_order: 9,
                required: false,
                metadata: AttributeMetadata::Boolean {
                    true_label: "On time".to_string(),
                    false_label: "Late".to_string(),
                },
            },
        )
        .await
        .expect("create attribute");

    db.schema
        .deactivate_attribute(Some(&admin), id)
        .await
        .expect("deactivate");

    let listed = db
        .schema
        .attributes_for_kind(EntityKind::Person)
        .await
        .expect("listing");
    assert!(listed.iter().all(|a| a.id != id));
}
