//! Field-level validation for user-submitted content.

use crate::error::{Error, Result};
use crate::models::{AttributeMetadata, AttributeValue, ReviewAttribute};

/// Maximum review title length in characters.
pub const MAX_TITLE_LEN: usize = 100;

/// Maximum review content length in characters.
pub const MAX_CONTENT_LEN: usize = 1000;

/// Maximum entity name length in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Validate the core review fields: rating in [1,5], bounded non-empty
/// title/content, optional satisfaction in [1,10].
pub fn validate_review_fields(
    rating: i16,
    title: &str,
    content: &str,
    overall_satisfaction: Option<i16>,
) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(Error::Validation(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )));
    }
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::Validation(format!(
            "title must be {} characters or less",
            MAX_TITLE_LEN
        )));
    }
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::Validation("content cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(Error::Validation(format!(
            "content must be {} characters or less",
            MAX_CONTENT_LEN
        )));
    }
    if let Some(satisfaction) = overall_satisfaction {
        if !(1..=10).contains(&satisfaction) {
            return Err(Error::Validation(format!(
                "overall satisfaction must be between 1 and 10, got {}",
                satisfaction
            )));
        }
    }
    Ok(())
}

/// Validate a submitted attribute value against its definition: the variant
/// must match the declared type, and scale scores must sit within the
/// configured bounds.
pub fn validate_attribute_value(attribute: &ReviewAttribute, value: &AttributeValue) -> Result<()> {
    if value.attribute_type() != attribute.attribute_type {
        return Err(Error::Validation(format!(
            "attribute '{}' expects a {} value",
            attribute.name, attribute.attribute_type
        )));
    }
    match (value, &attribute.metadata) {
        (AttributeValue::Scale { score }, AttributeMetadata::Scale { min, max, .. }) => {
            if score < min || score > max {
                return Err(Error::Validation(format!(
                    "attribute '{}' score {} outside [{}, {}]",
                    attribute.name, score, min, max
                )));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate an entity name.
pub fn validate_entity_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "name must be {} characters or less",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Validate a slug: 1-100 characters of lowercase alphanumerics and hyphens.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 100 {
        return Err(Error::Validation(
            "slug must be between 1 and 100 characters".to_string(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::Validation(
            "slug may only contain lowercase letters, digits, and hyphens".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeType, EntityKind};
    use uuid::Uuid;

    fn scale_attribute(min: f64, max: f64) -> ReviewAttribute {
        ReviewAttribute {
            id: Uuid::new_v4(),
            entity_kind: EntityKind::Department,
            name: "responsiveness".to_string(),
            label: "Responsiveness".to_string(),
            attribute_type: AttributeType::Scale,
            category: "service".to_string(),
            display_order: 1,
            required: false,
            active: true,
            metadata: AttributeMetadata::Scale {
                min,
                max,
                step: 1.0,
            },
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(validate_review_fields(0, "t", "c", None).is_err());
        assert!(validate_review_fields(6, "t", "c", None).is_err());
        for rating in 1..=5 {
            assert!(validate_review_fields(rating, "t", "c", None).is_ok());
        }
    }

    #[test]
    fn test_title_bounds() {
        assert!(validate_review_fields(3, "", "c", None).is_err());
        assert!(validate_review_fields(3, "   ", "c", None).is_err());
        assert!(validate_review_fields(3, &"x".repeat(100), "c", None).is_ok());
        assert!(validate_review_fields(3, &"x".repeat(101), "c", None).is_err());
    }

    #[test]
    fn test_content_bounds() {
        assert!(validate_review_fields(3, "t", "", None).is_err());
        assert!(validate_review_fields(3, "t", &"x".repeat(1000), None).is_ok());
        assert!(validate_review_fields(3, "t", &"x".repeat(1001), None).is_err());
    }

    #[test]
    fn test_satisfaction_bounds() {
        assert!(validate_review_fields(3, "t", "c", Some(0)).is_err());
        assert!(validate_review_fields(3, "t", "c", Some(11)).is_err());
        assert!(validate_review_fields(3, "t", "c", Some(1)).is_ok());
        assert!(validate_review_fields(3, "t", "c", Some(10)).is_ok());
    }

    #[test]
    fn test_attribute_value_type_mismatch() {
        let attr = scale_attribute(1.0, 5.0);
        let err = validate_attribute_value(&attr, &AttributeValue::Boolean { value: true });
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn test_scale_score_within_bounds() {
        let attr = scale_attribute(1.0, 5.0);
        assert!(validate_attribute_value(&attr, &AttributeValue::Scale { score: 1.0 }).is_ok());
        assert!(validate_attribute_value(&attr, &AttributeValue::Scale { score: 5.0 }).is_ok());
        assert!(validate_attribute_value(&attr, &AttributeValue::Scale { score: 5.5 }).is_err());
        assert!(validate_attribute_value(&attr, &AttributeValue::Scale { score: 0.5 }).is_err());
    }

    #[test]
    fn test_slug_rules() {
        assert!(validate_slug("finance-dept-3").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Finance").is_err());
        assert!(validate_slug("a b").is_err());
        assert!(validate_slug(&"a".repeat(101)).is_err());
    }
}
