//! Smoke tests for the public surface
//!
//! Happy-path checks of each component in isolation, through the crate's public API.
//! Scenario coverage lives in `scenarios.rs`.

use storefront_core::validation::{LineItemDraft, validate_review};
use storefront_core::{EngineError, OrderDraft, OrderStatus, Ref, TimeStamp};

// IDENTITY CODEC
mod identity_tests {
    use super::*;

    /// Generated references print as 32 lowercase hex digits and parse back
    #[test]
    fn transport_form_is_lowercase_hex() {
        let id = Ref::generate();
        let text = id.to_string();

        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(Ref::parse(&text).unwrap(), id);
    }

    /// Parsing forgives case and surrounding whitespace
    #[test]
    fn parse_is_lenient_about_case_and_padding() {
        let id = Ref::generate();
        let shouted = format!("  {}\n", id.to_string().to_uppercase());

        assert_eq!(shouted.parse::<Ref>().unwrap(), id);
    }

    /// Wrong length, non-hex, and empty input are all invalid identifiers
    #[test]
    fn rejects_malformed_input() {
        for raw in ["", "abc", "0123456789abcdef0123456789abcdeg", "507f1f77bcf86cd799439011"] {
            assert!(
                matches!(Ref::parse(raw), Err(EngineError::InvalidIdentifier(_))),
                "{raw:?} should not parse"
            );
        }
    }

    /// Later references sort after earlier ones
    #[test]
    fn references_follow_creation_order() {
        let first = Ref::generate();
        let second = Ref::generate();

        assert!(first < second);
    }
}

// ORDER STATUS
mod status_tests {
    use super::*;

    #[test]
    fn displays_lowercase_names() {
        assert_eq!(OrderStatus::Shipped.to_string(), "shipped");
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert!(matches!(
            "refunded".parse::<OrderStatus>(),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn new_orders_start_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }
}

// VALIDATION
mod validation_tests {
    use super::*;

    /// An empty draft reports every required field at once
    #[test]
    fn empty_draft_lists_all_missing_fields() {
        let err = OrderDraft::new().validate_and_finalise().unwrap_err();
        let EngineError::Validation(errors) = err else {
            panic!("expected validation error");
        };

        let fields: Vec<_> = errors.fields().collect();
        for expected in [
            "userId",
            "listProduct",
            "totalPriceOrder",
            "city",
            "country",
            "email",
            "firstName",
            "lastName",
            "phoneNumber",
            "paymentMethod",
            "streetAddress",
        ] {
            assert!(fields.contains(&expected), "missing {expected}");
        }
    }

    /// Line items are checked field by field with indexed names
    #[test]
    fn bad_line_item_is_reported_by_index() {
        let err = OrderDraft::new()
            .add_line_item(LineItemDraft {
                product: "nope".into(),
                name: "Serum".into(),
                size: "30ml".into(),
                quantity: 0,
                ..LineItemDraft::default()
            })
            .validate_and_finalise()
            .unwrap_err();
        let EngineError::Validation(errors) = err else {
            panic!("expected validation error");
        };

        let fields: Vec<_> = errors.fields().collect();
        assert!(fields.contains(&"listProduct[0].productId"));
        assert!(fields.contains(&"listProduct[0].quantity"));
        assert!(!fields.contains(&"listProduct"));
    }

    /// Ratings default to five and are clamped into 1..=5
    #[test]
    fn review_rating_defaults_and_clamps() {
        assert_eq!(validate_review(None, "ok").unwrap().rating, 5);
        assert_eq!(validate_review(Some(0), "ok").unwrap().rating, 1);
        assert_eq!(validate_review(Some(9), "ok").unwrap().rating, 5);
        assert_eq!(validate_review(Some(3), "ok").unwrap().rating, 3);
    }

    /// Whitespace-only review text is rejected
    #[test]
    fn blank_review_text_is_rejected() {
        assert!(matches!(
            validate_review(Some(4), " \t\n"),
            Err(EngineError::Validation(_))
        ));
    }
}

// TIMESTAMPS
mod timestamp_tests {
    use super::*;

    #[test]
    fn new_with_rejects_impossible_dates() {
        assert!(TimeStamp::new_with(2024, 2, 30, 0, 0, 0).is_none());
        assert!(TimeStamp::new_with(2024, 2, 29, 0, 0, 0).is_some());
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2024, 1, 1, 0, 0, 0).unwrap();
        let later = TimeStamp::new_with(2024, 1, 1, 0, 0, 1).unwrap();

        assert!(earlier < later);
    }
}
