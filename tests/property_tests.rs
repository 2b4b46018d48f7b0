//! Property-based tests for identity parsing, checkout persistence and reporting
//!
//! Invariants here should hold for every input, not just the handful of cases the scenario
//! tests walk through.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use storefront_core::catalog::Product;
use storefront_core::reporting::{
    category_distribution, daily_revenue_series, recent_orders, total_revenue,
};
use storefront_core::validation::{LineItemDraft, validate_review};
use storefront_core::{
    Lifecycle, LineItem, Order, OrderDraft, OrderStatus, OrderStore, Ref, ShippingDetails, Store,
    StoreConfig, TimeStamp,
};

// PROPERTY TEST STRATEGIES

/// Strategy for line items as (quantity, unit price)
fn line_items_strategy() -> impl Strategy<Value = Vec<(u32, u64)>> {
    prop::collection::vec((1u32..=10, 1u64..=5_000_000), 1..6)
}

/// Strategy for optional categories drawn from a small pool, so repeats are common
fn category_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        Just(Some("Skincare".to_string())),
        Just(Some("Makeup".to_string())),
        Just(Some("Haircare".to_string())),
    ]
}

/// Strategy for orders created within the ten days before a fixed "now"
fn orders_strategy() -> impl Strategy<Value = Vec<Order>> {
    prop::collection::vec((0i64..10 * 24 * 60, 1u64..1_000_000, prop::bool::ANY), 0..30).prop_map(
        |specs| {
            specs
                .into_iter()
                .map(|(minutes_ago, total, destroyed)| {
                    order(total, now() - Duration::minutes(minutes_ago), destroyed)
                })
                .collect()
        },
    )
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 7, 15, 30, 0).unwrap()
}

fn order(total: u64, at: chrono::DateTime<Utc>, destroyed: bool) -> Order {
    Order {
        id: Ref::generate(),
        customer: Ref::generate(),
        line_items: vec![LineItem {
            product: Ref::generate(),
            name: "Balm".into(),
            size: "10g".into(),
            quantity: 1,
            unit_price: total,
            line_total: total,
        }],
        total_price: total,
        shipping: ShippingDetails::default(),
        status: OrderStatus::Pending,
        is_paid: false,
        lifecycle: if destroyed {
            Lifecycle::Destroyed
        } else {
            Lifecycle::Active
        },
        created_at: TimeStamp::from(at),
    }
}

fn checkout(customer: &Ref, items: &[(u32, u64)]) -> OrderDraft {
    let mut draft = OrderDraft::new()
        .set_customer(&customer.to_string())
        .set_city("Hue")
        .set_country("Vietnam")
        .set_email("an@example.com")
        .set_first_name("An")
        .set_last_name("Tran")
        .set_phone_number("0912345678")
        .set_payment_method("card")
        .set_street_address("3 Le Loi");
    for (quantity, unit_price) in items {
        draft = draft.add_line_item(LineItemDraft {
            product: Ref::generate().to_string(),
            name: "Balm".into(),
            size: "10g".into(),
            quantity: *quantity,
            unit_price: *unit_price,
            line_total: u64::from(*quantity) * unit_price,
        });
    }
    let total = draft.line_items_total();
    draft.set_total_price(total)
}

// PROPERTY TESTS
proptest! {
    /// Property: any 16 bytes survive the transport form, in either case
    #[test]
    fn ref_transport_form_round_trips(bytes in prop::array::uniform16(any::<u8>()), upper in prop::bool::ANY) {
        let text = hex::encode(bytes);
        let text = if upper { text.to_uppercase() } else { text };

        let parsed = Ref::parse(&text).unwrap();
        prop_assert_eq!(parsed.as_bytes(), &bytes);
        prop_assert_eq!(parsed.to_string(), text.to_lowercase());
    }

    /// Property: strings that are not exactly 32 hex digits never parse
    #[test]
    fn ref_rejects_non_hex(raw in "[g-z]{32}|[0-9a-f]{0,31}|[0-9a-f]{33,40}") {
        prop_assert!(Ref::parse(&raw).is_err());
    }

    /// Property: every rating, however far out of range, lands in 1..=5
    #[test]
    fn review_rating_is_always_in_range(rating in any::<i64>()) {
        let content = validate_review(Some(rating), "fine").unwrap();
        prop_assert!((1..=5).contains(&content.rating));
    }

    /// Property: category counts partition the product list, one entry per category
    #[test]
    fn category_counts_sum_to_product_count(categories in prop::collection::vec(category_strategy(), 0..40)) {
        let products: Vec<Product> = categories
            .into_iter()
            .map(|category| Product {
                id: Ref::generate(),
                name: "p".into(),
                category,
                brand: "b".into(),
                price: 1,
                images: vec![],
            })
            .collect();

        let chart = category_distribution(&products);
        prop_assert_eq!(chart.iter().map(|c| c.count).sum::<usize>(), products.len());

        let mut names: Vec<_> = chart.iter().map(|c| c.category.clone()).collect();
        names.sort();
        names.dedup();
        prop_assert_eq!(names.len(), chart.len());
        prop_assert!(chart.iter().all(|c| !c.category.is_empty()));
    }

    /// Property: the daily series has one entry per day and never exceeds total revenue
    #[test]
    fn daily_series_is_bounded_by_total_revenue(orders in orders_strategy(), days in 1usize..10) {
        let series = daily_revenue_series(&orders, days, &now());

        prop_assert_eq!(series.len(), days);
        prop_assert!(series.windows(2).all(|w| w[0].day < w[1].day));
        prop_assert!(series.iter().map(|d| d.revenue).sum::<u64>() <= total_revenue(&orders));
    }

    /// Property: a window covering every order accounts for all live revenue
    #[test]
    fn wide_window_captures_all_live_revenue(orders in orders_strategy()) {
        let series = daily_revenue_series(&orders, 11, &now());

        prop_assert_eq!(series.iter().map(|d| d.revenue).sum::<u64>(), total_revenue(&orders));
    }

    /// Property: recent orders are sorted newest first and capped
    #[test]
    fn recent_orders_are_sorted_and_capped(orders in orders_strategy(), n in 0usize..10) {
        let recent = recent_orders(&orders, n);

        prop_assert_eq!(recent.len(), n.min(orders.len()));
        prop_assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a persisted order reads back exactly, and its total equals the line sum
    #[test]
    fn created_orders_read_back_unchanged(items in line_items_strategy()) {
        let store = Arc::new(Store::open(&StoreConfig::temporary()).unwrap());
        let orders = OrderStore::new(store);
        let customer = Ref::generate();

        let created = orders.create(&checkout(&customer, &items)).unwrap();
        let stored = orders.get_by_id(&created.id).unwrap().unwrap();

        prop_assert_eq!(&stored, &created);
        prop_assert_eq!(stored.total_price, stored.line_items_total());
        prop_assert_eq!(stored.status, OrderStatus::Pending);
        prop_assert!(!stored.is_paid);
    }

    /// Property: soft-deleted orders never appear in any listing
    #[test]
    fn destroyed_orders_stay_out_of_listings(deletions in prop::collection::vec(prop::bool::ANY, 1..8)) {
        let store = Arc::new(Store::open(&StoreConfig::temporary()).unwrap());
        let orders = OrderStore::new(store);
        let customer = Ref::generate();

        let mut live = 0;
        for delete in &deletions {
            let order = orders.create(&checkout(&customer, &[(1, 100)])).unwrap();
            if *delete {
                orders.soft_delete(&order.id).unwrap();
            } else {
                live += 1;
            }
        }

        prop_assert_eq!(orders.list_for_customer(&customer).unwrap().len(), live);
        prop_assert!(orders.snapshot().unwrap().iter().all(|o| !o.is_destroyed()));
    }
}
