//! Per-list spending totals.
//!
//! Totals are recomputed from the full product snapshot on every delivery.
//! Products are append-only, so this matches a running sum keyed by list.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::Locale;
use crate::models::Product;

/// Sum of product prices keyed by list id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTotals(HashMap<String, Decimal>);

impl ListTotals {
    pub fn from_products(products: &[Product]) -> Self {
        let mut totals: HashMap<String, Decimal> = HashMap::new();
        for product in products {
            let total = totals.entry(product.list_id.clone()).or_default();
            *total = total.saturating_add(product.price);
        }
        Self(totals)
    }

    /// Total for a list; zero when it has no products.
    pub fn get(&self, list_id: &str) -> Decimal {
        self.0.get(list_id).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Every product of an owner together with the totals derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductsSnapshot {
    pub products: Vec<Product>,
    pub totals: ListTotals,
}

impl ProductsSnapshot {
    pub fn new(products: Vec<Product>) -> Self {
        let totals = ListTotals::from_products(&products);
        Self { products, totals }
    }
}

/// Sum of prices, saturating at `Decimal::MAX`.
pub fn sum_prices(products: &[Product]) -> Decimal {
    products
        .iter()
        .fold(Decimal::ZERO, |total, p| total.saturating_add(p.price))
}

/// Render an amount the way the screens show it, e.g. `$12.50`.
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "${:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Calendar date of an epoch-millisecond timestamp in `tz`, day first for
/// `es` and month first for `en`. Empty when out of range.
pub fn format_date<Tz: TimeZone>(millis: i64, locale: Locale, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let pattern = match locale {
        Locale::Es => "%d/%m/%Y",
        Locale::En => "%m/%d/%Y",
    };
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(tz).format(pattern).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, list_id: &str, price: &str) -> Product {
        Product {
            id: id.to_string(),
            list_id: list_id.to_string(),
            owner_id: "u1".to_string(),
            name: id.to_string(),
            price: price.parse().unwrap(),
            store: String::new(),
            link: String::new(),
            created_at: 0,
        }
    }

    #[test]
    fn groups_and_sums_by_list() {
        let products = vec![
            product("a", "l1", "10.10"),
            product("b", "l2", "3"),
            product("c", "l1", "0.20"),
        ];
        let totals = ListTotals::from_products(&products);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get("l1"), Decimal::new(1030, 2));
        assert_eq!(totals.get("l2"), Decimal::from(3));
        assert_eq!(totals.get("missing"), Decimal::ZERO);
    }

    #[test]
    fn dashboard_total_matches_detail_sum_in_any_order() {
        let products = vec![
            product("a", "l1", "0.1"),
            product("b", "l1", "0.2"),
            product("c", "l2", "99.99"),
            product("d", "l1", "0.3"),
        ];
        let totals = ListTotals::from_products(&products);

        let mut detail: Vec<Product> = products.iter().filter(|p| p.list_id == "l1").cloned().collect();
        detail.reverse();
        assert_eq!(totals.get("l1"), sum_prices(&detail));
        assert_eq!(sum_prices(&detail), Decimal::new(6, 1));
    }

    #[test]
    fn empty_snapshot_has_no_totals() {
        let snapshot = ProductsSnapshot::new(Vec::new());
        assert!(snapshot.totals.is_empty());
        assert_eq!(sum_prices(&snapshot.products), Decimal::ZERO);
    }

    #[test]
    fn oversized_prices_saturate_instead_of_overflowing() {
        let mut products = vec![product("a", "l1", "1"), product("b", "l1", "1")];
        for p in &mut products {
            p.price = Decimal::MAX;
        }
        let totals = ListTotals::from_products(&products);
        assert_eq!(totals.get("l1"), Decimal::MAX);
        assert_eq!(sum_prices(&products), Decimal::MAX);
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_amount(Decimal::from(5)), "$5.00");
        assert_eq!(format_amount(Decimal::new(12345, 3)), "$12.35");
    }

    #[test]
    fn dates_follow_locale_order() {
        // 2024-03-05T12:00:00Z
        let millis = 1_709_640_000_000;
        assert_eq!(format_date(millis, Locale::Es, &chrono::Utc), "05/03/2024");
        assert_eq!(format_date(millis, Locale::En, &chrono::Utc), "03/05/2024");
        assert_eq!(format_date(i64::MAX, Locale::Es, &chrono::Utc), "");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn products() -> impl Strategy<Value = Vec<Product>> {
            // Cents up to one million, spread over a handful of lists.
            prop::collection::vec((0u8..5, 0i64..100_000_000), 0..64).prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (list, cents))| Product {
                        price: Decimal::new(cents, 2),
                        ..product(&format!("p{i}"), &format!("l{list}"), "0")
                    })
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn totals_equal_per_list_sums(products in products()) {
                let totals = ListTotals::from_products(&products);
                for list in 0..5 {
                    let list_id = format!("l{list}");
                    let mut detail: Vec<Product> =
                        products.iter().filter(|p| p.list_id == list_id).cloned().collect();
                    prop_assert_eq!(totals.get(&list_id), sum_prices(&detail));
                    detail.reverse();
                    prop_assert_eq!(totals.get(&list_id), sum_prices(&detail));
                }
                prop_assert!(totals.len() <= 5);
            }
        }
    }
}
