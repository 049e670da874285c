//! Payment calculation property-based and unit tests
//!
//! Covers:
//! - Property 1: Every line is weight x grade price, rounded to cents
//! - Property 2: Farmer amounts add up to the run total
//! - Property 3: Rejected produce is never paid
//! - Property 4: Prices follow the latest effective date

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    calculate_payment_run, line_amount, round_money, PayableHarvest, PriceBook, PriceEntry,
    QualityGrade,
};
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn book_with(a: Decimal, b: Decimal, c: Decimal) -> PriceBook {
    [(QualityGrade::A, a), (QualityGrade::B, b), (QualityGrade::C, c)]
        .into_iter()
        .map(|(grade, price_per_kg)| PriceEntry {
            crop: "coffee".to_string(),
            grade,
            price_per_kg,
            effective_date: day("2024-01-01"),
        })
        .collect()
}

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Weights from 0.1 to 2000.0 kg with one decimal place
fn weight_strategy() -> impl Strategy<Value = Decimal> {
    (1..=20_000i64).prop_map(|n| Decimal::new(n, 1))
}

/// Prices from 0.01 to 500.00 per kg
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1..=50_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn grade_strategy() -> impl Strategy<Value = QualityGrade> {
    prop_oneof![
        Just(QualityGrade::A),
        Just(QualityGrade::B),
        Just(QualityGrade::C),
        Just(QualityGrade::Reject),
    ]
}

/// Harvests spread over a handful of farmers
fn harvests_strategy() -> impl Strategy<Value = Vec<PayableHarvest>> {
    let farmers: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    prop::collection::vec((0..4usize, grade_strategy(), weight_strategy(), 0..60u32), 1..40)
        .prop_map(move |rows| {
            rows.into_iter()
                .map(|(farmer, grade, weight_kg, offset)| PayableHarvest {
                    harvest_id: Uuid::new_v4(),
                    farmer_id: farmers[farmer],
                    crop: "coffee".to_string(),
                    grade,
                    weight_kg,
                    harvest_date: day("2024-01-01") + chrono::Days::new(offset as u64),
                })
                .collect()
        })
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 1: line amount is the rounded product and never drifts more than half a cent
    #[test]
    fn test_line_amount_is_rounded_product(
        weight in weight_strategy(),
        price in price_strategy(),
    ) {
        let amount = line_amount(weight, price);
        prop_assert!(amount.scale() <= 2);
        prop_assert!((amount - weight * price).abs() <= Decimal::new(5, 3));
        prop_assert_eq!(amount, round_money(weight * price));
    }

    /// Property 2: per-farmer amounts and weights sum to the run totals
    #[test]
    fn test_farmer_amounts_sum_to_total(
        harvests in harvests_strategy(),
        a in price_strategy(),
        b in price_strategy(),
        c in price_strategy(),
    ) {
        let run = calculate_payment_run(&harvests, &book_with(a, b, c)).unwrap();

        let farmer_total: Decimal = run.farmers.iter().map(|f| f.amount).sum();
        prop_assert_eq!(farmer_total, run.total_amount);

        let weight_total: Decimal = harvests.iter().map(|h| h.weight_kg).sum();
        prop_assert_eq!(run.total_weight_kg, weight_total);
        prop_assert_eq!(run.harvest_count, harvests.len());

        for farmer in &run.farmers {
            let line_total: Decimal = farmer.lines.iter().map(|l| l.amount).sum();
            prop_assert_eq!(line_total, farmer.amount);
            prop_assert!(farmer.lines.iter().all(|l| l.farmer_id == farmer.farmer_id));
        }
    }

    /// Property 3: REJECT lines carry a zero price and a zero amount
    #[test]
    fn test_reject_lines_are_free(
        harvests in harvests_strategy(),
        price in price_strategy(),
    ) {
        let run = calculate_payment_run(&harvests, &book_with(price, price, price)).unwrap();
        for line in run.farmers.iter().flat_map(|f| &f.lines) {
            if line.grade.is_reject() {
                prop_assert_eq!(line.unit_price, Decimal::ZERO);
                prop_assert_eq!(line.amount, Decimal::ZERO);
            } else {
                prop_assert_eq!(line.unit_price, price);
            }
        }
    }

    /// Property 4: a harvest is priced by the latest entry on or before its date
    #[test]
    fn test_price_follows_effective_date(
        old in price_strategy(),
        new in price_strategy(),
        offset in 0..30u32,
    ) {
        let mut book = book_with(old, old, old);
        book.insert(PriceEntry {
            crop: "coffee".to_string(),
            grade: QualityGrade::A,
            price_per_kg: new,
            effective_date: day("2024-01-15"),
        });

        let date = day("2024-01-01") + chrono::Days::new(offset as u64);
        let expected = if date >= day("2024-01-15") { new } else { old };
        prop_assert_eq!(book.price_on("coffee", QualityGrade::A, date), Some(expected));
        prop_assert_eq!(book.price_on("coffee", QualityGrade::B, date), Some(old));
    }
}

// ============================================================================
// Unit Tests: Rounding
// ============================================================================

#[cfg(test)]
mod rounding_tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_half_cent_rounds_up() {
        assert_eq!(line_amount(dec("1"), dec("0.005")), dec("0.01"));
        assert_eq!(line_amount(dec("3"), dec("0.335")), dec("1.01"));
    }

    #[test]
    fn test_lines_round_before_summing() {
        // Three lines of 0.004 each would sum to 0.012 unrounded
        let farmer = Uuid::new_v4();
        let harvests: Vec<PayableHarvest> = (0..3)
            .map(|_| PayableHarvest {
                harvest_id: Uuid::new_v4(),
                farmer_id: farmer,
                crop: "coffee".to_string(),
                grade: QualityGrade::C,
                weight_kg: dec("0.1"),
                harvest_date: day("2024-02-01"),
            })
            .collect();
        let run = calculate_payment_run(&harvests, &book_with(dec("1"), dec("1"), dec("0.04"))).unwrap();
        assert_eq!(run.total_amount, dec("0.00"));
    }
}

// ============================================================================
// Unit Tests: Missing Prices
// ============================================================================

#[cfg(test)]
mod missing_price_tests {
    use super::*;
    use shared::DomainError;

    #[test]
    fn test_harvest_before_first_price_fails() {
        let harvest = PayableHarvest {
            harvest_id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            crop: "coffee".to_string(),
            grade: QualityGrade::B,
            weight_kg: Decimal::from(10),
            harvest_date: day("2023-12-31"),
        };
        let err = calculate_payment_run(&[harvest], &book_with(Decimal::ONE, Decimal::ONE, Decimal::ONE))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::MissingPrice {
                crop: "coffee".to_string(),
                grade: "B".to_string(),
                date: day("2023-12-31"),
            }
        );
    }

    #[test]
    fn test_rejected_harvest_needs_no_price() {
        let harvest = PayableHarvest {
            harvest_id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            crop: "cocoa".to_string(),
            grade: QualityGrade::Reject,
            weight_kg: Decimal::from(10),
            harvest_date: day("2024-03-01"),
        };
        let run = calculate_payment_run(&[harvest], &PriceBook::new()).unwrap();
        assert_eq!(run.total_amount, Decimal::ZERO);
        assert_eq!(run.total_weight_kg, Decimal::from(10));
    }
}
