//! Harvest, batch and payment lifecycle tests
//!
//! Covers:
//! - Property 1: Inspection outcome follows the grade
//! - Property 2: Batches only accept verified, unbatched harvests of one crop
//! - Property 3: Generated codes are unique per sequence

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    batch_code, check_batch_candidates, farmer_code, payment_reference, BatchCandidate,
    BatchStatus, DomainError, HarvestStatus, PaymentStatus, QualityGrade,
};
use std::collections::HashSet;
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn grade_strategy() -> impl Strategy<Value = QualityGrade> {
    prop_oneof![
        Just(QualityGrade::A),
        Just(QualityGrade::B),
        Just(QualityGrade::C),
        Just(QualityGrade::Reject),
    ]
}

fn verified_candidates_strategy() -> impl Strategy<Value = Vec<BatchCandidate>> {
    prop::collection::vec(1..=5000i64, 1..20).prop_map(|weights| {
        weights
            .into_iter()
            .map(|w| BatchCandidate {
                id: Uuid::new_v4(),
                crop: "coffee".to_string(),
                status: HarvestStatus::Verified,
                batch_id: None,
                weight_kg: Decimal::new(w, 1),
            })
            .collect()
    })
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 1: REJECT becomes rejected, any other grade becomes verified
    #[test]
    fn test_inspection_outcome(grade in grade_strategy()) {
        let status = HarvestStatus::Pending.verify(grade).unwrap();
        if grade.is_reject() {
            prop_assert_eq!(status, HarvestStatus::Rejected);
        } else {
            prop_assert_eq!(status, HarvestStatus::Verified);
        }
        prop_assert!(!status.is_editable());
        prop_assert!(status.verify(grade).is_err());
    }

    /// Property 2: the batch weight is the sum of its harvests
    #[test]
    fn test_batch_weight_is_sum(candidates in verified_candidates_strategy()) {
        let total = check_batch_candidates("coffee", &candidates).unwrap();
        let expected: Decimal = candidates.iter().map(|c| c.weight_kg).sum();
        prop_assert_eq!(total, expected);
    }

    /// Property 2: a single foreign-crop harvest spoils the whole batch
    #[test]
    fn test_mixed_crop_rejected(
        mut candidates in verified_candidates_strategy(),
        index in any::<prop::sample::Index>(),
    ) {
        let i = index.index(candidates.len());
        candidates[i].crop = "cocoa".to_string();
        prop_assert!(check_batch_candidates("coffee", &candidates).is_err());
    }

    /// Property 3: distinct sequences give distinct codes
    #[test]
    fn test_codes_unique(sequences in prop::collection::hash_set(1..100_000i32, 1..50)) {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let farmers: HashSet<String> = sequences.iter().map(|s| farmer_code("KAF", *s)).collect();
        let batches: HashSet<String> = sequences.iter().map(|s| batch_code("KAF", day, *s)).collect();
        let payments: HashSet<String> =
            sequences.iter().map(|s| payment_reference("KAF", day, *s)).collect();
        prop_assert_eq!(farmers.len(), sequences.len());
        prop_assert_eq!(batches.len(), sequences.len());
        prop_assert_eq!(payments.len(), sequences.len());
    }
}

// ============================================================================
// Unit Tests: Batch Lifecycle
// ============================================================================

#[cfg(test)]
mod batch_lifecycle_tests {
    use super::*;

    fn candidate(status: HarvestStatus, batch_id: Option<Uuid>) -> BatchCandidate {
        BatchCandidate {
            id: Uuid::new_v4(),
            crop: "coffee".to_string(),
            status,
            batch_id,
            weight_kg: Decimal::from(20),
        }
    }

    #[test]
    fn test_open_close_dispatch() {
        let closed = BatchStatus::Open.close(3).unwrap();
        assert_eq!(closed, BatchStatus::Closed);
        assert_eq!(closed.dispatch().unwrap(), BatchStatus::Dispatched);
    }

    #[test]
    fn test_closed_batch_is_frozen() {
        assert!(BatchStatus::Open.ensure_open().is_ok());
        assert!(BatchStatus::Closed.ensure_open().is_err());
        assert!(BatchStatus::Dispatched.ensure_open().is_err());
        assert!(BatchStatus::Dispatched.dispatch().is_err());
        assert!(BatchStatus::Closed.close(1).is_err());
    }

    #[test]
    fn test_pending_rejected_and_batched_harvests_refused() {
        for bad in [
            candidate(HarvestStatus::Pending, None),
            candidate(HarvestStatus::Rejected, None),
            candidate(HarvestStatus::Verified, Some(Uuid::new_v4())),
        ] {
            let err = check_batch_candidates("coffee", &[bad]).unwrap_err();
            assert!(matches!(err, DomainError::Invalid { field: "harvest_ids", .. }));
        }
    }

    #[test]
    fn test_empty_candidate_list_refused() {
        assert!(check_batch_candidates("coffee", &[]).is_err());
    }
}

// ============================================================================
// Unit Tests: Payment Lifecycle
// ============================================================================

#[cfg(test)]
mod payment_lifecycle_tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let approved = PaymentStatus::Pending.approve().unwrap();
        assert_eq!(approved, PaymentStatus::Approved);
        assert_eq!(approved.pay().unwrap(), PaymentStatus::Paid);
    }

    #[test]
    fn test_paid_is_final() {
        assert!(PaymentStatus::Paid.approve().is_err());
        assert!(PaymentStatus::Paid.pay().is_err());
        assert!(PaymentStatus::Paid.cancel().is_err());
    }

    #[test]
    fn test_cancel_before_payment() {
        assert_eq!(PaymentStatus::Pending.cancel().unwrap(), PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::Approved.cancel().unwrap(), PaymentStatus::Cancelled);
        assert!(PaymentStatus::Cancelled.cancel().is_err());
    }

    #[test]
    fn test_transition_error_names_state() {
        let err = PaymentStatus::Pending.pay().unwrap_err();
        assert_eq!(err.to_string(), "cannot pay a payment that is pending");
    }
}
