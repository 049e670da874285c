//! Payment models and the payment calculation
//!
//! A farmer is paid `weight_kg × unit_price` for every verified harvest, where
//! the unit price comes from the price sheet effective on the harvest date for
//! the harvest's crop and grade. Line amounts are rounded to cents before they
//! are summed so that a payment always equals the sum of its printed lines.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PriceBook, QualityGrade};
use crate::error::DomainError;

/// A payment owed or made to a farmer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub farmer_id: Uuid,
    pub reference: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_weight_kg: Decimal,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub transaction_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "approved" => Some(PaymentStatus::Approved),
            "paid" => Some(PaymentStatus::Paid),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    fn invalid(self, action: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            entity: "payment",
            from: self.as_str().to_string(),
            action,
        }
    }

    pub fn approve(self) -> Result<Self, DomainError> {
        match self {
            PaymentStatus::Pending => Ok(PaymentStatus::Approved),
            other => Err(other.invalid("approve")),
        }
    }

    pub fn pay(self) -> Result<Self, DomainError> {
        match self {
            PaymentStatus::Approved => Ok(PaymentStatus::Paid),
            other => Err(other.invalid("pay")),
        }
    }

    pub fn cancel(self) -> Result<Self, DomainError> {
        match self {
            PaymentStatus::Pending | PaymentStatus::Approved => Ok(PaymentStatus::Cancelled),
            other => Err(other.invalid("cancel")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "mobile_money" => Some(PaymentMethod::MobileMoney),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }

    /// Non-cash payments must carry a transaction reference
    pub fn requires_reference(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

/// A verified harvest waiting to be paid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayableHarvest {
    pub harvest_id: Uuid,
    pub farmer_id: Uuid,
    pub crop: String,
    pub grade: QualityGrade,
    pub weight_kg: Decimal,
    pub harvest_date: NaiveDate,
}

/// One priced harvest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentLine {
    pub harvest_id: Uuid,
    pub farmer_id: Uuid,
    pub crop: String,
    pub grade: QualityGrade,
    pub weight_kg: Decimal,
    pub harvest_date: NaiveDate,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Totals owed to a single farmer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmerPaymentSummary {
    pub farmer_id: Uuid,
    pub harvest_count: usize,
    pub total_weight_kg: Decimal,
    pub amount: Decimal,
    pub lines: Vec<PaymentLine>,
}

/// Summary of a whole payment run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRunSummary {
    pub farmer_count: usize,
    pub harvest_count: usize,
    pub total_weight_kg: Decimal,
    pub total_amount: Decimal,
    pub farmers: Vec<FarmerPaymentSummary>,
}

/// Round a money amount to cents, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `weight × unit price`, rounded to cents
pub fn line_amount(weight_kg: Decimal, unit_price: Decimal) -> Decimal {
    round_money(weight_kg * unit_price)
}

/// Price every harvest against the book. Fails on the first harvest without a price.
pub fn price_harvests(harvests: &[PayableHarvest], prices: &PriceBook) -> Result<Vec<PaymentLine>, DomainError> {
    harvests
        .iter()
        .map(|h| {
            let unit_price = prices.require_price(&h.crop, h.grade, h.harvest_date)?;
            Ok(PaymentLine {
                harvest_id: h.harvest_id,
                farmer_id: h.farmer_id,
                crop: h.crop.clone(),
                grade: h.grade,
                weight_kg: h.weight_kg,
                harvest_date: h.harvest_date,
                unit_price,
                amount: line_amount(h.weight_kg, unit_price),
            })
        })
        .collect()
}

/// Group lines per farmer, ordered by farmer id, lines ordered by harvest date
pub fn aggregate_by_farmer(lines: Vec<PaymentLine>) -> Vec<FarmerPaymentSummary> {
    let mut grouped: BTreeMap<Uuid, Vec<PaymentLine>> = BTreeMap::new();
    for line in lines {
        grouped.entry(line.farmer_id).or_default().push(line);
    }

    grouped
        .into_iter()
        .map(|(farmer_id, mut lines)| {
            lines.sort_by(|a, b| {
                a.harvest_date
                    .cmp(&b.harvest_date)
                    .then(a.harvest_id.cmp(&b.harvest_id))
            });
            FarmerPaymentSummary {
                farmer_id,
                harvest_count: lines.len(),
                total_weight_kg: lines.iter().map(|l| l.weight_kg).sum(),
                amount: lines.iter().map(|l| l.amount).sum(),
                lines,
            }
        })
        .collect()
}

/// Price and aggregate a set of payable harvests
pub fn calculate_payment_run(harvests: &[PayableHarvest], prices: &PriceBook) -> Result<PaymentRunSummary, DomainError> {
    let farmers = aggregate_by_farmer(price_harvests(harvests, prices)?);
    Ok(PaymentRunSummary {
        farmer_count: farmers.len(),
        harvest_count: farmers.iter().map(|f| f.harvest_count).sum(),
        total_weight_kg: farmers.iter().map(|f| f.total_weight_kg).sum(),
        total_amount: farmers.iter().map(|f| f.amount).sum(),
        farmers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceEntry;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn prices() -> PriceBook {
        [
            (QualityGrade::A, "52.50"),
            (QualityGrade::B, "45.00"),
            (QualityGrade::C, "30.25"),
        ]
        .into_iter()
        .map(|(grade, price)| PriceEntry {
            crop: "coffee".to_string(),
            grade,
            price_per_kg: dec(price),
            effective_date: d("2024-01-01"),
        })
        .collect()
    }

    fn harvest(farmer_id: Uuid, grade: QualityGrade, kg: &str) -> PayableHarvest {
        PayableHarvest {
            harvest_id: Uuid::new_v4(),
            farmer_id,
            crop: "coffee".to_string(),
            grade,
            weight_kg: dec(kg),
            harvest_date: d("2024-02-10"),
        }
    }

    #[test]
    fn test_line_amount_rounds_half_away_from_zero() {
        assert_eq!(line_amount(dec("0.1"), dec("0.25")), dec("0.03"));
        assert_eq!(line_amount(dec("12.5"), dec("30.25")), dec("378.13"));
        assert_eq!(line_amount(dec("10"), dec("45")), dec("450.00"));
    }

    #[test]
    fn test_run_aggregates_per_farmer() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let harvests = vec![
            harvest(alice, QualityGrade::A, "100"),
            harvest(alice, QualityGrade::B, "20"),
            harvest(bob, QualityGrade::C, "12.5"),
        ];

        let run = calculate_payment_run(&harvests, &prices()).unwrap();
        assert_eq!(run.farmer_count, 2);
        assert_eq!(run.harvest_count, 3);
        assert_eq!(run.total_weight_kg, dec("132.5"));

        let a = run.farmers.iter().find(|f| f.farmer_id == alice).unwrap();
        assert_eq!(a.amount, dec("6150.00"));
        let b = run.farmers.iter().find(|f| f.farmer_id == bob).unwrap();
        assert_eq!(b.amount, dec("378.13"));
        assert_eq!(run.total_amount, dec("6528.13"));
    }

    #[test]
    fn test_missing_price_fails_run() {
        let mut h = harvest(Uuid::new_v4(), QualityGrade::A, "10");
        h.crop = "cocoa".to_string();
        let err = calculate_payment_run(&[h], &prices()).unwrap_err();
        assert!(matches!(err, DomainError::MissingPrice { ref crop, .. } if crop == "cocoa"));
    }

    #[test]
    fn test_empty_run() {
        let run = calculate_payment_run(&[], &prices()).unwrap();
        assert_eq!(run.farmer_count, 0);
        assert_eq!(run.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_payment_status_flow() {
        let approved = PaymentStatus::Pending.approve().unwrap();
        assert_eq!(approved.pay(), Ok(PaymentStatus::Paid));
        assert!(PaymentStatus::Pending.pay().is_err());
        assert!(PaymentStatus::Paid.cancel().is_err());
        assert_eq!(PaymentStatus::Approved.cancel(), Ok(PaymentStatus::Cancelled));
        assert!(PaymentStatus::Cancelled.approve().is_err());
    }

    #[test]
    fn test_method_reference_requirement() {
        assert!(!PaymentMethod::Cash.requires_reference());
        assert!(PaymentMethod::MobileMoney.requires_reference());
        assert_eq!(PaymentMethod::parse("bank_transfer"), Some(PaymentMethod::BankTransfer));
    }
}
