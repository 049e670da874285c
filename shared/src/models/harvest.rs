//! Harvest models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// A harvest delivered by a farmer to the cooperative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Harvest {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub farmer_id: Uuid,
    pub crop: String,
    pub weight_kg: Decimal,
    pub harvest_date: NaiveDate,
    pub status: HarvestStatus,
    pub grade: Option<QualityGrade>,
    pub moisture_percent: Option<Decimal>,
    pub inspector_id: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub batch_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a harvest record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HarvestStatus {
    /// Recorded by a clerk, awaiting inspection
    Pending,
    /// Inspected and graded A, B or C
    Verified,
    /// Inspected and graded REJECT
    Rejected,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStatus::Pending => "pending",
            HarvestStatus::Verified => "verified",
            HarvestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(HarvestStatus::Pending),
            "verified" => Some(HarvestStatus::Verified),
            "rejected" => Some(HarvestStatus::Rejected),
            _ => None,
        }
    }

    /// Only pending harvests may be edited or deleted
    pub fn is_editable(&self) -> bool {
        matches!(self, HarvestStatus::Pending)
    }

    /// Status after an inspector assigns `grade`
    pub fn verify(self, grade: QualityGrade) -> Result<HarvestStatus, DomainError> {
        if self != HarvestStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "harvest",
                from: self.as_str().to_string(),
                action: "verify",
            });
        }
        Ok(if grade.is_reject() {
            HarvestStatus::Rejected
        } else {
            HarvestStatus::Verified
        })
    }
}

impl std::fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality grade assigned at inspection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityGrade {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "REJECT")]
    Reject,
}

impl QualityGrade {
    /// Grades that carry a price
    pub const PRICED: [QualityGrade; 3] = [QualityGrade::A, QualityGrade::B, QualityGrade::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::Reject => "REJECT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(QualityGrade::A),
            "B" => Some(QualityGrade::B),
            "C" => Some(QualityGrade::C),
            "REJECT" => Some(QualityGrade::Reject),
            _ => None,
        }
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, QualityGrade::Reject)
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityGrade::A => "Grade A (premium)",
            QualityGrade::B => "Grade B (standard)",
            QualityGrade::C => "Grade C (low)",
            QualityGrade::Reject => "Rejected",
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_pending_with_grade() {
        assert_eq!(
            HarvestStatus::Pending.verify(QualityGrade::B),
            Ok(HarvestStatus::Verified)
        );
    }

    #[test]
    fn test_verify_reject_grade_rejects() {
        assert_eq!(
            HarvestStatus::Pending.verify(QualityGrade::Reject),
            Ok(HarvestStatus::Rejected)
        );
    }

    #[test]
    fn test_verify_twice_fails() {
        let err = HarvestStatus::Verified.verify(QualityGrade::A).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { action: "verify", .. }));
        assert!(HarvestStatus::Rejected.verify(QualityGrade::A).is_err());
    }

    #[test]
    fn test_grade_parse_is_case_insensitive() {
        assert_eq!(QualityGrade::parse("a"), Some(QualityGrade::A));
        assert_eq!(QualityGrade::parse(" reject "), Some(QualityGrade::Reject));
        assert_eq!(QualityGrade::parse("D"), None);
    }

    #[test]
    fn test_only_pending_is_editable() {
        assert!(HarvestStatus::Pending.is_editable());
        assert!(!HarvestStatus::Verified.is_editable());
        assert!(!HarvestStatus::Rejected.is_editable());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&QualityGrade::Reject).unwrap(), "\"REJECT\"");
        assert_eq!(serde_json::to_string(&HarvestStatus::Verified).unwrap(), "\"verified\"");
        let grade: QualityGrade = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(grade, QualityGrade::B);
    }
}
