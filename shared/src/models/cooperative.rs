//! Cooperative (tenant) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered cooperative; every tenant-scoped record points to one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cooperative {
    pub id: Uuid,
    pub name: String,
    /// Short uppercase code used as the prefix of generated identifiers
    pub code: String,
    pub region: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kinds of generated, per-cooperative sequential codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Farmer,
    Batch,
    Payment,
}

impl CodeKind {
    /// Key used for the sequence counter row
    pub fn sequence_key(&self) -> &'static str {
        match self {
            CodeKind::Farmer => "farmer",
            CodeKind::Batch => "batch",
            CodeKind::Payment => "payment",
        }
    }
}

/// Counter scope for codes numbered per day
pub fn daily_scope(day: chrono::NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

/// `{COOP}-F{NNNNN}`
pub fn farmer_code(coop_code: &str, sequence: i32) -> String {
    format!("{}-F{:05}", coop_code, sequence)
}

/// `{COOP}-B{YYYYMMDD}-{NN}`
pub fn batch_code(coop_code: &str, day: chrono::NaiveDate, sequence: i32) -> String {
    format!("{}-B{}-{:02}", coop_code, day.format("%Y%m%d"), sequence)
}

/// `{COOP}-P{YYYYMMDD}-{NNNN}`
pub fn payment_reference(coop_code: &str, day: chrono::NaiveDate, sequence: i32) -> String {
    format!("{}-P{}-{:04}", coop_code, day.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_daily_scope() {
        let day = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        assert_eq!(daily_scope(day), "20240703");
    }

    #[test]
    fn test_generated_codes() {
        let day = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        assert_eq!(farmer_code("KAF", 12), "KAF-F00012");
        assert_eq!(batch_code("KAF", day, 4), "KAF-B20240703-04");
        assert_eq!(payment_reference("KAF", day, 151), "KAF-P20240703-0151");
    }

    #[test]
    fn test_sequence_keys_distinct() {
        assert_ne!(CodeKind::Farmer.sequence_key(), CodeKind::Batch.sequence_key());
        assert_ne!(CodeKind::Batch.sequence_key(), CodeKind::Payment.sequence_key());
    }
}
