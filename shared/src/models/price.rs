//! Daily price configuration models

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::QualityGrade;
use crate::error::DomainError;

/// A price per kilogram for one crop and grade, effective from a given day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceEntry {
    pub crop: String,
    pub grade: QualityGrade,
    pub price_per_kg: Decimal,
    pub effective_date: NaiveDate,
}

impl PriceEntry {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.grade.is_reject() {
            return Err(DomainError::invalid("grade", "rejected produce cannot be priced"));
        }
        if self.price_per_kg <= Decimal::ZERO {
            return Err(DomainError::invalid("price_per_kg", "price must be greater than 0"));
        }
        if !crate::validation::fits_stored_scale(self.price_per_kg) {
            return Err(DomainError::invalid("price_per_kg", "price can have at most 2 decimal places"));
        }
        if self.crop.trim().is_empty() {
            return Err(DomainError::invalid("crop", "crop is required"));
        }
        Ok(())
    }
}

/// Price history indexed by (crop, grade), each list ordered by effective date
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    entries: BTreeMap<(String, QualityGrade), BTreeMap<NaiveDate, Decimal>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; a later insert for the same day replaces the earlier one
    pub fn insert(&mut self, entry: PriceEntry) {
        self.entries
            .entry((entry.crop, entry.grade))
            .or_default()
            .insert(entry.effective_date, entry.price_per_kg);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Price effective on `date`: the entry with the latest effective date not after it.
    ///
    /// Rejected produce is always worth zero.
    pub fn price_on(&self, crop: &str, grade: QualityGrade, date: NaiveDate) -> Option<Decimal> {
        if grade.is_reject() {
            return Some(Decimal::ZERO);
        }
        self.entries
            .get(&(crop.to_string(), grade))?
            .range(..=date)
            .next_back()
            .map(|(_, price)| *price)
    }

    /// Like [`price_on`](Self::price_on) but with a descriptive error
    pub fn require_price(&self, crop: &str, grade: QualityGrade, date: NaiveDate) -> Result<Decimal, DomainError> {
        self.price_on(crop, grade, date)
            .ok_or_else(|| DomainError::MissingPrice {
                crop: crop.to_string(),
                grade: grade.to_string(),
                date,
            })
    }

    /// The sheet in force on `date`: one entry per (crop, grade) that has a price by then
    pub fn sheet_on(&self, date: NaiveDate) -> Vec<PriceEntry> {
        self.entries
            .iter()
            .filter_map(|((crop, grade), history)| {
                history
                    .range(..=date)
                    .next_back()
                    .map(|(effective_date, price)| PriceEntry {
                        crop: crop.clone(),
                        grade: *grade,
                        price_per_kg: *price,
                        effective_date: *effective_date,
                    })
            })
            .collect()
    }
}

impl FromIterator<PriceEntry> for PriceBook {
    fn from_iter<I: IntoIterator<Item = PriceEntry>>(iter: I) -> Self {
        let mut book = PriceBook::new();
        for entry in iter {
            book.insert(entry);
        }
        book
    }
}
