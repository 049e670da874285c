//! Batch models
//!
//! A batch groups verified harvests of one crop for storage and dispatch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HarvestStatus;
use crate::error::DomainError;

/// A batch of harvests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub batch_code: String,
    pub crop: String,
    pub status: BatchStatus,
    pub total_weight_kg: Decimal,
    pub harvest_count: i32,
    pub destination: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Open,
    Closed,
    Dispatched,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Open => "open",
            BatchStatus::Closed => "closed",
            BatchStatus::Dispatched => "dispatched",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(BatchStatus::Open),
            "closed" => Some(BatchStatus::Closed),
            "dispatched" => Some(BatchStatus::Dispatched),
            _ => None,
        }
    }

    fn transition(self, action: &'static str, allowed: BatchStatus, to: BatchStatus) -> Result<Self, DomainError> {
        if self == allowed {
            Ok(to)
        } else {
            Err(DomainError::InvalidTransition {
                entity: "batch",
                from: self.as_str().to_string(),
                action,
            })
        }
    }

    /// Membership changes are only allowed on open batches
    pub fn ensure_open(self) -> Result<(), DomainError> {
        self.transition("modify", BatchStatus::Open, BatchStatus::Open)
            .map(|_| ())
    }

    pub fn close(self, harvest_count: i32) -> Result<Self, DomainError> {
        let next = self.transition("close", BatchStatus::Open, BatchStatus::Closed)?;
        if harvest_count == 0 {
            return Err(DomainError::invalid("harvest_ids", "cannot close an empty batch"));
        }
        Ok(next)
    }

    pub fn dispatch(self) -> Result<Self, DomainError> {
        self.transition("dispatch", BatchStatus::Closed, BatchStatus::Dispatched)
    }
}

/// The harvest fields that decide whether it may join a batch
#[derive(Debug, Clone)]
pub struct BatchCandidate {
    pub id: Uuid,
    pub crop: String,
    pub status: HarvestStatus,
    pub batch_id: Option<Uuid>,
    pub weight_kg: Decimal,
}

/// Check that every candidate is a verified, unbatched harvest of `crop`.
///
/// Returns the combined weight of the candidates.
pub fn check_batch_candidates(crop: &str, candidates: &[BatchCandidate]) -> Result<Decimal, DomainError> {
    if candidates.is_empty() {
        return Err(DomainError::invalid("harvest_ids", "at least one harvest is required"));
    }

    let mut total = Decimal::ZERO;
    for c in candidates {
        if c.status != HarvestStatus::Verified {
            return Err(DomainError::invalid(
                "harvest_ids",
                format!("harvest {} is {}, only verified harvests can be batched", c.id, c.status),
            ));
        }
        if c.batch_id.is_some() {
            return Err(DomainError::invalid(
                "harvest_ids",
                format!("harvest {} already belongs to a batch", c.id),
            ));
        }
        if c.crop != crop {
            return Err(DomainError::invalid(
                "harvest_ids",
                format!("harvest {} is {}, batch is {}", c.id, c.crop, crop),
            ));
        }
        total += c.weight_kg;
    }
    Ok(total)
}
