//! Farmer models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A farmer registered with a cooperative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farmer {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub farmer_code: String,
    pub name: String,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub village: Option<String>,
    pub farm_size_ha: Option<Decimal>,
    /// Login account with the `farmer` role, if one was created
    pub user_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Running totals for a farmer's deliveries and payments
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FarmerTotals {
    pub harvest_count: i64,
    pub delivered_kg: Decimal,
    pub paid_amount: Decimal,
    /// Verified weight not yet attached to a payment
    pub outstanding_kg: Decimal,
}
