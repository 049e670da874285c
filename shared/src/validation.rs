//! Validation utilities for the Cooperative Management Platform

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::types::DateRange;

// ============================================================================
// Produce Validations
// ============================================================================

/// Largest single delivery the platform accepts, in kilograms
pub const MAX_HARVEST_WEIGHT_KG: i64 = 100_000;

/// Decimal places stored for weights, percentages and money
pub const STORED_DECIMAL_PLACES: u32 = 2;

/// True when `value` is stored without rounding (trailing zeros don't count)
pub fn fits_stored_scale(value: Decimal) -> bool {
    value.normalize().scale() <= STORED_DECIMAL_PLACES
}

/// Validate a delivered weight (strictly positive, bounded, at most two decimals)
pub fn validate_weight(weight_kg: Decimal) -> Result<(), &'static str> {
    if weight_kg <= Decimal::ZERO {
        return Err("Weight must be greater than 0");
    }
    if weight_kg > Decimal::from(MAX_HARVEST_WEIGHT_KG) {
        return Err("Weight exceeds the maximum for a single delivery");
    }
    if !fits_stored_scale(weight_kg) {
        return Err("Weight can have at most 2 decimal places");
    }
    Ok(())
}

/// Validate moisture content is a percentage
pub fn validate_moisture_content(moisture: Decimal) -> Result<(), &'static str> {
    if moisture < Decimal::ZERO || moisture > Decimal::from(100) {
        return Err("Moisture content must be between 0 and 100%");
    }
    if !fits_stored_scale(moisture) {
        return Err("Moisture content can have at most 2 decimal places");
    }
    Ok(())
}

/// Harvests cannot be recorded for a future day or before the first storable one
pub fn validate_harvest_date(date: NaiveDate, today: NaiveDate) -> Result<(), &'static str> {
    if date > today {
        return Err("Harvest date cannot be in the future");
    }
    if date < DateRange::earliest() {
        return Err("Harvest date is out of range");
    }
    Ok(())
}

/// Normalise a crop name: trimmed, lowercase, single spaces
pub fn normalize_crop(crop: &str) -> Result<String, &'static str> {
    let normalized = crop
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        return Err("Crop is required");
    }
    if normalized.len() > 50 {
        return Err("Crop name must be at most 50 characters");
    }
    Ok(normalized)
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate cooperative code format (3-10 uppercase alphanumeric)
pub fn validate_cooperative_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Cooperative code must be at least 3 characters");
    }
    if code.len() > 10 {
        return Err("Cooperative code must be at most 10 characters");
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err("Cooperative code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) || !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain letters and digits");
    }
    Ok(())
}

/// Validate a phone number: optional leading `+`, then 9-15 digits.
/// Spaces and dashes are ignored.
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if body.chars().any(|c| !(c.is_ascii_digit() || c == ' ' || c == '-')) {
        return Err("Phone number may only contain digits, spaces and dashes");
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(9..=15).contains(&digits) {
        return Err("Phone number must have 9 to 15 digits");
    }
    Ok(())
}
