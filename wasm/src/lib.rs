//! WebAssembly module for the Cooperative Management Platform
//!
//! Provides client-side computation for:
//! - Payment line amounts and payment previews
//! - Weight and cooperative code validation
//! - Grade labels
//!
//! Money and weights cross the boundary as decimal strings so the browser
//! shows exactly what the server will pay.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{line_amount, QualityGrade};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// A line as entered in the browser
#[derive(Debug, Deserialize)]
struct PreviewLineInput {
    crop: String,
    grade: QualityGrade,
    weight_kg: Decimal,
    unit_price: Decimal,
}

#[derive(Debug, Serialize)]
struct PreviewLine {
    crop: String,
    grade: QualityGrade,
    weight_kg: Decimal,
    unit_price: Decimal,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct PaymentPreview {
    lines: Vec<PreviewLine>,
    total_weight_kg: Decimal,
    total_amount: Decimal,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|_| format!("{} must be a decimal number", field))
}

/// The server stores two decimals, so a finer value would be priced differently there
fn check_scale(field: &str, value: Decimal) -> Result<Decimal, String> {
    if shared::fits_stored_scale(value) {
        Ok(value)
    } else {
        Err(format!("{} can have at most 2 decimal places", field))
    }
}

fn compute_line_amount(weight: &str, unit_price: &str) -> Result<String, String> {
    let weight = check_scale("weight", parse_decimal("weight", weight)?)?;
    let unit_price = check_scale("unit_price", parse_decimal("unit_price", unit_price)?)?;
    Ok(line_amount(weight, unit_price).to_string())
}

fn compute_preview(lines_json: &str) -> Result<String, String> {
    let inputs: Vec<PreviewLineInput> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;

    let lines: Vec<PreviewLine> = inputs
        .into_iter()
        .map(|l| -> Result<PreviewLine, String> {
            let weight_kg = check_scale("weight_kg", l.weight_kg)?;
            // Rejected produce is never paid, whatever price was typed
            let unit_price = if l.grade.is_reject() {
                Decimal::ZERO
            } else {
                check_scale("unit_price", l.unit_price)?
            };
            Ok(PreviewLine {
                amount: line_amount(weight_kg, unit_price),
                crop: l.crop,
                grade: l.grade,
                weight_kg,
                unit_price,
            })
        })
        .collect::<Result<_, _>>()?;

    let preview = PaymentPreview {
        total_weight_kg: lines.iter().map(|l| l.weight_kg).sum(),
        total_amount: lines.iter().map(|l| l.amount).sum(),
        lines,
    };
    serde_json::to_string(&preview).map_err(|e| format!("Serialization failed: {}", e))
}

/// `weight × unit price`, rounded to cents
#[wasm_bindgen]
pub fn calculate_line_amount(weight: &str, unit_price: &str) -> Result<String, JsValue> {
    compute_line_amount(weight, unit_price).map_err(|e| JsValue::from_str(&e))
}

/// Price a list of `{crop, grade, weight_kg, unit_price}` lines and total them
#[wasm_bindgen]
pub fn preview_payment(lines_json: &str) -> Result<String, JsValue> {
    compute_preview(lines_json).map_err(|e| JsValue::from_str(&e))
}

/// Validation message for a harvest weight, or `None` when it is acceptable
#[wasm_bindgen]
pub fn validate_weight(weight: &str) -> Option<String> {
    match parse_decimal("weight", weight) {
        Ok(w) => shared::validate_weight(w).err().map(str::to_string),
        Err(e) => Some(e),
    }
}

#[wasm_bindgen]
pub fn is_valid_cooperative_code(code: &str) -> bool {
    shared::validate_cooperative_code(code).is_ok()
}

/// Human-readable label for a grade code such as `"b"` or `"REJECT"`
#[wasm_bindgen]
pub fn classify_grade_label(grade: &str) -> Option<String> {
    QualityGrade::parse(grade).map(|g| g.label().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_line_amount() {
        assert_eq!(calculate_line_amount("12.5", "30.25").unwrap(), "378.13");
        assert_eq!(calculate_line_amount(" 10 ", "45").unwrap(), "450");
    }

    #[test]
    fn test_line_amount_rejects_garbage() {
        assert_eq!(
            compute_line_amount("ten", "45").unwrap_err(),
            "weight must be a decimal number"
        );
    }

    #[test]
    fn test_preview_totals_and_reject() {
        let json = r#"[
            {"crop": "coffee", "grade": "A", "weight_kg": "100", "unit_price": "52.50"},
            {"crop": "coffee", "grade": "REJECT", "weight_kg": "8", "unit_price": "52.50"},
            {"crop": "coffee", "grade": "C", "weight_kg": "12.5", "unit_price": "30.25"}
        ]"#;
        let out: serde_json::Value = serde_json::from_str(&preview_payment(json).unwrap()).unwrap();
        assert_eq!(out["total_amount"], "5628.13");
        assert_eq!(out["total_weight_kg"], "120.5");
        assert_eq!(out["lines"][1]["amount"], "0");
    }

    #[test]
    fn test_sub_cent_inputs_refused() {
        assert_eq!(
            compute_line_amount("10", "52.505").unwrap_err(),
            "unit_price can have at most 2 decimal places"
        );
        let json = r#"[{"crop": "coffee", "grade": "A", "weight_kg": "0.001", "unit_price": "52.50"}]"#;
        assert!(compute_preview(json).is_err());
        assert!(validate_weight("0.001").is_some());
    }

    #[test]
    fn test_preview_rejects_bad_json() {
        assert!(compute_preview("{not json").is_err());
        assert!(compute_preview(r#"[{"crop": "coffee", "grade": "Z", "weight_kg": "1", "unit_price": "1"}]"#).is_err());
    }

    #[test]
    fn test_validate_weight() {
        assert_eq!(validate_weight("25.5"), None);
        assert!(validate_weight("0").is_some());
        assert!(validate_weight("abc").is_some());
    }

    #[test]
    fn test_cooperative_code_and_grade_label() {
        assert!(is_valid_cooperative_code("KAF01"));
        assert!(!is_valid_cooperative_code("kaf"));
        assert_eq!(classify_grade_label("b").as_deref(), Some("Grade B (standard)"));
        assert_eq!(classify_grade_label("reject").as_deref(), Some("Rejected"));
        assert_eq!(classify_grade_label("Z"), None);
    }
}
