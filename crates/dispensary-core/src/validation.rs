//! # Validation Module
//!
//! Input validation for ledger submissions.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Forms (browser)                                              │
//! │  └── Required fields, autocomplete                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before the transaction opens)                   │
//! │  ├── names, bill numbers, regnos                                       │
//! │  └── quantity > 0, price >= 0, non-empty bills                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── UNIQUE (bill number, medicine name, (date, regno))                │
//! │  ├── CHECK (quantity > 0, journal balance, summary totals)             │
//! │  └── append-only triggers on event tables                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A submission that fails here has touched nothing.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::{AdjustMedicine, BillSubmission, DiagnosisSubmission, NewMedicine};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a medicine name (1-200 characters after trimming).
///
/// ```rust
/// use dispensary_core::validation::validate_medicine_name;
///
/// assert!(validate_medicine_name("Paracetamol 500mg").is_ok());
/// assert!(validate_medicine_name("   ").is_err());
/// ```
pub fn validate_medicine_name(name: &str) -> ValidationResult<()> {
    required_text("medicine name", name, 200)
}

/// Validates a purchase bill number (1-50 characters after trimming).
pub fn validate_bill_number(bill_number: &str) -> ValidationResult<()> {
    required_text("bill number", bill_number, 50)
}

/// Validates a patient registration number.
///
/// ## Rules
/// - 1-30 characters after trimming
/// - Letters, digits, `-`, `/` and `_` only (e.g. "21CS01", "STF/104")
pub fn validate_regno(regno: &str) -> ValidationResult<()> {
    required_text("regno", regno, 30)?;

    if !regno
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "regno".to_string(),
            reason: "must contain only letters, digits, '-', '/' and '_'".to_string(),
        });
    }

    Ok(())
}

/// Validates an entity id (UUID).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in paise. Must be greater than zero.
pub fn validate_price_paise(paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    Ok(())
}

fn validate_grand_total(paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::InvalidFormat {
            field: "grand total".to_string(),
            reason: "must not be negative".to_string(),
        });
    }

    Ok(())
}

/// Validates an administrative stock delta (non-zero, bounded).
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 || delta.abs() > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_ITEM_QUANTITY,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

fn validate_line_count(field: &str, count: usize) -> ValidationResult<()> {
    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates a reporting range.
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> ValidationResult<()> {
    if from > to {
        return Err(ValidationError::InvertedRange { from, to });
    }

    Ok(())
}

// =============================================================================
// Submission Validators
// =============================================================================

/// Validates a whole purchase bill before any write.
///
/// ## Rules
/// - Bill number present
/// - Grand total non-negative
/// - At least one item, at most MAX_LINE_ITEMS
/// - Every item: name present, quantity > 0, price > 0
pub fn validate_bill_submission(bill: &BillSubmission) -> ValidationResult<()> {
    validate_bill_number(&bill.header.bill_number)?;
    validate_grand_total(bill.header.grand_total.paise())?;

    if bill.items.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }
    validate_line_count("items", bill.items.len())?;

    for item in &bill.items {
        validate_medicine_name(&item.medicine_name)?;
        validate_quantity(item.quantity)?;
        validate_price_paise(item.price_per_unit.paise())?;
    }

    Ok(())
}

/// Validates an explicit catalog addition.
pub fn validate_new_medicine(medicine: &NewMedicine) -> ValidationResult<()> {
    validate_medicine_name(&medicine.name)?;

    if medicine.stock < 0 || medicine.stock > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY,
        });
    }

    if let Some(price) = medicine.price_per_unit {
        validate_price_paise(price.paise())?;
    }

    Ok(())
}

/// Validates an administrative adjustment.
///
/// Either a non-zero delta or a new price must be present.
pub fn validate_adjustment(adjustment: &AdjustMedicine) -> ValidationResult<()> {
    validate_id("medicine id", &adjustment.medicine_id)?;

    match (adjustment.delta, adjustment.new_price) {
        (0, None) => {
            return Err(ValidationError::Required {
                field: "delta or new price".to_string(),
            })
        }
        (0, Some(_)) => {}
        (delta, _) => validate_stock_delta(delta)?,
    }

    if let Some(price) = adjustment.new_price {
        validate_price_paise(price.paise())?;
    }

    Ok(())
}

/// Validates a diagnosis before any write.
///
/// An empty prescription list is allowed (a visit without medicine).
pub fn validate_diagnosis_submission(diagnosis: &DiagnosisSubmission) -> ValidationResult<()> {
    validate_regno(&diagnosis.regno)?;
    validate_line_count("items", diagnosis.items.len())?;

    for item in &diagnosis.items {
        validate_medicine_name(&item.medicine_name)?;
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{BillHeader, BillItemInput, PrescriptionInput};

    fn bill(items: Vec<BillItemInput>) -> BillSubmission {
        BillSubmission {
            header: BillHeader {
                bill_number: "B1".to_string(),
                purchase_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                enterprise_name: Some("City Pharma".to_string()),
                grand_total: Money::from_paise(20_000),
            },
            items,
        }
    }

    fn item(name: &str, quantity: i64, price: i64) -> BillItemInput {
        BillItemInput {
            medicine_name: name.to_string(),
            quantity,
            price_per_unit: Money::from_paise(price),
        }
    }

    #[test]
    fn test_validate_regno() {
        assert!(validate_regno("21CS01").is_ok());
        assert!(validate_regno("STF/104").is_ok());
        assert!(validate_regno("").is_err());
        assert!(validate_regno("21 CS 01").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_bill_rules() {
        assert!(validate_bill_submission(&bill(vec![item("Paracetamol", 100, 200)])).is_ok());

        let err = validate_bill_submission(&bill(vec![])).unwrap_err();
        assert!(matches!(err, ValidationError::Empty { .. }));

        assert!(validate_bill_submission(&bill(vec![item("Paracetamol", 0, 200)])).is_err());
        assert!(validate_bill_submission(&bill(vec![item("Paracetamol", 5, -1)])).is_err());

        let err = validate_bill_submission(&bill(vec![item("Paracetamol", 5, 0)])).unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { ref field } if field == "price"));
        assert!(validate_bill_submission(&bill(vec![item(" ", 5, 100)])).is_err());
    }

    #[test]
    fn test_diagnosis_rules() {
        let mut diagnosis = DiagnosisSubmission {
            regno: "21CS01".to_string(),
            problems: "fever".to_string(),
            diagnosis: "viral".to_string(),
            items: vec![],
        };
        assert!(validate_diagnosis_submission(&diagnosis).is_ok());

        diagnosis.items.push(PrescriptionInput {
            medicine_name: "Paracetamol".to_string(),
            quantity: -10,
            instructions: String::new(),
        });
        assert!(validate_diagnosis_submission(&diagnosis).is_err());
    }

    #[test]
    fn test_adjustment_rules() {
        let mut adj = AdjustMedicine {
            medicine_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            delta: 0,
            new_price: None,
            reason: None,
        };
        assert!(validate_adjustment(&adj).is_err());

        adj.new_price = Some(Money::from_paise(250));
        assert!(validate_adjustment(&adj).is_ok());

        adj.new_price = Some(Money::from_paise(0));
        assert!(validate_adjustment(&adj).is_err());

        adj.delta = -5;
        adj.new_price = None;
        assert!(validate_adjustment(&adj).is_ok());

        adj.medicine_id = "nope".to_string();
        assert!(validate_adjustment(&adj).is_err());
    }

    #[test]
    fn test_new_medicine_rules() {
        let mut med = NewMedicine {
            name: "Cetirizine".to_string(),
            stock: 0,
            price_per_unit: None,
        };
        assert!(validate_new_medicine(&med).is_ok());

        med.price_per_unit = Some(Money::from_paise(0));
        assert!(validate_new_medicine(&med).is_err());

        med.price_per_unit = Some(Money::from_paise(150));
        assert!(validate_new_medicine(&med).is_ok());

        med.stock = -1;
        assert!(validate_new_medicine(&med).is_err());
    }

    #[test]
    fn test_date_range() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        assert!(validate_date_range(a, b).is_ok());
        assert!(validate_date_range(a, a).is_ok());
        assert!(validate_date_range(b, a).is_err());
    }
}
