//! # Ledger Errors
//!
//! ```text
//! validate_*() ── ValidationError ─┐
//!                                  ├─► CoreError ──► DbError::Domain ──► caller
//! ledger rules ────────────────────┘
//! ```
//!
//! Each [`CoreError`] has a stable [`code`](CoreError::code) the calling
//! layer can branch on. Nothing here is retried automatically; resubmitting
//! (for example with a new bill number) is up to the caller.

use chrono::NaiveDate;
use thiserror::Error;

/// Ledger rule violations.
///
/// Every variant is detected synchronously and surfaced to the caller; when
/// raised inside a submission the whole submission is rolled back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing input, rejected before any write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Bill number already used in the primary or the legacy bill store.
    #[error("Bill number {bill_number} already exists")]
    DuplicateBill { bill_number: String },

    /// Patient was already diagnosed on this date.
    ///
    /// ## User Workflow
    /// ```text
    /// Diagnosis form (regno: 21CS01)
    ///      │
    ///      ▼
    /// register_visit(today, MaleStudent, 21CS01)
    ///      │
    ///      ▼
    /// 21CS01 ∈ regnos visited today?  ── yes ──► DuplicateVisit
    ///      │                                      (no stock touched)
    ///      no
    ///      ▼
    /// counters += 1, guard += 21CS01
    /// ```
    #[error("Patient {regno} already diagnosed on {date}")]
    DuplicateVisit { regno: String, date: NaiveDate },

    /// No patient with this registration number.
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    /// Prescribed medicine is not in the catalog (no auto-create on the
    /// consumption path).
    #[error("Medicine \"{0}\" not found in stock")]
    MedicineNotFound(String),

    /// Gender/type pair does not map to one of the four visit categories.
    #[error("Invalid gender/type: {gender} {patient_type}")]
    UnknownCategory { gender: String, patient_type: String },

    /// Delete blocked by historical references.
    #[error(
        "Cannot delete medicine \"{medicine}\": referenced by {purchase_items} purchase records, \
         {bill_particulars} bill entries, {prescriptions} prescription records, \
         {adjustments} stock adjustments"
    )]
    ReferencedEntity {
        medicine: String,
        purchase_items: i64,
        bill_particulars: i64,
        prescriptions: i64,
        adjustments: i64,
    },

    /// Stock would go negative. Only raised when the stock floor is enforced.
    #[error("Insufficient stock for {medicine}: available {available}, requested {requested}")]
    InsufficientStock {
        medicine: String,
        available: i64,
        requested: i64,
    },

    /// Explicit add of a medicine whose name already exists (case-insensitive).
    #[error("Medicine \"{0}\" already exists")]
    MedicineExists(String),

    /// Registration of a patient whose regno already exists.
    #[error("Patient {0} already exists")]
    PatientExists(String),
}

impl CoreError {
    /// Stable machine-readable code for the calling layer.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::DuplicateBill { .. } => "DUPLICATE_BILL",
            CoreError::DuplicateVisit { .. } => "DUPLICATE_VISIT",
            CoreError::PatientNotFound(_) => "PATIENT_NOT_FOUND",
            CoreError::MedicineNotFound(_) => "MEDICINE_NOT_FOUND",
            CoreError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            CoreError::ReferencedEntity { .. } => "REFERENCED_ENTITY",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::MedicineExists(_) => "MEDICINE_EXISTS",
            CoreError::PatientExists(_) => "PATIENT_EXISTS",
        }
    }
}

/// A submission field failed a shape check. Raised before the ledger opens
/// a transaction.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Ages, quantities and similar bounded numbers.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Regnos with stray characters, ids that are not UUIDs, negative totals.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A list that must carry at least one entry is empty.
    #[error("{field} must contain at least one item")]
    Empty { field: String },

    /// Date range where `from` is after `to`.
    #[error("from ({from}) must not be after to ({to})")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
}

pub type CoreResult<T> = Result<T, CoreError>;
