//! # Domain Types
//!
//! Core domain types used throughout the dispensary ledger.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog              Stock Event Log             Derived caches        │
//! │  ───────              ───────────────             ──────────────        │
//! │  Medicine ◄────────── PurchaseBillItem (in)       StockJournalRow       │
//! │    id, name,          PrescribedMedicine (out)    (medicine, date)      │
//! │    stock, price       StockAdjustment (admin)                           │
//! │                                                   DailySummary (date)   │
//! │  Patient ──► VisitCategory ──────────────────────► counters + guard     │
//! │                                                                         │
//! │  Inputs: BillSubmission, DiagnosisSubmission                            │
//! │  Outputs: BillReceipt, DiagnosisReceipt, StockMovement, drift reports   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Catalog rows, bills and visits have a UUID `id` for relations plus a
//! business key (medicine name, bill number, patient regno). Prescriptions
//! and legacy bill particulars reference medicines by name, purchase items by
//! id; both reference styles are live.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::journal::JournalEntry;
use crate::money::Money;

// =============================================================================
// Visit Category
// =============================================================================

/// The four patient categories tallied per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum VisitCategory {
    MaleStudent,
    FemaleStudent,
    MaleStaff,
    FemaleStaff,
}

impl VisitCategory {
    pub const ALL: [VisitCategory; 4] = [
        VisitCategory::MaleStudent,
        VisitCategory::FemaleStudent,
        VisitCategory::MaleStaff,
        VisitCategory::FemaleStaff,
    ];

    /// Derives the category from a patient's stored gender and type.
    ///
    /// Matching is case-insensitive on the trimmed words `male`/`female` and
    /// `student`/`staff`; anything else is an [`CoreError::UnknownCategory`].
    ///
    /// ```rust
    /// use dispensary_core::VisitCategory;
    ///
    /// let c = VisitCategory::from_gender_and_type("Male", "Student").unwrap();
    /// assert_eq!(c, VisitCategory::MaleStudent);
    /// assert!(VisitCategory::from_gender_and_type("Male", "Visitor").is_err());
    /// ```
    pub fn from_gender_and_type(gender: &str, patient_type: &str) -> CoreResult<Self> {
        let g = gender.trim().to_ascii_lowercase();
        let t = patient_type.trim().to_ascii_lowercase();

        match (g.as_str(), t.as_str()) {
            ("male", "student") => Ok(VisitCategory::MaleStudent),
            ("female", "student") => Ok(VisitCategory::FemaleStudent),
            ("male", "staff") => Ok(VisitCategory::MaleStaff),
            ("female", "staff") => Ok(VisitCategory::FemaleStaff),
            _ => Err(CoreError::UnknownCategory {
                gender: gender.to_string(),
                patient_type: patient_type.to_string(),
            }),
        }
    }

    /// Counter column in `daily_summary`.
    pub const fn column(&self) -> &'static str {
        match self {
            VisitCategory::MaleStudent => "male_student",
            VisitCategory::FemaleStudent => "female_student",
            VisitCategory::MaleStaff => "male_staff",
            VisitCategory::FemaleStaff => "female_staff",
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            VisitCategory::MaleStudent => "male-student",
            VisitCategory::FemaleStudent => "female-student",
            VisitCategory::MaleStaff => "male-staff",
            VisitCategory::FemaleStaff => "female-staff",
        }
    }
}

impl fmt::Display for VisitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Patient
// =============================================================================

/// A registered patient. Gender and type are stored as entered on the
/// registration form; [`Patient::category`] interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Registration number, e.g. "21CS01".
    pub regno: String,
    pub name: String,
    pub age: Option<i64>,
    pub gender: String,
    pub patient_type: String,
    #[ts(as = "String")]
    pub registered_on: NaiveDate,
    pub mobile: Option<String>,
    pub department: Option<String>,
    pub stay_type: Option<String>,
}

impl Patient {
    pub fn category(&self) -> CoreResult<VisitCategory> {
        VisitCategory::from_gender_and_type(&self.gender, &self.patient_type)
    }
}

// =============================================================================
// Medicine
// =============================================================================

/// A catalog entry: the authoritative current stock count and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: String,
    /// Unique, compared case-insensitively.
    pub name: String,
    /// Intended to stay >= 0; only enforced when the stock floor is on.
    pub stock: i64,
    pub price_per_unit_paise: Option<i64>,
    #[ts(as = "String")]
    pub last_updated: NaiveDate,
}

impl Medicine {
    pub fn price_per_unit(&self) -> Option<Money> {
        self.price_per_unit_paise.map(Money::from_paise)
    }
}

/// Explicit catalog addition from the medicine-management surface.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewMedicine {
    pub name: String,
    pub stock: i64,
    pub price_per_unit: Option<Money>,
}

// =============================================================================
// Purchase Bills (stock-in events)
// =============================================================================

/// A committed purchase bill. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBill {
    pub id: String,
    pub bill_number: String,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    pub enterprise_name: Option<String>,
    pub grand_total_paise: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One stock-in event: `quantity` units of `medicine_id` on the bill's date.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBillItem {
    pub id: String,
    pub purchase_bill_id: String,
    /// Position in the submitted list, starting at 1.
    pub line_no: i64,
    pub medicine_id: String,
    pub quantity: i64,
    pub price_per_unit_paise: i64,
}

/// Header of a bill being submitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillHeader {
    pub bill_number: String,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    pub enterprise_name: Option<String>,
    pub grand_total: Money,
}

/// One line of a bill being submitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillItemInput {
    pub medicine_name: String,
    pub quantity: i64,
    pub price_per_unit: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillSubmission {
    pub header: BillHeader,
    pub items: Vec<BillItemInput>,
}

/// Per-line outcome of a committed bill.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillLineTotal {
    pub medicine_id: String,
    pub medicine_name: String,
    pub quantity: i64,
    pub price_per_unit: Money,
    pub line_total: Money,
    /// Catalog stock right after this line was applied.
    pub stock_after: i64,
}

/// Result of a committed purchase bill.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillReceipt {
    pub bill_id: String,
    pub bill_number: String,
    pub lines: Vec<BillLineTotal>,
    /// Sum of line totals.
    pub items_total: Money,
    /// Grand total as entered on the bill header.
    pub grand_total: Money,
}

// =============================================================================
// Visits (stock-out events)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: String,
    pub patient_regno: String,
    #[ts(as = "String")]
    pub visit_date: NaiveDate,
    pub problems: String,
    pub diagnosis: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One stock-out event, referencing the medicine by catalog name.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PrescribedMedicine {
    pub id: String,
    pub visit_id: String,
    pub line_no: i64,
    pub medicine_name: String,
    pub quantity: i64,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionInput {
    pub medicine_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisSubmission {
    pub regno: String,
    pub problems: String,
    pub diagnosis: String,
    #[serde(default)]
    pub items: Vec<PrescriptionInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionLine {
    pub medicine_id: String,
    pub medicine_name: String,
    pub quantity: i64,
    pub stock_after: i64,
}

/// Result of a committed diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisReceipt {
    pub visit_id: String,
    #[ts(as = "String")]
    pub visit_date: NaiveDate,
    pub category: VisitCategory,
    pub lines: Vec<PrescriptionLine>,
}

// =============================================================================
// Stock Adjustments (administrative events)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub id: String,
    pub medicine_id: String,
    #[ts(as = "String")]
    pub adjustment_date: NaiveDate,
    pub delta: i64,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Administrative correction from the medicine-management surface.
///
/// A zero `delta` with a `new_price` is a price-only update and leaves no
/// adjustment event.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdjustMedicine {
    pub medicine_id: String,
    #[serde(default)]
    pub delta: i64,
    #[serde(default)]
    pub new_price: Option<Money>,
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Derived Caches
// =============================================================================

/// One materialized `(medicine, date)` journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockJournalRow {
    pub medicine_name: String,
    #[ts(as = "String")]
    pub journal_date: NaiveDate,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub entry: JournalEntry,
}

/// Per-date visit tally with the same-day guard list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    #[ts(as = "String")]
    pub summary_date: NaiveDate,
    pub male_student: i64,
    pub female_student: i64,
    pub male_staff: i64,
    pub female_staff: i64,
    pub total_entries: i64,
    /// Patients diagnosed that day, in visit order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub regnos: Vec<String>,
}

impl DailySummary {
    pub fn count_for(&self, category: VisitCategory) -> i64 {
        match category {
            VisitCategory::MaleStudent => self.male_student,
            VisitCategory::FemaleStudent => self.female_student,
            VisitCategory::MaleStaff => self.male_staff,
            VisitCategory::FemaleStaff => self.female_staff,
        }
    }

    /// `total_entries` equals both the counter sum and the guard size.
    pub fn is_consistent(&self) -> bool {
        let counters: i64 = VisitCategory::ALL.iter().map(|c| self.count_for(*c)).sum();
        self.total_entries == counters && self.total_entries == self.regnos.len() as i64
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Opening/in/out/closing for one medicine over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub medicine_id: String,
    pub medicine_name: String,
    pub opening_stock: i64,
    pub stock_in: i64,
    pub stock_out: i64,
    pub closing_stock: i64,
}

/// A medicine whose journal-derived movement disagrees with the event log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MovementDrift {
    pub medicine_name: String,
    pub event_log: StockMovement,
    pub journal: StockMovement,
}

/// A medicine whose catalog stock disagrees with the sum of its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockDrift {
    pub medicine_id: String,
    pub medicine_name: String,
    pub catalog_stock: i64,
    pub event_stock: i64,
}

/// One bill line joined with its bill header, for the purchase report.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReportLine {
    pub bill_no: String,
    #[ts(as = "String")]
    pub bill_date: NaiveDate,
    pub enterprise_name: Option<String>,
    pub grand_total_paise: i64,
    pub medicine_name: String,
    pub quantity: i64,
    pub price_per_unit_paise: i64,
    pub line_total_paise: i64,
}
