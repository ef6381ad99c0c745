//! # Repository Module
//!
//! Database repository implementations for the dispensary ledger.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Read side (&self, uses the pool)                                      │
//! │  └── db.medicines().get_by_name("Paracetamol")                         │
//! │       db.reports().stock_movement(from, to)                            │
//! │                                                                         │
//! │  Write side (associated fns, take &mut SqliteConnection)               │
//! │  └── MedicineRepository::adjust_stock(&mut *tx, id, -10, None, date)   │
//! │       JournalRepository::record_out(&mut *tx, name, date, 10, 100)     │
//! │       │                                                                 │
//! │       │  called only by the Ledger, inside its BEGIN IMMEDIATE tx      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write-side functions never open their own transaction, so one submission
//! composes many of them and commits or rolls back once.
//!
//! ## Available Repositories
//!
//! - [`MedicineRepository`](medicine::MedicineRepository) - Catalog and stock adjustments
//! - [`JournalRepository`](journal::JournalRepository) - Daily stock journal
//! - [`SummaryRepository`](summary::SummaryRepository) - Daily visit summary and guard
//! - [`BillRepository`](bill::BillRepository) - Purchase bills (primary + legacy)
//! - [`VisitRepository`](visit::VisitRepository) - Visits and prescriptions
//! - [`PatientRepository`](patient::PatientRepository) - Patient registry
//! - [`ReportRepository`](report::ReportRepository) - Stock movement and reconciliation

pub mod bill;
pub mod journal;
pub mod medicine;
pub mod patient;
pub mod report;
pub mod summary;
pub mod visit;
