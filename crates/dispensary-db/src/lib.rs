//! # dispensary-db: Ledger and Storage for the Clinic Dispensary
//!
//! SQLite storage for the medicine catalog, purchase bills, visits, the daily
//! stock journal and the daily visit summary, plus the [`Ledger`] that keeps
//! them consistent.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Dispensary Data Flow                              │
//! │                                                                         │
//! │  Bill entry form / Diagnosis form / Stock report                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  dispensary-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Ledger     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger.rs)  │───►│  medicine     │    │  (embedded)  │  │   │
//! │  │   │               │    │  journal      │    │              │  │   │
//! │  │   │ one tx per    │    │  summary      │    │ 001_initial_ │  │   │
//! │  │   │ submission    │    │  bill, visit  │    │ schema.sql   │  │   │
//! │  │   └───────┬───────┘    │  report       │    └──────────────┘  │   │
//! │  │           │            └───────────────┘                       │   │
//! │  │   ┌───────▼───────┐    ┌───────────────┐                       │   │
//! │  │   │   Database    │    │    Config     │                       │   │
//! │  │   │   (pool.rs)   │◄───│  (config.rs)  │                       │   │
//! │  │   └───────────────┘    └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`ledger`] - Transaction coordinator for bills, diagnoses and catalog edits
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - TOML configuration with environment overrides
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (medicine, journal, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dispensary_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/dispensary.db")).await?;
//!
//! let receipt = db.ledger().submit_purchase_bill(&bill).await?;
//! let report = db.reports().stock_movement(from, to).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DispensaryConfig, LedgerSettings};
pub use error::{ConfigError, DbError, DbResult};
pub use ledger::Ledger;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::bill::BillRepository;
pub use repository::journal::JournalRepository;
pub use repository::medicine::{MedicineReferences, MedicineRepository};
pub use repository::patient::PatientRepository;
pub use repository::report::ReportRepository;
pub use repository::summary::SummaryRepository;
pub use repository::visit::VisitRepository;
