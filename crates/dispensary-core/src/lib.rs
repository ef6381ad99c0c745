//! # dispensary-core: Pure Domain Logic for the Dispensary Ledger
//!
//! Domain types, journal arithmetic, visit categories and input validation,
//! all as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Dispensary Ledger Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Callers (forms, HTTP handlers, PDF/Excel export)       │   │
//! │  │   Bill entry ──► Diagnosis entry ──► Stock movement report      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            dispensary-db (Ledger Transaction Coordinator)        │   │
//! │  │     catalog • journal • visit summary • reporter (SQLite)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ uses                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ dispensary-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  journal  │  │ validation│  │   │
//! │  │   │ Medicine  │  │   Money   │  │ Opening / │  │   rules   │  │   │
//! │  │   │ Visit ... │  │  (paise)  │  │ In / Out  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, PurchaseBill, Visit, DailySummary, ...)
//! - [`money`] - Money type with integer arithmetic in paise
//! - [`journal`] - Daily stock journal arithmetic
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation for submissions
//!
//! ## Example Usage
//!
//! ```rust
//! use dispensary_core::journal::JournalEntry;
//!
//! // First purchase of the day, nothing recorded before
//! let mut day = JournalEntry::opened_with(0);
//! day.record_in(100);
//! day.record_out(10);
//!
//! assert_eq!(day.closing_stock, 90);
//! assert!(day.is_balanced());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod journal;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use journal::JournalEntry;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on one purchase bill or one prescription.
///
/// ## Business Reason
/// A single clinic bill rarely carries more than a few dozen lines; the cap
/// keeps one submission (and its write lock) short.
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Catches typing mistakes (an extra zero or two) on bulk strip purchases.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;
