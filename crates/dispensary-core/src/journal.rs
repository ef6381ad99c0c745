//! # Daily Stock Journal Arithmetic
//!
//! Pure opening/in/out/closing bookkeeping for one `(medicine, date)` row.
//! The database layer owns where rows live; this module owns what the
//! numbers must satisfy.
//!
//! ## Journal Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (Paracetamol, 2024-01-11)                                              │
//! │                                                                         │
//! │  first touch ──► opening = latest prior closing (or seed) ───┐          │
//! │                                                              ▼          │
//! │               ┌──────────┬──────────┬──────────┬──────────┐            │
//! │               │ opening  │    in    │   out    │ closing  │            │
//! │               │   100    │    0     │    10    │    90    │            │
//! │               └──────────┴──────────┴──────────┴──────────┘            │
//! │                                                                         │
//! │  every later touch: in += q / out += q, closing moves with it           │
//! │  invariant:  closing == opening + in - out                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Opening/in/out/closing figures for one medicine on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub opening_stock: i64,
    pub stock_in: i64,
    pub stock_out: i64,
    pub closing_stock: i64,
}

impl JournalEntry {
    /// A fresh row with no movement yet.
    pub const fn opened_with(opening_stock: i64) -> Self {
        JournalEntry {
            opening_stock,
            stock_in: 0,
            stock_out: 0,
            closing_stock: opening_stock,
        }
    }

    /// Opening for a row first created by a stock-in event.
    ///
    /// Carries forward the latest prior closing; a medicine with no journal
    /// history opens at zero.
    pub fn opening_for_in(prior_closing: Option<i64>) -> i64 {
        prior_closing.unwrap_or(0)
    }

    /// Opening for a row first created by a stock-out event.
    ///
    /// Carries forward the latest prior closing when one exists. Without
    /// journal history the catalog's stock *before* this decrement is the
    /// only known fact, so it seeds the row.
    pub fn opening_for_out(prior_closing: Option<i64>, catalog_stock_before: i64) -> i64 {
        prior_closing.unwrap_or(catalog_stock_before)
    }

    pub fn record_in(&mut self, quantity: i64) {
        self.stock_in += quantity;
        self.closing_stock += quantity;
    }

    pub fn record_out(&mut self, quantity: i64) {
        self.stock_out += quantity;
        self.closing_stock -= quantity;
    }

    /// `closing == opening + in - out`
    pub const fn is_balanced(&self) -> bool {
        self.closing_stock == self.opening_stock + self.stock_in - self.stock_out
    }
}

/// Folds consecutive journal days into one movement over a period.
///
/// `prior_closing` is the latest closing strictly before the period; `days`
/// must be the period's rows in date order. Days with no row contribute no
/// movement, so the period opens at the first row's opening (or the prior
/// closing when the period has no rows) and closes at the last row's closing.
pub fn summarize(prior_closing: Option<i64>, days: &[JournalEntry]) -> JournalEntry {
    let carried = prior_closing.unwrap_or(0);

    let opening_stock = days.first().map_or(carried, |d| d.opening_stock);
    let closing_stock = days.last().map_or(carried, |d| d.closing_stock);

    JournalEntry {
        opening_stock,
        stock_in: days.iter().map(|d| d.stock_in).sum(),
        stock_out: days.iter().map(|d| d.stock_out).sum(),
        closing_stock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scenario_rows() {
        // 2024-01-10: purchase 100, nothing before
        let mut day1 = JournalEntry::opened_with(JournalEntry::opening_for_in(None));
        day1.record_in(100);
        assert_eq!(
            day1,
            JournalEntry { opening_stock: 0, stock_in: 100, stock_out: 0, closing_stock: 100 }
        );

        // 2024-01-11: prescribe 10, carries 100 forward
        let mut day2 = JournalEntry::opened_with(JournalEntry::opening_for_out(
            Some(day1.closing_stock),
            100,
        ));
        day2.record_out(10);
        assert_eq!(
            day2,
            JournalEntry { opening_stock: 100, stock_in: 0, stock_out: 10, closing_stock: 90 }
        );
    }

    #[test]
    fn test_out_without_history_seeds_from_catalog() {
        assert_eq!(JournalEntry::opening_for_out(None, 40), 40);
        assert_eq!(JournalEntry::opening_for_out(Some(12), 40), 12);
        assert_eq!(JournalEntry::opening_for_in(None), 0);
    }

    #[test]
    fn test_summarize_empty_period_carries_prior() {
        let period = summarize(Some(75), &[]);
        assert_eq!(period, JournalEntry::opened_with(75));

        let period = summarize(None, &[]);
        assert_eq!(period, JournalEntry::opened_with(0));
    }

    #[test]
    fn test_summarize_spans_days() {
        let mut a = JournalEntry::opened_with(10);
        a.record_in(5);
        let mut b = JournalEntry::opened_with(15);
        b.record_out(7);
        b.record_in(2);

        let period = summarize(Some(10), &[a, b]);
        assert_eq!(period.opening_stock, 10);
        assert_eq!(period.stock_in, 7);
        assert_eq!(period.stock_out, 7);
        assert_eq!(period.closing_stock, 10);
        assert!(period.is_balanced());
    }

    proptest! {
        #[test]
        fn prop_any_event_sequence_stays_balanced(
            opening in 0i64..10_000,
            events in prop::collection::vec((any::<bool>(), 1i64..500), 0..50),
        ) {
            let mut row = JournalEntry::opened_with(opening);
            for (is_in, qty) in events {
                if is_in { row.record_in(qty) } else { row.record_out(qty) }
                prop_assert!(row.is_balanced());
            }
        }

        #[test]
        fn prop_chained_days_summarize_balanced(
            start in 0i64..1_000,
            moves in prop::collection::vec((0i64..100, 0i64..100), 1..20),
        ) {
            let mut days = Vec::new();
            let mut carried = start;
            for (inn, out) in moves {
                let mut d = JournalEntry::opened_with(carried);
                d.record_in(inn);
                d.record_out(out);
                carried = d.closing_stock;
                days.push(d);
            }
            let period = summarize(Some(start), &days);
            prop_assert!(period.is_balanced());
            prop_assert_eq!(period.closing_stock, carried);
        }
    }
}
